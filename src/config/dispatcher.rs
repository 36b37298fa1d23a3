/// Main-thread dispatcher configuration constants.
use std::time::Duration;

/// Period between two drains of the main-thread queues.
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);
