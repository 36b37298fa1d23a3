/// Main-thread dispatch: hands work from background completions to the host thread.

pub mod queue;
pub mod executer;
