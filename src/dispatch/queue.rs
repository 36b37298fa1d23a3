//! Main-thread dispatch queues.
//!
//! Background tasks (backend completions) cannot touch host state directly: the host
//! runs all game and UI logic on a single cooperative thread. Producers push work into
//! the [`Dispatcher`]; the [`Executer`] actor living on the host thread drains it on
//! every tick.
//!
//! Two queues are kept: parameterized calls and parameterless callbacks. Each queue has
//! its own lock, held only for the push or the pop, never while a call runs, so a call
//! can enqueue more work without deadlocking.

use actix::prelude::*;
use log::{debug, error, trace};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::executer::Executer;

/// Untyped parameter carried by a [`PendingCall`].
pub type CallParameter = Box<dyn Any + Send>;

/// Function invoked with the untyped parameter of a [`PendingCall`].
pub type CallFunction = Box<dyn FnOnce(CallParameter) + Send>;

/// A queued call taking one parameter. Consumed exactly once.
pub struct PendingCall {
    func: CallFunction,
    parameter: CallParameter,
}

impl PendingCall {
    /// Build a call from an untyped function and parameter.
    pub fn new(func: CallFunction, parameter: CallParameter) -> Self {
        Self { func, parameter }
    }

    /// Build a call from a typed function. The parameter is boxed and handed back to
    /// `func` with its original type when the call runs.
    pub fn typed<T, F>(func: F, parameter: T) -> Self
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let func: CallFunction = Box::new(move |parameter: CallParameter| {
            match parameter.downcast::<T>() {
                Ok(value) => func(*value),
                Err(_) => error!(
                    "[Dispatcher] Dropped call: parameter is not a {}",
                    std::any::type_name::<T>()
                ),
            }
        });
        Self::new(func, Box::new(parameter))
    }

    fn execute(self) {
        (self.func)(self.parameter)
    }
}

/// A queued parameterless callback. Consumed exactly once.
pub struct PendingCallback(Box<dyn FnOnce() + Send>);

impl PendingCallback {
    pub fn new(func: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(func))
    }

    fn execute(self) {
        (self.0)()
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Parameterized calls removed from the queue and run.
    pub calls: usize,
    /// Parameterless callbacks removed from the queue and run.
    pub callbacks: usize,
    /// Invocations that panicked (already counted in `calls`/`callbacks`).
    pub failures: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.calls == 0 && self.callbacks == 0
    }
}

/// Process-wide dispatcher, created by the composition root and shared by handle.
pub struct Dispatcher {
    calls: Mutex<VecDeque<PendingCall>>,
    callbacks: Mutex<VecDeque<PendingCallback>>,
    started: AtomicBool,
}

impl Dispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(VecDeque::new()),
            callbacks: Mutex::new(VecDeque::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Start the drain loop on the current actix arbiter, ticking every `period`.
    ///
    /// Only the first call starts a loop; later calls return `None`.
    pub fn start(self: &Arc<Self>, period: Duration) -> Option<Addr<Executer>> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("[Dispatcher] Drain loop already started");
            return None;
        }
        Some(Executer::new(self.clone(), period).start())
    }

    /// True once [`Dispatcher::start`] has launched the drain loop.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Queue `func(parameter)` for the host thread. Safe from any thread.
    pub fn call_on_main_thread_with<T, F>(&self, func: F, parameter: T)
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.enqueue_call(PendingCall::typed(func, parameter));
    }

    /// Queue a parameterless callback for the host thread. Safe from any thread.
    pub fn call_on_main_thread(&self, func: impl FnOnce() + Send + 'static) {
        self.enqueue_callback(PendingCallback::new(func));
    }

    pub fn enqueue_call(&self, call: PendingCall) {
        lock(&self.calls).push_back(call);
    }

    pub fn enqueue_callback(&self, callback: PendingCallback) {
        lock(&self.callbacks).push_back(callback);
    }

    /// Number of (calls, callbacks) waiting.
    pub fn pending(&self) -> (usize, usize) {
        (lock(&self.calls).len(), lock(&self.callbacks).len())
    }

    /// Run everything that was queued when the pass started: parameterized calls first,
    /// then callbacks, each in FIFO order.
    ///
    /// Must be called from the host thread. Work queued by a running call waits for the
    /// next pass. A panicking call is logged and skipped.
    pub fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        let (queued_calls, queued_callbacks) = self.pending();

        for _ in 0..queued_calls {
            let Some(call) = lock(&self.calls).pop_front() else {
                break;
            };
            report.calls += 1;
            if !run_isolated(move || call.execute()) {
                report.failures += 1;
            }
        }

        for _ in 0..queued_callbacks {
            let Some(callback) = lock(&self.callbacks).pop_front() else {
                break;
            };
            report.callbacks += 1;
            if !run_isolated(move || callback.execute()) {
                report.failures += 1;
            }
        }

        if !report.is_empty() {
            trace!(
                "[Dispatcher] Drained calls={} callbacks={} failures={}",
                report.calls, report.callbacks, report.failures
            );
        }
        report
    }
}

/// Lock a queue. Nothing runs under these locks, so a poisoned one still holds a
/// consistent queue.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run one dispatched item, returning false if it panicked.
fn run_isolated(work: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(()) => true,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("[Dispatcher] Dispatched call panicked: {}", reason);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Clone + Send + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |entry: &str| sink.lock().unwrap().push(entry.to_string()))
    }

    #[test]
    fn test_calls_run_in_fifo_order() {
        let dispatcher = Dispatcher::new();
        let (log, record) = recorder();
        for name in ["c1", "c2", "c3"] {
            let record = record.clone();
            dispatcher.call_on_main_thread_with(move |n: &'static str| record(n), name);
        }

        let report = dispatcher.drain();

        assert_eq!(report.calls, 3);
        assert_eq!(*log.lock().unwrap(), vec!["c1", "c2", "c3"]);
        assert_eq!(dispatcher.pending(), (0, 0));
    }

    #[test]
    fn test_calls_drain_before_callbacks() {
        let dispatcher = Dispatcher::new();
        let (log, record) = recorder();
        let r = record.clone();
        dispatcher.call_on_main_thread(move || r("callback"));
        let r = record.clone();
        dispatcher.call_on_main_thread_with(move |v: u32| r(&format!("call {}", v)), 7);

        dispatcher.drain();

        assert_eq!(*log.lock().unwrap(), vec!["call 7", "callback"]);
    }

    #[test]
    fn test_fifo_across_producer_threads() {
        let dispatcher = Dispatcher::new();
        let (log, record) = recorder();
        // Each producer finishes before the next starts, fixing the global order.
        for name in ["c1", "c2", "c3"] {
            let d = dispatcher.clone();
            let record = record.clone();
            thread::spawn(move || d.call_on_main_thread_with(move |n: &'static str| record(n), name))
                .join()
                .unwrap();
        }

        dispatcher.drain();

        assert_eq!(*log.lock().unwrap(), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let dispatcher = Dispatcher::new();
        let counter = Arc::new(Mutex::new(0usize));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = dispatcher.clone();
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let counter = counter.clone();
                        d.call_on_main_thread(move || *counter.lock().unwrap() += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = dispatcher.drain();

        assert_eq!(report.callbacks, 800);
        assert_eq!(*counter.lock().unwrap(), 800);
    }

    #[test]
    fn test_panicking_call_does_not_block_queue() {
        let dispatcher = Dispatcher::new();
        let (log, record) = recorder();
        dispatcher.call_on_main_thread_with(|_: ()| panic!("boom"), ());
        let r = record.clone();
        dispatcher.call_on_main_thread_with(move |_: ()| r("after"), ());
        dispatcher.call_on_main_thread(|| panic!("callback boom"));
        let r = record.clone();
        dispatcher.call_on_main_thread(move || r("last"));

        let report = dispatcher.drain();

        assert_eq!(report, DrainReport { calls: 2, callbacks: 2, failures: 2 });
        assert_eq!(*log.lock().unwrap(), vec!["after", "last"]);
        assert_eq!(dispatcher.pending(), (0, 0));
    }

    #[test]
    fn test_reentrant_enqueue_runs_on_next_pass() {
        let dispatcher = Dispatcher::new();
        let (log, record) = recorder();
        let d = dispatcher.clone();
        let r = record.clone();
        dispatcher.call_on_main_thread_with(
            move |_: ()| {
                r("outer");
                let r = r.clone();
                d.call_on_main_thread_with(move |_: ()| r("inner"), ());
            },
            (),
        );

        let first = dispatcher.drain();
        assert_eq!(first.calls, 1);
        assert_eq!(*log.lock().unwrap(), vec!["outer"]);
        assert_eq!(dispatcher.pending(), (1, 0));

        dispatcher.drain();
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_callback_queued_by_call_waits_for_next_pass() {
        let dispatcher = Dispatcher::new();
        let (log, record) = recorder();
        let d = dispatcher.clone();
        dispatcher.call_on_main_thread_with(
            move |_: ()| {
                record("call");
                let r = record.clone();
                d.call_on_main_thread(move || r("callback"));
            },
            (),
        );

        let first = dispatcher.drain();
        assert_eq!(first, DrainReport { calls: 1, callbacks: 0, failures: 0 });
        assert_eq!(*log.lock().unwrap(), vec!["call"]);
        assert_eq!(dispatcher.pending(), (0, 1));

        let second = dispatcher.drain();
        assert_eq!(second.callbacks, 1);
        assert_eq!(*log.lock().unwrap(), vec!["call", "callback"]);
    }

    #[test]
    fn test_self_refilling_calls_do_not_starve_callbacks() {
        fn refill(d: Arc<Dispatcher>) {
            let next = d.clone();
            d.call_on_main_thread_with(move |_: ()| refill(next), ());
        }

        let dispatcher = Dispatcher::new();
        let (log, record) = recorder();
        refill(dispatcher.clone());
        dispatcher.call_on_main_thread(move || record("callback"));

        let report = dispatcher.drain();

        assert_eq!(report.calls, 1);
        assert_eq!(report.callbacks, 1);
        assert_eq!(*log.lock().unwrap(), vec!["callback"]);
    }

    #[test]
    fn test_untyped_call_receives_parameter() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        dispatcher.enqueue_call(PendingCall::new(
            Box::new(move |p: CallParameter| {
                *sink.lock().unwrap() = p.downcast::<String>().ok().map(|s| *s);
            }),
            Box::new("payload".to_string()),
        ));

        dispatcher.drain();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("payload"));
    }
}
