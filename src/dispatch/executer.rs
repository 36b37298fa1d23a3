/// Drain loop actor.
///
/// Lives on the host's arbiter (the single logical update thread) and drains the
/// [`Dispatcher`] every tick. The host can also force a pass with a [`Tick`] message,
/// e.g. once per rendered frame.
use actix::prelude::*;
use actix::MessageResult;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use super::queue::{Dispatcher, DrainReport};

/// Actor draining the main-thread queues on a fixed period.
pub struct Executer {
    dispatcher: Arc<Dispatcher>,
    period: Duration,
}

impl Executer {
    pub fn new(dispatcher: Arc<Dispatcher>, period: Duration) -> Self {
        Self { dispatcher, period }
    }

    fn drain(&self) -> DrainReport {
        let report = self.dispatcher.drain();
        if report.failures > 0 {
            warn!("[Executer] {} dispatched call(s) failed this tick", report.failures);
        }
        report
    }
}

impl Actor for Executer {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        debug!("[Executer] Drain loop started, period={:?}", self.period);
        ctx.run_interval(self.period, |act, _ctx| {
            act.drain();
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let (calls, callbacks) = self.dispatcher.pending();
        debug!("[Executer] Drain loop stopped with {} call(s) and {} callback(s) pending", calls, callbacks);
    }
}

/// Message: drain the queues now, outside the periodic schedule.
#[derive(Message)]
#[rtype(result = "DrainReport")]
pub struct Tick;

impl Handler<Tick> for Executer {
    type Result = MessageResult<Tick>;

    fn handle(&mut self, _msg: Tick, _ctx: &mut Context<Self>) -> Self::Result {
        MessageResult(self.drain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    #[actix::test]
    async fn test_start_is_one_time() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.is_started());
        assert!(dispatcher.start(Duration::from_secs(3600)).is_some());
        assert!(dispatcher.start(Duration::from_secs(3600)).is_none());
        assert!(dispatcher.is_started());
    }

    #[actix::test]
    async fn test_tick_drains_on_host_thread() {
        let dispatcher = Dispatcher::new();
        let executer = dispatcher.start(Duration::from_secs(3600)).unwrap();
        let host_thread = thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));

        let d = dispatcher.clone();
        let sink = ran_on.clone();
        thread::spawn(move || {
            d.call_on_main_thread(move || *sink.lock().unwrap() = Some(thread::current().id()));
        })
        .join()
        .unwrap();

        let report = executer.send(Tick).await.unwrap();

        assert_eq!(report.callbacks, 1);
        assert_eq!(*ran_on.lock().unwrap(), Some(host_thread));
    }

    #[actix::test]
    async fn test_periodic_drain() {
        let dispatcher = Dispatcher::new();
        let _executer = dispatcher.start(Duration::from_millis(5)).unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        dispatcher.call_on_main_thread_with(move |v: u8| { let _ = tx.send(v); }, 42);

        let value = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();

        assert_eq!(value, 42);
    }
}
