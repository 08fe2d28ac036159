//! Cancellable fixed-period sync loop.
//!
//! A `SyncLoop` owns one tokio task that polls its target on every tick and
//! forwards engine events to it. The task ends when the loop is cancelled,
//! and is aborted if the loop is dropped without being cancelled.

use std::sync::Arc;

use {
    async_channel::{Receiver, Sender, unbounded},
    tokio::{
        select, spawn,
        task::JoinHandle,
        time::{Duration, MissedTickBehavior, interval},
    },
    tracing::{debug, warn},
};

use crate::playback::engine::EngineEvent;

/// Receiver of sync loop callbacks.
pub trait SyncTarget: Send + Sync + 'static {
    /// Called once per period, starting immediately.
    fn on_tick(&self);

    /// Called for every engine event.
    fn on_event(&self, event: EngineEvent);
}

/// Handle to a running sync loop.
pub struct SyncLoop {
    name: &'static str,
    /// Dropping the sender stops the task.
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SyncLoop {
    /// Spawns the loop on the current tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `name` - Loop name used in logs
    /// * `period` - Tick period
    /// * `target` - Receiver of ticks and events
    /// * `events` - Engine event stream; the loop keeps ticking after it closes
    ///
    /// # Returns
    ///
    /// A handle that must be cancelled, or dropped, to stop the loop.
    pub fn spawn<T: SyncTarget>(
        name: &'static str,
        period: Duration,
        target: Arc<T>,
        events: Receiver<EngineEvent>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = unbounded::<()>();

        let handle = spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut events_open = true;

            loop {
                select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        debug!("{name} sync loop received shutdown signal");
                        break;
                    }
                    event = events.recv(), if events_open => match event {
                        Ok(event) => target.on_event(event),
                        Err(_) => {
                            debug!("{name} engine events closed, ticking only");
                            events_open = false;
                        }
                    },
                    _ = ticker.tick() => target.on_tick(),
                }
            }
        });
        debug!("{name} sync loop started ({} ms)", period.as_millis());

        Self {
            name,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Loop name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the loop and waits for its task to finish.
    ///
    /// No tick or event is delivered once this returns.
    pub async fn cancel(mut self) {
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!("{} sync loop ended abnormally: {e}", self.name);
        }
        debug!("{} sync loop cancelled", self.name);
    }
}

impl Drop for SyncLoop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use {
        async_channel::unbounded,
        parking_lot::Mutex,
        tokio::time::{Duration, sleep},
    };

    use crate::playback::{
        engine::EngineEvent,
        sync::{SyncLoop, SyncTarget},
    };

    #[derive(Default)]
    struct Recorder {
        ticks: Mutex<u32>,
        events: Mutex<Vec<EngineEvent>>,
    }

    impl SyncTarget for Recorder {
        fn on_tick(&self) {
            *self.ticks.lock() += 1;
        }

        fn on_event(&self, event: EngineEvent) {
            self.events.lock().push(event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_fixed_period() {
        let recorder = Arc::new(Recorder::default());
        let (_events_tx, events_rx) = unbounded();
        let sync = SyncLoop::spawn(
            "test",
            Duration::from_millis(100),
            Arc::clone(&recorder),
            events_rx,
        );

        // Ticks at 0, 100, 200 and 300 ms.
        sleep(Duration::from_millis(350)).await;
        sync.cancel().await;

        assert_eq!(*recorder.ticks.lock(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_cancel() {
        let recorder = Arc::new(Recorder::default());
        let (_events_tx, events_rx) = unbounded();
        let sync = SyncLoop::spawn(
            "test",
            Duration::from_millis(100),
            Arc::clone(&recorder),
            events_rx,
        );

        sleep(Duration::from_millis(150)).await;
        sync.cancel().await;
        let ticks = *recorder.ticks.lock();

        sleep(Duration::from_secs(5)).await;
        assert_eq!(*recorder.ticks.lock(), ticks);
        assert_eq!(Arc::strong_count(&recorder), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_events_in_order() {
        let recorder = Arc::new(Recorder::default());
        let (events_tx, events_rx) = unbounded();
        let sync = SyncLoop::spawn(
            "test",
            Duration::from_secs(1),
            Arc::clone(&recorder),
            events_rx,
        );

        events_tx
            .send(EngineEvent::Ready { duration_ms: 42 })
            .await
            .unwrap();
        events_tx.send(EngineEvent::Ended).await.unwrap();
        drop(events_tx);

        sleep(Duration::from_millis(10)).await;
        assert!(sync.is_running());
        sync.cancel().await;

        assert_eq!(
            *recorder.events.lock(),
            vec![EngineEvent::Ready { duration_ms: 42 }, EngineEvent::Ended]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let recorder = Arc::new(Recorder::default());
        let (_events_tx, events_rx) = unbounded();
        let sync = SyncLoop::spawn(
            "test",
            Duration::from_millis(100),
            Arc::clone(&recorder),
            events_rx,
        );

        sleep(Duration::from_millis(50)).await;
        drop(sync);
        sleep(Duration::from_millis(10)).await;

        assert_eq!(*recorder.ticks.lock(), 1);
        assert_eq!(Arc::strong_count(&recorder), 1);
    }
}
