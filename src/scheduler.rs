//! Background polling timer.
//!
//! The scheduler never refreshes anything itself. It only sends
//! [`PollEvent::Tick`] into the channel handed to [`PollScheduler::start`];
//! the receiver decides whether a refresh is due (and skips it if one is
//! already running).
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    Tick,
}

/// Owns the timer task. Dropping the scheduler stops the timer.
#[derive(Debug)]
pub struct PollScheduler {
    interval: Duration,
    sender: mpsc::Sender<PollEvent>,
    handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    /// Start a timer that sends a tick every `interval`.
    ///
    /// The first tick fires one full interval after start, not immediately.
    pub fn start(interval: Duration, sender: mpsc::Sender<PollEvent>) -> Self {
        let handle = spawn_timer(interval, sender.clone());
        tracing::debug!(interval_secs = interval.as_secs(), "Poll timer started");
        Self {
            interval,
            sender,
            handle: Some(handle),
        }
    }

    /// Replace the running timer with one using `interval`.
    ///
    /// The previous timer is aborted first, so at most one timer is live.
    pub fn reschedule(&mut self, interval: Duration) {
        self.cancel();
        self.interval = interval;
        self.handle = Some(spawn_timer(interval, self.sender.clone()));
        tracing::info!(interval_secs = interval.as_secs(), "Poll timer rescheduled");
    }

    /// Stop the timer. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn spawn_timer(interval: Duration, sender: mpsc::Sender<PollEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        // A slow refresh should not cause a burst of catch-up ticks
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if sender.send(PollEvent::Tick).await.is_err() {
                tracing::debug!("Poll receiver closed, stopping timer");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_MIN: Duration = Duration::from_secs(300);

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_before_first_interval() {
        let (tx, mut rx) = mpsc::channel(4);
        let _scheduler = PollScheduler::start(FIVE_MIN, tx);

        tokio::time::advance(FIVE_MIN - Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(rx.recv().await, Some(PollEvent::Tick));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_repeat() {
        let (tx, mut rx) = mpsc::channel(4);
        let _scheduler = PollScheduler::start(Duration::from_secs(10), tx);

        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(PollEvent::Tick));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_timer() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut scheduler = PollScheduler::start(FIVE_MIN, tx);

        scheduler.reschedule(Duration::from_secs(600));
        assert_eq!(scheduler.interval(), Duration::from_secs(600));
        assert!(scheduler.is_running());

        // Old 5 minute timer must not fire
        tokio::time::advance(FIVE_MIN + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(FIVE_MIN).await;
        assert_eq!(rx.recv().await, Some(PollEvent::Tick));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut scheduler = PollScheduler::start(Duration::from_secs(10), tx);
        scheduler.cancel();
        scheduler.cancel();
        tokio::task::yield_now().await;
        assert!(!scheduler.is_running());

        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timer() {
        let (tx, mut rx) = mpsc::channel(4);
        let scheduler = PollScheduler::start(Duration::from_secs(10), tx);
        drop(scheduler);

        // Both the timer task and the scheduler held senders; once both are
        // gone the channel closes.
        assert_eq!(rx.recv().await, None);
    }
}
