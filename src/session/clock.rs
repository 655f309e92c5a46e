use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub type TimerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type TimerTask = Arc<dyn Fn() -> TimerFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Schedules recurring work for a session.
///
/// A timer first fires `first_after` from now, then once per `period`.
/// A task is awaited to completion before the same timer fires again.
pub trait Clock: Send + Sync {
    fn every(&self, first_after: Duration, period: Duration, task: TimerTask) -> TimerHandle;
    fn cancel(&self, handle: TimerHandle);
}

#[derive(Default)]
pub struct TokioClock {
    next_id: AtomicU64,
    timers: Mutex<HashMap<u64, CancellationToken>>,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_timers(&self) -> usize {
        self.timers.lock().expect("clock mutex poisoned").len()
    }
}

impl Clock for TokioClock {
    fn every(&self, first_after: Duration, period: Duration, task: TimerTask) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.timers
            .lock()
            .expect("clock mutex poisoned")
            .insert(id, token.clone());

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + first_after, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if token.is_cancelled() {
                            break;
                        }
                        task().await;
                    }
                }
            }
        });

        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(token) = self
            .timers
            .lock()
            .expect("clock mutex poisoned")
            .remove(&handle.0)
        {
            token.cancel();
        }
    }
}

struct ManualTimer {
    id: u64,
    period: Duration,
    next_due: Duration,
    task: TimerTask,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    timers: Vec<ManualTimer>,
}

/// Simulated time. Nothing fires until [`ManualClock::advance`] is awaited.
#[derive(Default)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed(&self) -> Duration {
        self.state.lock().expect("clock mutex poisoned").now
    }

    pub fn active_timers(&self) -> usize {
        self.state.lock().expect("clock mutex poisoned").timers.len()
    }

    /// Fires every timer due within `by`, earliest first, awaiting each task.
    pub async fn advance(&self, by: Duration) {
        let target = self.elapsed() + by;
        loop {
            let next = {
                let mut state = self.state.lock().expect("clock mutex poisoned");
                let due = state
                    .timers
                    .iter_mut()
                    .filter(|t| t.next_due <= target)
                    .min_by_key(|t| (t.next_due, t.id));
                match due {
                    Some(timer) => {
                        let fired_at = timer.next_due;
                        timer.next_due += timer.period;
                        let task = timer.task.clone();
                        state.now = fired_at;
                        Some(task)
                    }
                    None => None,
                }
            };
            match next {
                Some(task) => task().await,
                None => break,
            }
        }
        self.state.lock().expect("clock mutex poisoned").now = target;
    }
}

impl Clock for ManualClock {
    fn every(&self, first_after: Duration, period: Duration, task: TimerTask) -> TimerHandle {
        let mut state = self.state.lock().expect("clock mutex poisoned");
        let id = state.next_id;
        state.next_id += 1;
        let next_due = state.now + first_after;
        state.timers.push(ManualTimer {
            id,
            period,
            next_due,
            task,
        });
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.state
            .lock()
            .expect("clock mutex poisoned")
            .timers
            .retain(|t| t.id != handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(counter: Arc<AtomicUsize>) -> TimerTask {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn manual_clock_fires_each_period() {
        let clock = ManualClock::new();
        let fired = Arc::new(AtomicUsize::new(0));
        clock.every(Duration::from_secs(1), Duration::from_secs(1), counting_task(fired.clone()));

        clock.advance(Duration::from_millis(999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        clock.advance(Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn cancelled_manual_timer_stops_firing() {
        let clock = ManualClock::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = clock.every(Duration::from_secs(1), Duration::from_secs(1), counting_task(fired.clone()));

        clock.advance(Duration::from_secs(2)).await;
        clock.cancel(handle);
        clock.advance(Duration::from_secs(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(clock.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_runs_until_cancelled() {
        let clock = TokioClock::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = clock.every(Duration::from_secs(1), Duration::from_secs(1), counting_task(fired.clone()));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);

        clock.cancel(handle);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(clock.active_timers(), 0);
    }

    #[tokio::test]
    async fn zero_delay_timer_fires_on_first_advance() {
        let clock = ManualClock::new();
        let fired = Arc::new(AtomicUsize::new(0));
        clock.every(Duration::ZERO, Duration::from_secs(1), counting_task(fired.clone()));

        clock.advance(Duration::ZERO).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_millis(2500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_fires_immediately_with_zero_delay() {
        let clock = TokioClock::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = clock.every(Duration::ZERO, Duration::from_secs(1), counting_task(fired.clone()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        clock.cancel(handle);
    }
}
