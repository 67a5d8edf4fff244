use chrono::{DateTime, Utc};
use railbook_core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// The fixed interval during which a PENDING order may still be paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentWindow {
    pub window: Duration,
    pub urgent_below: Duration,
    pub tick: Duration,
}

impl Default for PaymentWindow {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            urgent_below: Duration::from_secs(5 * 60),
            tick: Duration::from_secs(1),
        }
    }
}

impl PaymentWindow {
    /// Whole seconds left: `window - elapsed`, where elapsed is floored at zero so
    /// a clock that moved backwards never yields more than the window.
    pub fn remaining_at(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - created_at).num_seconds().max(0) as u64;
        self.window.as_secs().saturating_sub(elapsed)
    }

    pub fn phase_at(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> TimerPhase {
        let remaining = self.remaining_at(created_at, now);
        if remaining == 0 {
            TimerPhase::Expired
        } else if remaining < self.urgent_below.as_secs() {
            TimerPhase::Urgent { remaining }
        } else {
            TimerPhase::Counting { remaining }
        }
    }
}

/// Countdown state. `Urgent` only changes presentation; `Expired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Counting { remaining: u64 },
    Urgent { remaining: u64 },
    Expired,
}

impl TimerPhase {
    pub fn remaining(&self) -> u64 {
        match self {
            TimerPhase::Counting { remaining } | TimerPhase::Urgent { remaining } => *remaining,
            TimerPhase::Expired => 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, TimerPhase::Expired)
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, TimerPhase::Urgent { .. })
    }
}

/// `m:ss`
pub fn format_remaining(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub type ExpiryCallback = Box<dyn FnOnce() + Send + 'static>;

/// Turns an order's creation time into a live countdown.
#[derive(Clone)]
pub struct PaymentTimer {
    window: PaymentWindow,
    clock: Arc<dyn Clock>,
}

impl PaymentTimer {
    pub fn new(window: PaymentWindow, clock: Arc<dyn Clock>) -> Self {
        Self { window, clock }
    }

    pub fn window(&self) -> PaymentWindow {
        self.window
    }

    /// Current phase without starting a countdown.
    pub fn phase(&self, created_at: DateTime<Utc>) -> TimerPhase {
        self.window.phase_at(created_at, self.clock.now())
    }

    pub fn activate(&self, created_at: DateTime<Utc>) -> TimerSubscription {
        self.start(created_at, None)
    }

    /// Start a countdown whose expiry runs `on_expired` exactly once.
    pub fn activate_with<F>(&self, created_at: DateTime<Utc>, on_expired: F) -> TimerSubscription
    where
        F: FnOnce() + Send + 'static,
    {
        self.start(created_at, Some(Box::new(on_expired)))
    }

    fn start(&self, created_at: DateTime<Utc>, mut on_expired: Option<ExpiryCallback>) -> TimerSubscription {
        let initial = self.phase(created_at);
        let (tx, rx) = watch::channel(initial);

        if initial.is_expired() {
            info!("Payment window for order created at {} already elapsed", created_at);
            if let Some(callback) = on_expired.take() {
                callback();
            }
            return TimerSubscription { phase: rx, task: None };
        }

        let window = self.window;
        let clock = self.clock.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + window.tick, window.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let phase = window.phase_at(created_at, clock.now());
                tx.send_replace(phase);
                if phase.is_expired() {
                    info!("Payment window for order created at {} expired", created_at);
                    if let Some(callback) = on_expired.take() {
                        callback();
                    }
                    break;
                }
            }
        });

        TimerSubscription {
            phase: rx,
            task: Some(task),
        }
    }
}

/// Registration handle of one running countdown. Dropping it (or calling
/// [`TimerSubscription::cancel`]) stops the countdown; no callback fires afterwards.
pub struct TimerSubscription {
    phase: watch::Receiver<TimerPhase>,
    task: Option<JoinHandle<()>>,
}

impl TimerSubscription {
    pub fn phase(&self) -> TimerPhase {
        *self.phase.borrow()
    }

    /// Wait for the next phase update. Returns `None` once the countdown has stopped.
    pub async fn changed(&mut self) -> Option<TimerPhase> {
        self.phase.changed().await.ok()?;
        Some(*self.phase.borrow_and_update())
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!("Payment timer cancelled");
            }
            task.abort();
        }
    }
}

impl Drop for TimerSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
