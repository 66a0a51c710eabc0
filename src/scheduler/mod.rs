//! Refresh scheduler: keeps one `RefreshState<T>` fresh by polling an
//! injected fetcher on a fixed interval.
//!
//! ## Timeline
//!
//! One spawned task per subscription, driven by a `tokio::time::interval`
//! with `MissedTickBehavior::Skip`. The first poll runs immediately, then on
//! every multiple of the interval. The fetch is awaited inside the loop, so
//! a tick that falls while a fetch is outstanding is skipped rather than
//! starting a second request; the next poll stays on the original grid.
//!
//! With back-off enabled, a run of transport failures pushes the next poll
//! out by the back-off delay on top of a full interval, and the grid restarts
//! from there.
//!
//! ## Cancellation
//!
//! Every state write goes through the watch channel's write lock and is
//! dropped if the status is already `Stopped`. `stop` takes that same lock to
//! write `Stopped`, then aborts the task, so a fetch that resolves late can
//! never land after `stop`.

use crate::error::{Error, ErrorKind, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Idle,
    Loading,
    Ready,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshState<T> {
    pub latest: Option<T>,
    pub status: RefreshStatus,
    pub last_error: Option<Error>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for RefreshState<T> {
    fn default() -> Self {
        Self {
            latest: None,
            status: RefreshStatus::Idle,
            last_error: None,
            last_updated_at: None,
        }
    }
}

impl<T> RefreshState<T> {
    /// Fetch in flight and nothing to show yet.
    pub fn is_first_load(&self) -> bool {
        self.status == RefreshStatus::Loading && self.latest.is_none()
    }

    /// Fetch in flight while an older value is on display.
    pub fn is_refreshing(&self) -> bool {
        self.status == RefreshStatus::Loading && self.latest.is_some()
    }

    /// Last attempt failed but a previous value is still available.
    pub fn is_stale(&self) -> bool {
        self.status == RefreshStatus::Failed && self.latest.is_some()
    }

    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error.as_ref().map(Error::kind)
    }

    fn begin(&mut self) {
        self.status = RefreshStatus::Loading;
    }

    fn finish(&mut self, outcome: Result<T>) {
        match outcome {
            Ok(value) => {
                self.latest = Some(value);
                self.status = RefreshStatus::Ready;
                self.last_error = None;
                self.last_updated_at = Some(Utc::now());
            }
            // `latest` and `last_updated_at` are kept: stale beats blank.
            Err(e) => {
                self.status = RefreshStatus::Failed;
                self.last_error = Some(e);
            }
        }
    }
}

// ── Policy ────────────────────────────────────────────────────────────────────

/// Poll cadence plus the optional back-off applied after consecutive
/// transport failures. `backoff_max == 0` disables back-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshPolicy {
    pub interval: Duration,
    pub backoff_max: Duration,
    pub jitter: Duration,
}

impl RefreshPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            backoff_max: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, max: Duration, jitter: Duration) -> Self {
        self.backoff_max = max;
        self.jitter = jitter;
        self
    }

    /// Extra delay before the next poll after `streak` consecutive
    /// transport failures: `min(interval * 2^(streak-1), backoff_max)` plus
    /// up to `jitter` of random noise.
    pub fn backoff_delay(&self, streak: u32) -> Duration {
        if streak == 0 || self.backoff_max.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(streak - 1);
        let base = self.interval.saturating_mul(factor).min(self.backoff_max);
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let noise = if jitter_ms == 0 {
            0
        } else {
            rand::random_range(0..=jitter_ms)
        };
        base.saturating_add(Duration::from_millis(noise))
    }
}

// ── Subscription ──────────────────────────────────────────────────────────────

/// Owner's grip on a running poll loop. Dropping the handle stops it.
pub struct SubscriptionHandle<T> {
    name: String,
    state: watch::Sender<RefreshState<T>>,
    task: AbortHandle,
}

impl<T: Clone> SubscriptionHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RefreshState<T> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RefreshState<T>> {
        self.state.subscribe()
    }
}

impl<T> SubscriptionHandle<T> {
    /// Cancel the timer and any in-flight fetch. Safe to call repeatedly.
    pub fn stop(&self) {
        let changed = self.state.send_if_modified(|s| {
            if s.status == RefreshStatus::Stopped {
                return false;
            }
            s.status = RefreshStatus::Stopped;
            true
        });
        self.task.abort();
        if changed {
            info!("{}: polling stopped", self.name);
        }
    }
}

impl<T> Drop for SubscriptionHandle<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Apply `f` unless the subscription has been stopped. Returns `false` once
/// stopped so the loop can exit.
fn apply<T>(tx: &watch::Sender<RefreshState<T>>, f: impl FnOnce(&mut RefreshState<T>)) -> bool {
    let mut live = true;
    tx.send_if_modified(|s| {
        if s.status == RefreshStatus::Stopped {
            live = false;
            return false;
        }
        f(s);
        true
    });
    live
}

/// Start polling `fetcher` every `policy.interval`. The first fetch starts
/// immediately. Must be called inside a Tokio runtime.
pub fn start<T, F, Fut>(
    name: impl Into<String>,
    fetcher: F,
    policy: RefreshPolicy,
) -> Result<SubscriptionHandle<T>>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    if policy.interval.is_zero() {
        return Err(Error::InvalidInput("poll interval must be > 0".into()));
    }

    let name = name.into();
    let (tx, _) = watch::channel(RefreshState::default());
    let task_tx = tx.clone();
    let task_name = name.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_finished: Option<Instant> = None;
        let mut transport_streak = 0u32;

        loop {
            let scheduled = ticker.tick().await;
            // A tick that came due while the previous fetch was running.
            if last_finished.is_some_and(|done| scheduled < done) {
                continue;
            }

            if !apply(&task_tx, RefreshState::begin) {
                break;
            }
            debug!("{}: polling", task_name);

            let outcome = fetcher().await;
            last_finished = Some(Instant::now());
            match &outcome {
                Ok(_) => transport_streak = 0,
                Err(e) => {
                    if e.kind() == ErrorKind::Transport {
                        transport_streak += 1;
                    } else {
                        transport_streak = 0;
                    }
                    warn!("{}: refresh failed: {}", task_name, e);
                }
            }

            if !apply(&task_tx, |s| s.finish(outcome)) {
                debug!("{}: discarding result that resolved after stop", task_name);
                break;
            }

            let pause = policy.backoff_delay(transport_streak);
            if !pause.is_zero() {
                debug!("{}: backing off {:?} after {} failures", task_name, pause, transport_streak);
                tokio::time::sleep(pause).await;
                ticker.reset();
            }
        }
    });

    info!("{}: polling every {:?}", name, policy.interval);
    Ok(SubscriptionHandle {
        name,
        state: tx,
        task: task.abort_handle(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
