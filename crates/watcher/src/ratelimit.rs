//! Throttle and debounce wrappers for zero-argument triggers
//!
//! Collapses bursts of scroll/resize events into a bounded number of
//! visibility checks. Timers run on the tokio runtime the limiter was
//! created with.

use lazyload_core::TimingPolicy;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

/// Wrapped trigger
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Rate-limited trigger
///
/// - `NoLimit`: every call runs the callback synchronously
/// - `Throttle`: leading edge runs immediately, calls inside the window are
///   coalesced into one trailing run at the window boundary
/// - `Debounce`: one run, `interval` after the last call
pub struct RateLimiter {
    policy: TimingPolicy,
    callback: Callback,
    runtime: Handle,
    state: Arc<Mutex<LimiterState>>,
}

#[derive(Default)]
struct LimiterState {
    /// When the callback last ran
    last_run: Option<Instant>,
    /// Scheduled trailing run
    timer: Option<Timer>,
    /// Bumped on every (re)schedule and cancel
    generation: u64,
}

struct Timer {
    generation: u64,
    task: JoinHandle<()>,
}

impl RateLimiter {
    /// Wrap `callback` according to `policy`
    pub fn new(policy: TimingPolicy, callback: Callback, runtime: Handle) -> Self {
        Self {
            policy,
            callback,
            runtime,
            state: Arc::new(Mutex::new(LimiterState::default())),
        }
    }

    /// Policy this limiter was built with
    pub fn policy(&self) -> TimingPolicy {
        self.policy
    }

    /// Request a run of the callback
    pub fn call(&self) {
        match self.policy {
            TimingPolicy::NoLimit => (self.callback)(),
            TimingPolicy::Throttle(interval) => self.call_throttled(interval),
            TimingPolicy::Debounce(interval) => self.call_debounced(interval),
        }
    }

    fn call_throttled(&self, interval: Duration) {
        let now = Instant::now();
        let mut state = self.state.lock();

        // Already coalescing into a trailing run
        if state.timer.is_some() {
            return;
        }

        let last_run = state.last_run;
        match last_run {
            Some(last) if now.duration_since(last) < interval => {
                let deadline = last + interval;
                self.schedule(&mut state, async move { sleep_until(deadline).await });
            }
            _ => {
                state.last_run = Some(now);
                drop(state);
                (self.callback)();
            }
        }
    }

    fn call_debounced(&self, interval: Duration) {
        let mut state = self.state.lock();

        if let Some(timer) = state.timer.take() {
            timer.task.abort();
        }
        self.schedule(&mut state, async move { sleep(interval).await });
    }

    /// Spawn a trailing run that fires once `wait` completes
    fn schedule<F>(&self, state: &mut LimiterState, wait: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        state.generation += 1;
        let generation = state.generation;
        let shared = Arc::clone(&self.state);
        let callback = Arc::clone(&self.callback);

        let task = self.runtime.spawn(async move {
            wait.await;
            fire_if_current(&shared, generation, &callback);
        });

        state.timer = Some(Timer { generation, task });
    }

    /// Run a pending trailing invocation now
    ///
    /// Returns whether the callback ran.
    pub fn flush(&self) -> bool {
        let mut state = self.state.lock();
        let Some(timer) = state.timer.take() else {
            return false;
        };

        timer.task.abort();
        state.generation += 1;
        state.last_run = Some(Instant::now());
        drop(state);

        (self.callback)();
        true
    }

    /// Drop a pending trailing invocation, if any
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.task.abort();
        }
        state.generation += 1;
    }

    /// Whether a trailing invocation is scheduled
    pub fn is_pending(&self) -> bool {
        self.state.lock().timer.is_some()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Run the callback unless the timer was superseded or cancelled meanwhile
fn fire_if_current(state: &Mutex<LimiterState>, generation: u64, callback: &Callback) {
    let mut guard = state.lock();
    match &guard.timer {
        Some(timer) if timer.generation == generation => {}
        _ => return,
    }

    guard.timer = None;
    guard.last_run = Some(Instant::now());
    drop(guard);

    callback();
}
