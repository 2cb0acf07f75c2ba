//! Scheduler wait watchdog for detecting stalled graphs
//!
//! Low-overhead monitoring using atomic timestamps instead of locks.
//! Each block stores the start time of its current buffer wait (input items
//! or output space) in an atomic variable, and the watchdog periodically
//! scans these timestamps to report blocks stuck longer than the threshold.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{info, warn};

/// Timestamp in milliseconds since UNIX_EPOCH
#[inline(always)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Shared state for one block-side wait being tracked
struct WaitState {
    /// Timestamp (ms since epoch) when the current wait started, or 0 if idle
    wait_start: AtomicU64,
    /// Track if we've already warned about this wait being stuck
    has_warned: AtomicBool,
    block_name: String,
    /// "input" or "output"
    direction: &'static str,
    stream: usize,
}

/// Handle to a wait's watchdog state (held by buffer endpoints)
#[derive(Clone)]
pub struct WatchdogHandle {
    state: Arc<WaitState>,
}

impl WatchdogHandle {
    /// Mark the start of a blocking wait (stores current timestamp)
    #[inline(always)]
    pub fn start_wait(&self) {
        self.state.wait_start.store(now_millis(), Ordering::Relaxed);
        self.state.has_warned.store(false, Ordering::Relaxed);
    }

    /// Mark the end of a blocking wait (clears timestamp to 0)
    #[inline(always)]
    pub fn finish_wait(&self) {
        if self.state.has_warned.load(Ordering::Relaxed) {
            info!(
                "unblocked: [{}] {} stream {} resumed",
                self.state.block_name, self.state.direction, self.state.stream
            );
            self.state.has_warned.store(false, Ordering::Relaxed);
        }
        self.state.wait_start.store(0, Ordering::Relaxed);
    }
}

/// Shared watchdog state
#[derive(Clone)]
pub struct Watchdog {
    waits: Arc<Mutex<Vec<Weak<WaitState>>>>,
    enabled: Arc<AtomicBool>,
    threshold: Duration,
}

impl Watchdog {
    /// Create a new watchdog with the default 5 second threshold
    pub fn new() -> Self {
        Self {
            waits: Arc::new(Mutex::new(Vec::new())),
            enabled: Arc::new(AtomicBool::new(true)),
            threshold: Duration::from_secs(5),
        }
    }

    /// Register a block-side wait for monitoring
    pub fn register(
        &self,
        block_name: &str,
        direction: &'static str,
        stream: usize,
    ) -> WatchdogHandle {
        let state = Arc::new(WaitState {
            wait_start: AtomicU64::new(0),
            has_warned: AtomicBool::new(false),
            block_name: block_name.to_string(),
            direction,
            stream,
        });

        self.waits.lock().push(Arc::downgrade(&state));

        WatchdogHandle { state }
    }

    /// Check for waits blocked longer than the threshold
    pub fn check_for_blocked(&self) {
        let now = now_millis();
        let threshold_ms = self.threshold.as_millis() as u64;

        let mut waits = self.waits.lock();

        // Remove dead weak references and check live ones
        waits.retain(|weak| {
            if let Some(state) = weak.upgrade() {
                let start = state.wait_start.load(Ordering::Relaxed);
                if start > 0 {
                    let duration_ms = now.saturating_sub(start);
                    if duration_ms > threshold_ms
                        && !state.has_warned.swap(true, Ordering::Relaxed)
                    {
                        warn!(
                            "blocked: [{}] waiting on {} stream {} for {:.1}s",
                            state.block_name,
                            state.direction,
                            state.stream,
                            duration_ms as f64 / 1000.0
                        );
                    }
                }
                true
            } else {
                false
            }
        });
    }

    /// Start the watchdog monitoring thread
    pub fn start_monitoring_thread(&self) -> std::thread::JoinHandle<()> {
        let watchdog = self.clone();
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(1));

            if !watchdog.enabled.load(Ordering::Relaxed) {
                break;
            }

            watchdog.check_for_blocked();
        })
    }

    /// Stop the watchdog monitoring thread
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard wrapping one blocking wait in start/finish timestamps
pub struct WaitGuard<'a> {
    handle: &'a WatchdogHandle,
}

impl<'a> WaitGuard<'a> {
    #[inline(always)]
    pub fn new(handle: &'a WatchdogHandle) -> Self {
        handle.start_wait();
        Self { handle }
    }
}

impl Drop for WaitGuard<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        self.handle.finish_wait();
    }
}
