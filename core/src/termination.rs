//! Resource watchdog (§5).
//!
//! The pipeline is single-threaded and cooperative: one logical task (the
//! current grounder or propagator) runs at a time. A side thread polls a
//! time/memory budget and, on violation, flips an atomic flag; every hot
//! inner loop calls [`TerminationFlag::check`] (the `CHECKTERMINATION`
//! macro's counterpart) at a convenient point and unwinds with
//! [`crate::error::GroundingError::Terminated`] if it is set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{GroundingError, Result};

/// Shared, cloneable handle to the termination flag. Cheap to clone and
/// pass into every grounder/estimator/propagator.
#[derive(Debug, Clone)]
pub struct TerminationFlag(Arc<AtomicBool>);

impl Default for TerminationFlag {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }
}

impl TerminationFlag {
    /// Creates a fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `CHECKTERMINATION` macro: bail out with
    /// [`GroundingError::Terminated`] if the flag has been set.
    pub fn check(&self) -> Result<()> {
        if self.0.load(Ordering::Relaxed) {
            Err(GroundingError::Terminated)
        } else {
            Ok(())
        }
    }

    /// Sets the flag. Idempotent.
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Sticky reset, meant to be called only by the higher-level API
    /// boundary between two independent inference calls (§5
    /// "Cancellation").
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// True if termination has already been requested.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A time/memory budget watched by a [`ResourceMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Wall-clock timeout; `None` means unbounded.
    pub timeout: Option<Duration>,
}

impl Budget {
    /// Builds a budget from the millisecond config field (`0` = unbounded).
    pub fn from_millis(ms: u64) -> Self {
        Self {
            timeout: if ms == 0 { None } else { Some(Duration::from_millis(ms)) },
        }
    }
}

/// The watchdog side-thread described in §5: polls `budget` and sets
/// `flag` once exceeded. Dropping the monitor stops the polling thread at
/// its next wakeup (it checks a `stop` flag alongside the budget).
#[derive(Debug)]
pub struct ResourceMonitor {
    flag: TerminationFlag,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ResourceMonitor {
    /// Spawns the watchdog thread. `poll_interval` trades responsiveness
    /// for wakeup overhead; the source used a small fixed interval, this
    /// exposes it so tests can poll fast without busy-looping production
    /// runs.
    pub fn spawn(flag: TerminationFlag, budget: Budget, poll_interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let flag = flag.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let start = Instant::now();
                loop {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    if let Some(timeout) = budget.timeout {
                        if start.elapsed() >= timeout {
                            log::warn!("resource monitor: timeout exceeded, requesting termination");
                            flag.set();
                            return;
                        }
                    }
                    std::thread::sleep(poll_interval);
                }
            })
        };
        Self {
            flag,
            stop,
            handle: Some(handle),
        }
    }

    /// Shared flag this monitor writes to.
    pub fn flag(&self) -> &TerminationFlag {
        &self.flag
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn check_ok_until_set() {
        let flag = TerminationFlag::new();
        assert!(flag.check().is_ok());
        flag.set();
        assert!(flag.check().is_err());
        flag.reset();
        assert!(flag.check().is_ok());
    }

    #[test]
    fn monitor_sets_flag_after_timeout() {
        let flag = TerminationFlag::new();
        let budget = Budget::from_millis(10);
        let monitor = ResourceMonitor::spawn(flag.clone(), budget, Duration::from_millis(2));
        std::thread::sleep(Duration::from_millis(60));
        assert!(flag.is_set());
        drop(monitor);
    }

    #[test]
    fn unbounded_budget_never_fires() {
        let flag = TerminationFlag::new();
        let budget = Budget::from_millis(0);
        let monitor = ResourceMonitor::spawn(flag.clone(), budget, Duration::from_millis(2));
        std::thread::sleep(Duration::from_millis(30));
        assert!(!flag.is_set());
        drop(monitor);
    }
}
