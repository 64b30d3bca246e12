//! Wait/notify primitive
//!
//! A thin layer over `Condvar` that understands deadlines, so callers can
//! block on "data available or EOF" without hand-rolling the spurious wakeup
//! and remaining-time bookkeeping at every site.

use std::sync::{Condvar, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Reusable wait/notify signal bound to an external mutex
#[derive(Debug, Default)]
pub struct Signal {
    cond: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            cond: Condvar::new(),
        }
    }

    /// Wake every waiter
    pub fn notify(&self) {
        self.cond.notify_all();
    }

    /// Block while `blocked` returns true, up to `timeout`.
    ///
    /// Returns the re-acquired guard and `true` if the wait ended because the
    /// condition cleared, `false` if the deadline passed first.
    pub fn wait_while<'a, T, F>(
        &self,
        mut guard: MutexGuard<'a, T>,
        timeout: Duration,
        mut blocked: F,
    ) -> (MutexGuard<'a, T>, bool)
    where
        F: FnMut(&mut T) -> bool,
    {
        let deadline = Instant::now().checked_add(timeout);

        while blocked(&mut guard) {
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return (guard, false);
                    }
                    deadline - now
                }
                // Timeout too large to represent: wait in long slices
                None => Duration::from_secs(3600),
            };

            guard = match self.cond.wait_timeout(guard, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }

        (guard, true)
    }

    /// Block indefinitely while `blocked` returns true
    pub fn wait_forever<'a, T, F>(&self, guard: MutexGuard<'a, T>, blocked: F) -> MutexGuard<'a, T>
    where
        F: FnMut(&mut T) -> bool,
    {
        self.cond
            .wait_while(guard, blocked)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn test_wait_times_out() {
        let lock = Mutex::new(false);
        let signal = Signal::new();

        let start = Instant::now();
        let guard = lock.lock().unwrap();
        let (_guard, ready) = signal.wait_while(guard, Duration::from_millis(30), |ready| !*ready);

        assert!(!ready);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_notify_wakes_waiter() {
        let shared = Arc::new((Mutex::new(false), Signal::new()));

        let notifier = shared.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            *notifier.0.lock().unwrap() = true;
            notifier.1.notify();
        });

        let guard = shared.0.lock().unwrap();
        let (guard, ready) = shared.1.wait_while(guard, Duration::from_secs(5), |ready| !*ready);
        assert!(ready);
        assert!(*guard);
        drop(guard);

        handle.join().unwrap();
    }

    #[test]
    fn test_condition_already_met() {
        let lock = Mutex::new(1u32);
        let signal = Signal::new();

        let guard = lock.lock().unwrap();
        let (_guard, ready) = signal.wait_while(guard, Duration::ZERO, |n| *n == 0);
        assert!(ready);
    }
}
