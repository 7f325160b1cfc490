use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Jobs that are queued or running, each with its cancellation flag.
///
/// A job id is claimed at submit time and released by the worker once the
/// job reaches a terminal state (or is abandoned), so at most one worker
/// ever owns a given job.
#[derive(Default)]
pub struct InFlight {
    jobs: Mutex<HashMap<String, Arc<AtomicBool>>>,
    idle: Condvar,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<AtomicBool>>> {
        match self.jobs.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("In-flight set lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Claims `id`. Returns its fresh cancellation flag, or `None` if the
    /// job is already queued or running.
    pub fn try_claim(&self, id: &str) -> Option<Arc<AtomicBool>> {
        let mut jobs = self.lock();
        if jobs.contains_key(id) {
            return None;
        }
        let flag = Arc::new(AtomicBool::new(false));
        jobs.insert(id.to_string(), Arc::clone(&flag));
        Some(flag)
    }

    pub fn release(&self, id: &str) {
        let mut jobs = self.lock();
        jobs.remove(id);
        if jobs.is_empty() {
            self.idle.notify_all();
        }
    }

    /// Requests cancellation of `id`. Returns false if it was not in flight.
    pub fn cancel(&self, id: &str) -> bool {
        match self.lock().get(id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until no job is in flight.
    pub fn wait_idle(&self) {
        let mut jobs = self.lock();
        while !jobs.is_empty() {
            jobs = match self.idle.wait(jobs) {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Like [`wait_idle`](Self::wait_idle) but gives up after `timeout`.
    /// Returns true if the set drained in time.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut jobs = self.lock();
        while !jobs.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            jobs = match self.idle.wait_timeout(jobs, deadline - now) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_claim_is_exclusive() {
        let inflight = InFlight::new();
        assert!(inflight.try_claim("a").is_some());
        assert!(inflight.try_claim("a").is_none());
        assert!(inflight.try_claim("b").is_some());
        assert_eq!(inflight.len(), 2);

        inflight.release("a");
        assert!(inflight.try_claim("a").is_some());
    }

    #[test]
    fn test_cancel_sets_flag() {
        let inflight = InFlight::new();
        let flag = inflight.try_claim("a").unwrap();
        assert!(inflight.cancel("a"));
        assert!(flag.load(Ordering::SeqCst));
        assert!(!inflight.cancel("missing"));
    }

    #[test]
    fn test_reclaim_gets_fresh_flag() {
        let inflight = InFlight::new();
        inflight.try_claim("a").unwrap();
        inflight.cancel("a");
        inflight.release("a");
        let flag = inflight.try_claim("a").unwrap();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_wait_idle_returns_after_release() {
        let inflight = Arc::new(InFlight::new());
        inflight.try_claim("a").unwrap();

        let releaser = Arc::clone(&inflight);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            releaser.release("a");
        });

        inflight.wait_idle();
        assert!(inflight.is_empty());
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_idle_timeout_expires() {
        let inflight = InFlight::new();
        inflight.try_claim("stuck").unwrap();
        assert!(!inflight.wait_idle_timeout(Duration::from_millis(10)));
        inflight.release("stuck");
        assert!(inflight.wait_idle_timeout(Duration::from_millis(10)));
    }
}
