use std::sync::atomic::{AtomicBool, Ordering};

/// Skip-if-running guard for one scheduled job.
#[derive(Debug, Default)]
pub struct JobLock {
    running: AtomicBool,
}

impl JobLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another run still holds the lock.
    pub fn try_acquire(&self) -> Option<JobGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobGuard { lock: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub struct JobGuard<'a> {
    lock: &'a JobLock,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.lock.running.store(false, Ordering::Release);
    }
}
