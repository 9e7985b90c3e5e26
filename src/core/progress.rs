//! # Completion counter.
//!
//! Each worker owns one [`Progress`]: a monotonic count of finished units plus a
//! wake-up primitive for tasks waiting on it. Only the owning worker calls
//! [`Progress::complete`]; everyone else reads.
//!
//! Readers must only test for advancement: two observations may differ by more
//! than one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Returned by [`Progress::advanced_past`] when the owning worker has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExited;

/// Completion counter of one worker.
#[derive(Debug, Default)]
pub struct Progress {
    completed: AtomicU64,
    closed: AtomicBool,
    notify: Notify,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of units finished so far.
    #[inline]
    pub fn current(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// True once the owning worker has exited.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Records one finished unit and wakes waiters. Returns the new count.
    pub(crate) fn complete(&self) -> u64 {
        let n = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        self.notify.notify_waiters();
        n
    }

    /// Marks the owning worker as gone and wakes waiters.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Suspends the calling task until the counter differs from `seen`.
    ///
    /// Returns the newly observed value. Only the calling task is suspended; the
    /// scheduler keeps running everything else.
    ///
    /// # Errors
    /// [`WorkerExited`] if the worker exits without advancing the counter.
    pub async fn advanced_past(&self, seen: u64) -> Result<u64, WorkerExited> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking, so a completion between check and await is not lost.
            notified.as_mut().enable();

            let now = self.current();
            if now != seen {
                return Ok(now);
            }
            if self.is_closed() {
                return Err(WorkerExited);
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn returns_immediately_when_already_advanced() {
        let p = Progress::new();
        p.complete();
        p.complete();
        assert_eq!(p.advanced_past(0).await, Ok(2));
    }

    #[tokio::test]
    async fn wakes_on_completion() {
        let p = Arc::new(Progress::new());
        let waiter = {
            let p = Arc::clone(&p);
            tokio::spawn(async move { p.advanced_past(0).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        p.complete();
        let got = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, Ok(1));
    }

    #[tokio::test]
    async fn reports_worker_exit() {
        let p = Arc::new(Progress::new());
        let waiter = {
            let p = Arc::clone(&p);
            tokio::spawn(async move { p.advanced_past(0).await })
        };
        p.close();
        let got = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, Err(WorkerExited));
    }

    #[test]
    fn counter_is_monotonic() {
        let p = Progress::new();
        let mut last = p.current();
        for _ in 0..100 {
            let n = p.complete();
            assert!(n > last);
            last = n;
        }
    }
}
