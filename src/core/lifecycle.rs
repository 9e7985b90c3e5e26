//! # Supervisor lifecycle state.
//!
//! ```text
//! NotStarted ──start()──► Running ──stop()──► Stopped ──start()──► Running ...
//!                            │
//!                            └──dispatch fault──► Crashed (terminal)
//! ```
//!
//! The state lives in an atomic so that `is_running()` never blocks and the
//! dispatch task can record a crash without holding the supervisor.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Notify;

/// Lifecycle state of a [`Supervisor`](crate::Supervisor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    NotStarted,
    Running,
    Stopped,
    Crashed,
}

impl LifecycleState {
    /// `start()` is accepted only from these states.
    #[inline]
    pub fn can_start(self) -> bool {
        matches!(self, LifecycleState::NotStarted | LifecycleState::Stopped)
    }

    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::NotStarted => 0,
            LifecycleState::Running => 1,
            LifecycleState::Stopped => 2,
            LifecycleState::Crashed => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LifecycleState::NotStarted,
            1 => LifecycleState::Running,
            2 => LifecycleState::Stopped,
            _ => LifecycleState::Crashed,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::NotStarted => "not_started",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Crashed => "crashed",
        })
    }
}

/// Shared, lock-free holder of a [`LifecycleState`].
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
    changed: Notify,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::NotStarted.as_u8()),
            changed: Notify::new(),
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves `from → to`; returns the state actually observed on failure.
    pub(crate) fn transition(
        &self,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Result<(), LifecycleState> {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| self.changed.notify_waiters())
            .map_err(LifecycleState::from_u8)
    }

    /// Resolves once the state is no longer `state`; returns the new state.
    pub(crate) async fn left(&self, state: LifecycleState) -> LifecycleState {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = self.get();
            if now != state {
                return now;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listed_transitions_succeed() {
        let lc = Lifecycle::new();
        assert_eq!(lc.get(), LifecycleState::NotStarted);

        assert_eq!(
            lc.transition(LifecycleState::Running, LifecycleState::Stopped),
            Err(LifecycleState::NotStarted)
        );
        lc.transition(LifecycleState::NotStarted, LifecycleState::Running)
            .unwrap();
        lc.transition(LifecycleState::Running, LifecycleState::Crashed)
            .unwrap();
        assert_eq!(
            lc.transition(LifecycleState::Running, LifecycleState::Stopped),
            Err(LifecycleState::Crashed)
        );
        assert!(!lc.get().can_start());
    }

    #[tokio::test]
    async fn left_wakes_on_transition() {
        let lc = std::sync::Arc::new(Lifecycle::new());
        lc.transition(LifecycleState::NotStarted, LifecycleState::Running)
            .unwrap();
        let waiter = {
            let lc = std::sync::Arc::clone(&lc);
            tokio::spawn(async move { lc.left(LifecycleState::Running).await })
        };
        tokio::task::yield_now().await;
        lc.transition(LifecycleState::Running, LifecycleState::Crashed)
            .unwrap();
        assert_eq!(waiter.await.unwrap(), LifecycleState::Crashed);
    }

    #[test]
    fn stopped_can_start_again() {
        assert!(LifecycleState::NotStarted.can_start());
        assert!(LifecycleState::Stopped.can_start());
        assert!(!LifecycleState::Running.can_start());
        assert!(!LifecycleState::Crashed.can_start());
    }
}
