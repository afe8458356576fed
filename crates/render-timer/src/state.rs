//! The three-valued timer state (spec.md §4.E).

use std::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const PAUSED: u8 = 1;
const RUNNING: u8 = 2;

/// The adaptive render timer's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Sleeping on a wake event; zero wall-clock work.
    Idle,
    /// Polling for the idle timeout to elapse.
    Paused,
    /// Actively dispatching frames at the target rate.
    Running,
}

impl RenderState {
    fn to_u8(self) -> u8 {
        match self {
            RenderState::Idle => IDLE,
            RenderState::Paused => PAUSED,
            RenderState::Running => RUNNING,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            IDLE => RenderState::Idle,
            PAUSED => RenderState::Paused,
            RUNNING => RenderState::Running,
            other => unreachable!("render timer state byte out of range: {other}"),
        }
    }

    /// Lowercase name, matching `describe_state()`.
    pub fn as_str(self) -> &'static str {
        match self {
            RenderState::Idle => "idle",
            RenderState::Paused => "paused",
            RenderState::Running => "running",
        }
    }
}

/// Atomic holder for a [`RenderState`], exposing the CAS transitions the
/// timer's public API is built from.
pub(crate) struct AtomicRenderState(AtomicU8);

impl AtomicRenderState {
    pub(crate) fn new(initial: RenderState) -> Self {
        Self(AtomicU8::new(initial.to_u8()))
    }

    pub(crate) fn load(&self) -> RenderState {
        RenderState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempts `from -> to`; returns whether it succeeded.
    pub(crate) fn compare_exchange(&self, from: RenderState, to: RenderState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Attempts `from_a -> to` or `from_b -> to`, whichever the current
    /// value matches.
    pub(crate) fn compare_exchange_either(
        &self,
        from_a: RenderState,
        from_b: RenderState,
        to: RenderState,
    ) -> bool {
        self.compare_exchange(from_a, to) || self.compare_exchange(from_b, to)
    }

    pub(crate) fn store(&self, value: RenderState) {
        self.0.store(value.to_u8(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_exchange_either_covers_both_sources() {
        let state = AtomicRenderState::new(RenderState::Idle);
        assert!(state.compare_exchange_either(RenderState::Paused, RenderState::Idle, RenderState::Running));
        assert_eq!(state.load(), RenderState::Running);
    }

    #[test]
    fn compare_exchange_fails_on_mismatch() {
        let state = AtomicRenderState::new(RenderState::Running);
        assert!(!state.compare_exchange(RenderState::Idle, RenderState::Paused));
        assert_eq!(state.load(), RenderState::Running);
    }
}
