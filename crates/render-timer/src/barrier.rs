//! Multi-display transition readiness barrier (spec.md §4.F).

use parking_lot::Mutex;
use ring_channel::{ring_channel, RingReceiver, RingSender};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::warn;

/// Canonical ready-signal queue capacity; generous enough that bursts from
/// all displays rarely overflow before the controller drains them.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// Rendezvous point for N participating display surfaces completing their
/// per-display pre-transition work before a synchronized transition cycle
/// begins.
///
/// The underlying queue is a single-producer primitive; multiple surface
/// threads calling [`TransitionBarrier::mark_ready`] concurrently are
/// serialized through an internal lock rather than each owning their own
/// producer half.
pub struct TransitionBarrier {
    surface_count: usize,
    enabled: bool,
    sender: Mutex<RingSender<usize>>,
    receiver: Mutex<RingReceiver<usize>>,
}

impl TransitionBarrier {
    /// Builds a barrier for `surface_count` displays. Sync is only
    /// meaningful for more than one surface; construct with `enabled =
    /// false` to make every wait return immediately regardless of count.
    pub fn new(surface_count: usize, enabled: bool) -> Result<Self, ring_channel::Error> {
        let (sender, receiver) = ring_channel(DEFAULT_QUEUE_CAPACITY)?;
        Ok(Self {
            surface_count,
            enabled: enabled && surface_count > 1,
            sender: Mutex::new(sender),
            receiver: Mutex::new(receiver),
        })
    }

    /// Whether synchronization is active for this barrier.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Clears any signals left over from the previous cycle. Must be
    /// called before new `mark_ready` calls begin for the next cycle.
    pub fn begin_cycle(&self) {
        self.receiver.lock().clear();
    }

    /// Called by a surface once it has completed its per-display
    /// pre-transition work. Non-blocking: queue overflow is logged, not
    /// propagated, since the consumer falls back to the wait timeout.
    pub fn mark_ready(&self, surface_index: usize) {
        let mut sender = self.sender.lock();
        if sender.is_full() {
            warn!(surface_index, "transition barrier queue full, signal may be lost");
        }
        sender.push_drop_oldest(surface_index);
    }

    /// Waits until every surface index in `0..surface_count` has reported
    /// ready, or `timeout` elapses. Tolerates duplicate signals. Returns
    /// `true` immediately when sync is disabled or there is only one
    /// surface.
    pub fn wait_for_all_displays_ready(&self, timeout: Duration) -> bool {
        if !self.enabled {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut seen = HashSet::with_capacity(self.surface_count);
        loop {
            {
                let mut receiver = self.receiver.lock();
                while let Some(index) = receiver.try_pop() {
                    seen.insert(index);
                }
            }
            if seen.len() >= self.surface_count {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_surface_always_returns_immediately() {
        let barrier = TransitionBarrier::new(1, true).unwrap();
        assert!(!barrier.is_enabled());
        assert!(barrier.wait_for_all_displays_ready(Duration::from_millis(0)));
    }

    #[test]
    fn waits_for_every_distinct_index() {
        let barrier = TransitionBarrier::new(3, true).unwrap();
        barrier.mark_ready(0);
        barrier.mark_ready(1);
        barrier.mark_ready(1); // duplicate, tolerated
        barrier.mark_ready(2);
        assert!(barrier.wait_for_all_displays_ready(Duration::from_millis(100)));
    }

    #[test]
    fn times_out_when_a_surface_never_reports() {
        let barrier = TransitionBarrier::new(3, true).unwrap();
        barrier.mark_ready(0);
        barrier.mark_ready(1);
        assert!(!barrier.wait_for_all_displays_ready(Duration::from_millis(20)));
    }

    #[test]
    fn begin_cycle_clears_stale_signals() {
        let barrier = TransitionBarrier::new(2, true).unwrap();
        barrier.mark_ready(0);
        barrier.mark_ready(1);
        assert!(barrier.wait_for_all_displays_ready(Duration::from_millis(50)));

        barrier.begin_cycle();
        // Only one of two surfaces reports for the new cycle; must not
        // still count the drained signals from before.
        barrier.mark_ready(0);
        assert!(!barrier.wait_for_all_displays_ready(Duration::from_millis(20)));
    }

    #[test]
    fn disabled_barrier_skips_waiting_even_with_multiple_surfaces() {
        let barrier = TransitionBarrier::new(4, false).unwrap();
        assert_eq!(barrier.is_enabled(), false);
        assert!(barrier.wait_for_all_displays_ready(Duration::from_millis(0)));
    }
}
