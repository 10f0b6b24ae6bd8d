//! Timing of quote recomputation.
//!
//! Edits are debounced: a recomputation is due once no edit has arrived for the debounce
//! window. A started calculation is delivered after a fixed latency, and only if no newer edit
//! arrived in the meantime. Every edit is tagged with a sequence number, so a calculation can be
//! recognised as stale whatever order things complete in.
//!
//! Nothing here runs on its own: the owner asks for the next due [`Step`] with the current time.
use super::SimulatorInput;
use crate::units::Millis;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// A source of the current time
pub trait Clock {
    /// The current time
    fn now(&self) -> Millis;
}

/// Time elapsed since the clock was created
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a clock starting at zero now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        Millis(u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX))
    }
}

/// A clock which only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    /// Set the current time
    pub fn set(&self, now: Millis) {
        self.0.set(now.value());
    }

    /// Move the current time forward, stopping at the largest representable time
    pub fn advance(&self, by: Millis) {
        self.0.set(self.0.get().saturating_add(by.value()));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        Millis(self.0.get())
    }
}

/// A recomputation waiting for edits to settle
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pending {
    seq: u64,
    due: Millis,
}

/// A calculation which has been started but not yet delivered
#[derive(Debug, Clone, Copy, PartialEq)]
struct InFlight {
    seq: u64,
    ready_at: Millis,
    input: SimulatorInput,
}

/// Something the scheduler's owner must act on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Edits up to `seq` have settled at time `at`
    Settle {
        /// The sequence number of the last edit
        seq: u64,
        /// When the debounce window elapsed
        at: Millis,
    },
    /// A calculation started for `seq` is ready to be delivered
    Complete {
        /// The sequence number of the edit the calculation was started for
        seq: u64,
        /// The answers the calculation was started with
        input: SimulatorInput,
    },
}

/// Debounce and latency bookkeeping for a single simulator
#[derive(Debug)]
pub struct Scheduler {
    debounce: Millis,
    latency: Millis,
    issued: u64,
    pending: Option<Pending>,
    in_flight: Option<InFlight>,
}

impl Scheduler {
    /// Create a scheduler with nothing pending
    pub fn new(debounce: Millis, latency: Millis) -> Self {
        Self {
            debounce,
            latency,
            issued: 0,
            pending: None,
            in_flight: None,
        }
    }

    /// Record an edit made at `now`, (re)starting the debounce window.
    ///
    /// Returns the edit's sequence number.
    pub fn touch(&mut self, now: Millis) -> u64 {
        self.issued += 1;
        self.pending = Some(Pending {
            seq: self.issued,
            due: now + self.debounce,
        });

        self.issued
    }

    /// Start a calculation for edit `seq` at time `at`, replacing any calculation in flight
    pub fn start(&mut self, seq: u64, at: Millis, input: SimulatorInput) {
        self.in_flight = Some(InFlight {
            seq,
            ready_at: at + self.latency,
            input,
        });
    }

    /// Whether `seq` is the most recent edit
    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.issued
    }

    /// Whether a calculation is in flight
    pub fn is_calculating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Drop the pending recomputation and any calculation in flight
    pub fn cancel(&mut self) {
        self.pending = None;
        self.in_flight = None;
    }

    /// The earliest step due at or before `now`, if any
    pub fn next_step(&mut self, now: Millis) -> Option<Step> {
        let pending_due = self.pending.map(|p| p.due).filter(|&due| due <= now);
        let in_flight_due = self.in_flight.map(|f| f.ready_at).filter(|&at| at <= now);

        match (pending_due, in_flight_due) {
            (None, None) => None,
            (Some(due), Some(ready_at)) if ready_at < due => self.take_in_flight(),
            (Some(_), _) => self.take_pending(),
            (None, Some(_)) => self.take_in_flight(),
        }
    }

    /// The next step regardless of timers: pending edits settle at `now` and calculations are
    /// delivered at once
    pub fn force_step(&mut self, now: Millis) -> Option<Step> {
        if let Some(pending) = self.pending.take() {
            return Some(Step::Settle {
                seq: pending.seq,
                at: now,
            });
        }

        self.take_in_flight()
    }

    fn take_pending(&mut self) -> Option<Step> {
        self.pending.take().map(|p| Step::Settle {
            seq: p.seq,
            at: p.due,
        })
    }

    fn take_in_flight(&mut self) -> Option<Step> {
        self.in_flight.take().map(|f| Step::Complete {
            seq: f.seq,
            input: f.input,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn scheduler() -> Scheduler {
        Scheduler::new(Millis(300), Millis(300))
    }

    #[rstest]
    fn test_debounce_burst(mut scheduler: Scheduler) {
        scheduler.touch(Millis(0));
        scheduler.touch(Millis(100));
        let last = scheduler.touch(Millis(200));

        assert_eq!(scheduler.next_step(Millis(499)), None);
        assert_eq!(
            scheduler.next_step(Millis(500)),
            Some(Step::Settle {
                seq: last,
                at: Millis(500)
            })
        );
        assert_eq!(scheduler.next_step(Millis(10_000)), None);
    }

    #[rstest]
    fn test_latency(mut scheduler: Scheduler) {
        let seq = scheduler.touch(Millis(0));
        let Some(Step::Settle { at, .. }) = scheduler.next_step(Millis(300)) else {
            panic!("Expected edits to settle");
        };
        let input = SimulatorInput::default();
        scheduler.start(seq, at, input);
        assert!(scheduler.is_calculating());

        assert_eq!(scheduler.next_step(Millis(599)), None);
        assert_eq!(
            scheduler.next_step(Millis(600)),
            Some(Step::Complete { seq, input })
        );
        assert!(scheduler.is_current(seq));
        assert!(!scheduler.is_calculating());
    }

    #[rstest]
    fn test_late_poll_orders_steps_by_time(mut scheduler: Scheduler) {
        let first = scheduler.touch(Millis(0));
        scheduler.start(first, Millis(0), SimulatorInput::default());
        let second = scheduler.touch(Millis(100));

        // In flight ready at 300, second edit settles at 400
        assert!(matches!(
            scheduler.next_step(Millis(1000)),
            Some(Step::Complete { seq, .. }) if seq == first
        ));
        assert!(!scheduler.is_current(first));
        assert!(matches!(
            scheduler.next_step(Millis(1000)),
            Some(Step::Settle { seq, at: Millis(400) }) if seq == second
        ));
    }

    #[rstest]
    fn test_cancel(mut scheduler: Scheduler) {
        let seq = scheduler.touch(Millis(0));
        scheduler.start(seq, Millis(0), SimulatorInput::default());
        scheduler.touch(Millis(0));
        scheduler.cancel();

        assert!(!scheduler.is_calculating());
        assert_eq!(scheduler.next_step(Millis(u64::MAX / 2)), None);
        assert_eq!(scheduler.force_step(Millis(0)), None);
    }

    #[rstest]
    fn test_force_step(mut scheduler: Scheduler) {
        let seq = scheduler.touch(Millis(50));
        assert_eq!(
            scheduler.force_step(Millis(60)),
            Some(Step::Settle { seq, at: Millis(60) })
        );
        assert_eq!(scheduler.force_step(Millis(60)), None);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::default();
        let shared = clock.clone();
        clock.set(Millis(100));
        shared.advance(Millis(50));
        assert_eq!(clock.now(), Millis(150));

        clock.advance(Millis(u64::MAX));
        assert_eq!(shared.now(), Millis(u64::MAX));
        clock.advance(Millis(1));
        assert_eq!(shared.now(), Millis(u64::MAX));
    }
}
