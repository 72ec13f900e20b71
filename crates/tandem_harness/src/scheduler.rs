//! Deciding which of two coupled stages advances.
//!
//! Stage A fills the middle lanes, stage B drains them. Water marks keep
//! each stage from stepping on thin data, stall streaks let a stage run
//! when its partner has stopped making progress, and when neither stage
//! qualifies both are stepped once.

/// Buffered bits and end-of-message flag of one middle lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneState {
    /// Bits buffered between the stages.
    pub size: usize,
    /// Stage A has finished this lane's message.
    pub last: bool,
}

/// Snapshot of every buffer the scheduler looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy<const L: usize> {
    /// Middle lanes.
    pub lanes: [LaneState; L],
    /// Stage A's input buffer is full or holds the end of input.
    pub input_available: bool,
    /// Stage B's output buffer has been drained.
    pub output_empty: bool,
    /// Stage B has delivered the end of its output.
    pub output_done: bool,
}

/// Consecutive steps in which each stage made no forward progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StallTracker {
    a: u32,
    b: u32,
}

impl StallTracker {
    /// Records a step of stage A.
    ///
    /// Input progress clears A's streak; output progress also clears B's,
    /// since B now has something new to consume.
    pub fn record_a(&mut self, input_moved: bool, output_moved: bool) {
        self.a += 1;
        if input_moved {
            self.a = 0;
        }
        if output_moved {
            self.a = 0;
            self.b = 0;
        }
    }

    /// Records a step of stage B.
    ///
    /// Input progress clears both streaks, since A now has room again.
    pub fn record_b(&mut self, input_moved: bool, output_moved: bool) {
        self.b += 1;
        if input_moved {
            self.a = 0;
            self.b = 0;
        }
        if output_moved {
            self.b = 0;
        }
    }

    /// Stage A's current streak.
    pub const fn a(&self) -> u32 {
        self.a
    }

    /// Stage B's current streak.
    pub const fn b(&self) -> u32 {
        self.b
    }
}

/// Which stages advance this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Step stage A.
    pub step_a: bool,
    /// Step stage B.
    pub step_b: bool,
    /// Neither stage qualified and both are stepped anyway.
    pub forced: bool,
}

impl Decision {
    /// Combines the two stage choices, forcing both when neither holds.
    pub const fn resolve(step_a: bool, step_b: bool) -> Self {
        if step_a || step_b {
            Self {
                step_a,
                step_b,
                forced: false,
            }
        } else {
            Self {
                step_a: true,
                step_b: true,
                forced: true,
            }
        }
    }
}

/// Water-mark scheduler with a stall override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    low_water: usize,
    high_water: usize,
    stall_override: u32,
}

impl Scheduler {
    /// Creates a scheduler.
    pub const fn new(low_water: usize, high_water: usize, stall_override: u32) -> Self {
        Self {
            low_water,
            high_water,
            stall_override,
        }
    }

    /// Stage A should step: it has somewhere to put output (or B has
    /// stalled), it has enough input, and not every lane has ended.
    pub fn wants_a<const L: usize>(&self, occupancy: &Occupancy<L>, stalls: &StallTracker) -> bool {
        let room = occupancy.lanes.iter().any(|l| l.size <= self.low_water);
        let finished = occupancy.lanes.iter().all(|l| l.last);
        (room || stalls.b >= self.stall_override) && occupancy.input_available && !finished
    }

    /// Stage B should step: every lane is fed (or A has stalled), its
    /// output has been drained, and it has not finished.
    pub fn wants_b<const L: usize>(&self, occupancy: &Occupancy<L>, stalls: &StallTracker) -> bool {
        let fed = occupancy
            .lanes
            .iter()
            .all(|l| l.last || l.size >= self.high_water);
        let drained = occupancy.output_empty || occupancy.output_done;
        ((fed && drained) || stalls.a >= self.stall_override) && !occupancy.output_done
    }

    /// Decides both stages from one snapshot.
    pub fn decide<const L: usize>(&self, occupancy: &Occupancy<L>, stalls: &StallTracker) -> Decision {
        Decision::resolve(self.wants_a(occupancy, stalls), self.wants_b(occupancy, stalls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn occupancy(sizes: [usize; 2], last: [bool; 2]) -> Occupancy<2> {
        Occupancy {
            lanes: [
                LaneState {
                    size: sizes[0],
                    last: last[0],
                },
                LaneState {
                    size: sizes[1],
                    last: last[1],
                },
            ],
            input_available: true,
            output_empty: true,
            output_done: false,
        }
    }

    const SCHEDULER: Scheduler = Scheduler::new(72, 24, 3);

    #[test]
    fn a_fills_until_every_lane_is_above_low_water() {
        let stalls = StallTracker::default();
        assert!(SCHEDULER.wants_a(&occupancy([80, 10], [false; 2]), &stalls));
        assert!(!SCHEDULER.wants_a(&occupancy([80, 90], [false; 2]), &stalls));
    }

    #[test]
    fn a_waits_for_a_full_input_block() {
        let mut occ = occupancy([0, 0], [false; 2]);
        occ.input_available = false;
        assert!(!SCHEDULER.wants_a(&occ, &StallTracker::default()));
    }

    #[test]
    fn b_needs_every_lane_fed_or_finished() {
        let stalls = StallTracker::default();
        assert!(!SCHEDULER.wants_b(&occupancy([30, 10], [false; 2]), &stalls));
        assert!(SCHEDULER.wants_b(&occupancy([30, 10], [false, true]), &stalls));
    }

    #[test]
    fn b_stops_once_done() {
        let mut occ = occupancy([30, 30], [true; 2]);
        occ.output_done = true;
        let mut stalls = StallTracker::default();
        for _ in 0..5 {
            stalls.record_a(false, false);
        }
        assert!(!SCHEDULER.wants_b(&occ, &stalls));
    }

    #[test]
    fn stalled_partner_overrides_water_marks() {
        let occ = occupancy([90, 10], [false; 2]);
        let mut stalls = StallTracker::default();
        assert!(!SCHEDULER.wants_b(&occ, &stalls));

        for _ in 0..3 {
            stalls.record_a(false, false);
        }
        assert!(SCHEDULER.wants_b(&occ, &stalls));
    }

    #[test]
    fn neither_qualifying_forces_both() {
        let mut occ = occupancy([90, 90], [false; 2]);
        occ.output_empty = false;
        let decision = SCHEDULER.decide(&occ, &StallTracker::default());
        assert!(decision.forced);
        assert!(decision.step_a && decision.step_b);
    }

    #[test]
    fn progress_resets_streaks() {
        let mut stalls = StallTracker::default();
        stalls.record_b(false, false);
        stalls.record_a(false, false);
        stalls.record_a(false, true);
        assert_eq!((stalls.a(), stalls.b()), (0, 0));

        stalls.record_b(false, false);
        stalls.record_b(false, true);
        assert_eq!(stalls.b(), 0);
        stalls.record_a(false, false);
        stalls.record_b(true, false);
        assert_eq!((stalls.a(), stalls.b()), (0, 0));
    }

    fn lane_state() -> impl Strategy<Value = LaneState> {
        (0usize..200, any::<bool>()).prop_map(|(size, last)| LaneState { size, last })
    }

    fn any_occupancy() -> impl Strategy<Value = Occupancy<8>> {
        (
            prop::array::uniform8(lane_state()),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(lanes, input_available, output_empty, output_done)| Occupancy {
                lanes,
                input_available,
                output_empty,
                output_done,
            })
    }

    fn any_stalls() -> impl Strategy<Value = StallTracker> {
        prop::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 0..12).prop_map(
            |steps| {
                let mut stalls = StallTracker::default();
                for (is_a, input, output) in steps {
                    if is_a {
                        stalls.record_a(input, output);
                    } else {
                        stalls.record_b(input, output);
                    }
                }
                stalls
            },
        )
    }

    proptest! {
        #[test]
        fn some_stage_always_advances(
            occ in any_occupancy(),
            stalls in any_stalls(),
            low in 0usize..150,
            high in 0usize..150,
        ) {
            let decision = Scheduler::new(low, high, 3).decide(&occ, &stalls);
            prop_assert!(decision.step_a || decision.step_b);
            prop_assert_eq!(
                decision.forced,
                !Scheduler::new(low, high, 3).wants_a(&occ, &stalls)
                    && !Scheduler::new(low, high, 3).wants_b(&occ, &stalls)
            );
        }

        #[test]
        fn finished_lanes_never_want_a(occ in any_occupancy(), stalls in any_stalls()) {
            let mut occ = occ;
            for lane in &mut occ.lanes {
                lane.last = true;
            }
            prop_assert!(!SCHEDULER.wants_a(&occ, &stalls));
        }
    }
}
