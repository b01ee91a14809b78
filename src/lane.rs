//! Lane model: bitmask priorities for pending updates.
//!
//! A [`Lane`] is a single bit; [`Lanes`] is a set of them. Numerically
//! smaller lane values are more urgent, so the highest-priority lane in a
//! set is its lowest set bit. Multiple updates may share a lane (they batch
//! into one render) or occupy different lanes (independent priorities in
//! flight on the same root).

use std::ops::{BitAnd, BitOr};

use crate::scheduler::Priority;

// ---------------------------------------------------------------------------
// Lane
// ---------------------------------------------------------------------------

/// One priority lane: a single bit. Smaller value = more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Lane(pub u32);

impl Lane {
    /// Absence of a lane.
    pub const NONE: Lane = Lane(0);
    /// Synchronous priority: bypasses time-slicing and the task heap.
    pub const SYNC: Lane = Lane(1);
    /// Continuous user input (drag, scroll).
    pub const INPUT_CONTINUOUS: Lane = Lane(1 << 1);
    /// Default asynchronous priority.
    pub const DEFAULT: Lane = Lane(1 << 2);
    /// Deprioritized work.
    pub const LOW: Lane = Lane(1 << 3);
    /// Work that may wait indefinitely.
    pub const IDLE: Lane = Lane(1 << 4);

    /// Whether this is [`Lane::NONE`].
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The scheduler priority used to drive work at this lane.
    pub fn to_priority(self) -> Priority {
        match self {
            Lane::SYNC => Priority::Immediate,
            Lane::INPUT_CONTINUOUS => Priority::UserBlocking,
            Lane::DEFAULT => Priority::Normal,
            Lane::LOW => Priority::Low,
            _ => Priority::Idle,
        }
    }

    /// The lane allocated to updates submitted at the given ambient priority.
    pub fn from_priority(priority: Priority) -> Lane {
        match priority {
            Priority::Immediate => Lane::SYNC,
            Priority::UserBlocking => Lane::INPUT_CONTINUOUS,
            Priority::Normal => Lane::DEFAULT,
            Priority::Low => Lane::LOW,
            Priority::Idle => Lane::IDLE,
        }
    }
}

// ---------------------------------------------------------------------------
// Lanes
// ---------------------------------------------------------------------------

/// A set of lanes, e.g. everything pending on a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Lanes(pub u32);

impl Lanes {
    /// The empty set.
    pub const NONE: Lanes = Lanes(0);

    /// Whether no lane is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Add a lane to the set.
    pub fn merge(self, lane: Lane) -> Lanes {
        Lanes(self.0 | lane.0)
    }

    /// Remove a lane from the set.
    pub fn remove(self, lane: Lane) -> Lanes {
        Lanes(self.0 & !lane.0)
    }

    /// Whether the set contains the given lane.
    pub fn contains(self, lane: Lane) -> bool {
        (self.0 & lane.0) == lane.0 && !lane.is_none()
    }

    /// The most urgent lane in the set: the lowest set bit.
    pub fn highest_priority(self) -> Lane {
        Lane(self.0 & self.0.wrapping_neg())
    }
}

impl BitOr for Lanes {
    type Output = Lanes;
    fn bitor(self, rhs: Self) -> Self::Output {
        Lanes(self.0 | rhs.0)
    }
}

impl BitAnd for Lanes {
    type Output = Lanes;
    fn bitand(self, rhs: Self) -> Self::Output {
        Lanes(self.0 & rhs.0)
    }
}

impl From<Lane> for Lanes {
    fn from(lane: Lane) -> Lanes {
        Lanes(lane.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_bitwise_or() {
        let lanes = Lanes::NONE.merge(Lane::SYNC).merge(Lane::DEFAULT);
        assert_eq!(lanes, Lanes(0b101));
    }

    #[test]
    fn highest_priority_is_lowest_set_bit() {
        let lanes = Lanes::NONE.merge(Lane::DEFAULT).merge(Lane::LOW);
        assert_eq!(lanes.highest_priority(), Lane::DEFAULT);

        let with_sync = lanes.merge(Lane::SYNC);
        assert_eq!(with_sync.highest_priority(), Lane::SYNC);
    }

    #[test]
    fn highest_priority_of_empty_is_none() {
        assert_eq!(Lanes::NONE.highest_priority(), Lane::NONE);
        assert!(Lanes::NONE.highest_priority().is_none());
    }

    #[test]
    fn remove_clears_only_that_lane() {
        let lanes = Lanes::NONE.merge(Lane::SYNC).merge(Lane::IDLE);
        let remaining = lanes.remove(Lane::SYNC);
        assert!(!remaining.contains(Lane::SYNC));
        assert!(remaining.contains(Lane::IDLE));
    }

    #[test]
    fn contains_rejects_none() {
        let lanes = Lanes::NONE.merge(Lane::SYNC);
        assert!(!lanes.contains(Lane::NONE));
    }

    #[test]
    fn priority_round_trip() {
        for lane in [
            Lane::SYNC,
            Lane::INPUT_CONTINUOUS,
            Lane::DEFAULT,
            Lane::LOW,
            Lane::IDLE,
        ] {
            assert_eq!(Lane::from_priority(lane.to_priority()), lane);
        }
    }

    #[test]
    fn sync_is_most_urgent() {
        let all = Lanes::NONE
            .merge(Lane::SYNC)
            .merge(Lane::INPUT_CONTINUOUS)
            .merge(Lane::DEFAULT)
            .merge(Lane::LOW)
            .merge(Lane::IDLE);
        assert_eq!(all.highest_priority(), Lane::SYNC);
    }
}
