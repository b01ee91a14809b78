//! Effect flags: per-node bitsets of pending commit work.

use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Bitset of effects a node (or its subtree, via `subtree_flags`) carries
/// into the commit phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(pub u16);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Node must be inserted into its host parent.
    pub const PLACEMENT: Flags = Flags(1);
    /// Node's host instance must be updated (props/text changed).
    pub const UPDATE: Flags = Flags(1 << 1);
    /// Node has children recorded for deletion.
    pub const CHILD_DELETION: Flags = Flags(1 << 2);
    /// Node queued passive effects for after-commit flushing.
    pub const PASSIVE_EFFECT: Flags = Flags(1 << 3);
    /// Node's ref must be (re)attached in the layout pass.
    pub const REF_ATTACH: Flags = Flags(1 << 4);

    /// Effects applied during the mutation pass.
    pub const MUTATION_MASK: Flags =
        Flags(Self::PLACEMENT.0 | Self::UPDATE.0 | Self::CHILD_DELETION.0);
    /// Effects that require the passive-flush task to be scheduled.
    /// Deletions are included because unmounting collects destroy callbacks.
    pub const PASSIVE_MASK: Flags = Flags(Self::PASSIVE_EFFECT.0 | Self::CHILD_DELETION.0);
    /// Effects applied during the layout pass, after the tree swap.
    pub const LAYOUT_MASK: Flags = Flags(Self::REF_ATTACH.0);

    /// Whether any bit of `mask` is set.
    pub fn intersects(self, mask: Flags) -> bool {
        (self.0 & mask.0) != 0
    }

    /// Whether all bits of `mask` are set.
    pub fn contains(self, mask: Flags) -> bool {
        (self.0 & mask.0) == mask.0
    }

    /// Whether no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Remove the bits of `mask`.
    pub fn clear(&mut self, mask: Flags) {
        self.0 &= !mask.0;
    }
}

impl BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Self) -> Self::Output {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Flags {
    type Output = Flags;
    fn bitand(self, rhs: Self) -> Self::Output {
        Flags(self.0 & rhs.0)
    }
}

impl Not for Flags {
    type Output = Flags;
    fn not(self) -> Self::Output {
        Flags(!self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_and_contains() {
        let f = Flags::PLACEMENT | Flags::UPDATE;
        assert!(f.contains(Flags::PLACEMENT));
        assert!(f.contains(Flags::UPDATE));
        assert!(!f.contains(Flags::CHILD_DELETION));
    }

    #[test]
    fn intersects_any_bit() {
        let f = Flags::PASSIVE_EFFECT;
        assert!(f.intersects(Flags::PASSIVE_MASK));
        assert!(!f.intersects(Flags::MUTATION_MASK));
    }

    #[test]
    fn clear_removes_bits() {
        let mut f = Flags::PLACEMENT | Flags::REF_ATTACH;
        f.clear(Flags::PLACEMENT);
        assert!(!f.contains(Flags::PLACEMENT));
        assert!(f.contains(Flags::REF_ATTACH));
    }

    #[test]
    fn deletion_is_in_both_masks() {
        assert!(Flags::MUTATION_MASK.contains(Flags::CHILD_DELETION));
        assert!(Flags::PASSIVE_MASK.contains(Flags::CHILD_DELETION));
    }

    #[test]
    fn default_is_empty() {
        assert!(Flags::default().is_empty());
    }
}
