//! Type-safe wrapper for diagram levels.
//!
//! Levels are numbered bottom-up: level 0 holds the terminal nodes and
//! levels `1..=N` hold internal nodes, with level `N` at the top.
//! Reordering changes which semantic variable lives at a level, never the
//! numbering itself.
use std::fmt;

/// A level in the diagram (0 = terminals).
///
/// # Invariants
///
/// - Level 0 is reserved for terminal nodes
/// - Levels increase upward, towards the root
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Level(u32);

impl Level {
    /// The terminal level.
    pub const TERMINAL: Level = Level(0);

    /// Creates a new level with the given index.
    pub const fn new(index: u32) -> Self {
        Level(index)
    }

    /// Returns the raw level index.
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Returns the raw level index as a `usize`, for indexing tuples and bounds.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the level directly above (index + 1).
    pub fn up(self) -> Self {
        Level(self.0 + 1)
    }

    /// Returns the level directly below, or `None` at the terminal level.
    pub fn down(self) -> Option<Self> {
        if self.0 > 0 {
            Some(Level(self.0 - 1))
        } else {
            None
        }
    }

    /// Checks if this is the terminal level.
    pub fn is_terminal(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl From<Level> for u32 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl From<u32> for Level {
    fn from(index: u32) -> Self {
        Level(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_creation() {
        let l1 = Level::new(1);
        let l2 = Level::new(2);
        assert_eq!(l1.index(), 1);
        assert_eq!(l2.as_usize(), 2);
        assert!(l1 < l2);
        assert_eq!(format!("{}", l2), "L2");
    }

    #[test]
    fn test_level_navigation() {
        let l0 = Level::TERMINAL;
        let l1 = l0.up();
        let l2 = l1.up();

        assert_eq!(l2.down(), Some(l1));
        assert_eq!(l1.down(), Some(l0));
        assert_eq!(l0.down(), None);
        assert!(l0.is_terminal());
        assert!(!l1.is_terminal());
    }
}
