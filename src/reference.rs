use std::fmt::{Display, Formatter};

/// Handle to a node stored in the [`Mdd`][crate::mdd::Mdd] manager.
///
/// A `Ref` is only meaningful for the manager that produced it, and only
/// until the node is reclaimed by garbage collection.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ref(u32);

impl Ref {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the raw index of the referenced node in the node table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Return the internal representation of the reference.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}
