use std::rc::Rc;

use crate::reference::Ref;
use crate::types::Level;
use crate::utils::{pair_all, StructuralHash};

/// A node of a multi-terminal decision diagram.
///
/// Terminal nodes live at level 0 and carry `value`. Internal nodes carry
/// their outgoing edges as `(value, child)` pairs, sorted by value, with
/// edges to the zero terminal left out.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Node {
    pub level: Level,
    pub value: i64,
    pub children: Rc<[(u32, Ref)]>,
}

impl Node {
    pub fn terminal(value: i64) -> Self {
        Self {
            level: Level::TERMINAL,
            value,
            children: Rc::from(Vec::new()),
        }
    }

    pub fn internal(level: Level, children: Vec<(u32, Ref)>) -> Self {
        Self {
            level,
            value: 0,
            children: Rc::from(children),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.level.is_terminal()
    }

    /// Child reached by `value`, if the edge exists.
    pub fn child(&self, value: u32) -> Option<Ref> {
        self.children
            .binary_search_by_key(&value, |&(v, _)| v)
            .ok()
            .map(|i| self.children[i].1)
    }

    /// Estimated number of bytes occupied by this node.
    pub fn memory(&self) -> usize {
        std::mem::size_of::<Node>() + self.children.len() * std::mem::size_of::<(u32, Ref)>()
    }
}

impl Default for Node {
    fn default() -> Self {
        Node::terminal(0)
    }
}

impl StructuralHash for Node {
    fn structural_hash(&self) -> u64 {
        let head = [self.level.index() as u64, self.value as u64];
        let edges = self
            .children
            .iter()
            .flat_map(|&(v, c)| [v as u64, c.get() as u64]);
        pair_all(head.into_iter().chain(edges))
    }
}
