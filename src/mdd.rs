//! Multi-terminal multi-valued decision diagrams.
//!
//! The [`Mdd`] manager owns every node of a forest and keeps them canonical:
//! for a fixed set of level bounds, every function from integer assignments
//! to `i64` values has exactly one node representing it.
//!
//! # Levels and reduction
//!
//! Levels are numbered bottom-up. Level 0 holds terminals, level `N` is the
//! top. The forest is *fully reduced*: a node whose children are identical
//! for every value `0..bound` is never built, and an edge that skips a level
//! means "any value" at that level.
//!
//! # Operations
//!
//! - [`Mdd::create_edge`] builds a diagram from a batch of tuples, summing
//!   the values of identical assignments.
//! - [`Mdd::plus`] and [`Mdd::multiply`] combine two diagrams pointwise.
//! - [`Mdd::cardinality`] counts assignments with a non-zero value.
//! - [`Mdd::assignments`] enumerates `(assignment, value)` pairs.
//!
//! Reordering lives in [`crate::reorder`], persistence in [`crate::io`].

use std::cell::{Cell, RefCell};
use std::cmp::max;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Debug;

use log::debug;
use num_bigint::BigUint;
use thiserror::Error;

use crate::cache::{ComputedTable, OpKey};
use crate::node::Node;
use crate::reference::Ref;
use crate::table::Table;
use crate::types::Level;

/// Tuple entry meaning "any value at this level".
pub const DONT_CARE: u32 = u32::MAX;

/// Failures of the diagram engine.
#[derive(Debug, Error)]
pub enum MddError {
    #[error("node table is full ({capacity} cells)")]
    TableFull { capacity: usize },

    #[error("value {value} is outside the domain of {level} (bound {bound})")]
    OutOfDomain { level: Level, value: u32, bound: u32 },

    #[error("tuple has length {found}, expected {expected}")]
    TupleLength { expected: usize, found: usize },

    #[error("{0:?} is not a permutation of the diagram levels")]
    InvalidPermutation(Vec<u32>),
}

#[derive(Debug, Copy, Clone)]
enum Op {
    Plus,
    Multiply,
}

impl Op {
    fn key(self, f: Ref, g: Ref) -> OpKey {
        match self {
            Op::Plus => OpKey::Plus(f, g),
            Op::Multiply => OpKey::Multiply(f, g),
        }
    }

    fn eval(self, a: i64, b: i64) -> i64 {
        match self {
            Op::Plus => a.saturating_add(b),
            Op::Multiply => a.saturating_mul(b),
        }
    }
}

pub struct Mdd {
    storage: RefCell<Table<Node>>,
    cache: RefCell<ComputedTable>,
    /// Domain size per level; index 0 is the terminal sentinel.
    bounds: RefCell<Vec<u32>>,
    memory: Cell<usize>,
    peak_memory: Cell<usize>,
    peak_nodes: Cell<usize>,
    zero: Ref,
}

impl Mdd {
    /// Create a forest with one level per entry of `bounds` (bottom level first).
    pub fn new(bounds: &[u32], storage_bits: usize) -> Self {
        assert!(
            (1..=31).contains(&storage_bits),
            "Storage bits should be in the range 1..=31"
        );

        let cache_bits = storage_bits.min(16);

        let mut storage = Table::new(storage_bits);

        // Allocate the zero terminal:
        let zero_node = Node::terminal(0);
        let memory = zero_node.memory();
        let zero = storage.add(zero_node);
        assert_eq!(zero, Some(1)); // Make sure the zero terminal is (1).

        let mut levels = Vec::with_capacity(bounds.len() + 1);
        levels.push(0);
        levels.extend_from_slice(bounds);

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(ComputedTable::new(cache_bits)),
            bounds: RefCell::new(levels),
            memory: Cell::new(memory),
            peak_memory: Cell::new(memory),
            peak_nodes: Cell::new(1),
            zero: Ref::new(1),
        }
    }
}

impl Debug for Mdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("Mdd")
            .field("levels", &self.num_levels())
            .field("capacity", &storage.capacity())
            .field("real_size", &storage.real_size())
            .finish()
    }
}

impl Mdd {
    pub fn zero(&self) -> Ref {
        self.zero
    }
    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }

    pub fn num_levels(&self) -> u32 {
        (self.bounds.borrow().len() - 1) as u32
    }
    pub fn top(&self) -> Level {
        Level::new(self.num_levels())
    }
    pub fn bound(&self, level: Level) -> u32 {
        self.bounds.borrow()[level.as_usize()]
    }
    /// Bounds of levels `1..=N`, bottom level first.
    pub fn bounds(&self) -> Vec<u32> {
        self.bounds.borrow()[1..].to_vec()
    }
    pub(crate) fn set_bound(&self, level: Level, bound: u32) {
        self.bounds.borrow_mut()[level.as_usize()] = bound;
    }
    pub(crate) fn set_bounds(&self, bounds: &[u32]) {
        let mut levels = self.bounds.borrow_mut();
        levels.truncate(1);
        levels.extend_from_slice(bounds);
    }

    pub fn node(&self, node: Ref) -> Node {
        self.storage.borrow().value(node.index()).clone()
    }
    pub fn level(&self, node: Ref) -> Level {
        self.storage.borrow().value(node.index()).level
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        self.level(node).is_terminal()
    }
    /// Terminal value of `node`; meaningless for internal nodes.
    pub fn value(&self, node: Ref) -> i64 {
        self.storage.borrow().value(node.index()).value
    }

    pub fn cache_hits(&self) -> usize {
        self.cache.borrow().hits()
    }
    pub fn cache_misses(&self) -> usize {
        self.cache.borrow().misses()
    }

    fn put(&self, node: Node) -> Result<Ref, MddError> {
        let memory = node.memory();
        let mut storage = self.storage.borrow_mut();
        let before = storage.real_size();
        let index = storage.put(node).ok_or(MddError::TableFull {
            capacity: storage.capacity(),
        })?;
        if storage.real_size() > before {
            self.memory.set(self.memory.get() + memory);
            self.peak_memory.set(max(self.peak_memory.get(), self.memory.get()));
            self.peak_nodes.set(max(self.peak_nodes.get(), storage.real_size()));
        }
        Ok(Ref::new(index as u32))
    }

    /// Terminal node carrying `value`.
    pub fn constant(&self, value: i64) -> Result<Ref, MddError> {
        if value == 0 {
            return Ok(self.zero);
        }
        self.put(Node::terminal(value))
    }

    /// Make a canonical node at `level` from `(value, child)` edges.
    pub fn mk_node(&self, level: Level, mut children: Vec<(u32, Ref)>) -> Result<Ref, MddError> {
        debug!("mk(level = {}, children = {:?})", level, children);

        assert!(!level.is_terminal(), "Internal nodes cannot live at the terminal level");
        assert!(level <= self.top(), "Level {} is above the top level", level);

        children.retain(|&(_, c)| c != self.zero);
        if children.is_empty() {
            return Ok(self.zero);
        }
        children.sort_unstable_by_key(|&(v, _)| v);
        debug_assert!(children.windows(2).all(|w| w[0].0 < w[1].0), "Duplicate edge values");

        let bound = self.bound(level);
        if let Some(&(v, _)) = children.last() {
            if v >= bound {
                return Err(MddError::OutOfDomain { level, value: v, bound });
            }
        }

        // Handle redundancy
        let first = children[0].1;
        if children.len() == bound as usize && children.iter().all(|&(_, c)| c == first) {
            debug!("mk: redundant node at {}, returning {}", level, first);
            return Ok(first);
        }

        self.put(Node::internal(level, children))
    }

    /// Restriction of `node` to `level = value`, where `node` sits at or below `level`.
    pub fn cofactor(&self, node: Ref, level: Level, value: u32) -> Ref {
        let n = self.node(node);
        if n.level == level {
            n.child(value).unwrap_or(self.zero)
        } else {
            debug_assert!(n.level < level);
            node
        }
    }

    pub fn plus(&self, f: Ref, g: Ref) -> Result<Ref, MddError> {
        self.apply(Op::Plus, f, g)
    }

    pub fn multiply(&self, f: Ref, g: Ref) -> Result<Ref, MddError> {
        self.apply(Op::Multiply, f, g)
    }

    fn apply(&self, op: Op, f: Ref, g: Ref) -> Result<Ref, MddError> {
        match op {
            Op::Plus => {
                if self.is_zero(f) {
                    return Ok(g);
                }
                if self.is_zero(g) {
                    return Ok(f);
                }
            }
            Op::Multiply => {
                if self.is_zero(f) || self.is_zero(g) {
                    return Ok(self.zero);
                }
            }
        }

        // Both operations commute.
        let (f, g) = if f <= g { (f, g) } else { (g, f) };
        let nf = self.node(f);
        let ng = self.node(g);

        if nf.is_terminal() && ng.is_terminal() {
            return self.constant(op.eval(nf.value, ng.value));
        }

        let key = op.key(f, g);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            debug!("cache: {:?} -> {}", key, res);
            return Ok(res);
        }

        let top = max(nf.level, ng.level);
        let mut children = Vec::new();
        match (nf.level == top, ng.level == top) {
            (true, true) => {
                let mut a = nf.children.iter().peekable();
                let mut b = ng.children.iter().peekable();
                loop {
                    let (v, x, y) = match (a.peek(), b.peek()) {
                        (Some(&&(va, ca)), Some(&&(vb, cb))) => {
                            if va == vb {
                                a.next();
                                b.next();
                                (va, ca, cb)
                            } else if va < vb {
                                a.next();
                                (va, ca, self.zero)
                            } else {
                                b.next();
                                (vb, self.zero, cb)
                            }
                        }
                        (Some(&&(va, ca)), None) => {
                            a.next();
                            (va, ca, self.zero)
                        }
                        (None, Some(&&(vb, cb))) => {
                            b.next();
                            (vb, self.zero, cb)
                        }
                        (None, None) => break,
                    };
                    children.push((v, self.apply(op, x, y)?));
                }
            }
            (true, false) => children = self.apply_skipped(op, &nf, g)?,
            (false, true) => children = self.apply_skipped(op, &ng, f)?,
            (false, false) => unreachable!("one operand must sit at the top level"),
        }

        let res = self.mk_node(top, children)?;
        debug!("computed: {:?} -> {}", key, res);
        self.cache.borrow_mut().insert(key, res);
        Ok(res)
    }

    /// Children of `op(node, other)` where `other` skips the level of `node`.
    fn apply_skipped(&self, op: Op, node: &Node, other: Ref) -> Result<Vec<(u32, Ref)>, MddError> {
        match op {
            Op::Multiply => node
                .children
                .iter()
                .map(|&(v, c)| Ok((v, self.apply(op, c, other)?)))
                .collect(),
            Op::Plus => {
                // `other` holds for every value of the level, so the missing
                // edges of `node` become edges to `other`.
                let bound = self.bound(node.level);
                (0..bound)
                    .map(|v| {
                        let c = node.child(v).unwrap_or(self.zero);
                        Ok((v, self.apply(op, c, other)?))
                    })
                    .collect()
            }
        }
    }

    /// Build the diagram of a batch of tuples.
    ///
    /// Each tuple has length `N + 1`; entry `l` is the value at level `l` and
    /// entry 0 is ignored. [`DONT_CARE`] matches every value of a level.
    /// Values of identical assignments are summed.
    pub fn create_edge<T: AsRef<[u32]>>(&self, tuples: &[T], values: &[i64]) -> Result<Ref, MddError> {
        assert_eq!(tuples.len(), values.len(), "Every tuple needs a value");

        let n = self.num_levels();
        let expected = n as usize + 1;
        for tuple in tuples {
            let tuple = tuple.as_ref();
            if tuple.len() != expected {
                return Err(MddError::TupleLength {
                    expected,
                    found: tuple.len(),
                });
            }
            for l in 1..=n {
                let value = tuple[l as usize];
                let bound = self.bound(Level::new(l));
                if value != DONT_CARE && value >= bound {
                    return Err(MddError::OutOfDomain {
                        level: Level::new(l),
                        value,
                        bound,
                    });
                }
            }
        }

        let rows = (0..tuples.len()).collect();
        self.build(n, rows, tuples, values)
    }

    fn build<T: AsRef<[u32]>>(&self, level: u32, rows: Vec<usize>, tuples: &[T], values: &[i64]) -> Result<Ref, MddError> {
        if rows.is_empty() {
            return Ok(self.zero);
        }
        if level == 0 {
            let sum = rows.iter().fold(0i64, |acc, &i| acc.saturating_add(values[i]));
            return self.constant(sum);
        }

        let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        let mut free = Vec::new();
        for i in rows {
            let v = tuples[i].as_ref()[level as usize];
            if v == DONT_CARE {
                free.push(i);
            } else {
                groups.entry(v).or_default().push(i);
            }
        }

        let mut children = Vec::with_capacity(groups.len());
        for (v, group) in groups {
            children.push((v, self.build(level - 1, group, tuples, values)?));
        }
        let specified = self.mk_node(Level::new(level), children)?;
        let unspecified = self.build(level - 1, free, tuples, values)?;
        self.plus(specified, unspecified)
    }

    /// Value of `f` at `assignment` (entry `l` is the value at level `l`).
    pub fn evaluate(&self, f: Ref, assignment: &[u32]) -> i64 {
        let mut current = f;
        loop {
            let node = self.node(current);
            if node.is_terminal() {
                return node.value;
            }
            match node.child(assignment[node.level.as_usize()]) {
                Some(child) => current = child,
                None => return 0,
            }
        }
    }

    /// Number of assignments mapped to a non-zero value.
    pub fn cardinality(&self, f: Ref) -> BigUint {
        let mut cache = HashMap::new();
        let count = self._cardinality(f, &mut cache);
        count * self.span(self.level(f), self.top())
    }

    /// Product of the bounds of levels strictly between `low` and `high`.
    fn span(&self, low: Level, high: Level) -> BigUint {
        let bounds = self.bounds.borrow();
        let mut res = BigUint::from(1u32);
        for l in (low.index() + 1)..=high.index() {
            res *= bounds[l as usize];
        }
        res
    }

    fn _cardinality(&self, node: Ref, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if self.is_zero(node) {
            return BigUint::ZERO;
        }
        if let Some(count) = cache.get(&node) {
            return count.clone();
        }

        let n = self.node(node);
        let count = if n.is_terminal() {
            BigUint::from(1u32)
        } else {
            let below = n.level.down().unwrap_or(Level::TERMINAL);
            let mut acc = BigUint::ZERO;
            for &(_, child) in n.children.iter() {
                let skipped = self.span(self.level(child), below);
                acc += self._cardinality(child, cache) * skipped;
            }
            acc
        };

        cache.insert(node, count.clone());
        count
    }

    /// All nodes reachable from `nodes`, terminals included.
    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<Ref> {
        let mut visited = HashSet::new();
        let mut stack: Vec<Ref> = nodes.into_iter().collect();

        while let Some(node) = stack.pop() {
            if visited.insert(node) {
                let n = self.node(node);
                stack.extend(n.children.iter().map(|&(_, c)| c));
            }
        }

        visited
    }

    /// Number of internal nodes reachable from `f`.
    pub fn node_count(&self, f: Ref) -> usize {
        self.descendants([f]).into_iter().filter(|&r| !self.is_terminal(r)).count()
    }

    /// Number of edges between nodes reachable from `f`.
    pub fn edge_count(&self, f: Ref) -> usize {
        self.descendants([f])
            .into_iter()
            .map(|r| self.storage.borrow().value(r.index()).children.len())
            .sum()
    }

    /// Number of internal nodes currently stored, garbage included.
    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().iter().filter(|(_, n)| !n.is_terminal()).count()
    }
    pub fn peak_nodes(&self) -> usize {
        self.peak_nodes.get()
    }
    pub fn memory_used(&self) -> usize {
        self.memory.get()
    }
    pub fn peak_memory(&self) -> usize {
        self.peak_memory.get()
    }

    pub(crate) fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Drop every node not reachable from `roots`.
    pub fn collect_garbage(&self, roots: &[Ref]) {
        debug!("Collecting garbage...");

        self.cache.borrow_mut().clear();

        let mut alive = self.descendants(roots.iter().copied());
        alive.insert(self.zero);

        let mut storage = self.storage.borrow_mut();
        let dropped = storage.retain(|i, _| alive.contains(&Ref::new(i as u32)));
        let memory = storage.iter().map(|(_, n)| n.memory()).sum();
        self.memory.set(memory);

        debug!("Dropped {} nodes, {} alive", dropped, storage.real_size());
    }

    pub fn to_bracket_string(&self, node: Ref) -> String {
        let n = self.node(node);
        if n.is_terminal() {
            return format!("({})", n.value);
        }

        let children: Vec<String> = n
            .children
            .iter()
            .map(|&(v, c)| format!("{}={}", v, self.to_bracket_string(c)))
            .collect();
        format!("{}:({}, {})", node, n.level, children.join(", "))
    }
}
