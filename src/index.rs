//! Path index over a graph collection.
//!
//! [`DecisionDiagramIndex`] stores, for every labelled path of every indexed
//! graph and every vertex the path starts from, the number of occurrences of
//! the path in that graph. The data lives in a single multi-terminal diagram
//! whose levels are laid out by a [`VariableOrdering`].
//!
//! Tuples are collected in a [`Buffer`] and merged into the diagram batch by
//! batch: building a diagram from many tuples at once and adding it to the
//! root is much cheaper than adding tuples one by one.
//!
//! # Index file
//!
//! ```text
//! <num_levels> <num_labels> <num_vertices>
//! <bound> <order>                     -- one line per level
//! <label>                             -- one line per label, by code
//! <graph_id> <vertex_id>              -- one line per vertex, by code
//! mdd ...                             -- diagram edge, see crate::io
//! ```

use std::fmt::{self, Display};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use num_bigint::BigUint;

use crate::buffer::Buffer;
use crate::dot::DotConfig;
use crate::encoder::{LabelEncoder, VertexEncoder};
use crate::error::{Error, Result};
use crate::graph::GraphsDb;
use crate::io::{parse_fields, LineReader};
use crate::iter::Assignments;
use crate::mdd::{Mdd, MddError};
use crate::ordering::VariableOrdering;
use crate::paths::{distant_first, PathSet};
use crate::reference::Ref;
use crate::reorder::ReorderStats;

/// Parameters of index construction.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Maximum number of edges of an indexed path.
    pub max_depth: usize,
    pub directed: bool,
    /// Tuples per batch merged into the diagram.
    pub buffer_size: usize,
    /// Node table holds at most `2^storage_bits` nodes.
    pub storage_bits: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            directed: true,
            buffer_size: 10000,
            storage_bits: 24,
        }
    }
}

impl IndexConfig {
    /// Label positions plus the origin vertex.
    pub fn num_levels(&self) -> usize {
        self.max_depth + 2
    }
}

/// Size and content figures of an index.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IndexStats {
    pub num_nodes: usize,
    pub peak_nodes: usize,
    pub memory_used: usize,
    pub peak_memory: usize,
    /// Internal nodes reachable from the root.
    pub num_unique_nodes: usize,
    pub num_edges: usize,
    /// Number of indexed `(path, vertex)` tuples.
    pub cardinality: BigUint,
    pub num_graphs: usize,
    pub num_labels: usize,
    pub num_levels: usize,
}

impl Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "num_nodes: {}", self.num_nodes)?;
        writeln!(f, "peak_nodes: {}", self.peak_nodes)?;
        writeln!(f, "memory_used: {}", self.memory_used)?;
        writeln!(f, "peak_memory: {}", self.peak_memory)?;
        writeln!(f, "num_unique_nodes: {}", self.num_unique_nodes)?;
        writeln!(f, "num_edges: {}", self.num_edges)?;
        writeln!(f, "cardinality: {}", self.cardinality)?;
        writeln!(f, "num_graphs: {}", self.num_graphs)?;
        writeln!(f, "num_labels: {}", self.num_labels)?;
        write!(f, "num_levels: {}", self.num_levels)
    }
}

#[derive(Debug)]
pub struct DecisionDiagramIndex {
    mdd: Mdd,
    ordering: VariableOrdering,
    root: Ref,
    labels: LabelEncoder,
    vertices: VertexEncoder,
    num_graphs: usize,
    directed: bool,
    storage_bits: usize,
}

/// Bounds for `max_depth + 1` label positions followed by the vertex position.
pub fn default_bounds(num_labels: usize, num_vertices: usize, max_depth: usize) -> Vec<u32> {
    let mut bounds = vec![num_labels as u32 + 1; max_depth + 1];
    bounds.push(num_vertices as u32 + 1);
    bounds
}

/// `<db>.<max_depth>.index.mtdd`
pub fn index_file_name(db_path: impl AsRef<Path>, max_depth: usize) -> PathBuf {
    let mut name = db_path.as_ref().as_os_str().to_owned();
    name.push(format!(".{}.index.mtdd", max_depth));
    PathBuf::from(name)
}

/// Whether an index file for `(db_path, max_depth)` exists.
pub fn already_indexed(db_path: impl AsRef<Path>, max_depth: usize) -> bool {
    index_file_name(db_path, max_depth).exists()
}

impl DecisionDiagramIndex {
    /// Empty index over the given bounds (semantic order, vertex position last).
    pub fn init(bounds: Vec<u32>, order: Option<Vec<usize>>, storage_bits: usize) -> Result<Self> {
        if bounds.len() < 2 {
            return Err(Error::Configuration(format!(
                "need at least one label position and the vertex position, got {} levels",
                bounds.len()
            )));
        }
        if !(1..=31).contains(&storage_bits) {
            return Err(Error::Configuration(format!("storage bits {} not in 1..=31", storage_bits)));
        }
        let ordering = VariableOrdering::new(bounds, order)?;
        Ok(Self::with_ordering(ordering, storage_bits))
    }

    fn with_ordering(ordering: VariableOrdering, storage_bits: usize) -> Self {
        let mdd = Mdd::new(&ordering.level_bounds(), storage_bits);
        let root = mdd.zero();
        Self {
            mdd,
            ordering,
            root,
            labels: LabelEncoder::new(),
            vertices: VertexEncoder::new(),
            num_graphs: 0,
            directed: true,
            storage_bits,
        }
    }

    /// Index every graph of `db` with the identity ordering.
    pub fn build(db: &GraphsDb, config: &IndexConfig) -> Result<Self> {
        Self::build_inner(db, config, None)
    }

    /// Index every graph of `db`, levels laid out by `order`.
    pub fn build_with_order(db: &GraphsDb, config: &IndexConfig, order: Vec<usize>) -> Result<Self> {
        Self::build_inner(db, config, Some(order))
    }

    fn build_inner(db: &GraphsDb, config: &IndexConfig, order: Option<Vec<usize>>) -> Result<Self> {
        info!(
            "Building index of {} graphs, depth {}, buffer {}",
            db.len(),
            config.max_depth,
            config.buffer_size
        );
        if config.buffer_size == 0 {
            return Err(Error::Configuration("buffer size must be positive".to_string()));
        }
        let bounds = default_bounds(db.labels.size(), db.num_vertices, config.max_depth);
        let mut index = Self::init(bounds, order, config.storage_bits)?;
        index.directed = config.directed;
        index.load_from_graph_db(db, config.buffer_size)?;
        Ok(index)
    }

    pub fn mdd(&self) -> &Mdd {
        &self.mdd
    }
    pub fn root(&self) -> Ref {
        self.root
    }
    pub fn ordering(&self) -> &VariableOrdering {
        &self.ordering
    }
    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }
    pub fn vertices(&self) -> &VertexEncoder {
        &self.vertices
    }
    pub fn num_graphs(&self) -> usize {
        self.num_graphs
    }
    pub fn num_levels(&self) -> usize {
        self.ordering.size()
    }
    /// Maximum number of edges of an indexed path.
    pub fn max_depth(&self) -> usize {
        self.ordering.size() - 2
    }
    pub fn storage_bits(&self) -> usize {
        self.storage_bits
    }

    /// Whether graphs were indexed with directed edges.
    pub fn directed(&self) -> bool {
        self.directed
    }
    pub fn set_directed(&mut self, directed: bool) {
        self.directed = directed;
    }

    fn corrupted(operation: &'static str) -> impl FnOnce(MddError) -> Error {
        move |source| Error::IndexCorruption { operation, source }
    }

    /// Merge the buffered tuples into the root.
    ///
    /// Values of tuples already present are added up. On failure the index
    /// must be discarded.
    pub fn insert(&mut self, buffer: &Buffer) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        debug!("Inserting {} tuples", buffer.len());

        let batch = self
            .mdd
            .create_edge(buffer.tuples(), buffer.values())
            .map_err(Self::corrupted("insert"))?;
        self.root = self.mdd.plus(self.root, batch).map_err(Self::corrupted("insert"))?;
        self.mdd.collect_garbage(&[self.root]);

        debug!(
            "Index now has {} nodes (peak {})",
            self.mdd.num_nodes(),
            self.mdd.peak_nodes()
        );
        Ok(())
    }

    fn check_fits(&self, db: &GraphsDb) -> Result<()> {
        let bounds = self.ordering.bounds();
        let vertex_bound = bounds[bounds.len() - 1] as usize;
        if vertex_bound <= self.vertices.size() + db.num_vertices {
            return Err(Error::Configuration(format!(
                "vertex bound {} is too small for {} vertices",
                vertex_bound,
                self.vertices.size() + db.num_vertices
            )));
        }
        if let Some(&b) = bounds[..bounds.len() - 1].iter().find(|&&b| b as usize <= db.labels.size()) {
            return Err(Error::Configuration(format!(
                "label bound {} is too small for {} labels",
                b,
                db.labels.size()
            )));
        }
        Ok(())
    }

    /// Index every graph of `db`, `buffer_size` tuples per batch.
    pub fn load_from_graph_db(&mut self, db: &GraphsDb, buffer_size: usize) -> Result<()> {
        self.check_fits(db)?;
        if self.labels.is_empty() {
            self.labels = db.labels.clone();
        }

        let max_depth = self.max_depth();
        let mut buffer = Buffer::new(buffer_size, self.num_levels() + 1);
        let mut batches = 0;

        for graph in &db.graphs {
            let paths = PathSet::extract(graph, max_depth);
            for (path, info) in paths.iter() {
                let labels = distant_first(path);
                for &origin in &info.origins {
                    let code = self.vertices.encode((graph.id, origin));
                    let ordering = &self.ordering;
                    let has_more = buffer.push_with(info.occurrences as i64, |slot| {
                        ordering.copy_variables(&labels, code, slot)
                    });
                    if !has_more {
                        self.insert(&buffer)?;
                        buffer.flush();
                        batches += 1;
                    }
                }
            }
        }
        if !buffer.is_empty() {
            self.insert(&buffer)?;
            buffer.flush();
            batches += 1;
        }

        self.labels.build_inverse_mapping();
        self.vertices.build_inverse_mapping();
        self.num_graphs = self.vertices.num_graphs();
        info!(
            "Indexed {} graphs in {} batches: {} nodes",
            self.num_graphs,
            batches,
            self.mdd.node_count(self.root)
        );
        debug!(
            "Operation cache: {} hits, {} misses",
            self.mdd.cache_hits(),
            self.mdd.cache_misses()
        );
        Ok(())
    }

    /// Indexed occurrences of `path` (origin label first) from a vertex.
    pub fn count(&self, path: &[u32], graph_id: u32, vertex: u32) -> i64 {
        let Some(code) = self.vertices.get(&(graph_id, vertex)) else {
            return 0;
        };
        if path.len() > self.ordering.path_length() {
            return 0;
        }
        let mut tuple = vec![0; self.num_levels() + 1];
        self.ordering.copy_variables(&distant_first(path), code, &mut tuple);
        self.mdd.evaluate(self.root, &tuple)
    }

    pub fn assignments(&self) -> Assignments<'_> {
        self.mdd.assignments(self.root)
    }

    pub fn get_stats(&self) -> IndexStats {
        IndexStats {
            num_nodes: self.mdd.num_nodes(),
            peak_nodes: self.mdd.peak_nodes(),
            memory_used: self.mdd.memory_used(),
            peak_memory: self.mdd.peak_memory(),
            num_unique_nodes: self.mdd.node_count(self.root),
            num_edges: self.mdd.edge_count(self.root),
            cardinality: self.mdd.cardinality(self.root),
            num_graphs: self.num_graphs,
            num_labels: self.labels.size(),
            num_levels: self.num_levels(),
        }
    }

    /// Move the levels to `new_order`; the indexed content is unchanged.
    ///
    /// On [`Error::ReorderFailure`] the index keeps its previous ordering.
    pub fn reorder(&mut self, new_order: &[usize]) -> Result<ReorderStats> {
        match self.ordering.reorder(&self.mdd, self.root, new_order) {
            Ok((root, stats)) => {
                self.root = root;
                self.mdd.collect_garbage(&[self.root]);
                Ok(stats)
            }
            Err(e) => {
                if let Error::ReorderFailure { .. } = e {
                    warn!("{}, keeping order {:?}", e, self.ordering.order());
                    self.mdd.collect_garbage(&[self.root]);
                }
                Err(e)
            }
        }
    }

    /// Write the index next to `db_path`, returning the file name.
    pub fn write(&self, db_path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = index_file_name(db_path, self.max_depth());
        let mut out = BufWriter::new(File::create(&path)?);
        self.write_to(&mut out)?;
        out.flush()?;
        info!("Wrote index to {}", path.display());
        Ok(path)
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(
            out,
            "{} {} {}",
            self.num_levels(),
            self.labels.size(),
            self.vertices.size()
        )?;
        self.ordering.write(out)?;
        self.labels.write(out)?;
        self.vertices.write(out)?;
        self.mdd.write_edge(self.root, out)?;
        Ok(())
    }

    /// Read the index of `(db_path, max_depth)`.
    pub fn read(db_path: impl AsRef<Path>, max_depth: usize, storage_bits: usize) -> Result<Self> {
        let path = index_file_name(db_path, max_depth);
        let file = File::open(&path)?;
        let index = Self::read_from(BufReader::new(file), storage_bits)?;
        if index.max_depth() != max_depth {
            return Err(Error::CorruptIndex(format!(
                "{} holds depth {}, expected {}",
                path.display(),
                index.max_depth(),
                max_depth
            )));
        }
        info!("Read index from {}", path.display());
        Ok(index)
    }

    pub fn read_from<R: BufRead>(reader: R, storage_bits: usize) -> Result<Self> {
        let mut lines = LineReader::new(reader);
        let header: Vec<usize> = lines
            .expect_fields(3, "index header")
            .map_err(Error::into_corrupt_index)?;
        let (num_levels, num_labels, num_vertices) = (header[0], header[1], header[2]);
        if num_levels < 2 {
            return Err(Error::CorruptIndex(format!("{} levels in header", num_levels)));
        }
        if !(1..=31).contains(&storage_bits) {
            return Err(Error::Configuration(format!("storage bits {} not in 1..=31", storage_bits)));
        }

        let ordering = VariableOrdering::read(&mut lines, num_levels)?;
        let labels = LabelEncoder::read(&mut lines, num_labels).map_err(Error::into_corrupt_index)?;
        let vertices = VertexEncoder::read(&mut lines, num_vertices).map_err(Error::into_corrupt_index)?;

        let mut index = Self::with_ordering(ordering, storage_bits);
        index.root = index.mdd.read_edge(&mut lines).map_err(Error::into_corrupt_index)?;
        index.num_graphs = vertices.num_graphs();
        index.labels = labels;
        index.vertices = vertices;
        Ok(index)
    }

    /// Independent copy of this index.
    pub fn try_clone(&self) -> Result<Self> {
        let mut data = Vec::new();
        self.write_to(&mut data)?;
        let mut copy = Self::read_from(data.as_slice(), self.storage_bits)?;
        copy.directed = self.directed;
        Ok(copy)
    }

    /// Dump the indexed tuples as tab-separated values.
    ///
    /// The first line holds the ordering (`v_<order[i]>` for each semantic
    /// position `i`), the second the bounds in the same order, then one line
    /// per assignment: values of levels `1..=N`, then the count.
    pub fn save_data(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        for o in self.ordering.order() {
            write!(out, "v_{}\t", o)?;
        }
        writeln!(out, "terminal")?;
        for b in self.ordering.bounds() {
            write!(out, "{}\t", b)?;
        }
        writeln!(out)?;

        let mut rows = 0usize;
        for (assignment, value) in self.assignments() {
            for v in &assignment[1..] {
                write!(out, "{}\t", v)?;
            }
            writeln!(out, "{}", value)?;
            rows += 1;
        }
        out.flush()?;
        info!("Saved {} tuples to {}", rows, path.as_ref().display());
        Ok(())
    }

    /// Rebuild a diagram from a [`save_data`][Self::save_data] dump.
    ///
    /// Only the diagram and its ordering are restored; the encoders stay empty,
    /// so the result cannot answer queries.
    pub fn load_data(path: impl AsRef<Path>, config: &IndexConfig) -> Result<Self> {
        let mut lines = LineReader::new(BufReader::new(File::open(path.as_ref())?));

        let header = lines.expect_line("variable names")?.to_string();
        let mut order = Vec::new();
        for name in header.split_whitespace() {
            if name == "terminal" {
                break;
            }
            let position = name
                .strip_prefix("v_")
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| Error::parse(lines.line_number(), format!("invalid variable {:?}", name)))?;
            order.push(position);
        }
        let text = lines.expect_line("bounds")?.to_string();
        let bounds: Vec<u32> = parse_fields(&text, lines.line_number(), "bound")?;
        if bounds.len() != order.len() {
            return Err(Error::parse(
                lines.line_number(),
                format!("{} bounds for {} variables", bounds.len(), order.len()),
            ));
        }

        let mut index = Self::init(bounds, Some(order), config.storage_bits)?;
        let n = index.num_levels();
        let mut buffer = Buffer::new(config.buffer_size.max(1), n + 1);
        while let Some(line) = lines.next_nonblank()? {
            let line = line.to_string();
            let number = lines.line_number();
            let fields: Vec<i64> = parse_fields(&line, number, "tuple")?;
            if fields.len() != n + 1 {
                return Err(Error::parse(
                    number,
                    format!("expected {} fields, found {}", n + 1, fields.len()),
                ));
            }
            if fields[..n].iter().any(|&v| v < 0) {
                return Err(Error::parse(number, "negative variable value"));
            }
            let has_more = buffer.push_with(fields[n], |slot| {
                for (l, &v) in fields[..n].iter().enumerate() {
                    slot[l + 1] = v as u32;
                }
            });
            if !has_more {
                index.insert(&buffer)?;
                buffer.flush();
            }
        }
        index.insert(&buffer)?;
        index.labels.build_inverse_mapping();
        index.vertices.build_inverse_mapping();
        info!("Loaded {} tuples from {}", index.mdd.cardinality(index.root), path.as_ref().display());
        Ok(index)
    }

    /// Graphviz rendering of the diagram, levels named after their variable.
    pub fn to_dot(&self) -> std::result::Result<String, fmt::Error> {
        let n = self.num_levels();
        let mut level_names = vec![String::new(); n];
        for i in 0..n {
            let name = if i + 1 == n { "vertex".to_string() } else { format!("label{}", i) };
            level_names[self.ordering.level_of(i).as_usize() - 1] = name;
        }
        let config = DotConfig {
            level_names,
            ..DotConfig::default()
        };
        self.mdd.to_dot_with_config(self.root, &config)
    }
}
