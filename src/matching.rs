//! Candidate generation for subgraph queries.
//!
//! Matching runs in two phases:
//!
//! 1. **Intersection.** The labelled paths of the query are put in a query
//!    diagram, each distinct path once, with the origin vertex left free and
//!    the number of occurrences of the path in the query as value. The
//!    product with the index keeps exactly the `(path, vertex)` tuples of the
//!    index whose path also occurs in the query; the product value is the
//!    index count times the query count.
//! 2. **Filtering.** Tuples are grouped by index vertex. A query vertex `q`
//!    is a candidate for index vertex `t` only if every path starting at `q`
//!    also starts at `t`, and `t` holds enough occurrences of each. A graph
//!    is reported only when every query vertex has at least one candidate.
//!
//! Labels of the query that never occur in the index get codes outside the
//! index domain; paths using them cannot match, so the query vertices they
//! start from get no candidates.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Display};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{debug, info, warn};

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::graph::{GffReader, Graph};
use crate::index::DecisionDiagramIndex;
use crate::mdd::DONT_CARE;
use crate::ordering::VariableOrdering;
use crate::paths::{distant_first, PathSet};

/// A distinct labelled path of the query.
#[derive(Debug, Clone)]
pub struct QueryPath {
    /// Labels, origin first.
    pub labels: Vec<u32>,
    /// Diagram tuple with the origin vertex left free.
    pub tuple: Vec<u32>,
    /// Occurrences of the path in the whole query.
    pub occurrences: u32,
    /// Query vertices the path starts from.
    pub origins: BTreeSet<u32>,
    /// Whether every label fits the index domain.
    pub in_domain: bool,
}

/// Labelled paths of a query graph, indexed both ways.
#[derive(Debug, Clone)]
pub struct QueryPattern {
    paths: Vec<QueryPath>,
    /// Padded label values (semantic order) to path.
    by_labels: HashMap<Vec<u32>, usize>,
    paths_from_vertex: Vec<Vec<usize>>,
}

impl QueryPattern {
    pub fn new(graph: &Graph, ordering: &VariableOrdering) -> Self {
        let max_depth = ordering.path_length() - 1;
        let label_bounds = &ordering.bounds()[..ordering.path_length()];
        let set = PathSet::extract(graph, max_depth);

        let mut paths = Vec::with_capacity(set.len());
        let mut by_labels = HashMap::with_capacity(set.len());
        let mut paths_from_vertex = vec![Vec::new(); graph.num_vertices()];

        for (labels, info) in set.iter() {
            let mut tuple = vec![0; ordering.size() + 1];
            ordering.copy_variables(&distant_first(labels), DONT_CARE, &mut tuple);
            let (key, _) = ordering.split_tuple(&tuple);
            let in_domain = key.iter().zip(label_bounds).all(|(&v, &b)| v < b);

            let id = paths.len();
            for &q in &info.origins {
                paths_from_vertex[q as usize].push(id);
            }
            by_labels.insert(key, id);
            paths.push(QueryPath {
                labels: labels.to_vec(),
                tuple,
                occurrences: info.occurrences,
                origins: info.origins.clone(),
                in_domain,
            });
        }

        Self {
            paths,
            by_labels,
            paths_from_vertex,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.paths_from_vertex.len()
    }

    pub fn paths(&self) -> &[QueryPath] {
        &self.paths
    }

    /// Ids of the paths starting at query vertex `q`.
    pub fn paths_from(&self, q: u32) -> &[usize] {
        &self.paths_from_vertex[q as usize]
    }

    /// Path whose padded labels (semantic order) are `key`.
    pub fn find(&self, key: &[u32]) -> Option<usize> {
        self.by_labels.get(key).copied()
    }

    /// Tuples and values of the query diagram, one per distinct in-domain path.
    pub fn fill(&self, buffer: &mut Buffer) {
        for p in self.paths.iter().filter(|p| p.in_domain) {
            buffer.push_unbounded(&p.tuple, p.occurrences as i64);
        }
    }
}

/// Candidate target vertices of every query vertex, for one target graph.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GraphMatch {
    pub graph_id: u32,
    candidates: Vec<BTreeSet<u32>>,
}

impl GraphMatch {
    pub fn new(graph_id: u32, num_query_vertices: usize) -> Self {
        Self {
            graph_id,
            candidates: vec![BTreeSet::new(); num_query_vertices],
        }
    }

    pub fn add_match(&mut self, query_vertex: u32, graph_vertex: u32) {
        self.candidates[query_vertex as usize].insert(graph_vertex);
    }

    pub fn candidates(&self, query_vertex: u32) -> &BTreeSet<u32> {
        &self.candidates[query_vertex as usize]
    }

    pub fn num_query_vertices(&self) -> usize {
        self.candidates.len()
    }

    /// Every query vertex has at least one candidate.
    pub fn is_complete(&self) -> bool {
        self.candidates.iter().all(|c| !c.is_empty())
    }
}

impl Display for GraphMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph #{}:", self.graph_id)?;
        for (q, c) in self.candidates.iter().enumerate() {
            let list: Vec<String> = c.iter().map(|v| v.to_string()).collect();
            write!(f, " {}->[{}]", q, list.join(","))?;
        }
        Ok(())
    }
}

pub struct QueryMatcher<'a> {
    index: &'a DecisionDiagramIndex,
}

impl<'a> QueryMatcher<'a> {
    pub fn new(index: &'a DecisionDiagramIndex) -> Self {
        Self { index }
    }

    /// Read the first graph of a GFF file with the index label table.
    pub fn read_query(&self, path: impl AsRef<Path>) -> Result<Graph> {
        let mut labels = self.index.labels().clone();
        let file = File::open(path.as_ref())?;
        let mut reader = GffReader::new(BufReader::new(file), &mut labels, self.index.directed());
        reader
            .next_graph()?
            .ok_or_else(|| Error::parse(0, format!("no graph in {}", path.as_ref().display())))
    }

    /// Read a query from `path` and match it.
    pub fn match_file(&self, path: impl AsRef<Path>) -> Result<(Graph, Vec<GraphMatch>)> {
        let query = self.read_query(path)?;
        let matches = self.match_graph(&query)?;
        Ok((query, matches))
    }

    /// Complete matches of `query`, sorted by graph id.
    pub fn match_graph(&self, query: &Graph) -> Result<Vec<GraphMatch>> {
        let pattern = QueryPattern::new(query, self.index.ordering());
        debug!(
            "Query encoded: {} vertices, {} distinct paths",
            pattern.num_vertices(),
            pattern.paths().len()
        );
        let res = self.match_pattern(&pattern);
        // Drop the query and product diagrams.
        self.index.mdd().collect_garbage(&[self.index.root()]);
        res
    }

    pub fn match_pattern(&self, pattern: &QueryPattern) -> Result<Vec<GraphMatch>> {
        let index = self.index;
        let mdd = index.mdd();
        let ordering = index.ordering();
        let corrupted = |source| Error::IndexCorruption {
            operation: "query",
            source,
        };
        if index.vertices().is_empty() && !mdd.is_zero(index.root()) {
            return Err(Error::Configuration(
                "index has no vertex table, rebuild it from the graph database to query it".to_string(),
            ));
        }

        let mut buffer = Buffer::new(pattern.paths().len().max(1), ordering.size() + 1);
        pattern.fill(&mut buffer);
        let query_dd = mdd.create_edge(buffer.tuples(), buffer.values()).map_err(corrupted)?;
        let product = mdd.multiply(index.root(), query_dd).map_err(corrupted)?;
        debug!("Intersected: {} nodes", mdd.node_count(product));

        let mut by_vertex: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (assignment, _) in mdd.assignments(product) {
            let (key, code) = ordering.split_tuple(&assignment);
            match pattern.find(&key) {
                Some(p) => by_vertex.entry(code).or_default().push(p),
                None => warn!("Product holds path {:?} unknown to the query", key),
            }
        }

        let vertex_position = ordering.vertex_level().as_usize();
        let mut graphs: BTreeMap<u32, GraphMatch> = BTreeMap::new();

        for (code, paths) in by_vertex {
            let Some(&(graph_id, vertex)) = index.vertices().decode(code) else {
                warn!("Unknown vertex code {}", code);
                continue;
            };
            let graph_match = graphs
                .entry(graph_id)
                .or_insert_with(|| GraphMatch::new(graph_id, pattern.num_vertices()));

            let mut support: BTreeMap<u32, usize> = BTreeMap::new();
            for &p in &paths {
                for &q in &pattern.paths()[p].origins {
                    *support.entry(q).or_default() += 1;
                }
            }

            for (q, count) in support {
                let query_paths = pattern.paths_from(q);
                if count < query_paths.len() {
                    continue;
                }
                let supported = query_paths.iter().all(|&p| {
                    let path = &pattern.paths()[p];
                    if !path.in_domain {
                        return false;
                    }
                    let mut tuple = path.tuple.clone();
                    tuple[vertex_position] = code;
                    let vertex_n_occ = mdd.evaluate(product, &tuple);
                    let query_n_occ = path.occurrences as i64;
                    vertex_n_occ / query_n_occ >= query_n_occ
                });
                if supported {
                    graph_match.add_match(q, vertex);
                }
            }
        }

        let total = graphs.len();
        let complete: Vec<GraphMatch> = graphs.into_values().filter(GraphMatch::is_complete).collect();
        info!("Filtered: {} of {} graphs are complete matches", complete.len(), total);
        Ok(complete)
    }
}
