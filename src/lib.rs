//! # grapes-dd: path indexing of graph collections with decision diagrams
//!
//! **`grapes-dd`** indexes a collection of labelled graphs by their labelled
//! paths and answers subgraph queries by generating, for every graph, the
//! candidate vertices each query vertex may map to.
//!
//! ## How it works
//!
//! Every simple path of up to `max_depth` edges is recorded as a tuple
//! `(label of the most distant vertex, ..., label of the origin, origin vertex)`
//! with the number of times the path occurs in the graph as value. All tuples
//! of all graphs live in one multi-terminal multi-valued decision diagram
//! (an [`Mdd`][crate::mdd::Mdd]), which shares common structure between
//! graphs and between paths.
//!
//! A query is turned into a second diagram over the same variables. Their
//! product keeps the paths the query and the index have in common, and a
//! filtering pass derives the candidate sets.
//!
//! The size of the index depends heavily on the order of its variables.
//! The [`heuristic`] module searches for good orders, and
//! [`DecisionDiagramIndex::reorder`][crate::index::DecisionDiagramIndex::reorder]
//! applies one in place.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::io::Cursor;
//!
//! use grapes_dd::encoder::LabelEncoder;
//! use grapes_dd::graph::GraphsDb;
//! use grapes_dd::index::{DecisionDiagramIndex, IndexConfig};
//! use grapes_dd::matching::QueryMatcher;
//!
//! let text = "#g\n3\nA\nB\nA\n2\n0 1\n1 2\n";
//! let db = GraphsDb::from_reader(Cursor::new(text), true, LabelEncoder::new()).unwrap();
//!
//! let config = IndexConfig { max_depth: 2, storage_bits: 12, ..IndexConfig::default() };
//! let index = DecisionDiagramIndex::build(&db, &config).unwrap();
//!
//! // Query the graph with itself.
//! let query = db.graph(0).unwrap().clone();
//! let matches = QueryMatcher::new(&index).match_graph(&query).unwrap();
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].candidates(0).len(), 1);
//! // The last `A` has no out-edge, so either `A` of the graph fits it.
//! assert_eq!(matches[0].candidates(2).len(), 2);
//! ```
//!
//! ## Core Components
//!
//! - **[`mdd`]**: the decision diagram manager and its algebra.
//! - **[`index`]**: the path index over a graph database.
//! - **[`heuristic`]**: variable ordering heuristics.
//! - **[`matching`]**: candidate generation for queries.
//! - **[`verify`]**: exact subgraph matching over the candidates.

pub mod buffer;
pub mod cache;
pub mod dot;
pub mod encoder;
pub mod error;
pub mod graph;
pub mod heuristic;
pub mod index;
pub mod io;
pub mod iter;
pub mod matching;
pub mod mdd;
pub mod node;
pub mod ordering;
pub mod paths;
pub mod reference;
pub mod reorder;
pub mod table;
pub mod types;
pub mod utils;
pub mod verify;
