//! Labelled graphs and the GFF collection format.
//!
//! # GFF format
//!
//! ```text
//! #<graph name>
//! <number of vertices n>
//! <label of vertex 0>
//! ...
//! <label of vertex n-1>
//! <number of edges m>
//! <src> <dst>
//! ...
//! ```
//!
//! A file holds any number of graphs; blank lines are ignored. Graphs get ids
//! `0, 1, ...` in file order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};

use crate::encoder::LabelEncoder;
use crate::error::{Error, Result};
use crate::io::LineReader;

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub id: u32,
    pub name: String,
    labels: Vec<u32>,
    adjacency: Vec<Vec<u32>>,
    num_edges: usize,
}

impl Graph {
    /// Graph with the given vertex label codes and no edges.
    pub fn new(id: u32, name: impl Into<String>, labels: Vec<u32>) -> Self {
        let n = labels.len();
        Self {
            id,
            name: name.into(),
            labels,
            adjacency: vec![Vec::new(); n],
            num_edges: 0,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.labels.len()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    pub fn label(&self, v: u32) -> u32 {
        self.labels[v as usize]
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Out-neighbours of `v`, sorted.
    pub fn neighbors(&self, v: u32) -> &[u32] {
        &self.adjacency[v as usize]
    }

    pub fn has_edge(&self, src: u32, dst: u32) -> bool {
        self.adjacency[src as usize].binary_search(&dst).is_ok()
    }

    /// Add `src -> dst`; parallel edges are stored once.
    pub fn add_edge(&mut self, src: u32, dst: u32) {
        let out = &mut self.adjacency[src as usize];
        if let Err(pos) = out.binary_search(&dst) {
            out.insert(pos, dst);
            self.num_edges += 1;
        }
    }

    /// Vertices grouped by label code, both in increasing order.
    pub fn vertices_by_label(&self) -> std::collections::BTreeMap<u32, Vec<u32>> {
        let mut groups = std::collections::BTreeMap::<u32, Vec<u32>>::new();
        for (v, &l) in self.labels.iter().enumerate() {
            groups.entry(l).or_default().push(v as u32);
        }
        groups
    }
}

/// Reads graphs one at a time from a GFF stream.
pub struct GffReader<'a, R> {
    lines: LineReader<R>,
    labels: &'a mut LabelEncoder,
    directed: bool,
    next_id: u32,
}

impl<'a, R: BufRead> GffReader<'a, R> {
    pub fn new(reader: R, labels: &'a mut LabelEncoder, directed: bool) -> Self {
        Self {
            lines: LineReader::new(reader),
            labels,
            directed,
            next_id: 0,
        }
    }

    fn expect_count(&mut self, what: &str) -> Result<usize> {
        let fields: Vec<usize> = self.lines.expect_fields(1, what)?;
        Ok(fields[0])
    }

    /// Next graph, or `None` at end of input.
    pub fn next_graph(&mut self) -> Result<Option<Graph>> {
        let Some(header) = self.lines.next_nonblank()?.map(str::to_string) else {
            return Ok(None);
        };
        let Some(name) = header.strip_prefix('#') else {
            return Err(Error::parse(
                self.lines.line_number(),
                format!("expected `#<name>`, found {:?}", header),
            ));
        };
        let name = name.trim().to_string();

        let n = self.expect_count("vertex count")?;
        let mut codes = Vec::with_capacity(n);
        for _ in 0..n {
            let line = self.lines.line_number() + 1;
            let label = self
                .lines
                .next_nonblank()?
                .ok_or_else(|| Error::parse(line, "unexpected end of input, expected label"))?
                .to_string();
            codes.push(self.labels.encode(label));
        }

        let mut graph = Graph::new(self.next_id, name, codes);
        let m = self.expect_count("edge count")?;
        for _ in 0..m {
            let fields: Vec<u32> = self.lines.expect_fields(2, "edge")?;
            let (src, dst) = (fields[0], fields[1]);
            if src as usize >= n || dst as usize >= n {
                return Err(Error::parse(
                    self.lines.line_number(),
                    format!("edge {} {} out of range for {} vertices", src, dst, n),
                ));
            }
            graph.add_edge(src, dst);
            if !self.directed {
                graph.add_edge(dst, src);
            }
        }

        debug!(
            "Read graph {} {:?}: {} vertices, {} edges",
            graph.id,
            graph.name,
            graph.num_vertices(),
            graph.num_edges()
        );
        self.next_id += 1;
        Ok(Some(graph))
    }
}

/// A collection of graphs sharing one label table.
#[derive(Debug, Clone, Default)]
pub struct GraphsDb {
    pub graphs: Vec<Graph>,
    pub labels: LabelEncoder,
    pub num_vertices: usize,
}

impl GraphsDb {
    /// Read a GFF file with a fresh label table.
    pub fn read(path: impl AsRef<Path>, directed: bool) -> Result<Self> {
        Self::read_with_labels(path, directed, LabelEncoder::new())
    }

    /// Read a GFF file, extending an existing label table.
    pub fn read_with_labels(path: impl AsRef<Path>, directed: bool, labels: LabelEncoder) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let db = Self::from_reader(BufReader::new(file), directed, labels)?;
        info!(
            "Loaded {} graphs ({} vertices, {} labels) from {}",
            db.graphs.len(),
            db.num_vertices,
            db.labels.size(),
            path.display()
        );
        Ok(db)
    }

    pub fn from_reader<R: BufRead>(reader: R, directed: bool, mut labels: LabelEncoder) -> Result<Self> {
        let mut graphs = Vec::new();
        let mut gff = GffReader::new(reader, &mut labels, directed);
        while let Some(graph) = gff.next_graph()? {
            graphs.push(graph);
        }
        let num_vertices = graphs.iter().map(Graph::num_vertices).sum();
        Ok(Self {
            graphs,
            labels,
            num_vertices,
        })
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn graph(&self, id: u32) -> Option<&Graph> {
        self.graphs.get(id as usize)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use test_log::test;

    use super::*;

    const TWO_GRAPHS: &str = "#first\n3\nA\nB\nA\n2\n0 1\n1 2\n\n#second\n2\nC\nA\n1\n1 0\n";

    #[test]
    fn test_read_collection() {
        let db = GraphsDb::from_reader(Cursor::new(TWO_GRAPHS), true, LabelEncoder::new()).unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.num_vertices, 5);
        assert_eq!(db.labels.size(), 3);

        let g = db.graph(0).unwrap();
        assert_eq!(g.name, "first");
        assert_eq!(g.labels(), &[1, 2, 1]);
        assert!(g.has_edge(0, 1));
        assert!(!g.has_edge(1, 0));

        let h = db.graph(1).unwrap();
        assert_eq!(h.id, 1);
        assert_eq!(h.labels(), &[3, 1]);
        assert_eq!(h.neighbors(1), &[0]);
    }

    #[test]
    fn test_undirected_adds_reverse_edges() {
        let db = GraphsDb::from_reader(Cursor::new(TWO_GRAPHS), false, LabelEncoder::new()).unwrap();
        let g = db.graph(0).unwrap();
        assert_eq!(g.neighbors(1), &[0, 2]);
        assert_eq!(g.num_edges(), 4);
    }

    #[test]
    fn test_existing_labels_are_kept() {
        let mut labels = LabelEncoder::new();
        labels.encode("C".to_string());
        let db = GraphsDb::from_reader(Cursor::new(TWO_GRAPHS), true, labels).unwrap();
        assert_eq!(db.graph(0).unwrap().labels(), &[2, 3, 2]);
        assert_eq!(db.labels.get(&"C".to_string()), Some(1));
    }

    #[test]
    fn test_vertices_by_label() {
        let db = GraphsDb::from_reader(Cursor::new(TWO_GRAPHS), true, LabelEncoder::new()).unwrap();
        let groups = db.graph(0).unwrap().vertices_by_label();
        assert_eq!(groups[&1], vec![0, 2]);
        assert_eq!(groups[&2], vec![1]);
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("first\n1\nA\n0\n", 1),
            ("#g\n2\nA\nB\n1\n0 5\n", 6),
            ("#g\n2\nA\n", 4),
            ("#g\n1\nA\n1\n0\n", 5),
        ];
        for (text, line) in cases {
            let res = GraphsDb::from_reader(Cursor::new(text), true, LabelEncoder::new());
            match res {
                Err(Error::Parse { line: l, .. }) => assert_eq!(l, line, "{:?}", text),
                other => panic!("expected parse error for {:?}, got {:?}", text, other.map(|db| db.len())),
            }
        }
    }
}
