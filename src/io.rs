//! Text serialization of diagram edges, and the line reader shared by all
//! text formats of the crate.
//!
//! # Edge format
//!
//! ```text
//! mdd <num_nodes>
//! t <id> <value>                       -- terminal
//! n <id> <level> <k> <v1> <c1> ... <vk> <ck>   -- internal node
//! root <id>
//! ```
//!
//! Nodes are listed children-first, with ids `0..num_nodes` in listing order,
//! so every child id refers to an already-read node. Reading rebuilds the
//! nodes through [`Mdd::mk_node`], which keeps the result canonical.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::mdd::Mdd;
use crate::reference::Ref;
use crate::types::Level;

/// Reads a text stream line by line, tracking line numbers.
///
/// End of input is reported as `Ok(None)`, never as an error.
pub struct LineReader<R> {
    inner: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: String::new(),
        }
    }

    /// Number of the last line returned.
    pub fn line_number(&self) -> usize {
        self.line
    }

    /// Next line with trailing newline removed, or `None` at end of input.
    pub fn next_line(&mut self) -> Result<Option<&str>> {
        self.buf.clear();
        if self.inner.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        Ok(Some(self.buf.trim_end_matches(|c| c == '\n' || c == '\r')))
    }

    /// Next line that is not blank.
    pub fn next_nonblank(&mut self) -> Result<Option<&str>> {
        loop {
            self.buf.clear();
            if self.inner.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            if !self.buf.trim().is_empty() {
                return Ok(Some(self.buf.trim()));
            }
        }
    }

    /// Next line, failing at end of input.
    pub fn expect_line(&mut self, what: &str) -> Result<&str> {
        let line = self.line + 1;
        self.next_line()?
            .ok_or_else(|| Error::parse(line, format!("unexpected end of input, expected {}", what)))
    }

    /// Next non-blank line, split on whitespace into exactly `n` fields.
    pub fn expect_fields<T: FromStr>(&mut self, n: usize, what: &str) -> Result<Vec<T>> {
        let line = self.line + 1;
        let text = self
            .next_nonblank()?
            .ok_or_else(|| Error::parse(line, format!("unexpected end of input, expected {}", what)))?
            .to_string();
        let fields = parse_fields(&text, self.line, what)?;
        if fields.len() != n {
            return Err(Error::parse(
                self.line,
                format!("expected {} fields for {}, found {}", n, what, fields.len()),
            ));
        }
        Ok(fields)
    }
}

/// Parse every whitespace-separated field of `text`.
pub fn parse_fields<T: FromStr>(text: &str, line: usize, what: &str) -> Result<Vec<T>> {
    text.split_whitespace()
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| Error::parse(line, format!("invalid {} field {:?}", what, s)))
        })
        .collect()
}

impl Mdd {
    /// Write the diagram rooted at `root`.
    pub fn write_edge<W: Write>(&self, root: Ref, out: &mut W) -> std::io::Result<()> {
        // Post-order listing, children first.
        let mut ids: HashMap<Ref, usize> = HashMap::new();
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if ids.contains_key(&node) {
                continue;
            }
            if expanded {
                ids.insert(node, order.len());
                order.push(node);
            } else {
                stack.push((node, true));
                for &(_, c) in self.node(node).children.iter().rev() {
                    if !ids.contains_key(&c) {
                        stack.push((c, false));
                    }
                }
            }
        }

        writeln!(out, "mdd {}", order.len())?;
        for (id, &node) in order.iter().enumerate() {
            let n = self.node(node);
            if n.is_terminal() {
                writeln!(out, "t {} {}", id, n.value)?;
            } else {
                write!(out, "n {} {} {}", id, n.level.index(), n.children.len())?;
                for &(v, c) in n.children.iter() {
                    write!(out, " {} {}", v, ids[&c])?;
                }
                writeln!(out)?;
            }
        }
        writeln!(out, "root {}", ids[&root])
    }

    /// Read a diagram written by [`Mdd::write_edge`] into this forest.
    pub fn read_edge<R: BufRead>(&self, reader: &mut LineReader<R>) -> Result<Ref> {
        let header = reader.expect_line("diagram header")?.to_string();
        let count: usize = match header.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["mdd", n] => n
                .parse()
                .map_err(|_| Error::parse(reader.line_number(), "invalid node count"))?,
            _ => return Err(Error::parse(reader.line_number(), "expected `mdd <count>`")),
        };

        let corrupt = |line: usize, e: crate::mdd::MddError| Error::parse(line, e.to_string());

        let mut nodes: Vec<Ref> = Vec::with_capacity(count);
        for id in 0..count {
            let text = reader.expect_line("diagram node")?.to_string();
            let line = reader.line_number();
            let mut parts = text.split_whitespace();
            let kind = parts.next().unwrap_or_default();
            let fields: Vec<i64> = parse_fields(&parts.collect::<Vec<_>>().join(" "), line, "node")?;
            if fields.first() != Some(&(id as i64)) {
                return Err(Error::parse(line, format!("expected node id {}", id)));
            }
            let node = match kind {
                "t" if fields.len() == 2 => self.constant(fields[1]).map_err(|e| corrupt(line, e))?,
                "n" if fields.len() >= 3 => {
                    let (level, k) = (fields[1], fields[2]);
                    if level < 1 || level > self.num_levels() as i64 {
                        return Err(Error::parse(line, format!("level {} out of range", level)));
                    }
                    if k < 0 || fields.len() != 3 + 2 * k as usize {
                        return Err(Error::parse(line, "edge list length mismatch"));
                    }
                    let mut children = Vec::with_capacity(k as usize);
                    for pair in fields[3..].chunks(2) {
                        let (v, c) = (pair[0], pair[1]);
                        if v < 0 || c < 0 || c as usize >= nodes.len() {
                            return Err(Error::parse(line, format!("bad edge {} -> {}", v, c)));
                        }
                        children.push((v as u32, nodes[c as usize]));
                    }
                    self.mk_node(Level::new(level as u32), children)
                        .map_err(|e| corrupt(line, e))?
                }
                _ => return Err(Error::parse(line, format!("malformed node line {:?}", text))),
            };
            nodes.push(node);
        }

        let fields: Vec<String> = reader.expect_fields(2, "root")?;
        let line = reader.line_number();
        if fields[0] != "root" {
            return Err(Error::parse(line, "expected `root <id>`"));
        }
        let id: usize = fields[1]
            .parse()
            .map_err(|_| Error::parse(line, "invalid root id"))?;
        nodes
            .get(id)
            .copied()
            .ok_or_else(|| Error::parse(line, format!("root id {} out of range", id)))
    }
}
