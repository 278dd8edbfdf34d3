//! Dense integer codes for labels and graph vertices.
//!
//! Codes start at 1 and grow by one for every new value; 0 is never handed
//! out, so it can stand for "no label" in padded paths.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::io::{BufRead, Write};

use crate::error::{Error, Result};
use crate::io::LineReader;

/// Append-only bijection between values and codes `1..=size`.
#[derive(Debug, Clone)]
pub struct Encoder<T> {
    codes: HashMap<T, u32>,
    inverse: Option<Vec<T>>,
}

pub type LabelEncoder = Encoder<String>;

/// Codes `(graph_id, vertex_id)` pairs.
pub type VertexEncoder = Encoder<(u32, u32)>;

impl<T> Default for Encoder<T> {
    fn default() -> Self {
        Self {
            codes: HashMap::new(),
            inverse: None,
        }
    }
}

impl<T> Encoder<T>
where
    T: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Code of `value`, allocating the next one on first sight.
    pub fn encode(&mut self, value: T) -> u32 {
        let next = self.codes.len() as u32 + 1;
        let code = *self.codes.entry(value).or_insert(next);
        if code == next {
            // A new code invalidates a previously built inverse.
            self.inverse = None;
        }
        code
    }

    /// Code of `value` if it was seen before.
    pub fn get(&self, value: &T) -> Option<u32> {
        self.codes.get(value).copied()
    }

    /// Number of distinct values seen.
    pub fn size(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Freeze the current content for [`decode`][Encoder::decode].
    pub fn build_inverse_mapping(&mut self) {
        let mut inverse: Vec<Option<T>> = vec![None; self.codes.len()];
        for (value, &code) in &self.codes {
            inverse[code as usize - 1] = Some(value.clone());
        }
        self.inverse = Some(inverse.into_iter().flatten().collect());
    }

    /// Value of `code`, or `None` if no such code exists.
    ///
    /// # Panics
    ///
    /// Panics if [`build_inverse_mapping`][Encoder::build_inverse_mapping]
    /// was not called after the last new value.
    pub fn decode(&self, code: u32) -> Option<&T> {
        let inverse = self
            .inverse
            .as_ref()
            .unwrap_or_else(|| panic!("decode called before build_inverse_mapping"));
        inverse.get((code as usize).checked_sub(1)?)
    }

    /// Values sorted by code (`table[code - 1]`).
    pub fn table(&self) -> Vec<T> {
        let mut entries: Vec<(&T, u32)> = self.codes.iter().map(|(v, &c)| (v, c)).collect();
        entries.sort_by_key(|&(_, c)| c);
        entries.into_iter().map(|(v, _)| v.clone()).collect()
    }

    /// Rebuild from a table sorted by code; entry `i` gets code `i + 1`.
    pub fn from_table(table: Vec<T>) -> Self {
        let mut encoder = Self::new();
        for value in table {
            encoder.encode(value);
        }
        encoder.build_inverse_mapping();
        encoder
    }
}

impl LabelEncoder {
    /// One label per line, in code order.
    pub fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for label in self.table() {
            writeln!(out, "{}", label)?;
        }
        Ok(())
    }

    pub fn read<R: BufRead>(reader: &mut LineReader<R>, count: usize) -> Result<Self> {
        let mut table = Vec::with_capacity(count);
        for _ in 0..count {
            table.push(reader.expect_line("label")?.to_string());
        }
        let encoder = Self::from_table(table);
        if encoder.size() != count {
            return Err(Error::CorruptIndex(format!(
                "label table has duplicates ({} distinct of {})",
                encoder.size(),
                count
            )));
        }
        Ok(encoder)
    }
}

impl VertexEncoder {
    /// Number of distinct graphs among the coded vertices.
    pub fn num_graphs(&self) -> usize {
        self.codes.keys().map(|&(g, _)| g).collect::<BTreeSet<_>>().len()
    }

    /// One `graph vertex` pair per line, in code order.
    pub fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for (graph, vertex) in self.table() {
            writeln!(out, "{} {}", graph, vertex)?;
        }
        Ok(())
    }

    pub fn read<R: BufRead>(reader: &mut LineReader<R>, count: usize) -> Result<Self> {
        let mut table = Vec::with_capacity(count);
        for _ in 0..count {
            let fields: Vec<u32> = reader.expect_fields(2, "graph vertex")?;
            table.push((fields[0], fields[1]));
        }
        let encoder = Self::from_table(table);
        if encoder.size() != count {
            return Err(Error::CorruptIndex(format!(
                "vertex table has duplicates ({} distinct of {})",
                encoder.size(),
                count
            )));
        }
        Ok(encoder)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use test_log::test;

    use super::*;

    #[test]
    fn test_encode_is_idempotent() {
        let mut enc = LabelEncoder::new();
        assert_eq!(enc.encode("A".to_string()), 1);
        assert_eq!(enc.encode("B".to_string()), 2);
        assert_eq!(enc.encode("A".to_string()), 1);
        assert_eq!(enc.size(), 2);
        assert_eq!(enc.get(&"B".to_string()), Some(2));
        assert_eq!(enc.get(&"C".to_string()), None);
    }

    #[test]
    fn test_decode_after_inverse() {
        let mut enc = VertexEncoder::new();
        for pair in [(0, 2), (0, 0), (1, 0), (0, 2)] {
            enc.encode(pair);
        }
        enc.build_inverse_mapping();

        assert_eq!(enc.decode(1), Some(&(0, 2)));
        assert_eq!(enc.decode(3), Some(&(1, 0)));
        assert_eq!(enc.decode(0), None);
        assert_eq!(enc.decode(4), None);
        assert_eq!(enc.num_graphs(), 2);
        for code in 1..=3 {
            let value = *enc.decode(code).unwrap();
            assert_eq!(enc.encode(value), code);
        }
    }

    #[test]
    #[should_panic(expected = "decode called before build_inverse_mapping")]
    fn test_decode_before_inverse_panics() {
        let mut enc = LabelEncoder::new();
        enc.encode("A".to_string());
        enc.decode(1);
    }

    #[test]
    fn test_write_read_keeps_codes() {
        let mut labels = LabelEncoder::new();
        for l in ["C", "A", "B"] {
            labels.encode(l.to_string());
        }
        let mut vertices = VertexEncoder::new();
        for v in [(1, 5), (0, 3)] {
            vertices.encode(v);
        }

        let mut out = Vec::new();
        labels.write(&mut out).unwrap();
        vertices.write(&mut out).unwrap();
        assert_eq!(String::from_utf8(out.clone()).unwrap(), "C\nA\nB\n1 5\n0 3\n");

        let mut reader = LineReader::new(Cursor::new(out));
        let labels2 = LabelEncoder::read(&mut reader, 3).unwrap();
        let vertices2 = VertexEncoder::read(&mut reader, 2).unwrap();
        assert_eq!(labels2.get(&"C".to_string()), Some(1));
        assert_eq!(labels2.get(&"B".to_string()), Some(3));
        assert_eq!(vertices2.get(&(0, 3)), Some(2));
        assert_eq!(labels2.decode(2).map(String::as_str), Some("A"));
    }

    #[test]
    fn test_read_truncated() {
        let mut reader = LineReader::new(Cursor::new("0 1\n"));
        assert!(matches!(VertexEncoder::read(&mut reader, 2), Err(Error::Parse { .. })));
    }
}
