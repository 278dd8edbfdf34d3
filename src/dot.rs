//! Diagram to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! - **Terminal nodes** are rendered as squares labelled with their value, at the bottom (sink rank)
//! - **Internal nodes** are rendered as circles labelled with their level, one rank per level
//! - **Edges** are labelled with the value of the level they stand for
//! - **Root** is rendered as a rectangle at the top (source rank)
//!
//! # Examples
//!
//! ```
//! use grapes_dd::mdd::Mdd;
//!
//! let mdd = Mdd::new(&[2, 3], 10);
//! let f = mdd.create_edge(&[vec![0, 1, 2]], &[5]).unwrap();
//!
//! let dot = mdd.to_dot(f).unwrap();
//! assert!(dot.starts_with("digraph {"));
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::mdd::Mdd;
use crate::reference::Ref;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for internal nodes (default: "circle")
    pub node_shape: &'static str,
    /// Shape for terminal nodes (default: "square")
    pub terminal_shape: &'static str,
    /// Shape for the root marker (default: "rect")
    pub root_shape: &'static str,
    /// Optional names for levels `1..=N`, used instead of `L<i>`.
    pub level_names: Vec<String>,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "circle",
            terminal_shape: "square",
            root_shape: "rect",
            level_names: Vec::new(),
        }
    }
}

impl Mdd {
    /// Converts the diagram rooted at `root` to DOT format.
    pub fn to_dot(&self, root: Ref) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(root, &DotConfig::default())
    }

    /// Converts the diagram rooted at `root` to DOT format with custom configuration.
    pub fn to_dot_with_config(&self, root: Ref, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "node [shape={}];", config.node_shape)?;

        // Group reachable nodes by level, top level first.
        let mut levels: BTreeMap<u32, Vec<Ref>> = BTreeMap::new();
        for node in self.descendants([root]) {
            levels.entry(self.level(node).index()).or_default().push(node);
        }

        for (&level, nodes) in levels.iter_mut().rev() {
            nodes.sort();
            if level == 0 {
                writeln!(dot, "{{ rank=sink")?;
                for node in nodes.iter() {
                    writeln!(
                        dot,
                        "  {} [shape={}, label=\"{}\"];",
                        node.get(),
                        config.terminal_shape,
                        self.value(*node)
                    )?;
                }
            } else {
                let name = config
                    .level_names
                    .get(level as usize - 1)
                    .cloned()
                    .unwrap_or_else(|| format!("L{}", level));
                writeln!(dot, "{{ rank=same")?;
                for node in nodes.iter() {
                    writeln!(dot, "  {} [label=\"{}\"];", node.get(), name)?;
                }
            }
            writeln!(dot, "}}")?;
        }

        writeln!(dot, "{{ rank=source; r [shape={}, label=\"root\"]; }}", config.root_shape)?;
        writeln!(dot, "r -> {};", root.get())?;

        for nodes in levels.values() {
            for &node in nodes {
                for &(v, child) in self.node(node).children.iter() {
                    writeln!(dot, "{} -> {} [label=\"{}\"];", node.get(), child.get(), v)?;
                }
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_dot() {
        let mdd = Mdd::new(&[2, 3], 10);
        let f = mdd.create_edge(&[vec![0, 1, 2], vec![0, 0, 2]], &[5, 5]).unwrap();
        let dot = mdd.to_dot(f).unwrap();

        assert!(dot.contains("rank=sink"));
        assert!(dot.contains("label=\"5\""));
        assert!(dot.contains(&format!("r -> {};", f.get())));
        // Level 1 is redundant (both values lead to 5), so only level 2 remains.
        assert!(dot.contains("label=\"L2\""));
        assert!(!dot.contains("label=\"L1\""));
    }

    #[test]
    fn test_level_names() {
        let mdd = Mdd::new(&[2], 4);
        let f = mdd.create_edge(&[vec![0, 1]], &[1]).unwrap();
        let config = DotConfig {
            level_names: vec!["vertex".to_string()],
            ..DotConfig::default()
        };
        let dot = mdd.to_dot_with_config(f, &config).unwrap();
        assert!(dot.contains("label=\"vertex\""));
    }
}
