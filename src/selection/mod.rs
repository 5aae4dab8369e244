//! Field path compilation.
//!
//! Users pick fields with a dotted/bracketed notation such as
//! `tests[].results.IV_curve[*].current` or `location/site`. This module turns
//! such a list into a [`SelectionTree`] describing which branches of a nested
//! record to keep, plus the set of leaf paths that are multi-valued.
//!
//! Compilation never fails. Malformed input degrades to a coarser selection:
//! any bracketed group is dropped and marks the path as an array path, an
//! unclosed bracket drops the rest of the path, and empty segments vanish.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};


/// Which fields of a nested record to retain.
///
/// A `Leaf` keeps the corresponding value verbatim, whatever its shape. A
/// `Branch` keeps only the listed child keys. The root of a compiled tree is
/// always a `Branch`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SelectionTree {
    /// Keep this value as-is
    Leaf,
    /// Keep only these children
    Branch(BTreeMap<String, SelectionTree>),
}

impl Default for SelectionTree {
    fn default() -> Self {
        SelectionTree::Branch(BTreeMap::new())
    }
}

impl SelectionTree {
    /// Register one path given as segments.
    ///
    /// A `Leaf` met on the way is promoted to a `Branch`; a `Branch` at the
    /// end of the path is left alone, so a shorter path never demotes a
    /// longer one. This makes insertion order irrelevant.
    pub fn insert<S: AsRef<str>>(&mut self, segments: &[S]) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };

        if let SelectionTree::Leaf = self {
            *self = SelectionTree::Branch(BTreeMap::new());
        }
        if let SelectionTree::Branch(children) = self {
            children
                .entry(first.as_ref().to_string())
                .or_insert(SelectionTree::Leaf)
                .insert(rest);
        }
    }

    /// Whether this node is a terminal marker
    pub fn is_leaf(&self) -> bool {
        matches!(self, SelectionTree::Leaf)
    }

    /// Child node for `key`, if this is a branch that selects it
    pub fn child(&self, key: &str) -> Option<&SelectionTree> {
        match self {
            SelectionTree::Branch(children) => children.get(key),
            SelectionTree::Leaf => None,
        }
    }

    /// Whether nothing at all is selected
    pub fn is_empty(&self) -> bool {
        match self {
            SelectionTree::Branch(children) => children.is_empty(),
            SelectionTree::Leaf => false,
        }
    }

    /// Every root-to-leaf path, in sorted order
    pub fn leaf_paths(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        self.collect_leaves(&mut prefix, &mut out);
        out
    }

    fn collect_leaves(&self, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        match self {
            SelectionTree::Leaf => {
                if !prefix.is_empty() {
                    out.push(prefix.clone());
                }
            }
            SelectionTree::Branch(children) => {
                for (key, child) in children {
                    prefix.push(key.clone());
                    child.collect_leaves(prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}

/// One user path after bracket stripping and splitting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPath {
    /// Path segments in order
    pub segments: Vec<String>,
    /// Whether the path carried a repeated-element marker
    pub is_array: bool,
}

/// Parse a dotted/bracketed path.
///
/// `[]` and `[*]` are repeated-element markers. Other bracket contents, such
/// as an index, are treated the same way (every element is selected).
pub fn parse_path(raw: &str) -> ParsedPath {
    let mut cleaned = String::with_capacity(raw.len());
    let mut depth = 0usize;
    let mut is_array = false;

    for ch in raw.chars() {
        match ch {
            '[' => {
                if depth == 0 {
                    cleaned.push('.');
                }
                depth += 1;
                is_array = true;
            }
            ']' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            _ => cleaned.push(ch),
        }
    }

    let segments = cleaned
        .split(['.', '/'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    ParsedPath { segments, is_array }
}

/// Compile paths into a selection tree.
///
/// Structurally identical output for any permutation of the same paths.
pub fn compile<I, S>(paths: I) -> SelectionTree
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tree = SelectionTree::default();
    for raw in paths {
        tree.insert(&parse_path(raw.as_ref()).segments);
    }
    tree
}

/// A compiled field list: the selection tree plus the multi-valued leaves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSelection {
    /// Which branches to keep
    pub tree: SelectionTree,
    /// Dotted leaf paths expanded one row per element in tabular output
    pub array_paths: BTreeSet<String>,
    /// The field list as given, kept for export metadata
    pub requested: Vec<String>,
}

impl FieldSelection {
    /// Compile a user field list.
    ///
    /// A leaf is an array path when some path carrying a repeated-element
    /// marker is a segment-wise prefix of it (or equal to it).
    pub fn compile<S: AsRef<str>>(paths: &[S]) -> Self {
        let parsed: Vec<ParsedPath> = paths.iter().map(|p| parse_path(p.as_ref())).collect();

        let mut tree = SelectionTree::default();
        for p in &parsed {
            tree.insert(&p.segments);
        }

        let marked: Vec<&[String]> = parsed
            .iter()
            .filter(|p| p.is_array && !p.segments.is_empty())
            .map(|p| p.segments.as_slice())
            .collect();

        let array_paths = tree
            .leaf_paths()
            .into_iter()
            .filter(|leaf| marked.iter().any(|m| leaf.starts_with(m)))
            .map(|leaf| leaf.join("."))
            .collect();

        Self {
            tree,
            array_paths,
            requested: paths.iter().map(|p| p.as_ref().to_string()).collect(),
        }
    }

    /// Dotted leaf paths in sorted order; the tabular columns after `External_ID`
    pub fn columns(&self) -> Vec<String> {
        self.tree
            .leaf_paths()
            .into_iter()
            .map(|p| p.join("."))
            .collect()
    }
}
