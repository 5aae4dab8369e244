//! Record transformation.
//!
//! Applies a compiled [`FieldSelection`] to one fetched record, producing
//! either flat rows ([`to_rows`]) or a pruned nested object ([`to_object`]).
//! Both functions are pure. A record that cannot be transformed yields an
//! [`ItemError::Transform`], which the job worker treats as a per-item
//! failure.

use crate::error::ItemError;
use crate::selection::{FieldSelection, SelectionTree};
use crate::types::EXTERNAL_ID_FIELD;
use serde_json::{Map, Value};


/// One flat output row: dotted column name to value. Absent cells are missing keys.
pub type Row = Map<String, Value>;

/// Output of transforming one record
#[derive(Clone, Debug, PartialEq)]
pub enum Transformed {
    /// Tabular mode: one or more rows
    Rows(Vec<Row>),
    /// Nested mode: one pruned object
    Object(Map<String, Value>),
}

/// Flatten a record into rows.
///
/// Scalar paths are resolved against the record, fanning out across any
/// sequence met on the way, and copied into every row: a single value as-is,
/// several values as one JSON array.
///
/// Array paths are expanded from the sequences they pass through. Each
/// element of a sequence yields its own rows, and the leaves below it are
/// resolved inside that element only, so a field missing from one element
/// leaves an absent cell in that element's row. Within one mapping, a value
/// that is not repeated is copied into every row its siblings produce, and
/// sibling sequences are paired by index with the shorter ones leaving cells
/// absent. A sequence at the end of an array path is spread one element per
/// row. With no array values at all exactly one row is produced. Every row
/// carries `External_ID`.
pub fn to_rows(
    record: &Value,
    external_id: &str,
    selection: &FieldSelection,
) -> Result<Vec<Row>, ItemError> {
    require_mapping(record)?;

    let mut base = Row::new();
    base.insert(
        EXTERNAL_ID_FIELD.to_string(),
        Value::String(external_id.to_string()),
    );

    let mut array_tree = SelectionTree::default();

    for path in selection.tree.leaf_paths() {
        let column = path.join(".");
        if selection.array_paths.contains(&column) {
            array_tree.insert(path.as_slice());
            continue;
        }

        let mut found = Vec::new();
        resolve(record, &path, &mut found);
        match found.as_slice() {
            [] => {}
            [single] => {
                base.insert(column, (*single).clone());
            }
            many => {
                base.insert(column, Value::Array(many.iter().map(|v| (*v).clone()).collect()));
            }
        }
    }

    if array_tree.is_empty() {
        return Ok(vec![base]);
    }

    let mut prefix = Vec::new();
    let expanded = expand(record, &array_tree, &mut prefix).rows;
    if expanded.is_empty() {
        return Ok(vec![base]);
    }

    let rows = expanded
        .into_iter()
        .map(|cells| {
            let mut row = base.clone();
            row.extend(cells);
            row
        })
        .collect();

    Ok(rows)
}

/// Prune a record down to the selected branches.
///
/// A terminal node keeps its value verbatim. A branch keeps only the keys it
/// names that the record actually has; against a sequence it applies to every
/// element, and against a scalar the scalar is kept. `External_ID` is always
/// present at the top level and overrides any field of the same name.
pub fn to_object(
    record: &Value,
    external_id: &str,
    tree: &SelectionTree,
) -> Result<Map<String, Value>, ItemError> {
    let map = require_mapping(record)?;

    let mut out = prune_map(map, tree);
    out.insert(
        EXTERNAL_ID_FIELD.to_string(),
        Value::String(external_id.to_string()),
    );
    Ok(out)
}

/// Collect every value reachable along `segments`.
fn resolve<'a>(value: &'a Value, segments: &[String], out: &mut Vec<&'a Value>) {
    let Some((first, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(first) {
                resolve(child, rest, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve(item, segments, out);
            }
        }
        _ => {}
    }
}

/// Rows produced below one node of the array selection.
struct Expansion {
    rows: Vec<Row>,
    /// Whether a sequence was crossed; single values are copied into every
    /// sibling row instead of being paired by index
    repeated: bool,
}

/// Expand `value` against the array-only selection `node` into row cells.
fn expand(value: &Value, node: &SelectionTree, prefix: &mut Vec<String>) -> Expansion {
    match (node, value) {
        (SelectionTree::Leaf, Value::Array(items)) => {
            let column = prefix.join(".");
            Expansion {
                rows: items
                    .iter()
                    .map(|item| Row::from_iter([(column.clone(), item.clone())]))
                    .collect(),
                repeated: true,
            }
        }
        (SelectionTree::Leaf, other) => Expansion {
            rows: vec![Row::from_iter([(prefix.join("."), other.clone())])],
            repeated: false,
        },
        (SelectionTree::Branch(_), Value::Array(items)) => Expansion {
            rows: items
                .iter()
                .flat_map(|item| expand(item, node, prefix).rows)
                .collect(),
            repeated: true,
        },
        (SelectionTree::Branch(children), Value::Object(map)) => {
            let mut fixed = Row::new();
            let mut groups = Vec::new();

            for (key, child) in children {
                let Some(value) = map.get(key) else {
                    continue;
                };
                prefix.push(key.clone());
                let expansion = expand(value, child, prefix);
                prefix.pop();

                if expansion.repeated {
                    groups.push(expansion.rows);
                } else {
                    for row in expansion.rows {
                        fixed.extend(row);
                    }
                }
            }

            let repeated = !groups.is_empty();
            let row_count = groups.iter().map(Vec::len).max().unwrap_or(0);
            if row_count == 0 {
                return Expansion {
                    rows: vec![fixed],
                    repeated,
                };
            }

            let rows = (0..row_count)
                .map(|i| {
                    let mut row = fixed.clone();
                    for group in &groups {
                        if let Some(cells) = group.get(i) {
                            row.extend(cells.clone());
                        }
                    }
                    row
                })
                .collect();

            Expansion { rows, repeated }
        }
        (SelectionTree::Branch(_), _) => Expansion {
            rows: Vec::new(),
            repeated: false,
        },
    }
}

fn prune(value: &Value, node: &SelectionTree) -> Value {
    match (node, value) {
        (SelectionTree::Leaf, v) => v.clone(),
        (SelectionTree::Branch(_), Value::Object(map)) => Value::Object(prune_map(map, node)),
        (SelectionTree::Branch(_), Value::Array(items)) => {
            Value::Array(items.iter().map(|item| prune(item, node)).collect())
        }
        (SelectionTree::Branch(_), scalar) => scalar.clone(),
    }
}

fn prune_map(map: &Map<String, Value>, node: &SelectionTree) -> Map<String, Value> {
    let SelectionTree::Branch(children) = node else {
        return map.clone();
    };

    let mut out = Map::new();
    for (key, child) in children {
        if let Some(value) = map.get(key) {
            out.insert(key.clone(), prune(value, child));
        }
    }
    out
}

fn require_mapping(record: &Value) -> Result<&Map<String, Value>, ItemError> {
    match record {
        Value::Object(map) => Ok(map),
        other => Err(ItemError::Transform(format!(
            "expected an object at the record root, found {}",
            kind_name(other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
