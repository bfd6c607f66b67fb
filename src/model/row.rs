use serde_json::Value;
use std::collections::HashSet;

use crate::api::types::GroupBlock;
use crate::model::record::RecordId;

/// Stable row identity: the JSON serialization of the ordered
/// `[field, value]` pairs that define the group path. The same logical group
/// maps to the same id across reloads, which is what lets fold, selection and
/// closed-row state survive a refetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowId(String);

impl RowId {
    pub fn from_path(path: &[(String, Value)]) -> Self {
        let pairs: Vec<Value> = path
            .iter()
            .map(|(field, value)| Value::Array(vec![Value::String(field.clone()), value.clone()]))
            .collect();
        Self(Value::Array(pairs).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A node of the hierarchical group tree.
#[derive(Debug, Clone)]
pub struct Row {
    pub id: RowId,
    pub group_level: u32,
    pub is_group: bool,
    pub group_path: Vec<(String, Value)>,
    pub display_name: String,
    pub rows: Vec<Row>,
    pub record_ids: Vec<RecordId>,
    /// True when any field on the group path is read-only. Locked rows veto
    /// every drag gesture on their pills; because the flag derives from the
    /// path, pinned duplicates of the same group share it.
    pub locked: bool,
}

/// A flattened, visible row as the renderer consumes it.
#[derive(Debug, Clone)]
pub struct FlatRow {
    pub id: RowId,
    pub level: u32,
    pub is_group: bool,
    pub name: String,
    pub locked: bool,
    pub closed: bool,
    pub group_path: Vec<(String, Value)>,
    pub record_ids: Vec<RecordId>,
}

pub fn group_value_label(value: &Value) -> String {
    match value {
        Value::Null => "Undefined".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the row tree from the fetch response's group blocks.
///
/// Each block carries the full group-by combination; blocks are threaded into
/// a tree level by level, preserving first-appearance order. Without any
/// grouping a single implicit row holds every record.
pub fn build_rows(
    groups: &[GroupBlock],
    all_records: &[RecordId],
    grouped_by: &[String],
    readonly_fields: &HashSet<String>,
) -> Vec<Row> {
    if grouped_by.is_empty() {
        return vec![Row {
            id: RowId::from_path(&[]),
            group_level: 0,
            is_group: false,
            group_path: Vec::new(),
            display_name: String::new(),
            rows: Vec::new(),
            record_ids: all_records.to_vec(),
            locked: false,
        }];
    }
    build_level(groups, grouped_by, readonly_fields, &[], false, 0)
}

fn build_level(
    blocks: &[GroupBlock],
    grouped_by: &[String],
    readonly_fields: &HashSet<String>,
    prefix: &[(String, Value)],
    parent_locked: bool,
    level: u32,
) -> Vec<Row> {
    let field = &grouped_by[level as usize];
    let is_leaf = level as usize == grouped_by.len() - 1;

    // Partition blocks by this level's value, keeping first-appearance order.
    let mut order: Vec<Value> = Vec::new();
    for block in blocks {
        let value = block.values.get(field).cloned().unwrap_or(Value::Null);
        if !order.contains(&value) {
            order.push(value);
        }
    }

    order
        .into_iter()
        .map(|value| {
            let mut path = prefix.to_vec();
            path.push((field.clone(), value.clone()));
            let members: Vec<&GroupBlock> = blocks
                .iter()
                .filter(|b| b.values.get(field).cloned().unwrap_or(Value::Null) == value)
                .collect();
            let locked = parent_locked || readonly_fields.contains(field);
            let mut record_ids: Vec<RecordId> = Vec::new();
            for block in &members {
                for id in &block.record_ids {
                    if !record_ids.contains(id) {
                        record_ids.push(*id);
                    }
                }
            }
            let rows = if is_leaf {
                Vec::new()
            } else {
                let owned: Vec<GroupBlock> = members.iter().map(|b| (*b).clone()).collect();
                build_level(&owned, grouped_by, readonly_fields, &path, locked, level + 1)
            };
            Row {
                id: RowId::from_path(&path),
                group_level: level,
                is_group: !is_leaf,
                display_name: group_value_label(&value),
                group_path: path,
                rows,
                record_ids,
                locked,
            }
        })
        .collect()
}

/// Depth-first flattening honoring the closed-row set. Children of a closed
/// group are skipped; the group row itself stays (it shows aggregates).
pub fn flatten(rows: &[Row], closed: &HashSet<RowId>) -> Vec<FlatRow> {
    let mut out = Vec::new();
    flatten_into(rows, closed, &mut out);
    out
}

fn flatten_into(rows: &[Row], closed: &HashSet<RowId>, out: &mut Vec<FlatRow>) {
    for row in rows {
        let is_closed = closed.contains(&row.id);
        out.push(FlatRow {
            id: row.id.clone(),
            level: row.group_level,
            is_group: row.is_group,
            name: row.display_name.clone(),
            locked: row.locked,
            closed: is_closed,
            group_path: row.group_path.clone(),
            record_ids: row.record_ids.clone(),
        });
        if !is_closed {
            flatten_into(&row.rows, closed, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn block(team: &str, shift: &str, ids: Vec<RecordId>) -> GroupBlock {
        let mut values = serde_json::Map::new();
        values.insert("team".into(), json!(team));
        values.insert("shift".into(), json!(shift));
        GroupBlock {
            values,
            record_ids: ids,
        }
    }

    #[test]
    fn test_two_level_tree() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let groups = vec![
            block("Alpha", "Morning", vec![a]),
            block("Alpha", "Night", vec![b]),
            block("Beta", "Morning", vec![c]),
        ];
        let grouped = vec!["team".to_string(), "shift".to_string()];
        let rows = build_rows(&groups, &[a, b, c], &grouped, &HashSet::new());

        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_group);
        assert_eq!(rows[0].display_name, "Alpha");
        assert_eq!(rows[0].record_ids, vec![a, b]);
        assert_eq!(rows[0].rows.len(), 2);
        assert!(!rows[0].rows[0].is_group);
        assert_eq!(rows[0].rows[0].record_ids, vec![a]);
        assert_eq!(rows[1].rows.len(), 1);
    }

    #[test]
    fn test_row_id_stable_across_rebuilds() {
        let a = Uuid::new_v4();
        let groups1 = vec![block("Alpha", "Morning", vec![a])];
        let groups2 = vec![block("Alpha", "Morning", vec![Uuid::new_v4()])];
        let grouped = vec!["team".to_string(), "shift".to_string()];
        let r1 = build_rows(&groups1, &[], &grouped, &HashSet::new());
        let r2 = build_rows(&groups2, &[], &grouped, &HashSet::new());
        assert_eq!(r1[0].id, r2[0].id);
        assert_eq!(r1[0].rows[0].id, r2[0].rows[0].id);
    }

    #[test]
    fn test_readonly_field_locks_subtree() {
        let groups = vec![
            block("Alpha", "Morning", vec![]),
            block("Beta", "Night", vec![]),
        ];
        let grouped = vec!["team".to_string(), "shift".to_string()];
        let readonly: HashSet<String> = ["team".to_string()].into_iter().collect();
        let rows = build_rows(&groups, &[], &grouped, &readonly);
        assert!(rows.iter().all(|r| r.locked));
        assert!(rows.iter().flat_map(|r| &r.rows).all(|r| r.locked));
    }

    #[test]
    fn test_flatten_skips_closed_children() {
        let a = Uuid::new_v4();
        let groups = vec![
            block("Alpha", "Morning", vec![a]),
            block("Beta", "Morning", vec![]),
        ];
        let grouped = vec!["team".to_string(), "shift".to_string()];
        let rows = build_rows(&groups, &[a], &grouped, &HashSet::new());

        let open = flatten(&rows, &HashSet::new());
        assert_eq!(open.len(), 4);

        let mut closed = HashSet::new();
        closed.insert(rows[0].id.clone());
        let folded = flatten(&rows, &closed);
        assert_eq!(folded.len(), 3);
        assert!(folded[0].closed);
        assert_eq!(folded[1].name, "Beta");
    }
}
