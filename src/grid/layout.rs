use std::collections::{BTreeSet, HashSet};

use crate::model::meta::ConsolidationParams;
use crate::model::pill::{Aggregate, Pill, PillId};
use crate::model::record::RecordId;
use crate::model::row::RowId;

/// Assign non-overlapping vertical levels to a row's pills.
///
/// Greedy interval coloring over pills in nondecreasing start order (ties
/// broken by the record's original start time): each level tracks its
/// rightmost occupied sub-column and a pill takes the first level that ends
/// at or before its own first column. Processing in start order makes the
/// greedy choice optimal: the level count equals the maximum overlap depth.
pub fn assign_levels(pills: &mut [Pill]) -> u32 {
    pills.sort_by(|a, b| {
        a.first_col
            .cmp(&b.first_col)
            .then(a.start.cmp(&b.start))
            .then(a.stop.cmp(&b.stop))
    });
    let mut rightmost: Vec<u32> = Vec::new();
    for pill in pills.iter_mut() {
        // Zero-width pills still reserve a slot.
        let occupied_until = pill.last_col.max(pill.first_col + 1);
        match rightmost.iter().position(|&r| r <= pill.first_col) {
            Some(level) => {
                pill.level = level as u32;
                rightmost[level] = occupied_until;
            }
            None => {
                pill.level = rightmost.len() as u32;
                rightmost.push(occupied_until);
            }
        }
    }
    rightmost.len() as u32
}

#[derive(Debug, Clone, PartialEq)]
struct GroupRun {
    first: u32,
    last: u32,
    ids: Vec<RecordId>,
}

/// Replace a group row's member pills with level-0 summary bars.
///
/// Break points are the sub-columns where any member pill starts or stops.
/// The covered column list is split recursively and adjacent halves merge
/// their border groups when the border is contiguous, covers the same record
/// set and is not a break point.
pub fn aggregate_pills(
    members: &[Pill],
    row_id: &RowId,
    row_index: usize,
    consolidation: Option<&ConsolidationParams>,
    value_of: &dyn Fn(RecordId) -> Option<(f64, bool)>,
    next_id: &mut u32,
) -> Vec<Pill> {
    let mut covered: BTreeSet<u32> = BTreeSet::new();
    let mut breaks: HashSet<u32> = HashSet::new();
    for pill in members {
        breaks.insert(pill.first_col);
        breaks.insert(pill.last_col);
        for col in pill.first_col..pill.last_col {
            covered.insert(col);
        }
    }
    let columns: Vec<u32> = covered.into_iter().collect();
    let runs = split_merge(&columns, members, &breaks);

    runs.into_iter()
        .map(|run| {
            let count = run.ids.len() as u32;
            let value = consolidation.map(|params| {
                run.ids
                    .iter()
                    .filter_map(|&id| value_of(id))
                    .filter(|&(_, excluded)| !excluded)
                    .map(|(v, _)| v)
                    .sum::<f64>()
            });
            let over_limit = match (&value, consolidation.and_then(|p| p.max_value)) {
                (Some(sum), Some(max)) => *sum > max,
                _ => false,
            };
            let in_run = |p: &&Pill| p.first_col < run.last && p.last_col > run.first;
            let start = members
                .iter()
                .filter(in_run)
                .map(|p| p.start)
                .min()
                .unwrap_or_default();
            let stop = members
                .iter()
                .filter(in_run)
                .map(|p| p.stop)
                .max()
                .unwrap_or_default();
            let id = PillId(*next_id);
            *next_id += 1;
            Pill {
                id,
                record_id: None,
                row_id: row_id.clone(),
                row_index,
                first_col: run.first,
                last_col: run.last,
                level: 0,
                start,
                stop,
                disable_start_resize: true,
                disable_stop_resize: true,
                aggregate: Some(Aggregate {
                    count,
                    value,
                    over_limit,
                }),
            }
        })
        .collect()
}

fn split_merge(columns: &[u32], members: &[Pill], breaks: &HashSet<u32>) -> Vec<GroupRun> {
    match columns {
        [] => Vec::new(),
        [col] => vec![GroupRun {
            first: *col,
            last: *col + 1,
            ids: covering_ids(members, *col),
        }],
        _ => {
            let mid = columns.len() / 2;
            let mut left = split_merge(&columns[..mid], members, breaks);
            let right = split_merge(&columns[mid..], members, breaks);
            for run in right {
                match left.last_mut() {
                    Some(tail)
                        if tail.last == run.first
                            && tail.ids == run.ids
                            && !breaks.contains(&run.first) =>
                    {
                        tail.last = run.last;
                    }
                    _ => left.push(run),
                }
            }
            left
        }
    }
}

fn covering_ids(members: &[Pill], col: u32) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = members
        .iter()
        .filter(|p| p.covers(col))
        .filter_map(|p| p.record_id)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
