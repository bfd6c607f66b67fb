use std::collections::HashSet;

use crate::model::meta::ScaleId;
use crate::model::pill::Pill;

/// Folding policy knobs. Boundary runs (touching the first or last window
/// column) fold only at Week scale by default; this is a product decision
/// carried as a flag, not hard-coded in the algorithm.
#[derive(Debug, Clone, Copy)]
pub struct FoldPolicy {
    pub fold_boundary_runs: bool,
}

impl FoldPolicy {
    pub fn for_scale(scale: ScaleId) -> Self {
        Self {
            fold_boundary_runs: scale == ScaleId::Week,
        }
    }
}

/// A maximal run of sub-columns sharing fold state, `[first, last)` 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpan {
    pub first: u32,
    pub last: u32,
    pub foldable: bool,
    pub folded: bool,
}

/// The folded rendition of the column axis: run spans plus the bidirectional
/// index mapping between the total grid and the display grid. A folded run
/// occupies a single narrow display column.
#[derive(Debug, Clone)]
pub struct FoldedGrid {
    pub spans: Vec<GridSpan>,
    to_display: Vec<u32>,
    to_total: Vec<u32>,
    display_folded: Vec<bool>,
    pub display_count: u32,
}

impl FoldedGrid {
    pub fn display_of(&self, total_col: u32) -> u32 {
        self.to_display
            .get(total_col as usize)
            .copied()
            .unwrap_or(self.display_count.max(1))
    }

    pub fn total_of(&self, display_col: u32) -> u32 {
        self.to_total.get(display_col as usize).copied().unwrap_or(1)
    }

    pub fn display_is_folded(&self, display_col: u32) -> bool {
        self.display_folded
            .get(display_col as usize)
            .copied()
            .unwrap_or(false)
    }

    /// First column of the foldable run containing `total_col`, the toggle
    /// key for manual fold/unfold.
    pub fn run_start_at(&self, total_col: u32) -> Option<u32> {
        self.spans
            .iter()
            .find(|s| s.foldable && s.first <= total_col && total_col < s.last)
            .map(|s| s.first)
    }

    pub fn is_identity(&self) -> bool {
        self.to_display.len() == self.to_total.len()
            && self.spans.iter().all(|s| !s.folded)
    }
}

/// Per-sub-column foldability: every data row unavailable for the whole
/// column AND no pill anywhere in the dataset covering it. Folding must
/// never hide part of a scheduled interval.
pub fn compute_foldable(
    total_cols: u32,
    row_unavailable: &[Vec<bool>],
    pills: &[Pill],
) -> Vec<bool> {
    let mut foldable = vec![false; total_cols as usize];
    if row_unavailable.is_empty() {
        return foldable;
    }
    for col in 1..=total_cols {
        let idx = (col - 1) as usize;
        let all_unavailable = row_unavailable
            .iter()
            .all(|row| row.get(idx).copied().unwrap_or(false));
        foldable[idx] = all_unavailable && !pills.iter().any(|p| p.covers(col));
    }
    foldable
}

/// Run-length spans over the foldable set plus the total ↔ display index
/// maps, rebuilt whenever the foldable set or the user's toggles change.
pub fn compute_folded_grid(
    foldable: &[bool],
    user_expanded: &HashSet<u32>,
    policy: &FoldPolicy,
) -> FoldedGrid {
    let total = foldable.len() as u32;
    let mut spans: Vec<GridSpan> = Vec::new();
    let mut col = 1u32;
    while col <= total {
        let state = foldable[(col - 1) as usize];
        let mut last = col + 1;
        while last <= total && foldable[(last - 1) as usize] == state {
            last += 1;
        }
        let at_boundary = col == 1 || last == total + 1;
        let folded = state
            && !user_expanded.contains(&col)
            && (policy.fold_boundary_runs || !at_boundary);
        spans.push(GridSpan {
            first: col,
            last,
            foldable: state,
            folded,
        });
        col = last;
    }

    let mut to_display = vec![0u32; (total + 1) as usize];
    let mut to_total = vec![0u32];
    let mut display_folded = vec![false];
    let mut display = 0u32;
    for span in &spans {
        if span.folded {
            display += 1;
            to_total.push(span.first);
            display_folded.push(true);
            for c in span.first..span.last {
                to_display[c as usize] = display;
            }
        } else {
            for c in span.first..span.last {
                display += 1;
                to_total.push(c);
                display_folded.push(false);
                to_display[c as usize] = display;
            }
        }
    }

    FoldedGrid {
        spans,
        to_display,
        to_total,
        display_folded,
        display_count: display,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(bits: &[u8]) -> Vec<bool> {
        bits.iter().map(|&b| b != 0).collect()
    }

    #[test]
    fn test_runs_and_mapping() {
        // Columns 3..=4 and 7 are foldable in a 8-column grid.
        let foldable = mask(&[0, 0, 1, 1, 0, 0, 1, 0]);
        let policy = FoldPolicy {
            fold_boundary_runs: true,
        };
        let grid = compute_folded_grid(&foldable, &HashSet::new(), &policy);

        assert_eq!(grid.display_count, 7);
        assert_eq!(grid.display_of(2), 2);
        assert_eq!(grid.display_of(3), 3);
        assert_eq!(grid.display_of(4), 3);
        assert_eq!(grid.display_of(5), 4);
        assert_eq!(grid.display_of(7), 6);
        assert_eq!(grid.display_of(8), 7);
        assert_eq!(grid.total_of(3), 3);
        assert_eq!(grid.total_of(4), 5);
        assert!(grid.display_is_folded(3));
        assert!(!grid.display_is_folded(4));
        assert_eq!(grid.run_start_at(4), Some(3));
        assert_eq!(grid.run_start_at(5), None);
    }

    #[test]
    fn test_fold_then_unfold_restores_identity() {
        let foldable = mask(&[0, 1, 1, 0, 1, 1, 1, 0]);
        let policy = FoldPolicy {
            fold_boundary_runs: true,
        };
        let folded = compute_folded_grid(&foldable, &HashSet::new(), &policy);
        assert!(folded.display_count < 8);

        // Expanding every foldable run reverts to the exact original mapping.
        let expanded: HashSet<u32> = folded
            .spans
            .iter()
            .filter(|s| s.foldable)
            .map(|s| s.first)
            .collect();
        let unfolded = compute_folded_grid(&foldable, &expanded, &policy);
        assert!(unfolded.is_identity());
        assert_eq!(unfolded.display_count, 8);
        for c in 1..=8 {
            assert_eq!(unfolded.display_of(c), c);
            assert_eq!(unfolded.total_of(c), c);
        }
    }

    #[test]
    fn test_boundary_runs_follow_policy() {
        let foldable = mask(&[1, 1, 0, 1, 0, 1, 1, 1]);
        let keep = FoldPolicy {
            fold_boundary_runs: false,
        };
        let grid = compute_folded_grid(&foldable, &HashSet::new(), &keep);
        // The leading and trailing runs stay open; the middle one folds.
        let folded: Vec<(u32, u32)> = grid
            .spans
            .iter()
            .filter(|s| s.folded)
            .map(|s| (s.first, s.last))
            .collect();
        assert_eq!(folded, vec![(4, 5)]);

        let week = FoldPolicy {
            fold_boundary_runs: true,
        };
        let grid = compute_folded_grid(&foldable, &HashSet::new(), &week);
        assert_eq!(grid.spans.iter().filter(|s| s.folded).count(), 3);
    }

    #[test]
    fn test_pill_coverage_vetoes_folding() {
        use crate::model::pill::{Pill, PillId};
        use crate::model::row::RowId;

        let start = chrono::NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let pill = Pill {
            id: PillId(0),
            record_id: Some(uuid::Uuid::new_v4()),
            row_id: RowId::from_path(&[]),
            row_index: 0,
            first_col: 3,
            last_col: 5,
            level: 0,
            start,
            stop: start,
            disable_start_resize: false,
            disable_stop_resize: false,
            aggregate: None,
        };
        // Both rows fully unavailable everywhere.
        let rows = vec![vec![true; 6], vec![true; 6]];
        let foldable = compute_foldable(6, &rows, &[pill]);
        assert_eq!(foldable, mask(&[1, 1, 0, 0, 1, 1]));
    }

    #[test]
    fn test_no_rows_means_nothing_foldable() {
        let foldable = compute_foldable(4, &[], &[]);
        assert!(foldable.iter().all(|f| !f));
    }
}
