//! Index from cells and ranges to the reference tokens that observe them.
//!
//! Every tracked token has exactly one `(sheet, range)` key. Keys live in a per-sheet
//! R-tree for region queries and in a handle map for O(1) untrack/relocate. References
//! spanning a whole row or column are never tracked.

use ahash::AHashMap;
use formula_model::{CellRef, Range, SheetId, SheetLimits};
use rstar::{RTree, RTreeObject, AABB};

use crate::arena::RefHandle;

#[derive(Debug, Clone, Copy)]
struct Entry {
    handle: RefHandle,
    envelope: AABB<[i64; 2]>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Entry {}

impl RTreeObject for Entry {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope(range: &Range) -> AABB<[i64; 2]> {
    AABB::from_corners(
        [i64::from(range.start.row), i64::from(range.start.col)],
        [i64::from(range.end.row), i64::from(range.end.col)],
    )
}

#[derive(Debug, Default)]
pub struct ReferenceTracker {
    limits: SheetLimits,
    index: AHashMap<SheetId, RTree<Entry>>,
    keys: AHashMap<RefHandle, (SheetId, Range)>,
}

impl ReferenceTracker {
    pub fn new(limits: SheetLimits) -> Self {
        Self {
            limits,
            index: AHashMap::new(),
            keys: AHashMap::new(),
        }
    }

    /// True for ranges that cover every row or every column of the grid.
    pub fn is_whole_dimension(&self, range: &Range) -> bool {
        let all_rows = range.start.row == 0 && range.end.row >= self.limits.last_row();
        let all_cols = range.start.col == 0 && range.end.col >= self.limits.last_col();
        all_rows || all_cols
    }

    /// Start observing `range` on `sheet` for `handle`, replacing any previous key.
    ///
    /// Returns `false` (and leaves the handle untracked) for whole-row/column ranges.
    pub fn track(&mut self, handle: RefHandle, sheet: SheetId, range: Range) -> bool {
        self.untrack(handle);
        if self.is_whole_dimension(&range) {
            return false;
        }
        self.index.entry(sheet).or_default().insert(Entry {
            handle,
            envelope: envelope(&range),
        });
        self.keys.insert(handle, (sheet, range));
        true
    }

    /// Stop observing; returns the key the handle was tracked under.
    pub fn untrack(&mut self, handle: RefHandle) -> Option<(SheetId, Range)> {
        let (sheet, range) = self.keys.remove(&handle)?;
        if let Some(tree) = self.index.get_mut(&sheet) {
            tree.remove(&Entry {
                handle,
                envelope: envelope(&range),
            });
            if tree.size() == 0 {
                self.index.remove(&sheet);
            }
        }
        Some((sheet, range))
    }

    /// Move a tracked handle to a new key. Untracked handles are left alone.
    pub fn relocate(&mut self, handle: RefHandle, sheet: SheetId, range: Range) -> bool {
        if !self.keys.contains_key(&handle) {
            return false;
        }
        self.track(handle, sheet, range)
    }

    pub fn key(&self, handle: RefHandle) -> Option<(SheetId, Range)> {
        self.keys.get(&handle).copied()
    }

    /// Handles whose key contains `cell`, sorted.
    pub fn observers_of(&self, sheet: SheetId, cell: CellRef) -> Vec<RefHandle> {
        self.observers_overlapping(sheet, Range::single(cell))
    }

    /// Handles whose key intersects `range`, sorted.
    pub fn observers_overlapping(&self, sheet: SheetId, range: Range) -> Vec<RefHandle> {
        let Some(tree) = self.index.get(&sheet) else {
            return Vec::new();
        };
        let mut out: Vec<RefHandle> = tree
            .locate_in_envelope_intersecting(&envelope(&range))
            .map(|entry| entry.handle)
            .collect();
        out.sort();
        out
    }

    /// Every handle tracked on `sheet`, sorted.
    pub fn observers_on(&self, sheet: SheetId) -> Vec<RefHandle> {
        let mut out: Vec<RefHandle> = self
            .keys
            .iter()
            .filter(|(_, (s, _))| *s == sheet)
            .map(|(handle, _)| *handle)
            .collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::FormulaId;
    use pretty_assertions::assert_eq;

    fn handle(formula: u32, token: u32) -> RefHandle {
        RefHandle {
            formula: FormulaId::from_raw(formula),
            token,
        }
    }

    fn range(a1: &str) -> Range {
        Range::from_a1(a1).unwrap()
    }

    #[test]
    fn a_handle_has_one_key() {
        let mut t = ReferenceTracker::new(SheetLimits::default());
        assert!(t.track(handle(0, 0), 0, range("A1:B2")));
        assert!(t.track(handle(0, 0), 0, range("D4")));
        assert_eq!(t.len(), 1);
        assert!(t.observers_of(0, CellRef::new(0, 0)).is_empty());
        assert_eq!(t.observers_of(0, CellRef::new(3, 3)), vec![handle(0, 0)]);
    }

    #[test]
    fn whole_columns_are_not_tracked() {
        let mut t = ReferenceTracker::new(SheetLimits::default());
        assert!(!t.track(handle(1, 0), 0, range("A1:A65536")));
        assert!(!t.track(handle(1, 1), 0, range("A1:IV1")));
        assert!(t.is_empty());
    }

    #[test]
    fn untrack_leaves_other_entries_alone() {
        let mut t = ReferenceTracker::new(SheetLimits::default());
        t.track(handle(0, 0), 0, range("A1:C3"));
        t.track(handle(1, 2), 0, range("B2"));
        t.track(handle(2, 0), 1, range("B2"));
        assert_eq!(t.untrack(handle(0, 0)), Some((0, range("A1:C3"))));
        assert_eq!(t.untrack(handle(0, 0)), None);
        assert_eq!(t.observers_of(0, CellRef::new(1, 1)), vec![handle(1, 2)]);
        assert_eq!(t.observers_of(1, CellRef::new(1, 1)), vec![handle(2, 0)]);
    }

    #[test]
    fn relocate_only_moves_tracked_handles() {
        let mut t = ReferenceTracker::new(SheetLimits::default());
        assert!(!t.relocate(handle(0, 0), 0, range("A1")));
        t.track(handle(0, 0), 0, range("A1"));
        assert!(t.relocate(handle(0, 0), 2, range("E5:F6")));
        assert_eq!(t.key(handle(0, 0)), Some((2, range("E5:F6"))));
        assert_eq!(
            t.observers_overlapping(2, range("A1:E5")),
            vec![handle(0, 0)]
        );
    }
}
