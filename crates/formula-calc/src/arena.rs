//! Formula storage addressed by stable integer handles.
//!
//! Tokens never point back at their formula or at the tracker. A reference token is
//! identified by a [`RefHandle`] (formula id plus token index), and every change to a
//! token's target goes through the arena so its tracker key moves in the same step.

use ahash::AHashMap;
use formula_model::{CellRef, Range, SheetId, SheetLimits};
use formula_ptg::{shift_relative, Ptg};

use crate::tracker::ReferenceTracker;
use crate::workbook::{ArrayFormula, ExternSheet, SharedFormula};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormulaId(u32);

impl FormulaId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// One token of one formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefHandle {
    pub formula: FormulaId,
    pub token: u32,
}

/// Maps external-sheet indices to a single local sheet.
pub trait SheetResolver {
    fn local_sheet(&self, ixti: u16) -> Option<SheetId>;
}

impl SheetResolver for Vec<ExternSheet> {
    fn local_sheet(&self, ixti: u16) -> Option<SheetId> {
        match self.get(usize::from(ixti))? {
            ExternSheet::Local { first, last } if first == last => Some(*first),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormulaBody {
    /// A cell formula; a shared or array member holds a single `PtgExp`.
    Cell { cell: CellRef, tokens: Vec<Ptg> },
    Shared(SharedFormula),
    Array(ArrayFormula),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormulaRecord {
    pub sheet: SheetId,
    pub body: FormulaBody,
}

impl FormulaRecord {
    pub fn cell(sheet: SheetId, cell: CellRef, tokens: Vec<Ptg>) -> Self {
        Self {
            sheet,
            body: FormulaBody::Cell { cell, tokens },
        }
    }

    pub fn tokens(&self) -> &[Ptg] {
        match &self.body {
            FormulaBody::Cell { tokens, .. } => tokens,
            FormulaBody::Shared(shared) => &shared.tokens,
            FormulaBody::Array(array) => &array.tokens,
        }
    }

    fn tokens_mut(&mut self) -> &mut Vec<Ptg> {
        match &mut self.body {
            FormulaBody::Cell { tokens, .. } => tokens,
            FormulaBody::Shared(shared) => &mut shared.tokens,
            FormulaBody::Array(array) => &mut array.tokens,
        }
    }

    /// Position the record is indexed under: the cell, or the group's anchor.
    pub fn position(&self) -> CellRef {
        match &self.body {
            FormulaBody::Cell { cell, .. } => *cell,
            FormulaBody::Shared(shared) => shared.anchor,
            FormulaBody::Array(array) => array.range.start,
        }
    }

    /// The sheet and range token `index` observes.
    ///
    /// Shared formula bodies observe the union of what every member of the group sees.
    /// Returns `None` for non-reference tokens and for 3D tokens whose sheet cannot be
    /// resolved to a single local sheet.
    pub fn observed(
        &self,
        index: usize,
        sheets: &dyn SheetResolver,
        limits: &SheetLimits,
    ) -> Option<(SheetId, Range)> {
        let ptg = self.tokens().get(index)?;
        let (lo, hi, anchor) = match &self.body {
            FormulaBody::Cell { cell, .. } => (*cell, *cell, *cell),
            FormulaBody::Shared(shared) => (shared.range.start, shared.range.end, shared.anchor),
            FormulaBody::Array(array) => (array.range.start, array.range.start, array.range.start),
        };
        let delta = |origin: CellRef| {
            (
                i64::from(origin.row) - i64::from(anchor.row),
                i64::from(origin.col) - i64::from(anchor.col),
            )
        };
        let local = |ixti: u16| {
            let sheet = sheets.local_sheet(ixti);
            if sheet.is_none() {
                log::warn!("externsheet {ixti} has no single local sheet; reference not tracked");
            }
            sheet
        };
        match ptg {
            Ptg::Ref { addr, .. } => Some((self.sheet, Range::single(addr.cell()))),
            Ptg::Area { area, .. } => Some((self.sheet, area.range())),
            Ptg::RefN { addr, .. } => Some((
                self.sheet,
                Range::new(addr.resolve(lo, limits).cell(), addr.resolve(hi, limits).cell()),
            )),
            Ptg::AreaN { area, .. } => Some((
                self.sheet,
                area.resolve(lo, limits)
                    .range()
                    .bounding(&area.resolve(hi, limits).range()),
            )),
            Ptg::Ref3d { ixti, addr, .. } => {
                let sheet = local(*ixti)?;
                let (r0, c0) = delta(lo);
                let (r1, c1) = delta(hi);
                let a = shift_relative(*addr, r0, c0, limits)?;
                let b = shift_relative(*addr, r1, c1, limits)?;
                Some((sheet, Range::new(a.cell(), b.cell())))
            }
            Ptg::Area3d { ixti, area, .. } => {
                let sheet = local(*ixti)?;
                let (r0, c0) = delta(lo);
                let (r1, c1) = delta(hi);
                let a = Range::new(
                    shift_relative(area.first, r0, c0, limits)?.cell(),
                    shift_relative(area.last, r0, c0, limits)?.cell(),
                );
                let b = Range::new(
                    shift_relative(area.first, r1, c1, limits)?.cell(),
                    shift_relative(area.last, r1, c1, limits)?.cell(),
                );
                Some((sheet, a.bounding(&b)))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Cell,
    Shared,
    Array,
}

impl Slot {
    fn of(record: &FormulaRecord) -> Slot {
        match record.body {
            FormulaBody::Cell { .. } => Slot::Cell,
            FormulaBody::Shared(_) => Slot::Shared,
            FormulaBody::Array(_) => Slot::Array,
        }
    }
}

/// Owns every formula of a workbook together with the reference tracker.
#[derive(Debug)]
pub struct FormulaArena {
    limits: SheetLimits,
    records: Vec<Option<FormulaRecord>>,
    positions: AHashMap<(Slot, SheetId, CellRef), FormulaId>,
    tracker: ReferenceTracker,
}

impl FormulaArena {
    pub fn new(limits: SheetLimits) -> Self {
        Self {
            limits,
            records: Vec::new(),
            positions: AHashMap::new(),
            tracker: ReferenceTracker::new(limits),
        }
    }

    /// Store a formula and track its references. A formula already stored at the same
    /// position (and of the same kind) is removed first.
    pub fn insert(&mut self, record: FormulaRecord, sheets: &dyn SheetResolver) -> FormulaId {
        let key = (Slot::of(&record), record.sheet, record.position());
        if let Some(old) = self.positions.get(&key).copied() {
            self.remove(old);
        }
        let id = FormulaId(self.records.len() as u32);
        self.records.push(Some(record));
        self.positions.insert(key, id);
        self.track_all(id, sheets);
        id
    }

    /// Drop a formula and all of its tracker entries.
    pub fn remove(&mut self, id: FormulaId) -> Option<FormulaRecord> {
        self.untrack_all(id);
        let record = self.records.get_mut(id.0 as usize)?.take()?;
        let key = (Slot::of(&record), record.sheet, record.position());
        if self.positions.get(&key) == Some(&id) {
            self.positions.remove(&key);
        }
        Some(record)
    }

    pub fn get(&self, id: FormulaId) -> Option<&FormulaRecord> {
        self.records.get(id.0 as usize)?.as_ref()
    }

    pub fn token(&self, handle: RefHandle) -> Option<&Ptg> {
        self.get(handle.formula)?.tokens().get(handle.token as usize)
    }

    pub fn cell_formula(&self, sheet: SheetId, cell: CellRef) -> Option<FormulaId> {
        self.positions.get(&(Slot::Cell, sheet, cell)).copied()
    }

    pub fn shared_at(&self, sheet: SheetId, anchor: CellRef) -> Option<&SharedFormula> {
        let id = self.positions.get(&(Slot::Shared, sheet, anchor))?;
        match &self.get(*id)?.body {
            FormulaBody::Shared(shared) => Some(shared),
            _ => None,
        }
    }

    pub fn array_at(&self, sheet: SheetId, anchor: CellRef) -> Option<&ArrayFormula> {
        let id = self.positions.get(&(Slot::Array, sheet, anchor))?;
        match &self.get(*id)?.body {
            FormulaBody::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FormulaId, &FormulaRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (FormulaId(i as u32), r)))
    }

    pub fn ids(&self) -> Vec<FormulaId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn tracker(&self) -> &ReferenceTracker {
        &self.tracker
    }

    /// Replace one token and move (or drop) its tracker key in the same step.
    pub fn replace_token(
        &mut self,
        handle: RefHandle,
        ptg: Ptg,
        sheets: &dyn SheetResolver,
    ) -> bool {
        let Some(record) = self
            .records
            .get_mut(handle.formula.0 as usize)
            .and_then(Option::as_mut)
        else {
            return false;
        };
        let Some(slot) = record.tokens_mut().get_mut(handle.token as usize) else {
            return false;
        };
        *slot = ptg;
        let observed = record.observed(handle.token as usize, sheets, &self.limits);
        match observed {
            Some((sheet, range)) => {
                self.tracker.track(handle, sheet, range);
            }
            None => {
                self.tracker.untrack(handle);
            }
        }
        true
    }

    /// Apply `edit` to a stored formula, re-indexing its position and re-tracking every
    /// token afterwards.
    pub fn update(
        &mut self,
        id: FormulaId,
        sheets: &dyn SheetResolver,
        edit: impl FnOnce(&mut FormulaRecord),
    ) -> bool {
        let Some(record) = self.records.get(id.0 as usize).and_then(Option::as_ref) else {
            return false;
        };
        let old_key = (Slot::of(record), record.sheet, record.position());
        self.untrack_all(id);
        if self.positions.get(&old_key) == Some(&id) {
            self.positions.remove(&old_key);
        }
        if let Some(record) = self.records.get_mut(id.0 as usize).and_then(Option::as_mut) {
            edit(record);
            let key = (Slot::of(record), record.sheet, record.position());
            if let Some(displaced) = self.positions.insert(key, id) {
                if displaced != id {
                    log::debug!(
                        "formula {} replaced formula {} at its new position",
                        id.0,
                        displaced.0
                    );
                    self.untrack_all(displaced);
                    if let Some(slot) = self.records.get_mut(displaced.0 as usize) {
                        *slot = None;
                    }
                }
            }
        }
        self.track_all(id, sheets);
        true
    }

    fn track_all(&mut self, id: FormulaId, sheets: &dyn SheetResolver) {
        let Some(record) = self.get(id) else {
            return;
        };
        let keys: Vec<(u32, SheetId, Range)> = (0..record.tokens().len())
            .filter_map(|i| {
                record
                    .observed(i, sheets, &self.limits)
                    .map(|(sheet, range)| (i as u32, sheet, range))
            })
            .collect();
        for (token, sheet, range) in keys {
            self.tracker.track(RefHandle { formula: id, token }, sheet, range);
        }
    }

    fn untrack_all(&mut self, id: FormulaId) {
        let Some(len) = self.get(id).map(|r| r.tokens().len()) else {
            return;
        };
        for token in 0..len as u32 {
            self.tracker.untrack(RefHandle { formula: id, token });
        }
    }
}
