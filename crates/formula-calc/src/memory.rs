//! An in-memory workbook.
//!
//! Holds constants, formulas (through a [`FormulaArena`]), the externsheet table and
//! defined names. Row/column insertion and deletion and sheet removal rewrite the
//! reference tokens that point at the edited cells, found through the reference tracker.

use ahash::AHashMap;
use formula_model::{
    AreaAddr, CalcSettings, CellAddr, CellRef, ErrorValue, Range, SheetId, SheetLimits,
};
use formula_ptg::{decode_rgce_with_rgcb, render_formula, Ptg, RenderError};

use crate::arena::{
    FormulaArena, FormulaBody, FormulaId, FormulaRecord, RefHandle, SheetResolver,
};
use crate::error::EvalError;
use crate::functions::FunctionDispatch;
use crate::recalc::Recalc;
use crate::shared::{instantiate_shared, placeholder_anchor};
use crate::value::Value;
use crate::workbook::{
    ArrayFormula, DefinedName, ExternName, ExternSheet, SharedFormula, Workbook, WorkbookNames,
};

#[derive(Debug, Clone, Default)]
struct Sheet {
    name: String,
    values: AHashMap<CellRef, Value>,
}

#[derive(Debug)]
pub struct MemoryWorkbook {
    settings: CalcSettings,
    sheets: Vec<Sheet>,
    extern_sheets: Vec<ExternSheet>,
    names: Vec<DefinedName>,
    extern_names: AHashMap<u16, Vec<ExternName>>,
    arena: FormulaArena,
    results: AHashMap<(SheetId, CellRef), Value>,
    dirty: bool,
}

impl Default for MemoryWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::with_settings(CalcSettings::default())
    }

    pub fn with_settings(settings: CalcSettings) -> Self {
        Self {
            arena: FormulaArena::new(settings.limits),
            settings,
            sheets: Vec::new(),
            extern_sheets: Vec::new(),
            names: Vec::new(),
            extern_names: AHashMap::new(),
            results: AHashMap::new(),
            dirty: false,
        }
    }

    pub fn settings(&self) -> &CalcSettings {
        &self.settings
    }

    pub fn limits(&self) -> SheetLimits {
        self.settings.limits
    }

    pub fn arena(&self) -> &FormulaArena {
        &self.arena
    }

    /// True when an edit happened since the last [`MemoryWorkbook::recalculate`] in
    /// automatic mode.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn add_sheet(&mut self, name: &str) -> SheetId {
        self.sheets.push(Sheet {
            name: name.to_string(),
            values: AHashMap::new(),
        });
        self.sheets.len() - 1
    }

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheets
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Append an externsheet entry; returns its `ixti`.
    pub fn add_extern_sheet(&mut self, sheet: ExternSheet) -> u16 {
        self.extern_sheets.push(sheet);
        (self.extern_sheets.len() - 1) as u16
    }

    /// Append a defined name; returns its 1-based index.
    pub fn add_name(&mut self, name: DefinedName) -> u16 {
        self.names.push(name);
        self.names.len() as u16
    }

    /// Append a name reachable through `PtgNameX` on `ixti`; returns its 1-based index.
    pub fn add_extern_name(&mut self, ixti: u16, name: ExternName) -> u16 {
        let names = self.extern_names.entry(ixti).or_default();
        names.push(name);
        names.len() as u16
    }

    /// Store a constant, replacing any formula in the cell.
    pub fn set_value(&mut self, sheet: SheetId, cell: CellRef, value: impl Into<Value>) {
        if let Some(id) = self.arena.cell_formula(sheet, cell) {
            self.arena.remove(id);
        }
        self.results.remove(&(sheet, cell));
        if let Some(s) = self.sheets.get_mut(sheet) {
            match value.into() {
                Value::Blank => s.values.remove(&cell),
                value => s.values.insert(cell, value),
            };
        }
        self.touch();
    }

    /// Store a formula, replacing any constant or formula in the cell.
    pub fn set_formula(&mut self, sheet: SheetId, cell: CellRef, tokens: Vec<Ptg>) -> FormulaId {
        if let Some(s) = self.sheets.get_mut(sheet) {
            s.values.remove(&cell);
        }
        self.results.remove(&(sheet, cell));
        self.touch();
        self.arena.insert(
            FormulaRecord::cell(sheet, cell, tokens),
            &self.extern_sheets,
        )
    }

    /// Decode a stored `rgce`/`rgcb` pair and store it as the cell's formula.
    pub fn set_formula_bytes(
        &mut self,
        sheet: SheetId,
        cell: CellRef,
        rgce: &[u8],
        rgcb: &[u8],
    ) -> Result<FormulaId, EvalError> {
        let tokens = decode_rgce_with_rgcb(rgce, rgcb)?;
        Ok(self.set_formula(sheet, cell, tokens))
    }

    /// Store a shared formula group over `range` anchored at its top-left cell. Every
    /// member gets a `PtgExp` placeholder.
    pub fn set_shared_formula(
        &mut self,
        sheet: SheetId,
        range: Range,
        body: Vec<Ptg>,
    ) -> FormulaId {
        let anchor = range.start;
        let shared = SharedFormula {
            anchor,
            range,
            tokens: body,
        };
        self.fill_placeholders(sheet, range);
        self.arena.insert(
            FormulaRecord {
                sheet,
                body: FormulaBody::Shared(shared),
            },
            &self.extern_sheets,
        )
    }

    /// Store an array formula block over `range`.
    pub fn set_array_formula(
        &mut self,
        sheet: SheetId,
        range: Range,
        body: Vec<Ptg>,
    ) -> FormulaId {
        self.fill_placeholders(sheet, range);
        self.arena.insert(
            FormulaRecord {
                sheet,
                body: FormulaBody::Array(ArrayFormula {
                    range,
                    tokens: body,
                }),
            },
            &self.extern_sheets,
        )
    }

    fn fill_placeholders(&mut self, sheet: SheetId, range: Range) {
        for cell in range.components() {
            self.set_formula(sheet, cell, vec![placeholder(range.start)]);
        }
    }

    /// Stored tokens of a cell formula.
    pub fn formula(&self, sheet: SheetId, cell: CellRef) -> Option<&[Ptg]> {
        let id = self.arena.cell_formula(sheet, cell)?;
        Some(self.arena.get(id)?.tokens())
    }

    /// Formula text of a cell, `None` if the cell holds no formula. Shared and array
    /// members render the formula they display.
    pub fn formula_text(
        &self,
        sheet: SheetId,
        cell: CellRef,
    ) -> Option<Result<String, RenderError>> {
        let tokens = self.formula(sheet, cell)?;
        let names = WorkbookNames::new(self, self.settings.limits);
        let Some(anchor) = placeholder_anchor(tokens) else {
            return Some(render_formula(tokens, &names, cell));
        };
        if let Some(array) = self.arena.array_at(sheet, anchor) {
            if array.range.contains(cell) {
                return Some(render_formula(&array.tokens, &names, anchor));
            }
        }
        if let Some(shared) = self.arena.shared_at(sheet, anchor) {
            let tokens = instantiate_shared(&shared.tokens, anchor, cell, &self.settings.limits);
            return Some(render_formula(&tokens, &names, cell));
        }
        Some(render_formula(tokens, &names, cell))
    }

    /// Evaluate every formula and keep the results for [`Workbook::cell_value`].
    ///
    /// Formulas that fail structurally are returned and read as `#VALUE!`.
    pub fn recalculate(
        &mut self,
        functions: &dyn FunctionDispatch,
    ) -> Vec<(SheetId, CellRef, EvalError)> {
        let outcome = {
            let recalc = Recalc::new(&*self, functions, &self.settings);
            recalc.recalculate_all()
        };
        self.results.clear();
        let mut failures = Vec::new();
        for (sheet, cell, result) in outcome {
            let value = match result {
                Ok(value) => value,
                Err(err) => {
                    failures.push((sheet, cell, err));
                    Value::Error(ErrorValue::Value)
                }
            };
            self.results.insert((sheet, cell), value);
        }
        self.dirty = false;
        failures
    }

    fn touch(&mut self) {
        if self.settings.is_automatic() {
            self.dirty = true;
        }
    }

    pub fn insert_rows(&mut self, sheet: SheetId, at: u32, count: u32) {
        let edit = GridEdit::new(sheet, Axis::Rows, at, count, false, &self.settings.limits);
        self.edit_grid(edit);
    }

    pub fn delete_rows(&mut self, sheet: SheetId, at: u32, count: u32) {
        let edit = GridEdit::new(sheet, Axis::Rows, at, count, true, &self.settings.limits);
        self.edit_grid(edit);
    }

    pub fn insert_cols(&mut self, sheet: SheetId, at: u32, count: u32) {
        let edit = GridEdit::new(sheet, Axis::Cols, at, count, false, &self.settings.limits);
        self.edit_grid(edit);
    }

    pub fn delete_cols(&mut self, sheet: SheetId, at: u32, count: u32) {
        let edit = GridEdit::new(sheet, Axis::Cols, at, count, true, &self.settings.limits);
        self.edit_grid(edit);
    }

    fn edit_grid(&mut self, edit: GridEdit) {
        if edit.count == 0 || edit.sheet >= self.sheets.len() {
            return;
        }

        // Reference tokens first: their keys are still where the tracker expects them.
        let moved = edit.region(&self.settings.limits);
        let handles = self.arena.tracker().observers_overlapping(edit.sheet, moved);
        let mut rewritten = 0usize;
        for handle in handles {
            let Some(record) = self.arena.get(handle.formula) else {
                continue;
            };
            let Some(ptg) = record.tokens().get(handle.token as usize) else {
                continue;
            };
            if token_sheet(record, ptg, &self.extern_sheets) != Some(edit.sheet) {
                continue;
            }
            if let Some(new) = edit.rewrite(ptg) {
                self.arena.replace_token(handle, new, &self.extern_sheets);
                rewritten += 1;
            }
        }

        // Whole rows and columns are never tracked, so they are found by scanning.
        let limits = self.settings.limits;
        let mut untracked = Vec::new();
        for (id, record) in self.arena.iter() {
            for (index, ptg) in record.tokens().iter().enumerate() {
                if !is_whole_dimension(ptg, &limits)
                    || token_sheet(record, ptg, &self.extern_sheets) != Some(edit.sheet)
                {
                    continue;
                }
                if let Some(new) = edit.rewrite(ptg) {
                    let handle = RefHandle {
                        formula: id,
                        token: index as u32,
                    };
                    untracked.push((handle, new));
                }
            }
        }
        for (handle, new) in untracked {
            self.arena.replace_token(handle, new, &self.extern_sheets);
            rewritten += 1;
        }

        // Name bodies live outside the arena; their references are always 3D.
        for name in &mut self.names {
            for ptg in &mut name.tokens {
                let on_sheet = match ptg {
                    Ptg::Ref3d { ixti, .. } | Ptg::Area3d { ixti, .. } => {
                        self.extern_sheets.local_sheet(*ixti) == Some(edit.sheet)
                    }
                    _ => false,
                };
                if !on_sheet {
                    continue;
                }
                if let Some(new) = edit.rewrite(ptg) {
                    *ptg = new;
                    rewritten += 1;
                }
            }
        }

        let sheet = &mut self.sheets[edit.sheet];
        sheet.values = std::mem::take(&mut sheet.values)
            .into_iter()
            .filter_map(|(cell, value)| edit.cell(cell).map(|cell| (cell, value)))
            .collect();

        // Formula records on the sheet. Deleted ones go first; the rest move in an order
        // that never lands on a position still occupied.
        let mut moving: Vec<(FormulaId, CellRef)> = Vec::new();
        let mut dropped: Vec<FormulaId> = Vec::new();
        for (id, record) in self.arena.iter() {
            if record.sheet != edit.sheet {
                continue;
            }
            let survives = match &record.body {
                FormulaBody::Cell { cell, .. } => edit.cell(*cell).is_some(),
                FormulaBody::Shared(shared) => {
                    edit.cell(shared.anchor).is_some() && edit.range(shared.range).is_some()
                }
                FormulaBody::Array(array) => {
                    edit.cell(array.range.start).is_some() && edit.range(array.range).is_some()
                }
            };
            if survives {
                moving.push((id, record.position()));
            } else {
                dropped.push(id);
            }
        }
        for id in dropped {
            if let Some(record) = self.arena.remove(id) {
                log::debug!("formula at {} removed by grid edit", record.position());
            }
        }
        moving.sort_by_key(|(_, position)| edit.axis.coordinate(*position));
        if !edit.delete {
            moving.reverse();
        }
        for (id, _) in moving {
            self.arena.update(id, &self.extern_sheets, |record| edit.move_record(record));
        }

        log::debug!(
            "grid edit on sheet {}: {rewritten} reference tokens rewritten",
            edit.sheet
        );
        self.results.clear();
        self.touch();
    }

    /// Remove a sheet. 3D references to it become `#REF!` tokens that keep the sheet
    /// name for display, and every later sheet index shifts down by one.
    pub fn delete_sheet(&mut self, sheet: SheetId) {
        if sheet >= self.sheets.len() {
            return;
        }
        let removed = self.sheets.remove(sheet);

        for handle in self.arena.tracker().observers_on(sheet) {
            let Some(record) = self.arena.get(handle.formula) else {
                continue;
            };
            let broken = match record.tokens().get(handle.token as usize) {
                Some(Ptg::Ref3d { class, ixti, .. }) => Ptg::RefErr3d {
                    class: *class,
                    ixti: *ixti,
                    reserved: [0; 4],
                },
                Some(Ptg::Area3d { class, ixti, .. }) => Ptg::AreaErr3d {
                    class: *class,
                    ixti: *ixti,
                    reserved: [0; 8],
                },
                _ => continue,
            };
            self.arena.replace_token(handle, broken, &self.extern_sheets);
        }

        for entry in &mut self.extern_sheets {
            if let ExternSheet::Local { first, last } = *entry {
                *entry = if first == sheet && last == sheet {
                    ExternSheet::Deleted {
                        name: Some(removed.name.clone()),
                    }
                } else {
                    ExternSheet::Local {
                        first: if first > sheet { first - 1 } else { first },
                        last: if last >= sheet { last - 1 } else { last },
                    }
                };
            }
        }

        for name in &mut self.names {
            match name.scope {
                Some(scope) if scope == sheet => {
                    log::debug!("name {} lost its sheet", name.name);
                    name.scope = None;
                    name.tokens = vec![Ptg::Err(ErrorValue::Ref)];
                }
                Some(scope) if scope > sheet => name.scope = Some(scope - 1),
                _ => {}
            }
        }

        self.renumber_sheets(sheet);
        self.results.clear();
        self.touch();
    }

    /// Drop the removed sheet's formulas and re-key everything else, since externsheet
    /// entries and sheet indices have moved.
    fn renumber_sheets(&mut self, removed: SheetId) {
        for id in self.arena.ids() {
            let on_removed = self.arena.get(id).map(|r| r.sheet) == Some(removed);
            if on_removed {
                self.arena.remove(id);
                continue;
            }
            self.arena.update(id, &self.extern_sheets, |record| {
                if record.sheet > removed {
                    record.sheet -= 1;
                }
            });
        }
    }
}

fn placeholder(anchor: CellRef) -> Ptg {
    Ptg::Exp {
        row: anchor.row as u16,
        col: anchor.col as u16,
    }
}

/// The sheet a reference token points at.
fn token_sheet(record: &FormulaRecord, ptg: &Ptg, sheets: &dyn SheetResolver) -> Option<SheetId> {
    match ptg {
        Ptg::Ref { .. } | Ptg::Area { .. } | Ptg::RefN { .. } | Ptg::AreaN { .. } => {
            Some(record.sheet)
        }
        Ptg::Ref3d { ixti, .. } | Ptg::Area3d { ixti, .. } => sheets.local_sheet(*ixti),
        _ => None,
    }
}

fn is_whole_dimension(ptg: &Ptg, limits: &SheetLimits) -> bool {
    match ptg {
        Ptg::Area { area, .. } | Ptg::Area3d { area, .. } => {
            area.is_whole_column(limits) || area.is_whole_row(limits)
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Rows,
    Cols,
}

impl Axis {
    fn coordinate(self, cell: CellRef) -> u32 {
        match self {
            Axis::Rows => cell.row,
            Axis::Cols => cell.col,
        }
    }
}

/// A block of rows or columns inserted or deleted on one sheet.
#[derive(Debug, Clone, Copy)]
struct GridEdit {
    sheet: SheetId,
    axis: Axis,
    at: u32,
    count: u32,
    delete: bool,
    /// Last index along `axis`.
    last: u32,
}

impl GridEdit {
    fn new(
        sheet: SheetId,
        axis: Axis,
        at: u32,
        count: u32,
        delete: bool,
        limits: &SheetLimits,
    ) -> Self {
        let last = match axis {
            Axis::Rows => limits.last_row(),
            Axis::Cols => limits.last_col(),
        };
        Self {
            sheet,
            axis,
            at,
            count,
            delete,
            last,
        }
    }

    /// Every cell whose position the edit can change.
    fn region(&self, limits: &SheetLimits) -> Range {
        let end = CellRef::new(limits.last_row(), limits.last_col());
        let start = match self.axis {
            Axis::Rows => CellRef::new(self.at.min(limits.last_row()), 0),
            Axis::Cols => CellRef::new(0, self.at.min(limits.last_col())),
        };
        Range::new(start, end)
    }

    /// New index of `i`; `None` if it was deleted or pushed off the grid.
    fn index(&self, i: u32) -> Option<u32> {
        if i < self.at {
            return Some(i);
        }
        if self.delete {
            let end = self.at.saturating_add(self.count);
            (i >= end).then(|| i - self.count)
        } else {
            let moved = i.checked_add(self.count)?;
            (moved <= self.last).then_some(moved)
        }
    }

    /// New extent of `lo..=hi`; `None` when all of it was deleted or its start left the
    /// grid. Insertions inside the span widen it.
    fn span(&self, lo: u32, hi: u32) -> Option<(u32, u32)> {
        if !self.delete {
            let lo = self.index(lo)?;
            let hi = if hi < self.at {
                hi
            } else {
                hi.saturating_add(self.count).min(self.last)
            };
            return Some((lo, hi));
        }
        let end = self.at.saturating_add(self.count);
        let new_lo = if lo < self.at {
            lo
        } else if lo >= end {
            lo - self.count
        } else {
            self.at
        };
        let new_hi = if hi < self.at {
            hi
        } else if hi >= end {
            hi - self.count
        } else if lo < self.at {
            self.at - 1
        } else {
            return None;
        };
        Some((new_lo, new_hi))
    }

    fn cell(&self, cell: CellRef) -> Option<CellRef> {
        match self.axis {
            Axis::Rows => self.index(cell.row).map(|row| CellRef::new(row, cell.col)),
            Axis::Cols => self.index(cell.col).map(|col| CellRef::new(cell.row, col)),
        }
    }

    fn range(&self, range: Range) -> Option<Range> {
        let (start, end) = (range.start, range.end);
        match self.axis {
            Axis::Rows => {
                let (lo, hi) = self.span(start.row, end.row)?;
                Some(Range::new(CellRef::new(lo, start.col), CellRef::new(hi, end.col)))
            }
            Axis::Cols => {
                let (lo, hi) = self.span(start.col, end.col)?;
                Some(Range::new(CellRef::new(start.row, lo), CellRef::new(end.row, hi)))
            }
        }
    }

    fn addr(&self, addr: CellAddr) -> Option<CellAddr> {
        let cell = self.cell(addr.cell())?;
        Some(CellAddr {
            row: cell.row,
            col: cell.col,
            ..addr
        })
    }

    /// True when `range` spans every index along the edited axis.
    fn spans_axis(&self, range: Range) -> bool {
        let (lo, hi) = match self.axis {
            Axis::Rows => (range.start.row, range.end.row),
            Axis::Cols => (range.start.col, range.end.col),
        };
        lo == 0 && hi >= self.last
    }

    /// New form of a reference area. Whole rows under a row edit (whole columns under a
    /// column edit) keep covering the full axis.
    fn area(&self, area: AreaAddr) -> Option<AreaAddr> {
        if self.spans_axis(area.range()) {
            return Some(area);
        }
        let range = self.range(area.range())?;
        Some(AreaAddr::new(
            CellAddr {
                row: range.start.row,
                col: range.start.col,
                ..area.first
            },
            CellAddr {
                row: range.end.row,
                col: range.end.col,
                ..area.last
            },
        ))
    }

    /// Rewritten form of an absolute reference token on the edited sheet. Targets that
    /// were deleted entirely become the token's `#REF!` variant. Offset tokens
    /// (`PtgRefN`/`PtgAreaN`) are left alone.
    fn rewrite(&self, ptg: &Ptg) -> Option<Ptg> {
        let new = match ptg {
            Ptg::Ref { class, addr } => match self.addr(*addr) {
                Some(addr) => Ptg::Ref { class: *class, addr },
                None => Ptg::RefErr {
                    class: *class,
                    reserved: [0; 4],
                },
            },
            Ptg::Area { class, area } => match self.area(*area) {
                Some(area) => Ptg::Area { class: *class, area },
                None => Ptg::AreaErr {
                    class: *class,
                    reserved: [0; 8],
                },
            },
            Ptg::Ref3d { class, ixti, addr } => match self.addr(*addr) {
                Some(addr) => Ptg::Ref3d {
                    class: *class,
                    ixti: *ixti,
                    addr,
                },
                None => Ptg::RefErr3d {
                    class: *class,
                    ixti: *ixti,
                    reserved: [0; 4],
                },
            },
            Ptg::Area3d { class, ixti, area } => match self.area(*area) {
                Some(area) => Ptg::Area3d {
                    class: *class,
                    ixti: *ixti,
                    area,
                },
                None => Ptg::AreaErr3d {
                    class: *class,
                    ixti: *ixti,
                    reserved: [0; 8],
                },
            },
            _ => return None,
        };
        (new != *ptg).then_some(new)
    }

    /// Move a surviving record on the edited sheet, including the anchor its
    /// placeholder names.
    fn move_record(&self, record: &mut FormulaRecord) {
        match &mut record.body {
            FormulaBody::Cell { cell, tokens } => {
                if let Some(moved) = self.cell(*cell) {
                    *cell = moved;
                }
                if let Some(Ptg::Exp { row, col }) = tokens.first_mut() {
                    let anchor = CellRef::new(u32::from(*row), u32::from(*col));
                    if let Some(anchor) = self.cell(anchor) {
                        *row = anchor.row as u16;
                        *col = anchor.col as u16;
                    }
                }
            }
            FormulaBody::Shared(shared) => {
                if let Some(anchor) = self.cell(shared.anchor) {
                    shared.anchor = anchor;
                }
                if let Some(range) = self.range(shared.range) {
                    shared.range = range;
                }
            }
            FormulaBody::Array(array) => {
                if let Some(range) = self.range(array.range) {
                    array.range = range;
                }
            }
        }
    }
}

impl Workbook for MemoryWorkbook {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_name(&self, sheet: SheetId) -> Option<&str> {
        self.sheets.get(sheet).map(|s| s.name.as_str())
    }

    fn extern_sheet(&self, ixti: u16) -> Option<ExternSheet> {
        self.extern_sheets.get(usize::from(ixti)).cloned()
    }

    fn defined_name(&self, index: u16) -> Option<&DefinedName> {
        self.names.get(usize::from(index).checked_sub(1)?)
    }

    fn extern_name(&self, ixti: u16, index: u16) -> Option<&ExternName> {
        self.extern_names
            .get(&ixti)?
            .get(usize::from(index).checked_sub(1)?)
    }

    /// Formula cells report the result of the last [`MemoryWorkbook::recalculate`].
    fn cell_value(&self, sheet: SheetId, cell: CellRef) -> Value {
        if self.arena.cell_formula(sheet, cell).is_some() {
            return self.results.get(&(sheet, cell)).cloned().unwrap_or(Value::Blank);
        }
        self.sheets
            .get(sheet)
            .and_then(|s| s.values.get(&cell))
            .cloned()
            .unwrap_or(Value::Blank)
    }

    fn used_extent(&self, sheet: SheetId) -> Option<Range> {
        let values = self.sheets.get(sheet)?.values.keys().copied();
        let formulas = self.arena.iter().filter_map(|(_, record)| match record.body {
            FormulaBody::Cell { cell, .. } if record.sheet == sheet => Some(cell),
            _ => None,
        });
        values
            .chain(formulas)
            .map(Range::single)
            .reduce(|acc, r| acc.bounding(&r))
    }

    fn shared_formula(&self, sheet: SheetId, anchor: CellRef) -> Option<&SharedFormula> {
        self.arena.shared_at(sheet, anchor)
    }

    fn array_formula(&self, sheet: SheetId, anchor: CellRef) -> Option<&ArrayFormula> {
        self.arena.array_at(sheet, anchor)
    }

    fn cell_formula(&self, sheet: SheetId, cell: CellRef) -> Option<&[Ptg]> {
        self.formula(sheet, cell)
    }

    fn formula_cells(&self) -> Vec<(SheetId, CellRef)> {
        let mut cells: Vec<(SheetId, CellRef)> = self
            .arena
            .iter()
            .filter_map(|(_, record)| match record.body {
                FormulaBody::Cell { cell, .. } => Some((record.sheet, cell)),
                _ => None,
            })
            .collect();
        cells.sort_by_key(|(sheet, cell)| (*sheet, cell.row, cell.col));
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::BasicFunctions;
    use formula_ptg::{BinaryOp, PtgClass};
    use pretty_assertions::assert_eq;

    fn a1(s: &str) -> CellRef {
        CellRef::from_a1(s).unwrap()
    }

    fn ref_to(s: &str) -> Ptg {
        Ptg::cell(CellAddr::relative(a1(s)))
    }

    fn area(s: &str) -> AreaAddr {
        let range = Range::from_a1(s).unwrap();
        AreaAddr::new(CellAddr::relative(range.start), CellAddr::relative(range.end))
    }

    #[test]
    fn inserted_rows_push_references_down() {
        let mut wb = MemoryWorkbook::new();
        let s = wb.add_sheet("Sheet1");
        wb.set_value(s, a1("A5"), 4.0);
        let id = wb.set_formula(s, a1("B1"), vec![ref_to("A5")]);
        wb.insert_rows(s, 2, 3);
        assert_eq!(wb.formula(s, a1("B1")), Some(&[ref_to("A8")][..]));
        assert_eq!(wb.cell_value(s, a1("A8")), Value::Number(4.0));
        assert_eq!(
            wb.arena().tracker().key(crate::arena::RefHandle { formula: id, token: 0 }),
            Some((s, Range::from_a1("A8").unwrap()))
        );
    }

    #[test]
    fn deleting_a_referenced_row_breaks_the_reference() {
        let mut wb = MemoryWorkbook::new();
        let s = wb.add_sheet("Sheet1");
        wb.set_formula(s, a1("C1"), vec![ref_to("A3")]);
        wb.delete_rows(s, 2, 1);
        assert_eq!(
            wb.formula(s, a1("C1")),
            Some(
                &[Ptg::RefErr {
                    class: PtgClass::Value,
                    reserved: [0; 4],
                }][..]
            )
        );
        assert!(wb.arena().tracker().is_empty());
    }

    #[test]
    fn deleting_part_of_an_area_shrinks_it() {
        let mut wb = MemoryWorkbook::new();
        let s = wb.add_sheet("Sheet1");
        wb.set_formula(s, a1("D1"), vec![Ptg::area(area("A2:A10")), Ptg::func_var(4, 1)]);
        wb.delete_rows(s, 0, 4);
        assert_eq!(
            wb.formula(s, a1("D1")),
            None,
            "the formula cell itself was deleted"
        );

        wb.set_formula(s, a1("D1"), vec![Ptg::area(area("A2:A10")), Ptg::func_var(4, 1)]);
        wb.delete_cols(s, 1, 1);
        assert_eq!(wb.formula(s, a1("D1")), None);
        let tokens = wb.formula(s, a1("C1")).unwrap();
        assert_eq!(tokens[0], Ptg::area(area("A2:A10")));

        wb.delete_rows(s, 4, 3);
        let tokens = wb.formula(s, a1("C1")).unwrap();
        assert_eq!(tokens[0], Ptg::area(area("A2:A7")));
    }

    #[test]
    fn array_blocks_move_with_their_members() {
        let mut wb = MemoryWorkbook::new();
        let s = wb.add_sheet("Sheet1");
        wb.set_array_formula(s, Range::from_a1("B2:B3").unwrap(), vec![Ptg::Int(1)]);
        wb.insert_rows(s, 0, 1);
        assert!(wb.array_formula(s, a1("B3")).is_some());
        assert_eq!(
            wb.formula(s, a1("B4")),
            Some(&[Ptg::Exp { row: 2, col: 1 }][..])
        );
        assert_eq!(wb.formula(s, a1("B2")), None);
    }

    #[test]
    fn recalculate_caches_results() {
        let mut wb = MemoryWorkbook::new();
        let s = wb.add_sheet("Sheet1");
        wb.set_value(s, a1("A1"), 1.5);
        wb.set_formula(
            s,
            a1("A2"),
            vec![ref_to("A1"), Ptg::Int(2), Ptg::Binary(BinaryOp::Mul)],
        );
        assert!(wb.is_dirty());
        assert_eq!(wb.cell_value(s, a1("A2")), Value::Blank);
        let failures = wb.recalculate(&BasicFunctions);
        assert!(failures.is_empty());
        assert!(!wb.is_dirty());
        assert_eq!(wb.cell_value(s, a1("A2")), Value::Number(3.0));
    }

    #[test]
    fn structural_failures_are_reported() {
        let mut wb = MemoryWorkbook::new();
        let s = wb.add_sheet("Sheet1");
        wb.set_formula(s, a1("A1"), vec![Ptg::Exp { row: 9, col: 9 }]);
        let failures = wb.recalculate(&BasicFunctions);
        assert_eq!(
            failures,
            vec![(
                s,
                a1("A1"),
                EvalError::FormulaStructureNotFound {
                    sheet: s,
                    anchor: a1("J10"),
                }
            )]
        );
        assert_eq!(wb.cell_value(s, a1("A1")), Value::Error(ErrorValue::Value));
    }

    #[test]
    fn manual_mode_edits_do_not_mark_dirty() {
        let settings = CalcSettings {
            calculation_mode: formula_model::CalculationMode::Manual,
            ..CalcSettings::default()
        };
        let mut wb = MemoryWorkbook::with_settings(settings);
        let s = wb.add_sheet("Sheet1");
        wb.set_value(s, a1("A1"), 1.0);
        assert!(!wb.is_dirty());
    }
}
