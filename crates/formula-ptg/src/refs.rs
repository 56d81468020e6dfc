//! Packed row/column fields of reference tokens.

use formula_model::{AreaAddr, CellAddr, CellRef, SheetLimits};

pub(crate) const ROW_RELATIVE_BIT: u16 = 0x4000;
pub(crate) const COL_RELATIVE_BIT: u16 = 0x8000;
pub(crate) const COL_MASK: u16 = 0x3FFF;

pub(crate) fn unpack_cell(row: u16, col_field: u16) -> CellAddr {
    CellAddr::new(
        u32::from(row),
        u32::from(col_field & COL_MASK),
        col_field & ROW_RELATIVE_BIT != 0,
        col_field & COL_RELATIVE_BIT != 0,
    )
}

pub(crate) fn pack_col(col: u32, row_relative: bool, col_relative: bool) -> u16 {
    let mut field = (col as u16) & COL_MASK;
    if row_relative {
        field |= ROW_RELATIVE_BIT;
    }
    if col_relative {
        field |= COL_RELATIVE_BIT;
    }
    field
}

/// A cell address inside a relocatable token (`PtgRefN`, `PtgAreaN`, and the 3D tokens of a
/// shared formula body).
///
/// The raw 16-bit row and 14-bit column fields are kept as stored. For relative parts the
/// row field is a signed 16-bit offset and the low byte of the column field is a signed
/// 8-bit offset; absolute parts are plain coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RelCellAddr {
    pub row: u16,
    pub col: u16,
    pub row_relative: bool,
    pub col_relative: bool,
}

impl RelCellAddr {
    /// Build from offsets (for relative parts) or coordinates (for absolute parts).
    pub fn new(row: i32, col: i32, row_relative: bool, col_relative: bool) -> Self {
        let row = if row_relative {
            row as i16 as u16
        } else {
            row as u16
        };
        let col = if col_relative {
            u16::from(col as i8 as u8)
        } else {
            (col as u16) & COL_MASK
        };
        Self {
            row,
            col,
            row_relative,
            col_relative,
        }
    }

    pub(crate) fn unpack(row: u16, col_field: u16) -> Self {
        Self {
            row,
            col: col_field & COL_MASK,
            row_relative: col_field & ROW_RELATIVE_BIT != 0,
            col_relative: col_field & COL_RELATIVE_BIT != 0,
        }
    }

    pub(crate) fn col_field(&self) -> u16 {
        let mut field = self.col & COL_MASK;
        if self.row_relative {
            field |= ROW_RELATIVE_BIT;
        }
        if self.col_relative {
            field |= COL_RELATIVE_BIT;
        }
        field
    }

    /// Signed row offset, or `None` when the row is absolute.
    pub fn row_offset(&self) -> Option<i32> {
        self.row_relative.then_some(i32::from(self.row as i16))
    }

    /// Signed column offset, or `None` when the column is absolute.
    pub fn col_offset(&self) -> Option<i32> {
        self.col_relative.then_some(i32::from(self.col as u8 as i8))
    }

    /// Resolve against the cell that consumes the formula.
    ///
    /// Relative parts wrap around the grid edges, so an offset of `-1` from column `A`
    /// lands on the last column.
    pub fn resolve(&self, origin: CellRef, limits: &SheetLimits) -> CellAddr {
        let row = match self.row_offset() {
            Some(d) => wrap(origin.row, d, limits.max_rows),
            None => u32::from(self.row),
        };
        let col = match self.col_offset() {
            Some(d) => wrap(origin.col, d, limits.max_cols),
            None => u32::from(self.col),
        };
        CellAddr::new(row, col, self.row_relative, self.col_relative)
    }
}

fn wrap(base: u32, delta: i32, extent: u32) -> u32 {
    (i64::from(base) + i64::from(delta)).rem_euclid(i64::from(extent)) as u32
}

/// Corners of a relocatable area.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RelAreaAddr {
    pub first: RelCellAddr,
    pub last: RelCellAddr,
}

impl RelAreaAddr {
    pub fn resolve(&self, origin: CellRef, limits: &SheetLimits) -> AreaAddr {
        AreaAddr::new(
            self.first.resolve(origin, limits),
            self.last.resolve(origin, limits),
        )
    }
}

/// Shift the relative parts of an anchor-relative address by `(d_row, d_col)`.
///
/// Used for 3D references inside shared formula bodies, whose relative parts store
/// coordinates as seen from the group's anchor cell. Returns `None` when a shifted part
/// leaves the grid.
pub fn shift_relative(
    addr: CellAddr,
    d_row: i64,
    d_col: i64,
    limits: &SheetLimits,
) -> Option<CellAddr> {
    let row = if addr.row_relative {
        let r = i64::from(addr.row) + d_row;
        if r < 0 || r >= i64::from(limits.max_rows) {
            return None;
        }
        r as u32
    } else {
        addr.row
    };
    let col = if addr.col_relative {
        let c = i64::from(addr.col) + d_col;
        if c < 0 || c >= i64::from(limits.max_cols) {
            return None;
        }
        c as u32
    } else {
        addr.col
    };
    Some(CellAddr::new(row, col, addr.row_relative, addr.col_relative))
}
