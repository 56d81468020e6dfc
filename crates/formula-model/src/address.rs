use core::fmt;
use core::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::SheetLimits;

/// A reference to a single cell within a worksheet.
///
/// Rows and columns are **0-indexed**:
/// - `row = 0` is row `1` in A1 notation
/// - `col = 0` is column `A`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    /// 0-indexed row.
    pub row: u32,
    /// 0-indexed column.
    pub col: u32,
}

impl CellRef {
    /// Construct a new [`CellRef`].
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Convert to A1 notation (e.g. `A1`, `BC32`).
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_name(self.col), self.row + 1)
    }

    /// Parse an A1-style reference (e.g. `A1`, `$B$2`), bounded by the BIFF8 grid.
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        CellAddr::from_a1(a1, &SheetLimits::default()).map(CellAddr::cell)
    }

    /// Offset by a signed delta, returning `None` when the result leaves the grid.
    pub fn offset(self, d_row: i64, d_col: i64, limits: &SheetLimits) -> Option<Self> {
        let row = i64::from(self.row) + d_row;
        let col = i64::from(self.col) + d_col;
        if row < 0
            || col < 0
            || row >= i64::from(limits.max_rows)
            || col >= i64::from(limits.max_cols)
        {
            return None;
        }
        Some(Self::new(row as u32, col as u32))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// A rectangular region within a worksheet.
///
/// The range is inclusive and always normalized such that:
/// - `start.row <= end.row`
/// - `start.col <= end.col`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl Range {
    /// Construct a new range, normalizing reversed corners.
    pub const fn new(a: CellRef, b: CellRef) -> Self {
        let start_row = if a.row <= b.row { a.row } else { b.row };
        let end_row = if a.row <= b.row { b.row } else { a.row };
        let start_col = if a.col <= b.col { a.col } else { b.col };
        let end_col = if a.col <= b.col { b.col } else { a.col };
        Self {
            start: CellRef::new(start_row, start_col),
            end: CellRef::new(end_row, end_col),
        }
    }

    #[inline]
    pub const fn single(cell: CellRef) -> Self {
        Self {
            start: cell,
            end: cell,
        }
    }

    /// Returns true if `cell` lies within this range.
    #[inline]
    pub const fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    /// Number of columns in the range.
    #[inline]
    pub const fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    /// Number of rows in the range.
    #[inline]
    pub const fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    #[inline]
    pub const fn cell_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Returns true if the range is exactly one cell.
    #[inline]
    pub const fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let start_row = self.start.row.max(other.start.row);
        let end_row = self.end.row.min(other.end.row);
        let start_col = self.start.col.max(other.start.col);
        let end_col = self.end.col.min(other.end.col);
        if start_row > end_row || start_col > end_col {
            return None;
        }
        Some(Range {
            start: CellRef::new(start_row, start_col),
            end: CellRef::new(end_row, end_col),
        })
    }

    /// Smallest range covering both inputs.
    pub fn bounding(&self, other: &Range) -> Range {
        Range {
            start: CellRef::new(
                self.start.row.min(other.start.row),
                self.start.col.min(other.start.col),
            ),
            end: CellRef::new(self.end.row.max(other.end.row), self.end.col.max(other.end.col)),
        }
    }

    /// Enumerate the component cells: columns ascending in the outer loop, rows ascending
    /// in the inner loop.
    ///
    /// Every call returns a fresh iterator, so the sequence can be restarted at will.
    pub fn components(&self) -> Components {
        Components {
            range: *self,
            next: Some(self.start),
            remaining: self.cell_count(),
        }
    }

    /// Parse an A1-style range like `A1:B2` or a single-cell reference like `C3`.
    pub fn from_a1(a1: &str) -> Result<Self, RangeParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(RangeParseError::Empty);
        }

        match s.split_once(':') {
            None => {
                let cell = CellRef::from_a1(s).map_err(RangeParseError::Cell)?;
                Ok(Range::single(cell))
            }
            Some((a, b)) => {
                let start = CellRef::from_a1(a).map_err(RangeParseError::Cell)?;
                let end = CellRef::from_a1(b).map_err(RangeParseError::Cell)?;
                Ok(Range::new(start, end))
            }
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// Column-major cell iterator returned by [`Range::components`].
#[derive(Clone, Debug)]
pub struct Components {
    range: Range,
    next: Option<CellRef>,
    remaining: u64,
}

impl Iterator for Components {
    type Item = CellRef;

    fn next(&mut self) -> Option<CellRef> {
        let current = self.next?;
        self.remaining -= 1;
        self.next = if current.row < self.range.end.row {
            Some(CellRef::new(current.row + 1, current.col))
        } else if current.col < self.range.end.col {
            Some(CellRef::new(self.range.start.row, current.col + 1))
        } else {
            None
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Components {}

impl FusedIterator for Components {}

/// A cell address as stored in a reference token: coordinates plus independent
/// relative/absolute flags for the row and the column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddr {
    pub row: u32,
    pub col: u32,
    pub row_relative: bool,
    pub col_relative: bool,
}

impl CellAddr {
    pub const fn new(row: u32, col: u32, row_relative: bool, col_relative: bool) -> Self {
        Self {
            row,
            col,
            row_relative,
            col_relative,
        }
    }

    /// Fully absolute address (`$A$1`).
    pub const fn absolute(cell: CellRef) -> Self {
        Self::new(cell.row, cell.col, false, false)
    }

    /// Fully relative address (`A1`).
    pub const fn relative(cell: CellRef) -> Self {
        Self::new(cell.row, cell.col, true, true)
    }

    #[inline]
    pub const fn cell(self) -> CellRef {
        CellRef::new(self.row, self.col)
    }

    /// A1 text with `$` markers on the absolute parts.
    pub fn to_a1(self) -> String {
        let mut out = String::new();
        self.write_col(&mut out);
        self.write_row(&mut out);
        out
    }

    pub(crate) fn write_col(self, out: &mut String) {
        if !self.col_relative {
            out.push('$');
        }
        out.push_str(&col_to_name(self.col));
    }

    pub(crate) fn write_row(self, out: &mut String) {
        if !self.row_relative {
            out.push('$');
        }
        out.push_str(&(self.row + 1).to_string());
    }

    /// Parse `A1`, `$A1`, `A$1` or `$A$1`.
    pub fn from_a1(a1: &str, limits: &SheetLimits) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let bytes = s.as_bytes();
        let mut idx = 0usize;
        let col_relative = bytes.get(idx) != Some(&b'$');
        if !col_relative {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        if idx == col_start {
            return Err(A1ParseError::MissingColumn);
        }
        let col_str = &s[col_start..idx];

        let row_relative = bytes.get(idx) != Some(&b'$');
        if !row_relative {
            idx += 1;
        }

        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == row_start {
            return Err(A1ParseError::MissingRow);
        }
        if idx != bytes.len() {
            return Err(A1ParseError::TrailingCharacters);
        }

        let col = name_to_col(col_str)?;
        if col >= limits.max_cols {
            return Err(A1ParseError::InvalidColumn);
        }
        let row_1_based: u32 = s[row_start..idx]
            .parse()
            .map_err(|_| A1ParseError::InvalidRow)?;
        if row_1_based == 0 || row_1_based > limits.max_rows {
            return Err(A1ParseError::InvalidRow);
        }

        Ok(Self::new(row_1_based - 1, col, row_relative, col_relative))
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Two corner addresses of a rectangular reference.
///
/// Corners are stored exactly as encoded and may be reversed; call [`AreaAddr::range`]
/// to obtain the normalized span.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaAddr {
    pub first: CellAddr,
    pub last: CellAddr,
}

impl AreaAddr {
    pub const fn new(first: CellAddr, last: CellAddr) -> Self {
        Self { first, last }
    }

    pub const fn range(&self) -> Range {
        Range::new(self.first.cell(), self.last.cell())
    }

    /// The area spans every row of the sheet (`A:C`).
    pub fn is_whole_column(&self, limits: &SheetLimits) -> bool {
        let r = self.range();
        r.start.row == 0 && r.end.row + 1 >= limits.max_rows
    }

    /// The area spans every column of the sheet (`1:3`).
    pub fn is_whole_row(&self, limits: &SheetLimits) -> bool {
        let r = self.range();
        r.start.col == 0 && r.end.col + 1 >= limits.max_cols
    }

    /// Either dimension is open-ended.
    pub fn is_whole_dimension(&self, limits: &SheetLimits) -> bool {
        self.is_whole_column(limits) || self.is_whole_row(limits)
    }

    /// A1 text, collapsing whole columns to `A:C` and whole rows to `1:3`.
    pub fn to_a1(&self, limits: &SheetLimits) -> String {
        let mut out = String::new();
        if self.is_whole_column(limits) && !self.is_whole_row(limits) {
            self.first.write_col(&mut out);
            out.push(':');
            self.last.write_col(&mut out);
        } else if self.is_whole_row(limits) && !self.is_whole_column(limits) {
            self.first.write_row(&mut out);
            out.push(':');
            self.last.write_row(&mut out);
        } else {
            out.push_str(&self.first.to_a1());
            out.push(':');
            out.push_str(&self.last.to_a1());
        }
        out
    }
}

/// Errors that can occur when parsing an A1 cell reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum A1ParseError {
    Empty,
    MissingColumn,
    MissingRow,
    InvalidColumn,
    InvalidRow,
    TrailingCharacters,
}

impl fmt::Display for A1ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            A1ParseError::Empty => "empty A1 reference",
            A1ParseError::MissingColumn => "missing column in A1 reference",
            A1ParseError::MissingRow => "missing row in A1 reference",
            A1ParseError::InvalidColumn => "invalid column in A1 reference",
            A1ParseError::InvalidRow => "invalid row in A1 reference",
            A1ParseError::TrailingCharacters => "trailing characters in A1 reference",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for A1ParseError {}

/// Errors that can occur when parsing an A1 range.
#[derive(Debug)]
pub enum RangeParseError {
    Empty,
    Cell(A1ParseError),
}

impl fmt::Display for RangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeParseError::Empty => f.write_str("empty A1 range"),
            RangeParseError::Cell(e) => write!(f, "invalid cell reference in range: {e}"),
        }
    }
}

impl std::error::Error for RangeParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RangeParseError::Empty => None,
            RangeParseError::Cell(e) => Some(e),
        }
    }
}

/// Column letters for a 0-based column index (`0 -> A`, `26 -> AA`).
pub fn col_to_name(col: u32) -> String {
    let mut n = col + 1;
    let mut out = Vec::<char>::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

fn name_to_col(s: &str) -> Result<u32, A1ParseError> {
    let mut col: u32 = 0;
    for b in s.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(A1ParseError::InvalidColumn);
        }
        let v = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .ok_or(A1ParseError::InvalidColumn)?;
    }
    if col == 0 {
        return Err(A1ParseError::InvalidColumn);
    }
    Ok(col - 1)
}

/// Parse column letters into a 0-based index.
pub fn name_to_col_index(s: &str) -> Option<u32> {
    name_to_col(s).ok()
}
