use formula_model::{AreaAddr, CellAddr, ErrorValue, Range};

use crate::array::ArrayConstant;
use crate::ftab;
use crate::opcode::{PtgClass, PtgId};
use crate::refs::{RelAreaAddr, RelCellAddr};
use crate::strings::PtgString;

/// Two-operand operators, in opcode order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Power,
    Concat,
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    /// Intersection (space operator).
    Isect,
    /// Union (`,` outside of a function argument list).
    Union,
    /// Range (`:`).
    Range,
}

impl BinaryOp {
    pub const fn id(self) -> PtgId {
        match self {
            BinaryOp::Add => PtgId::Add,
            BinaryOp::Sub => PtgId::Sub,
            BinaryOp::Mul => PtgId::Mul,
            BinaryOp::Div => PtgId::Div,
            BinaryOp::Power => PtgId::Power,
            BinaryOp::Concat => PtgId::Concat,
            BinaryOp::Lt => PtgId::Lt,
            BinaryOp::Le => PtgId::Le,
            BinaryOp::Eq => PtgId::Eq,
            BinaryOp::Ge => PtgId::Ge,
            BinaryOp::Gt => PtgId::Gt,
            BinaryOp::Ne => PtgId::Ne,
            BinaryOp::Isect => PtgId::Isect,
            BinaryOp::Union => PtgId::Union,
            BinaryOp::Range => PtgId::Range,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Power => "^",
            BinaryOp::Concat => "&",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Ne => "<>",
            BinaryOp::Isect => " ",
            BinaryOp::Union => ",",
            BinaryOp::Range => ":",
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ge | BinaryOp::Gt | BinaryOp::Ne
        )
    }

    /// Operators that combine references rather than values.
    pub const fn is_reference_operator(self) -> bool {
        matches!(self, BinaryOp::Isect | BinaryOp::Union | BinaryOp::Range)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    /// Postfix `%`.
    Percent,
}

impl UnaryOp {
    pub const fn id(self) -> PtgId {
        match self {
            UnaryOp::Plus => PtgId::Uplus,
            UnaryOp::Minus => PtgId::Uminus,
            UnaryOp::Percent => PtgId::Percent,
        }
    }
}

/// Whitespace kinds recorded by `PtgAttrSpace`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpaceKind {
    SpaceBefore,
    CrBefore,
    SpaceBeforeOpenParen,
    CrBeforeOpenParen,
    SpaceBeforeCloseParen,
    CrBeforeCloseParen,
    SpaceBeforeExpression,
    /// Any other type byte, kept as stored.
    Other(u8),
}

impl SpaceKind {
    pub const fn from_byte(b: u8) -> Self {
        match b {
            0x00 => SpaceKind::SpaceBefore,
            0x01 => SpaceKind::CrBefore,
            0x02 => SpaceKind::SpaceBeforeOpenParen,
            0x03 => SpaceKind::CrBeforeOpenParen,
            0x04 => SpaceKind::SpaceBeforeCloseParen,
            0x05 => SpaceKind::CrBeforeCloseParen,
            0x06 => SpaceKind::SpaceBeforeExpression,
            other => SpaceKind::Other(other),
        }
    }

    pub const fn to_byte(self) -> u8 {
        match self {
            SpaceKind::SpaceBefore => 0x00,
            SpaceKind::CrBefore => 0x01,
            SpaceKind::SpaceBeforeOpenParen => 0x02,
            SpaceKind::CrBeforeOpenParen => 0x03,
            SpaceKind::SpaceBeforeCloseParen => 0x04,
            SpaceKind::CrBeforeCloseParen => 0x05,
            SpaceKind::SpaceBeforeExpression => 0x06,
            SpaceKind::Other(b) => b,
        }
    }

    pub const fn is_line_break(self) -> bool {
        matches!(
            self,
            SpaceKind::CrBefore | SpaceKind::CrBeforeOpenParen | SpaceKind::CrBeforeCloseParen
        )
    }
}

/// `PtgAttr` variants, keyed by the `grbit` byte.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attr {
    /// Marks the formula volatile (`0x01`). The data word is unused.
    Semi { data: u16 },
    /// Jump to the false branch of `IF` (`0x02`).
    If { offset: u16 },
    /// `CHOOSE` jump table (`0x04`): one offset per choice plus the offset past the call.
    Choose { offsets: Vec<u16> },
    /// Unconditional jump (`0x08`).
    Goto { offset: u16 },
    /// `SUM` of a single argument (`0x10`).
    Sum { data: u16 },
    /// `bitBaxcel` assignment marker (`0x20`, or `0x21` when also volatile).
    Baxcel { volatile: bool, data: u16 },
    /// Whitespace (`0x40`, or `0x41` for the volatile form).
    Space {
        kind: SpaceKind,
        count: u8,
        volatile: bool,
    },
    /// Any other `grbit`, kept with its data word so it re-encodes unchanged.
    Other { grbit: u8, data: u16 },
}

impl Attr {
    pub(crate) fn grbit(&self) -> u8 {
        match self {
            Attr::Semi { .. } => 0x01,
            Attr::If { .. } => 0x02,
            Attr::Choose { .. } => 0x04,
            Attr::Goto { .. } => 0x08,
            Attr::Sum { .. } => 0x10,
            Attr::Baxcel { volatile, .. } => 0x20 | u8::from(*volatile),
            Attr::Space { volatile, .. } => 0x40 | u8::from(*volatile),
            Attr::Other { grbit, .. } => *grbit,
        }
    }
}

/// Memory-area tokens. They describe a precomputed subexpression whose tokens follow
/// inline; `cce` is the byte length of that subexpression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemKind {
    /// `PtgMemArea`; its area list is stored in rgcb.
    Area,
    /// `PtgMemErr`: the subexpression evaluates to an error.
    Err,
    /// `PtgMemNoMem`: the cached result was not stored.
    NoMem,
    /// `PtgMemFunc`: the subexpression contains a function call.
    Func,
    /// `PtgMemAreaN`: relative form inside a shared formula.
    AreaN,
    /// `PtgMemNoMemN`: relative form inside a shared formula.
    NoMemN,
}

impl MemKind {
    pub const fn id(self) -> PtgId {
        match self {
            MemKind::Area => PtgId::MemArea,
            MemKind::Err => PtgId::MemErr,
            MemKind::NoMem => PtgId::MemNoMem,
            MemKind::Func => PtgId::MemFunc,
            MemKind::AreaN => PtgId::MemAreaN,
            MemKind::NoMemN => PtgId::MemNoMemN,
        }
    }

    /// Kinds whose payload starts with four unused bytes before `cce`.
    pub(crate) const fn has_reserved(self) -> bool {
        matches!(self, MemKind::Area | MemKind::Err | MemKind::NoMem)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemPtg {
    pub kind: MemKind,
    pub class: PtgClass,
    pub reserved: [u8; 4],
    pub cce: u16,
    /// Precomputed areas (only for [`MemKind::Area`]).
    pub areas: Vec<Range>,
}

/// One parsed-expression token.
#[derive(Clone, Debug, PartialEq)]
pub enum Ptg {
    /// Placeholder for a shared or array formula; names its anchor cell.
    Exp { row: u16, col: u16 },
    /// Placeholder for a data-table cell; names the table's anchor cell.
    Tbl { row: u16, col: u16 },
    Binary(BinaryOp),
    Unary(UnaryOp),
    Paren,
    MissArg,
    Str(PtgString),
    Attr(Attr),
    Err(ErrorValue),
    /// Raw payload byte; any non-zero value is TRUE.
    Bool(u8),
    Int(u16),
    Num(f64),
    Array {
        class: PtgClass,
        reserved: [u8; 7],
        value: ArrayConstant,
    },
    /// Fixed-arity function call; the argument count comes from the function table.
    Func { class: PtgClass, iftab: u16 },
    /// Variable-arity function call.
    FuncVar {
        class: PtgClass,
        argc: u8,
        /// "Prompt user" flag (high bit of the count byte).
        prompt: bool,
        iftab: u16,
        /// Command-equivalent flag (high bit of the function index).
        command: bool,
    },
    /// Defined name, 1-based index into the workbook name table.
    Name {
        class: PtgClass,
        index: u16,
        reserved: u16,
    },
    /// Name from an external (or add-in) name table.
    NameX {
        class: PtgClass,
        ixti: u16,
        index: u16,
        reserved: u16,
    },
    Ref { class: PtgClass, addr: CellAddr },
    Area { class: PtgClass, area: AreaAddr },
    Mem(MemPtg),
    RefErr { class: PtgClass, reserved: [u8; 4] },
    AreaErr { class: PtgClass, reserved: [u8; 8] },
    RefN { class: PtgClass, addr: RelCellAddr },
    AreaN { class: PtgClass, area: RelAreaAddr },
    Ref3d {
        class: PtgClass,
        ixti: u16,
        addr: CellAddr,
    },
    Area3d {
        class: PtgClass,
        ixti: u16,
        area: AreaAddr,
    },
    RefErr3d {
        class: PtgClass,
        ixti: u16,
        reserved: [u8; 4],
    },
    AreaErr3d {
        class: PtgClass,
        ixti: u16,
        reserved: [u8; 8],
    },
}

/// Broad role of a token in the evaluation stack machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenRole {
    /// Consumes operands and produces one result.
    Operator,
    /// Pushes a value.
    Operand,
    /// Pushes a reference (also an operand).
    Reference,
    /// Grouping or bookkeeping; no effect on evaluation.
    Control,
}

/// Number of operands a token consumes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arity {
    Standalone,
    Unary,
    Binary,
    /// Function calls: the count comes from the function table or the payload.
    Variable,
}

impl Ptg {
    pub fn id(&self) -> PtgId {
        match self {
            Ptg::Exp { .. } => PtgId::Exp,
            Ptg::Tbl { .. } => PtgId::Tbl,
            Ptg::Binary(op) => op.id(),
            Ptg::Unary(op) => op.id(),
            Ptg::Paren => PtgId::Paren,
            Ptg::MissArg => PtgId::MissArg,
            Ptg::Str(_) => PtgId::Str,
            Ptg::Attr(_) => PtgId::Attr,
            Ptg::Err(_) => PtgId::Err,
            Ptg::Bool(_) => PtgId::Bool,
            Ptg::Int(_) => PtgId::Int,
            Ptg::Num(_) => PtgId::Num,
            Ptg::Array { .. } => PtgId::Array,
            Ptg::Func { .. } => PtgId::Func,
            Ptg::FuncVar { .. } => PtgId::FuncVar,
            Ptg::Name { .. } => PtgId::Name,
            Ptg::NameX { .. } => PtgId::NameX,
            Ptg::Ref { .. } => PtgId::Ref,
            Ptg::Area { .. } => PtgId::Area,
            Ptg::Mem(mem) => mem.kind.id(),
            Ptg::RefErr { .. } => PtgId::RefErr,
            Ptg::AreaErr { .. } => PtgId::AreaErr,
            Ptg::RefN { .. } => PtgId::RefN,
            Ptg::AreaN { .. } => PtgId::AreaN,
            Ptg::Ref3d { .. } => PtgId::Ref3d,
            Ptg::Area3d { .. } => PtgId::Area3d,
            Ptg::RefErr3d { .. } => PtgId::RefErr3d,
            Ptg::AreaErr3d { .. } => PtgId::AreaErr3d,
        }
    }

    /// Token class for classed opcodes.
    pub fn class(&self) -> Option<PtgClass> {
        match self {
            Ptg::Array { class, .. }
            | Ptg::Func { class, .. }
            | Ptg::FuncVar { class, .. }
            | Ptg::Name { class, .. }
            | Ptg::NameX { class, .. }
            | Ptg::Ref { class, .. }
            | Ptg::Area { class, .. }
            | Ptg::RefErr { class, .. }
            | Ptg::AreaErr { class, .. }
            | Ptg::RefN { class, .. }
            | Ptg::AreaN { class, .. }
            | Ptg::Ref3d { class, .. }
            | Ptg::Area3d { class, .. }
            | Ptg::RefErr3d { class, .. }
            | Ptg::AreaErr3d { class, .. } => Some(*class),
            Ptg::Mem(mem) => Some(mem.class),
            _ => None,
        }
    }

    /// The full opcode byte, class bits included.
    pub fn opcode(&self) -> u8 {
        self.id().opcode(self.class())
    }

    pub fn role(&self) -> TokenRole {
        match self {
            Ptg::Binary(_) | Ptg::Unary(_) | Ptg::Func { .. } | Ptg::FuncVar { .. } => {
                TokenRole::Operator
            }
            Ptg::Attr(Attr::Sum { .. }) => TokenRole::Operator,
            Ptg::Attr(_) | Ptg::Paren | Ptg::Mem(_) => TokenRole::Control,
            Ptg::Name { .. }
            | Ptg::NameX { .. }
            | Ptg::Ref { .. }
            | Ptg::Area { .. }
            | Ptg::RefErr { .. }
            | Ptg::AreaErr { .. }
            | Ptg::RefN { .. }
            | Ptg::AreaN { .. }
            | Ptg::Ref3d { .. }
            | Ptg::Area3d { .. }
            | Ptg::RefErr3d { .. }
            | Ptg::AreaErr3d { .. } => TokenRole::Reference,
            Ptg::Exp { .. }
            | Ptg::Tbl { .. }
            | Ptg::MissArg
            | Ptg::Str(_)
            | Ptg::Err(_)
            | Ptg::Bool(_)
            | Ptg::Int(_)
            | Ptg::Num(_)
            | Ptg::Array { .. } => TokenRole::Operand,
        }
    }

    pub fn is_operator(&self) -> bool {
        self.role() == TokenRole::Operator
    }

    /// References count as operands too.
    pub fn is_operand(&self) -> bool {
        matches!(self.role(), TokenRole::Operand | TokenRole::Reference)
    }

    pub fn is_reference(&self) -> bool {
        self.role() == TokenRole::Reference
    }

    pub fn is_control(&self) -> bool {
        self.role() == TokenRole::Control
    }

    pub fn arity(&self) -> Arity {
        match self {
            Ptg::Binary(_) => Arity::Binary,
            Ptg::Unary(_) | Ptg::Attr(Attr::Sum { .. }) => Arity::Unary,
            Ptg::Func { .. } | Ptg::FuncVar { .. } => Arity::Variable,
            _ => Arity::Standalone,
        }
    }

    /// How many stack entries evaluating this token consumes.
    ///
    /// `None` only for a fixed-arity call whose function id is unknown or variadic.
    pub fn operand_count(&self) -> Option<usize> {
        match self {
            Ptg::Func { iftab, .. } => ftab::fixed_arity(*iftab).map(usize::from),
            Ptg::FuncVar { argc, .. } => Some(usize::from(*argc)),
            _ => Some(match self.arity() {
                Arity::Standalone => 0,
                Arity::Unary => 1,
                Arity::Binary => 2,
                Arity::Variable => 0,
            }),
        }
    }

    /// Shorthand for a value-class `PtgRef`.
    pub fn cell(addr: CellAddr) -> Self {
        Ptg::Ref {
            class: PtgClass::Value,
            addr,
        }
    }

    /// Shorthand for a reference-class `PtgArea`.
    pub fn area(area: AreaAddr) -> Self {
        Ptg::Area {
            class: PtgClass::Reference,
            area,
        }
    }

    pub fn bool(value: bool) -> Self {
        Ptg::Bool(u8::from(value))
    }

    /// `PtgStr` in the compressed form when possible.
    pub fn str(text: &str) -> Self {
        Ptg::Str(PtgString::new(text))
    }

    /// Value-class `PtgFuncVar` without the cosmetic flags.
    pub fn func_var(iftab: u16, argc: u8) -> Self {
        Ptg::FuncVar {
            class: PtgClass::Value,
            argc,
            prompt: false,
            iftab,
            command: false,
        }
    }

    /// Value-class `PtgFunc`.
    pub fn func(iftab: u16) -> Self {
        Ptg::Func {
            class: PtgClass::Value,
            iftab,
        }
    }
}
