//! The closed opcode space of BIFF8 parsed expressions.

/// Token class carried in bits 5-6 of operand and function opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PtgClass {
    /// The operand is used as a reference (`0x20` bank).
    Reference,
    /// The operand is dereferenced to a single value (`0x40` bank).
    Value,
    /// The operand is used as an array (`0x60` bank).
    Array,
}

impl PtgClass {
    #[inline]
    pub const fn bits(self) -> u8 {
        match self {
            PtgClass::Reference => 0x20,
            PtgClass::Value => 0x40,
            PtgClass::Array => 0x60,
        }
    }

    #[inline]
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode & 0x60 {
            0x20 => Some(PtgClass::Reference),
            0x40 => Some(PtgClass::Value),
            0x60 => Some(PtgClass::Array),
            _ => None,
        }
    }
}

/// Base token identifiers. Classed tokens use their reference-bank (`0x2X`/`0x3X`) value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PtgId {
    Exp = 0x01,
    Tbl = 0x02,
    Add = 0x03,
    Sub = 0x04,
    Mul = 0x05,
    Div = 0x06,
    Power = 0x07,
    Concat = 0x08,
    Lt = 0x09,
    Le = 0x0A,
    Eq = 0x0B,
    Ge = 0x0C,
    Gt = 0x0D,
    Ne = 0x0E,
    Isect = 0x0F,
    Union = 0x10,
    Range = 0x11,
    Uplus = 0x12,
    Uminus = 0x13,
    Percent = 0x14,
    Paren = 0x15,
    MissArg = 0x16,
    Str = 0x17,
    Attr = 0x19,
    Err = 0x1C,
    Bool = 0x1D,
    Int = 0x1E,
    Num = 0x1F,
    Array = 0x20,
    Func = 0x21,
    FuncVar = 0x22,
    Name = 0x23,
    Ref = 0x24,
    Area = 0x25,
    MemArea = 0x26,
    MemErr = 0x27,
    MemNoMem = 0x28,
    MemFunc = 0x29,
    RefErr = 0x2A,
    AreaErr = 0x2B,
    RefN = 0x2C,
    AreaN = 0x2D,
    MemAreaN = 0x2E,
    MemNoMemN = 0x2F,
    NameX = 0x39,
    Ref3d = 0x3A,
    Area3d = 0x3B,
    RefErr3d = 0x3C,
    AreaErr3d = 0x3D,
}

impl PtgId {
    /// Split a raw opcode byte into its base id and (for classed tokens) its class.
    ///
    /// Returns `None` for opcodes outside the supported set, including the BIFF8 extended
    /// `0x18` space and the pre-BIFF5 sheet tokens.
    pub const fn decode(opcode: u8) -> Option<(PtgId, Option<PtgClass>)> {
        if opcode & 0x80 != 0 {
            return None;
        }
        if opcode >= 0x20 {
            let Some(class) = PtgClass::from_opcode(opcode) else {
                return None;
            };
            let id = match (opcode & 0x1F) | 0x20 {
                0x20 => PtgId::Array,
                0x21 => PtgId::Func,
                0x22 => PtgId::FuncVar,
                0x23 => PtgId::Name,
                0x24 => PtgId::Ref,
                0x25 => PtgId::Area,
                0x26 => PtgId::MemArea,
                0x27 => PtgId::MemErr,
                0x28 => PtgId::MemNoMem,
                0x29 => PtgId::MemFunc,
                0x2A => PtgId::RefErr,
                0x2B => PtgId::AreaErr,
                0x2C => PtgId::RefN,
                0x2D => PtgId::AreaN,
                0x2E => PtgId::MemAreaN,
                0x2F => PtgId::MemNoMemN,
                0x39 => PtgId::NameX,
                0x3A => PtgId::Ref3d,
                0x3B => PtgId::Area3d,
                0x3C => PtgId::RefErr3d,
                0x3D => PtgId::AreaErr3d,
                _ => return None,
            };
            return Some((id, Some(class)));
        }

        let id = match opcode {
            0x01 => PtgId::Exp,
            0x02 => PtgId::Tbl,
            0x03 => PtgId::Add,
            0x04 => PtgId::Sub,
            0x05 => PtgId::Mul,
            0x06 => PtgId::Div,
            0x07 => PtgId::Power,
            0x08 => PtgId::Concat,
            0x09 => PtgId::Lt,
            0x0A => PtgId::Le,
            0x0B => PtgId::Eq,
            0x0C => PtgId::Ge,
            0x0D => PtgId::Gt,
            0x0E => PtgId::Ne,
            0x0F => PtgId::Isect,
            0x10 => PtgId::Union,
            0x11 => PtgId::Range,
            0x12 => PtgId::Uplus,
            0x13 => PtgId::Uminus,
            0x14 => PtgId::Percent,
            0x15 => PtgId::Paren,
            0x16 => PtgId::MissArg,
            0x17 => PtgId::Str,
            0x19 => PtgId::Attr,
            0x1C => PtgId::Err,
            0x1D => PtgId::Bool,
            0x1E => PtgId::Int,
            0x1F => PtgId::Num,
            _ => return None,
        };
        Some((id, None))
    }

    /// Full opcode byte for this id in the given class bank.
    pub const fn opcode(self, class: Option<PtgClass>) -> u8 {
        let base = self as u8;
        match class {
            Some(class) if base >= 0x20 => (base & 0x1F) | class.bits(),
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classed_opcodes_split_into_id_and_class() {
        assert_eq!(PtgId::decode(0x24), Some((PtgId::Ref, Some(PtgClass::Reference))));
        assert_eq!(PtgId::decode(0x44), Some((PtgId::Ref, Some(PtgClass::Value))));
        assert_eq!(PtgId::decode(0x64), Some((PtgId::Ref, Some(PtgClass::Array))));
        assert_eq!(PtgId::decode(0x5A), Some((PtgId::Ref3d, Some(PtgClass::Value))));
        assert_eq!(PtgId::decode(0x42), Some((PtgId::FuncVar, Some(PtgClass::Value))));
    }

    #[test]
    fn unsupported_opcodes_are_rejected() {
        for opcode in [0x00, 0x18, 0x1A, 0x1B, 0x30, 0x38, 0x3E, 0x3F, 0x5E, 0xA4] {
            assert_eq!(PtgId::decode(opcode), None, "opcode {opcode:#04x}");
        }
    }

    #[test]
    fn opcode_rebuilds_the_original_byte() {
        for opcode in 0u8..=0x7F {
            if let Some((id, class)) = PtgId::decode(opcode) {
                assert_eq!(id.opcode(class), opcode, "opcode {opcode:#04x}");
            }
        }
    }
}
