//! Binary rgce/rgcb codec.
//!
//! `rgce` holds the tokens back to back. Tokens whose payload is not fixed by the opcode
//! (array constants, memory areas) keep their extra data in `rgcb`, a block stored right
//! after the token stream and consumed in token order.

use formula_model::{AreaAddr, CellAddr, CellRef, ErrorValue, Range};

use crate::array::ArrayConstant;
use crate::opcode::{PtgClass, PtgId};
use crate::ptg::{Attr, BinaryOp, MemKind, MemPtg, Ptg, SpaceKind, UnaryOp};
use crate::reader::Reader;
use crate::refs::{pack_col, unpack_cell, RelAreaAddr, RelCellAddr};
use crate::strings::{read_short, write_short};
use crate::{DecodeRgceError, EncodeRgceError};

const ATTR_SEMI: u8 = 0x01;
const ATTR_IF: u8 = 0x02;
const ATTR_CHOOSE: u8 = 0x04;
const ATTR_GOTO: u8 = 0x08;
const ATTR_SUM: u8 = 0x10;
const ATTR_BAXCEL: u8 = 0x20;
const ATTR_SPACE: u8 = 0x40;

/// Token stream plus its trailing value block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedRgce {
    pub rgce: Vec<u8>,
    pub rgcb: Vec<u8>,
}

/// Decode a token stream that carries no trailing data block.
pub fn decode_rgce(rgce: &[u8]) -> Result<Vec<Ptg>, DecodeRgceError> {
    decode_rgce_with_rgcb(rgce, &[])
}

/// Decode a token stream together with its trailing `rgcb` block.
pub fn decode_rgce_with_rgcb(rgce: &[u8], rgcb: &[u8]) -> Result<Vec<Ptg>, DecodeRgceError> {
    let mut r = Reader::new(rgce);
    let mut extra = Reader::new(rgcb);
    let mut out = Vec::new();
    while !r.is_empty() {
        let offset = r.pos();
        let opcode = r.u8()?;
        r.begin_token(offset, opcode);
        extra.begin_token(offset, opcode);
        out.push(decode_ptg(opcode, &mut r, &mut extra)?);
    }
    Ok(out)
}

fn decode_ptg(
    opcode: u8,
    r: &mut Reader<'_>,
    extra: &mut Reader<'_>,
) -> Result<Ptg, DecodeRgceError> {
    let offset = r.ptg_offset();
    let Some((id, class)) = PtgId::decode(opcode) else {
        return Err(DecodeRgceError::UnsupportedToken { offset, ptg: opcode });
    };
    // Classed ids always carry a class; the fallback is never observed.
    let class = class.unwrap_or(PtgClass::Reference);

    let ptg = match id {
        PtgId::Exp => Ptg::Exp {
            row: r.u16()?,
            col: r.u16()?,
        },
        PtgId::Tbl => Ptg::Tbl {
            row: r.u16()?,
            col: r.u16()?,
        },
        PtgId::Add => Ptg::Binary(BinaryOp::Add),
        PtgId::Sub => Ptg::Binary(BinaryOp::Sub),
        PtgId::Mul => Ptg::Binary(BinaryOp::Mul),
        PtgId::Div => Ptg::Binary(BinaryOp::Div),
        PtgId::Power => Ptg::Binary(BinaryOp::Power),
        PtgId::Concat => Ptg::Binary(BinaryOp::Concat),
        PtgId::Lt => Ptg::Binary(BinaryOp::Lt),
        PtgId::Le => Ptg::Binary(BinaryOp::Le),
        PtgId::Eq => Ptg::Binary(BinaryOp::Eq),
        PtgId::Ge => Ptg::Binary(BinaryOp::Ge),
        PtgId::Gt => Ptg::Binary(BinaryOp::Gt),
        PtgId::Ne => Ptg::Binary(BinaryOp::Ne),
        PtgId::Isect => Ptg::Binary(BinaryOp::Isect),
        PtgId::Union => Ptg::Binary(BinaryOp::Union),
        PtgId::Range => Ptg::Binary(BinaryOp::Range),
        PtgId::Uplus => Ptg::Unary(UnaryOp::Plus),
        PtgId::Uminus => Ptg::Unary(UnaryOp::Minus),
        PtgId::Percent => Ptg::Unary(UnaryOp::Percent),
        PtgId::Paren => Ptg::Paren,
        PtgId::MissArg => Ptg::MissArg,
        PtgId::Str => Ptg::Str(read_short(r)?),
        PtgId::Attr => Ptg::Attr(decode_attr(r)?),
        PtgId::Err => {
            let code = r.u8()?;
            Ptg::Err(
                ErrorValue::from_biff_code(code)
                    .ok_or(DecodeRgceError::InvalidErrorCode { offset, code })?,
            )
        }
        PtgId::Bool => Ptg::Bool(r.u8()?),
        PtgId::Int => Ptg::Int(r.u16()?),
        PtgId::Num => Ptg::Num(r.f64()?),
        PtgId::Array => {
            let reserved = r.array::<7>()?;
            let value = ArrayConstant::read(extra).map_err(rgcb_error)?;
            Ptg::Array {
                class,
                reserved,
                value,
            }
        }
        PtgId::Func => Ptg::Func {
            class,
            iftab: r.u16()?,
        },
        PtgId::FuncVar => {
            let argc = r.u8()?;
            let iftab = r.u16()?;
            Ptg::FuncVar {
                class,
                argc: argc & 0x7F,
                prompt: argc & 0x80 != 0,
                iftab: iftab & 0x7FFF,
                command: iftab & 0x8000 != 0,
            }
        }
        PtgId::Name => Ptg::Name {
            class,
            index: r.u16()?,
            reserved: r.u16()?,
        },
        PtgId::NameX => Ptg::NameX {
            class,
            ixti: r.u16()?,
            index: r.u16()?,
            reserved: r.u16()?,
        },
        PtgId::Ref => {
            let row = r.u16()?;
            let col = r.u16()?;
            Ptg::Ref {
                class,
                addr: unpack_cell(row, col),
            }
        }
        PtgId::Area => Ptg::Area {
            class,
            area: read_area(r)?,
        },
        PtgId::MemArea
        | PtgId::MemErr
        | PtgId::MemNoMem
        | PtgId::MemFunc
        | PtgId::MemAreaN
        | PtgId::MemNoMemN => Ptg::Mem(decode_mem(id, class, r, extra)?),
        PtgId::RefErr => Ptg::RefErr {
            class,
            reserved: r.array()?,
        },
        PtgId::AreaErr => Ptg::AreaErr {
            class,
            reserved: r.array()?,
        },
        PtgId::RefN => {
            let row = r.u16()?;
            let col = r.u16()?;
            Ptg::RefN {
                class,
                addr: RelCellAddr::unpack(row, col),
            }
        }
        PtgId::AreaN => {
            let row1 = r.u16()?;
            let row2 = r.u16()?;
            let col1 = r.u16()?;
            let col2 = r.u16()?;
            Ptg::AreaN {
                class,
                area: RelAreaAddr {
                    first: RelCellAddr::unpack(row1, col1),
                    last: RelCellAddr::unpack(row2, col2),
                },
            }
        }
        PtgId::Ref3d => {
            let ixti = r.u16()?;
            let row = r.u16()?;
            let col = r.u16()?;
            Ptg::Ref3d {
                class,
                ixti,
                addr: unpack_cell(row, col),
            }
        }
        PtgId::Area3d => Ptg::Area3d {
            class,
            ixti: r.u16()?,
            area: read_area(r)?,
        },
        PtgId::RefErr3d => Ptg::RefErr3d {
            class,
            ixti: r.u16()?,
            reserved: r.array()?,
        },
        PtgId::AreaErr3d => Ptg::AreaErr3d {
            class,
            ixti: r.u16()?,
            reserved: r.array()?,
        },
    };
    Ok(ptg)
}

fn rgcb_error(err: DecodeRgceError) -> DecodeRgceError {
    match err {
        DecodeRgceError::UnexpectedEof { offset, ptg, .. } => {
            DecodeRgceError::TruncatedRgcb { offset, ptg }
        }
        other => other,
    }
}

fn read_area(r: &mut Reader<'_>) -> Result<AreaAddr, DecodeRgceError> {
    let row1 = r.u16()?;
    let row2 = r.u16()?;
    let col1 = r.u16()?;
    let col2 = r.u16()?;
    Ok(AreaAddr::new(unpack_cell(row1, col1), unpack_cell(row2, col2)))
}

fn decode_attr(r: &mut Reader<'_>) -> Result<Attr, DecodeRgceError> {
    let grbit = r.u8()?;
    let data = r.u16()?;
    Ok(match grbit {
        ATTR_SEMI => Attr::Semi { data },
        ATTR_IF => Attr::If { offset: data },
        ATTR_CHOOSE => {
            let mut offsets = Vec::with_capacity(usize::from(data) + 1);
            for _ in 0..=data {
                offsets.push(r.u16()?);
            }
            Attr::Choose { offsets }
        }
        ATTR_GOTO => Attr::Goto { offset: data },
        ATTR_SUM => Attr::Sum { data },
        g if g & !ATTR_SEMI == ATTR_BAXCEL => Attr::Baxcel {
            volatile: g & ATTR_SEMI != 0,
            data,
        },
        g if g & !ATTR_SEMI == ATTR_SPACE => {
            let [kind, count] = data.to_le_bytes();
            Attr::Space {
                kind: SpaceKind::from_byte(kind),
                count,
                volatile: g & ATTR_SEMI != 0,
            }
        }
        grbit => {
            log::warn!(
                "unknown PtgAttr grbit {grbit:#04x} at rgce offset {}",
                r.ptg_offset()
            );
            Attr::Other { grbit, data }
        }
    })
}

fn decode_mem(
    id: PtgId,
    class: PtgClass,
    r: &mut Reader<'_>,
    extra: &mut Reader<'_>,
) -> Result<MemPtg, DecodeRgceError> {
    let kind = match id {
        PtgId::MemArea => MemKind::Area,
        PtgId::MemErr => MemKind::Err,
        PtgId::MemNoMem => MemKind::NoMem,
        PtgId::MemFunc => MemKind::Func,
        PtgId::MemAreaN => MemKind::AreaN,
        _ => MemKind::NoMemN,
    };
    let reserved = if kind.has_reserved() {
        r.array()?
    } else {
        [0; 4]
    };
    let cce = r.u16()?;
    let mut areas = Vec::new();
    if kind == MemKind::Area {
        let count = extra.u16().map_err(rgcb_error)?;
        for _ in 0..count {
            let row_first = extra.u16().map_err(rgcb_error)?;
            let row_last = extra.u16().map_err(rgcb_error)?;
            let col_first = extra.u16().map_err(rgcb_error)?;
            let col_last = extra.u16().map_err(rgcb_error)?;
            areas.push(Range {
                start: CellRef::new(u32::from(row_first), u32::from(col_first)),
                end: CellRef::new(u32::from(row_last), u32::from(col_last)),
            });
        }
    }
    Ok(MemPtg {
        kind,
        class,
        reserved,
        cce,
        areas,
    })
}

/// Encode tokens back into their binary form.
///
/// Reserved bytes captured at decode time are written back unchanged.
pub fn encode_rgce(ptgs: &[Ptg]) -> Result<EncodedRgce, EncodeRgceError> {
    let mut out = EncodedRgce::default();
    for ptg in ptgs {
        encode_ptg(ptg, &mut out)?;
    }
    Ok(out)
}

fn encode_ptg(ptg: &Ptg, out: &mut EncodedRgce) -> Result<(), EncodeRgceError> {
    let rgce = &mut out.rgce;
    rgce.push(ptg.opcode());
    match ptg {
        Ptg::Exp { row, col } | Ptg::Tbl { row, col } => {
            put_u16(rgce, *row);
            put_u16(rgce, *col);
        }
        Ptg::Binary(_) | Ptg::Unary(_) | Ptg::Paren | Ptg::MissArg => {}
        Ptg::Str(s) => write_short(s, rgce)?,
        Ptg::Attr(attr) => encode_attr(attr, rgce),
        Ptg::Err(e) => rgce.push(e.biff_code()),
        Ptg::Bool(raw) => rgce.push(*raw),
        Ptg::Int(n) => put_u16(rgce, *n),
        Ptg::Num(n) => rgce.extend_from_slice(&n.to_le_bytes()),
        Ptg::Array {
            reserved, value, ..
        } => {
            rgce.extend_from_slice(reserved);
            value.write(&mut out.rgcb)?;
        }
        Ptg::Func { iftab, .. } => put_u16(rgce, *iftab),
        Ptg::FuncVar {
            argc,
            prompt,
            iftab,
            command,
            ..
        } => {
            if *argc > 0x7F {
                return Err(EncodeRgceError::TooManyArguments { argc: *argc });
            }
            if *iftab > 0x7FFF {
                return Err(EncodeRgceError::FunctionIdOutOfRange { iftab: *iftab });
            }
            rgce.push(argc | if *prompt { 0x80 } else { 0 });
            put_u16(rgce, iftab | if *command { 0x8000 } else { 0 });
        }
        Ptg::Name {
            index, reserved, ..
        } => {
            put_u16(rgce, *index);
            put_u16(rgce, *reserved);
        }
        Ptg::NameX {
            ixti,
            index,
            reserved,
            ..
        } => {
            put_u16(rgce, *ixti);
            put_u16(rgce, *index);
            put_u16(rgce, *reserved);
        }
        Ptg::Ref { addr, .. } => put_cell(rgce, *addr)?,
        Ptg::Area { area, .. } => put_area(rgce, area)?,
        Ptg::Mem(mem) => {
            if mem.kind.has_reserved() {
                rgce.extend_from_slice(&mem.reserved);
            }
            put_u16(rgce, mem.cce);
            if mem.kind == MemKind::Area {
                let count = u16::try_from(mem.areas.len())
                    .map_err(|_| EncodeRgceError::ListTooLong { len: mem.areas.len() })?;
                put_u16(&mut out.rgcb, count);
                for area in &mem.areas {
                    for v in [area.start.row, area.end.row, area.start.col, area.end.col] {
                        let v = u16::try_from(v).map_err(|_| EncodeRgceError::AddressOutOfRange {
                            row: area.end.row,
                            col: area.end.col,
                        })?;
                        put_u16(&mut out.rgcb, v);
                    }
                }
            }
        }
        Ptg::RefErr { reserved, .. } => rgce.extend_from_slice(reserved),
        Ptg::AreaErr { reserved, .. } => rgce.extend_from_slice(reserved),
        Ptg::RefN { addr, .. } => {
            put_u16(rgce, addr.row);
            put_u16(rgce, addr.col_field());
        }
        Ptg::AreaN { area, .. } => {
            put_u16(rgce, area.first.row);
            put_u16(rgce, area.last.row);
            put_u16(rgce, area.first.col_field());
            put_u16(rgce, area.last.col_field());
        }
        Ptg::Ref3d { ixti, addr, .. } => {
            put_u16(rgce, *ixti);
            put_cell(rgce, *addr)?;
        }
        Ptg::Area3d { ixti, area, .. } => {
            put_u16(rgce, *ixti);
            put_area(rgce, area)?;
        }
        Ptg::RefErr3d { ixti, reserved, .. } => {
            put_u16(rgce, *ixti);
            rgce.extend_from_slice(reserved);
        }
        Ptg::AreaErr3d { ixti, reserved, .. } => {
            put_u16(rgce, *ixti);
            rgce.extend_from_slice(reserved);
        }
    }
    Ok(())
}

fn encode_attr(attr: &Attr, rgce: &mut Vec<u8>) {
    rgce.push(attr.grbit());
    match attr {
        Attr::Semi { data }
        | Attr::Sum { data }
        | Attr::Baxcel { data, .. }
        | Attr::Other { data, .. } => put_u16(rgce, *data),
        Attr::If { offset } | Attr::Goto { offset } => put_u16(rgce, *offset),
        Attr::Choose { offsets } => {
            put_u16(rgce, offsets.len().saturating_sub(1) as u16);
            for offset in offsets {
                put_u16(rgce, *offset);
            }
        }
        Attr::Space { kind, count, .. } => {
            rgce.push(kind.to_byte());
            rgce.push(*count);
        }
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn check_cell(addr: CellAddr) -> Result<u16, EncodeRgceError> {
    if addr.row > u32::from(u16::MAX) || addr.col > 0x3FFF {
        return Err(EncodeRgceError::AddressOutOfRange {
            row: addr.row,
            col: addr.col,
        });
    }
    Ok(addr.row as u16)
}

fn put_cell(out: &mut Vec<u8>, addr: CellAddr) -> Result<(), EncodeRgceError> {
    let row = check_cell(addr)?;
    put_u16(out, row);
    put_u16(out, pack_col(addr.col, addr.row_relative, addr.col_relative));
    Ok(())
}

fn put_area(out: &mut Vec<u8>, area: &AreaAddr) -> Result<(), EncodeRgceError> {
    let row1 = check_cell(area.first)?;
    let row2 = check_cell(area.last)?;
    put_u16(out, row1);
    put_u16(out, row2);
    put_u16(
        out,
        pack_col(area.first.col, area.first.row_relative, area.first.col_relative),
    );
    put_u16(
        out,
        pack_col(area.last.col, area.last.row_relative, area.last.col_relative),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_plus_two() {
        let ptgs = decode_rgce(&[0x1E, 1, 0, 0x1E, 2, 0, 0x03]).unwrap();
        assert_eq!(ptgs, vec![Ptg::Int(1), Ptg::Int(2), Ptg::Binary(BinaryOp::Add)]);
    }

    #[test]
    fn unknown_opcode_is_reported_with_offset() {
        let err = decode_rgce(&[0x1E, 1, 0, 0x18, 0x00]).unwrap_err();
        assert_eq!(err, DecodeRgceError::UnsupportedToken { offset: 3, ptg: 0x18 });
    }

    #[test]
    fn truncated_payload_reports_missing_bytes() {
        let err = decode_rgce(&[0x1F, 0, 0, 0]).unwrap_err();
        assert_eq!(
            err,
            DecodeRgceError::UnexpectedEof {
                offset: 0,
                ptg: 0x1F,
                needed: 8,
                remaining: 3,
            }
        );
    }

    #[test]
    fn func_var_flags_are_split_from_payload() {
        let ptgs = decode_rgce(&[0x42, 0x82, 0x04, 0x80]).unwrap();
        assert_eq!(
            ptgs,
            vec![Ptg::FuncVar {
                class: PtgClass::Value,
                argc: 2,
                prompt: true,
                iftab: 4,
                command: true,
            }]
        );
        assert_eq!(encode_rgce(&ptgs).unwrap().rgce, vec![0x42, 0x82, 0x04, 0x80]);
    }

    #[test]
    fn choose_jump_table_is_sized_by_count() {
        // Two choices: three offsets.
        let bytes = [0x19, 0x04, 0x02, 0x00, 0x06, 0x00, 0x0A, 0x00, 0x0E, 0x00];
        let ptgs = decode_rgce(&bytes).unwrap();
        assert_eq!(
            ptgs,
            vec![Ptg::Attr(Attr::Choose {
                offsets: vec![6, 10, 14]
            })]
        );
        assert_eq!(encode_rgce(&ptgs).unwrap().rgce, bytes.to_vec());
    }

    #[test]
    fn array_without_rgcb_is_truncated() {
        let err = decode_rgce(&[0x60, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err, DecodeRgceError::TruncatedRgcb { offset: 0, ptg: 0x60 });
    }

    #[test]
    fn unknown_attr_bits_are_kept() {
        let bytes = [0x19, 0x80, 0x34, 0x12];
        let ptgs = decode_rgce(&bytes).unwrap();
        assert_eq!(
            ptgs,
            vec![Ptg::Attr(Attr::Other {
                grbit: 0x80,
                data: 0x1234
            })]
        );
        assert_eq!(encode_rgce(&ptgs).unwrap().rgce, bytes.to_vec());
    }

    #[test]
    fn bool_payload_byte_is_kept() {
        let ptgs = decode_rgce(&[0x1D, 0x02]).unwrap();
        assert_eq!(ptgs, vec![Ptg::Bool(2)]);
        assert_eq!(encode_rgce(&ptgs).unwrap().rgce, vec![0x1D, 0x02]);
    }

    #[test]
    fn out_of_grid_addresses_cannot_be_encoded() {
        let ptg = Ptg::cell(CellAddr::new(70_000, 0, false, false));
        assert!(matches!(
            encode_rgce(&[ptg]),
            Err(EncodeRgceError::AddressOutOfRange { row: 70_000, .. })
        ));
    }
}
