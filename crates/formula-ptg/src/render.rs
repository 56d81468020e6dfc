//! Token stream -> formula text.

use formula_model::{
    format_number, format_sheet_span, quote_sheet_name, sheet_name_needs_quotes, CellRef,
    SheetLimits,
};

use crate::ftab::{self, USER_DEFINED_FUNCTION};
use crate::ptg::{Attr, Ptg, SpaceKind, UnaryOp};
use crate::RenderError;

/// What an external-sheet index points at, as far as formula text is concerned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetLabel {
    /// One sheet (`first == last`) or a span of sheets in this workbook.
    Local { first: String, last: String },
    /// A sheet in another workbook.
    External { book: String, sheet: String },
    /// The target no longer exists; `name` is the last known sheet name, if any.
    Deleted { name: Option<String> },
}

/// Lookups needed to turn indices stored in tokens back into names.
pub trait RenderContext {
    fn sheet_label(&self, ixti: u16) -> SheetLabel;

    /// Text of the defined name at 1-based `index`.
    fn defined_name(&self, index: u16) -> Option<String>;

    /// Text of an external or add-in name.
    fn extern_name(&self, ixti: u16, index: u16) -> Option<String>;

    fn limits(&self) -> SheetLimits {
        SheetLimits::default()
    }
}

/// Context with no workbook behind it: every sheet index is unknown.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoContext;

impl RenderContext for NoContext {
    fn sheet_label(&self, _ixti: u16) -> SheetLabel {
        SheetLabel::Deleted { name: None }
    }

    fn defined_name(&self, _index: u16) -> Option<String> {
        None
    }

    fn extern_name(&self, _ixti: u16, _index: u16) -> Option<String> {
        None
    }
}

/// Render tokens as A1-style formula text (without the leading `=`).
///
/// `origin` is the cell the formula belongs to; relative `PtgRefN`/`PtgAreaN` tokens are
/// resolved against it.
pub fn render_formula(
    ptgs: &[Ptg],
    ctx: &dyn RenderContext,
    origin: CellRef,
) -> Result<String, RenderError> {
    let limits = ctx.limits();
    let mut stack: Vec<String> = Vec::new();
    let mut pending: Option<(SpaceKind, String)> = None;

    for (index, ptg) in ptgs.iter().enumerate() {
        let needed = match ptg {
            Ptg::Func { iftab, .. } => match ftab::fixed_arity(*iftab) {
                Some(n) => usize::from(n),
                None => {
                    return Err(RenderError::UnknownFunction {
                        index,
                        iftab: *iftab,
                    })
                }
            },
            other => other.operand_count().unwrap_or(0),
        };
        if stack.len() < needed {
            return Err(RenderError::StackUnderflow {
                index,
                ptg: ptg.opcode(),
                needed,
                available: stack.len(),
            });
        }

        let lead = match &pending {
            Some((kind, text))
                if !matches!(
                    kind,
                    SpaceKind::SpaceBeforeCloseParen | SpaceKind::CrBeforeCloseParen
                ) =>
            {
                text.clone()
            }
            _ => String::new(),
        };

        let text = match ptg {
            Ptg::Exp { .. } | Ptg::Tbl { .. } => {
                return Err(RenderError::UnresolvedPlaceholder { index })
            }
            Ptg::Attr(Attr::Space { kind, count, .. }) => {
                let ch = if kind.is_line_break() { "\n" } else { " " };
                pending = Some((*kind, ch.repeat(usize::from(*count))));
                continue;
            }
            Ptg::Attr(Attr::Sum { .. }) => {
                let arg = pop(&mut stack);
                format!("{lead}SUM({arg})")
            }
            Ptg::Attr(_) | Ptg::Mem(_) => continue,
            Ptg::Binary(op) => {
                let right = pop(&mut stack);
                let left = pop(&mut stack);
                format!("{left}{lead}{}{right}", op.symbol())
            }
            Ptg::Unary(UnaryOp::Percent) => {
                let arg = pop(&mut stack);
                format!("{arg}{lead}%")
            }
            Ptg::Unary(op) => {
                let arg = pop(&mut stack);
                let sym = if *op == UnaryOp::Minus { "-" } else { "+" };
                format!("{lead}{sym}{arg}")
            }
            Ptg::Paren => {
                let inner = pop(&mut stack);
                let close = match &pending {
                    Some((SpaceKind::SpaceBeforeCloseParen | SpaceKind::CrBeforeCloseParen, t)) => {
                        t.as_str()
                    }
                    _ => "",
                };
                format!("{lead}({inner}{close})")
            }
            Ptg::MissArg => lead,
            Ptg::Str(s) => format!("{lead}\"{}\"", s.text.replace('"', "\"\"")),
            Ptg::Err(e) => format!("{lead}{}", e.as_str()),
            Ptg::Bool(raw) => format!("{lead}{}", if *raw != 0 { "TRUE" } else { "FALSE" }),
            Ptg::Int(n) => format!("{lead}{n}"),
            Ptg::Num(n) => format!("{lead}{}", format_number(*n)),
            Ptg::Array { value, .. } => format!("{lead}{}", value.to_formula_text()),
            Ptg::Func { iftab, .. } => {
                let args = pop_args(&mut stack, needed);
                let name = ftab::function_name(*iftab).unwrap_or("#NAME?");
                format!("{lead}{name}({})", args.join(","))
            }
            Ptg::FuncVar { iftab, argc, .. } => {
                let mut args = pop_args(&mut stack, usize::from(*argc));
                let name = if *iftab == USER_DEFINED_FUNCTION && !args.is_empty() {
                    args.remove(0)
                } else {
                    match ftab::function_name(*iftab) {
                        Some(name) => name.to_string(),
                        None => {
                            return Err(RenderError::UnknownFunction {
                                index,
                                iftab: *iftab,
                            })
                        }
                    }
                };
                format!("{lead}{name}({})", args.join(","))
            }
            Ptg::Name { index: name, .. } => {
                let text = ctx.defined_name(*name).unwrap_or_else(|| "#NAME?".to_string());
                format!("{lead}{text}")
            }
            Ptg::NameX {
                ixti, index: name, ..
            } => {
                let text = ctx
                    .extern_name(*ixti, *name)
                    .unwrap_or_else(|| "#NAME?".to_string());
                format!("{lead}{text}")
            }
            Ptg::Ref { addr, .. } => format!("{lead}{}", addr.to_a1()),
            Ptg::Area { area, .. } => format!("{lead}{}", area.to_a1(&limits)),
            Ptg::RefErr { .. } | Ptg::AreaErr { .. } => format!("{lead}#REF!"),
            Ptg::RefN { addr, .. } => format!("{lead}{}", addr.resolve(origin, &limits).to_a1()),
            Ptg::AreaN { area, .. } => {
                format!("{lead}{}", area.resolve(origin, &limits).to_a1(&limits))
            }
            Ptg::Ref3d { ixti, addr, .. } => {
                format!("{lead}{}", qualified(ctx.sheet_label(*ixti), &addr.to_a1()))
            }
            Ptg::Area3d { ixti, area, .. } => format!(
                "{lead}{}",
                qualified(ctx.sheet_label(*ixti), &area.to_a1(&limits))
            ),
            Ptg::RefErr3d { ixti, .. } | Ptg::AreaErr3d { ixti, .. } => {
                format!("{lead}{}", broken(ctx.sheet_label(*ixti)))
            }
        };
        pending = None;
        stack.push(text);
    }

    match stack.len() {
        1 => Ok(stack.pop().unwrap_or_default()),
        remaining => Err(RenderError::StackNotSingular { remaining }),
    }
}

fn pop(stack: &mut Vec<String>) -> String {
    stack.pop().unwrap_or_default()
}

fn pop_args(stack: &mut Vec<String>, n: usize) -> Vec<String> {
    let at = stack.len().saturating_sub(n);
    stack.split_off(at)
}

/// `Sheet!A1`, or the broken form when the sheet is gone.
fn qualified(label: SheetLabel, a1: &str) -> String {
    match label {
        SheetLabel::Local { first, last } => format!("{}!{a1}", format_sheet_span(&first, &last)),
        SheetLabel::External { book, sheet } => {
            if sheet_name_needs_quotes(&sheet) {
                format!("'[{book}]{}'!{a1}", sheet.replace('\'', "''"))
            } else {
                format!("[{book}]{sheet}!{a1}")
            }
        }
        deleted @ SheetLabel::Deleted { .. } => broken(deleted),
    }
}

/// `Sheet1!#REF!` when a sheet name is known, bare `#REF!` otherwise.
fn broken(label: SheetLabel) -> String {
    let name = match label {
        SheetLabel::Local { first, .. } => Some(first),
        SheetLabel::External { sheet, .. } => Some(sheet),
        SheetLabel::Deleted { name } => name,
    };
    match name {
        Some(name) => format!("{}!#REF!", quote_sheet_name(&name)),
        None => "#REF!".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptg::BinaryOp;
    use formula_model::CellAddr;

    #[test]
    fn binary_operators_render_infix() {
        let ptgs = [Ptg::Int(1), Ptg::Int(2), Ptg::Binary(BinaryOp::Mul)];
        assert_eq!(
            render_formula(&ptgs, &NoContext, CellRef::new(0, 0)).unwrap(),
            "1*2"
        );
    }

    #[test]
    fn whitespace_is_attached_to_the_next_token() {
        let ptgs = [
            Ptg::Int(1),
            Ptg::Attr(Attr::Space {
                kind: SpaceKind::SpaceBefore,
                count: 1,
                volatile: false,
            }),
            Ptg::Int(2),
            Ptg::Binary(BinaryOp::Add),
        ];
        assert_eq!(
            render_formula(&ptgs, &NoContext, CellRef::new(0, 0)).unwrap(),
            "1+ 2"
        );
    }

    #[test]
    fn missing_operands_are_reported() {
        let ptgs = [Ptg::Int(1), Ptg::Binary(BinaryOp::Add)];
        assert_eq!(
            render_formula(&ptgs, &NoContext, CellRef::new(0, 0)),
            Err(RenderError::StackUnderflow {
                index: 1,
                ptg: 0x03,
                needed: 2,
                available: 1,
            })
        );
    }

    #[test]
    fn deleted_sheet_without_name_renders_bare_ref_error() {
        let ptgs = [Ptg::Ref3d {
            class: crate::PtgClass::Reference,
            ixti: 9,
            addr: CellAddr::new(0, 0, true, true),
        }];
        assert_eq!(
            render_formula(&ptgs, &NoContext, CellRef::new(0, 0)).unwrap(),
            "#REF!"
        );
    }
}
