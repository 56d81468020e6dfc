//! The RPN stack machine.
//!
//! Tokens are consumed left to right. Each token pops the operands its arity calls for (the
//! last one popped is its leftmost operand) and pushes exactly one result. Spreadsheet
//! errors are values on the stack; only an inconsistent token stream ends evaluation early.

use formula_model::{CalcSettings, ErrorValue};
use formula_ptg::ftab::{self, USER_DEFINED_FUNCTION};
use formula_ptg::{Attr, BinaryOp, Ptg, PtgClass, UnaryOp};

use crate::broadcast::{broadcast_binary, broadcast_unary};
use crate::coercion::{to_number, to_text};
use crate::compare::compare_op;
use crate::error::EvalError;
use crate::functions::{CallContext, FunctionCall, FunctionDispatch, NotSupported};
use crate::resolve::{
    array_value, intersect_operator, intersection_cell, range_operator, resolve_reference,
    scalar_value, EvalContext,
};
use crate::value::{ArrayValue, Operand, Reference, SheetArea, Value};
use crate::workbook::Workbook;

/// A stack entry. Add-in function names only make sense as the callee of a
/// user-defined call; anywhere else they read as `#NAME?`.
#[derive(Debug, Clone, PartialEq)]
enum Item {
    Operand(Operand),
    Callee(String),
}

impl Item {
    fn into_operand(self) -> Operand {
        match self {
            Item::Operand(op) => op,
            Item::Callee(_) => Operand::error(ErrorValue::Name),
        }
    }
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        Item::Operand(Operand::Value(value))
    }
}

impl From<Operand> for Item {
    fn from(value: Operand) -> Self {
        Item::Operand(value)
    }
}

pub struct Evaluator<'a> {
    workbook: &'a dyn Workbook,
    functions: &'a dyn FunctionDispatch,
    settings: &'a CalcSettings,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        workbook: &'a dyn Workbook,
        functions: &'a dyn FunctionDispatch,
        settings: &'a CalcSettings,
    ) -> Self {
        Self {
            workbook,
            functions,
            settings,
        }
    }

    /// Result of a formula in a single cell. References are read through implicit
    /// intersection and array results collapse to their first element.
    pub fn evaluate(&self, tokens: &[Ptg], ctx: EvalContext) -> Result<Value, EvalError> {
        let result = self.evaluate_operand(tokens, ctx)?;
        Ok(scalar_value(&result, ctx, self.workbook).into_scalar())
    }

    /// Result of an array formula: references are materialized as arrays.
    pub fn evaluate_array(&self, tokens: &[Ptg], ctx: EvalContext) -> Result<Value, EvalError> {
        let result = self.evaluate_operand(tokens, ctx)?;
        Ok(array_value(&result, self.workbook, self.settings.max_array_cells))
    }

    /// The raw stack result, which may still be a reference.
    pub fn evaluate_operand(
        &self,
        tokens: &[Ptg],
        ctx: EvalContext,
    ) -> Result<Operand, EvalError> {
        self.run(tokens, ctx, 0)
    }

    fn run(&self, tokens: &[Ptg], ctx: EvalContext, depth: u32) -> Result<Operand, EvalError> {
        let mut stack: Vec<Item> = Vec::with_capacity(tokens.len());
        for (index, ptg) in tokens.iter().enumerate() {
            let needed = ptg.operand_count().ok_or_else(|| match ptg {
                Ptg::Func { iftab, .. } => EvalError::UnknownFunctionArity {
                    index,
                    iftab: *iftab,
                },
                _ => EvalError::UnsupportedInEvaluation {
                    index,
                    ptg: ptg.opcode(),
                },
            })?;
            if stack.len() < needed {
                return Err(EvalError::StackUnderflow {
                    index,
                    ptg: ptg.opcode(),
                    needed,
                    available: stack.len(),
                });
            }
            let args = stack.split_off(stack.len() - needed);

            let result: Item = match ptg {
                Ptg::Exp { .. } | Ptg::Tbl { .. } => {
                    return Err(EvalError::UnsupportedInEvaluation {
                        index,
                        ptg: ptg.opcode(),
                    })
                }
                Ptg::Attr(Attr::Sum { .. }) => self.call_builtin(ftab::SUM, args, ctx),
                Ptg::Attr(_) | Ptg::Paren | Ptg::Mem(_) => continue,
                Ptg::MissArg => Operand::Missing.into(),
                Ptg::Str(s) => Value::Text(s.text.clone()).into(),
                Ptg::Err(e) => Value::Error(*e).into(),
                Ptg::Bool(raw) => Value::Bool(*raw != 0).into(),
                Ptg::Int(n) => Value::Number(f64::from(*n)).into(),
                Ptg::Num(n) => Value::Number(*n).into(),
                Ptg::Array { value, .. } => {
                    if value.rows * value.cols > self.settings.max_array_cells {
                        Value::Error(ErrorValue::Num).into()
                    } else {
                        Value::Array(ArrayValue::from(value)).into()
                    }
                }
                Ptg::Binary(op) => {
                    let [left, right] = pair(args);
                    self.binary(*op, left.into_operand(), right.into_operand())
                        .into()
                }
                Ptg::Unary(op) => {
                    let operand = single(args).into_operand();
                    self.unary(*op, operand).into()
                }
                Ptg::Func { iftab, .. } => self.call_builtin(*iftab, args, ctx),
                Ptg::FuncVar { iftab, .. } if *iftab == USER_DEFINED_FUNCTION => {
                    self.call_user(args, ctx)
                }
                Ptg::FuncVar { iftab, .. } => self.call_builtin(*iftab, args, ctx),
                Ptg::Name { class, index: name, .. } => {
                    match self.defined_name(*name, ctx, depth)? {
                        Item::Operand(op) => self.apply_class(*class, op, ctx).into(),
                        callee => callee,
                    }
                }
                Ptg::NameX {
                    class,
                    ixti,
                    index: name,
                    ..
                } => match self.extern_name(*ixti, *name, ctx, depth)? {
                    Item::Operand(op) => self.apply_class(*class, op, ctx).into(),
                    callee => callee,
                },
                _ => {
                    let limits = self.settings.limits;
                    let Some(op) = resolve_reference(ptg, ctx, self.workbook, &limits) else {
                        return Err(EvalError::UnsupportedInEvaluation {
                            index,
                            ptg: ptg.opcode(),
                        });
                    };
                    match ptg.class() {
                        Some(class) => self.apply_class(class, op, ctx).into(),
                        None => op.into(),
                    }
                }
            };
            stack.push(result);
        }

        match stack.len() {
            1 => match stack.pop() {
                Some(item) => Ok(item.into_operand()),
                None => Err(EvalError::MalformedStack { remaining: 0 }),
            },
            remaining => Err(EvalError::MalformedStack { remaining }),
        }
    }

    /// Adapt a reference to the class its token was stored with: value-class references
    /// shrink to one cell by implicit intersection, array-class references become arrays.
    fn apply_class(&self, class: PtgClass, operand: Operand, ctx: EvalContext) -> Operand {
        let Operand::Ref(reference) = operand else {
            return operand;
        };
        match class {
            PtgClass::Reference => Operand::Ref(reference),
            PtgClass::Value => match intersection_cell(&reference, ctx) {
                Some((sheet, cell)) => Operand::Ref(Reference::new(SheetArea::cell(sheet, cell))),
                None => Operand::error(ErrorValue::Value),
            },
            PtgClass::Array => Operand::Value(array_value(
                &Operand::Ref(reference),
                self.workbook,
                self.settings.max_array_cells,
            )),
        }
    }

    fn binary(&self, op: BinaryOp, left: Operand, right: Operand) -> Operand {
        if op.is_reference_operator() {
            return match (left, right) {
                (Operand::Ref(l), Operand::Ref(r)) => {
                    let combined = match op {
                        BinaryOp::Range => range_operator(&l, &r),
                        BinaryOp::Isect => intersect_operator(&l, &r),
                        _ => Ok(l.union(r)),
                    };
                    match combined {
                        Ok(reference) => Operand::Ref(reference),
                        Err(e) => Operand::error(e),
                    }
                }
                (Operand::Value(Value::Error(e)), _) | (_, Operand::Value(Value::Error(e))) => {
                    Operand::error(e)
                }
                _ => Operand::error(ErrorValue::Value),
            };
        }

        let max = self.settings.max_array_cells;
        let l = array_value(&left, self.workbook, max);
        let r = array_value(&right, self.workbook, max);
        let epsilon = self.settings.compare_epsilon;
        let result = broadcast_binary(&l, &r, |l, r| match op {
            BinaryOp::Concat => concat(l, r),
            op if op.is_comparison() => compare_op(op, l, r, epsilon),
            op => arithmetic(op, l, r),
        });
        Operand::Value(result)
    }

    fn unary(&self, op: UnaryOp, operand: Operand) -> Operand {
        if op == UnaryOp::Plus {
            return operand;
        }
        let value = array_value(&operand, self.workbook, self.settings.max_array_cells);
        Operand::Value(broadcast_unary(&value, |v| match to_number(v) {
            Ok(n) if op == UnaryOp::Minus => Value::Number(-n),
            Ok(n) => Value::Number(n / 100.0),
            Err(e) => Value::Error(e),
        }))
    }

    fn call_builtin(&self, iftab: u16, args: Vec<Item>, ctx: EvalContext) -> Item {
        let Some(info) = ftab::function_info(iftab) else {
            log::debug!("function id {iftab} is not in the function table");
            return Value::Error(ErrorValue::Name).into();
        };
        let argc = args.len();
        if argc < usize::from(info.min_args) || argc > usize::from(info.max_args) {
            return Value::Error(ErrorValue::Value).into();
        }
        let args: Vec<Operand> = args.into_iter().map(Item::into_operand).collect();
        self.dispatch(iftab, info.name, &args, ctx).into()
    }

    /// `iftab` 255: the first argument names the function.
    fn call_user(&self, mut args: Vec<Item>, ctx: EvalContext) -> Item {
        if args.is_empty() {
            return Value::Error(ErrorValue::Value).into();
        }
        let name = match args.remove(0) {
            Item::Callee(name) => name,
            Item::Operand(Operand::Value(Value::Error(e))) => return Value::Error(e).into(),
            Item::Operand(_) => return Value::Error(ErrorValue::Name).into(),
        };
        let args: Vec<Operand> = args.into_iter().map(Item::into_operand).collect();
        self.dispatch(USER_DEFINED_FUNCTION, &name, &args, ctx).into()
    }

    fn dispatch(&self, id: u16, name: &str, args: &[Operand], ctx: EvalContext) -> Operand {
        let cx = CallContext {
            workbook: self.workbook,
            ctx,
            settings: self.settings,
        };
        match self.functions.call(&FunctionCall { id, name }, args, &cx) {
            Ok(result) => result,
            Err(NotSupported) => {
                log::debug!("function {name} is not supported by the dispatcher");
                Operand::error(ErrorValue::Name)
            }
        }
    }

    fn defined_name(&self, index: u16, ctx: EvalContext, depth: u32) -> Result<Item, EvalError> {
        let Some(def) = self.workbook.defined_name(index) else {
            return Ok(Value::Error(ErrorValue::Name).into());
        };
        if def.tokens.is_empty() {
            // Macro and add-in function names carry no definition.
            return Ok(Item::Callee(def.name.clone()));
        }
        self.name_body(&def.name, &def.tokens, ctx, depth)
    }

    fn extern_name(
        &self,
        ixti: u16,
        index: u16,
        ctx: EvalContext,
        depth: u32,
    ) -> Result<Item, EvalError> {
        let Some(ext) = self.workbook.extern_name(ixti, index) else {
            return Ok(Value::Error(ErrorValue::Name).into());
        };
        match &ext.tokens {
            Some(tokens) => self.name_body(&ext.name, tokens, ctx, depth),
            None => Ok(Item::Callee(ext.name.clone())),
        }
    }

    fn name_body(
        &self,
        name: &str,
        tokens: &[Ptg],
        ctx: EvalContext,
        depth: u32,
    ) -> Result<Item, EvalError> {
        if depth >= self.settings.max_name_depth {
            log::debug!(
                "name {name} nested more than {} levels deep",
                self.settings.max_name_depth
            );
            return Ok(Value::Error(ErrorValue::Name).into());
        }
        self.run(tokens, ctx, depth + 1).map(Item::Operand)
    }
}

fn single(mut args: Vec<Item>) -> Item {
    args.pop().unwrap_or(Item::Operand(Operand::Missing))
}

fn pair(mut args: Vec<Item>) -> [Item; 2] {
    let right = args.pop().unwrap_or(Item::Operand(Operand::Missing));
    let left = args.pop().unwrap_or(Item::Operand(Operand::Missing));
    [left, right]
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let a = match to_number(left) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let b = match to_number(right) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Value::Error(ErrorValue::Div0);
            }
            a / b
        }
        BinaryOp::Power => {
            if a == 0.0 && b == 0.0 {
                return Value::Error(ErrorValue::Num);
            }
            if a == 0.0 && b < 0.0 {
                return Value::Error(ErrorValue::Div0);
            }
            a.powf(b)
        }
        _ => return Value::Error(ErrorValue::Value),
    };
    if result.is_finite() {
        Value::Number(result)
    } else {
        Value::Error(ErrorValue::Num)
    }
}

fn concat(left: &Value, right: &Value) -> Value {
    let l = match to_text(left) {
        Ok(s) => s,
        Err(e) => return Value::Error(e),
    };
    match to_text(right) {
        Ok(r) => Value::Text(l + &r),
        Err(e) => Value::Error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::BasicFunctions;
    use crate::memory::MemoryWorkbook;
    use formula_model::{CellAddr, CellRef};
    use pretty_assertions::assert_eq;

    fn eval(wb: &MemoryWorkbook, tokens: &[Ptg]) -> Result<Value, EvalError> {
        let settings = CalcSettings::default();
        Evaluator::new(wb, &BasicFunctions, &settings)
            .evaluate(tokens, EvalContext::new(0, CellRef::new(0, 0)))
    }

    fn book() -> MemoryWorkbook {
        let mut wb = MemoryWorkbook::new();
        wb.add_sheet("Sheet1");
        wb
    }

    #[test]
    fn division_by_zero_is_a_value() {
        let wb = book();
        let tokens = [Ptg::Int(10), Ptg::Int(0), Ptg::Binary(BinaryOp::Div)];
        assert_eq!(eval(&wb, &tokens), Ok(Value::Error(ErrorValue::Div0)));
    }

    #[test]
    fn operands_are_popped_right_then_left() {
        let wb = book();
        let tokens = [Ptg::Int(10), Ptg::Int(4), Ptg::Binary(BinaryOp::Sub)];
        assert_eq!(eval(&wb, &tokens), Ok(Value::Number(6.0)));
        let tokens = [Ptg::Int(2), Ptg::Int(10), Ptg::Binary(BinaryOp::Power)];
        assert_eq!(eval(&wb, &tokens), Ok(Value::Number(1024.0)));
    }

    #[test]
    fn left_error_wins_in_arithmetic() {
        let wb = book();
        let tokens = [
            Ptg::Err(ErrorValue::NA),
            Ptg::Err(ErrorValue::Ref),
            Ptg::Binary(BinaryOp::Mul),
        ];
        assert_eq!(eval(&wb, &tokens), Ok(Value::Error(ErrorValue::NA)));
    }

    #[test]
    fn concatenation_uses_shortest_number_text() {
        let wb = book();
        let tokens = [Ptg::str("x"), Ptg::Num(0.5), Ptg::Binary(BinaryOp::Concat)];
        assert_eq!(eval(&wb, &tokens), Ok(Value::from("x0.5")));
    }

    #[test]
    fn percent_and_negation() {
        let wb = book();
        let tokens = [Ptg::Int(50), Ptg::Unary(UnaryOp::Percent), Ptg::Unary(UnaryOp::Minus)];
        assert_eq!(eval(&wb, &tokens), Ok(Value::Number(-0.5)));
    }

    #[test]
    fn control_tokens_are_skipped() {
        let wb = book();
        let tokens = [
            Ptg::Int(1),
            Ptg::Int(2),
            Ptg::Binary(BinaryOp::Add),
            Ptg::Paren,
            Ptg::Attr(Attr::Semi { data: 0 }),
        ];
        assert_eq!(eval(&wb, &tokens), Ok(Value::Number(3.0)));
    }

    #[test]
    fn leftover_operands_are_a_structural_error() {
        let wb = book();
        assert_eq!(
            eval(&wb, &[Ptg::Int(1), Ptg::Int(2)]),
            Err(EvalError::MalformedStack { remaining: 2 })
        );
        assert_eq!(eval(&wb, &[]), Err(EvalError::MalformedStack { remaining: 0 }));
        assert_eq!(
            eval(&wb, &[Ptg::Int(1), Ptg::Binary(BinaryOp::Add)]),
            Err(EvalError::StackUnderflow {
                index: 1,
                ptg: 0x03,
                needed: 2,
                available: 1,
            })
        );
    }

    #[test]
    fn placeholders_cannot_be_evaluated_directly() {
        let wb = book();
        assert_eq!(
            eval(&wb, &[Ptg::Tbl { row: 0, col: 0 }]),
            Err(EvalError::UnsupportedInEvaluation { index: 0, ptg: 0x02 })
        );
    }

    #[test]
    fn unknown_functions_evaluate_to_name_error() {
        let wb = book();
        // FuncVar id 200 is not in the table.
        let tokens = [Ptg::Int(1), Ptg::func_var(200, 1)];
        assert_eq!(eval(&wb, &tokens), Ok(Value::Error(ErrorValue::Name)));
    }

    #[test]
    fn value_class_area_uses_implicit_intersection() {
        let mut wb = book();
        wb.set_value(0, CellRef::new(0, 1), 7.0);
        wb.set_value(0, CellRef::new(1, 1), 8.0);
        let settings = CalcSettings::default();
        let area = formula_model::AreaAddr::new(
            CellAddr::absolute(CellRef::new(0, 1)),
            CellAddr::absolute(CellRef::new(1, 1)),
        );
        let tokens = [Ptg::Area {
            class: PtgClass::Value,
            area,
        }];
        let ev = Evaluator::new(&wb, &BasicFunctions, &settings);
        assert_eq!(
            ev.evaluate(&tokens, EvalContext::new(0, CellRef::new(1, 3))),
            Ok(Value::Number(8.0))
        );
        assert_eq!(
            ev.evaluate(&tokens, EvalContext::new(0, CellRef::new(5, 3))),
            Ok(Value::Error(ErrorValue::Value))
        );
    }
}
