use formula_calc::{instantiate_shared, BasicFunctions, MemoryWorkbook, Recalc, Value};
use formula_model::{CalcSettings, CellAddr, CellRef, ErrorValue, Range, SheetLimits};
use formula_ptg::{BinaryOp, Ptg, PtgClass, RelCellAddr};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn a1(s: &str) -> CellRef {
    CellRef::from_a1(s).unwrap()
}

fn refn(d_row: i32, d_col: i32) -> Ptg {
    Ptg::RefN {
        class: PtgClass::Value,
        addr: RelCellAddr::new(d_row, d_col, true, true),
    }
}

#[test]
fn refn_below_reads_the_next_row() {
    let mut wb = MemoryWorkbook::new();
    let s = wb.add_sheet("Sheet1");
    wb.set_value(s, a1("B3"), 42.0);
    wb.set_value(s, a1("C3"), 1.0);
    wb.set_shared_formula(s, Range::from_a1("B2:C2").unwrap(), vec![refn(1, 0)]);
    let settings = CalcSettings::default();
    let recalc = Recalc::new(&wb, &BasicFunctions, &settings);
    assert_eq!(recalc.value(s, a1("B2")), Ok(Value::Number(42.0)));
    assert_eq!(recalc.value(s, a1("C2")), Ok(Value::Number(1.0)));
}

#[test]
fn members_render_their_own_references() {
    let mut wb = MemoryWorkbook::new();
    let s = wb.add_sheet("Sheet1");
    let body = vec![refn(0, -1), Ptg::Int(2), Ptg::Binary(BinaryOp::Mul)];
    wb.set_shared_formula(s, Range::from_a1("C1:C3").unwrap(), body);
    assert_eq!(wb.formula_text(s, a1("C1")), Some(Ok("B1*2".to_string())));
    assert_eq!(wb.formula_text(s, a1("C3")), Some(Ok("B3*2".to_string())));
    assert_eq!(wb.formula_text(s, a1("D1")), None);
}

#[test]
fn member_without_group_is_structural() {
    let mut wb = MemoryWorkbook::new();
    let s = wb.add_sheet("Sheet1");
    wb.set_formula(s, a1("A2"), vec![Ptg::Exp { row: 0, col: 0 }]);
    wb.set_formula(s, a1("A3"), vec![Ptg::cell(CellAddr::relative(a1("A2")))]);
    let settings = CalcSettings::default();
    let recalc = Recalc::new(&wb, &BasicFunctions, &settings);
    assert!(recalc.value(s, a1("A2")).is_err());
    // Readers of the broken cell see #VALUE!.
    assert_eq!(recalc.value(s, a1("A3")), Ok(Value::Error(ErrorValue::Value)));
}

#[test]
fn array_block_scalar_result_fills_every_member() {
    let mut wb = MemoryWorkbook::new();
    let s = wb.add_sheet("Sheet1");
    wb.set_array_formula(s, Range::from_a1("A1:B2").unwrap(), vec![Ptg::Int(7)]);
    let settings = CalcSettings::default();
    let recalc = Recalc::new(&wb, &BasicFunctions, &settings);
    for cell in ["A1", "B1", "A2", "B2"] {
        assert_eq!(recalc.value(s, a1(cell)), Ok(Value::Number(7.0)), "{cell}");
    }
}

fn arb_cell() -> impl Strategy<Value = CellRef> {
    (0u32..65_536, 0u32..256).prop_map(|(row, col)| CellRef::new(row, col))
}

proptest! {
    // Every member resolves the body's offsets against itself, whichever cell anchors
    // the group; the grid wraps at its edges.
    #[test]
    fn offsets_follow_the_consuming_cell(
        anchor in arb_cell(),
        cell in arb_cell(),
        d_row in -65_536i32..65_536,
        d_col in -256i32..256,
    ) {
        let limits = SheetLimits::default();
        let body = [refn(d_row, d_col)];
        let out = instantiate_shared(&body, anchor, cell, &limits);
        let Ptg::Ref { addr, .. } = &out[0] else {
            panic!("expected a PtgRef, got {:?}", out[0]);
        };
        let row = (i64::from(cell.row) + i64::from(d_row)).rem_euclid(65_536) as u32;
        let col = (i64::from(cell.col) + i64::from(d_col)).rem_euclid(256) as u32;
        prop_assert_eq!(addr.cell(), CellRef::new(row, col));

        let again = instantiate_shared(&body, cell, cell, &limits);
        prop_assert_eq!(&out, &again);
    }

    // Relative parts of 3D references move by the member's distance from the anchor.
    #[test]
    fn relative_3d_parts_keep_their_distance(
        anchor in arb_cell(),
        cell in arb_cell(),
        target in arb_cell(),
    ) {
        let limits = SheetLimits::default();
        let body = [Ptg::Ref3d {
            class: PtgClass::Reference,
            ixti: 0,
            addr: CellAddr::relative(target),
        }];
        let out = instantiate_shared(&body, anchor, cell, &limits);
        let row = i64::from(target.row) + i64::from(cell.row) - i64::from(anchor.row);
        let col = i64::from(target.col) + i64::from(cell.col) - i64::from(anchor.col);
        let on_grid = (0..65_536).contains(&row) && (0..256).contains(&col);
        match &out[0] {
            Ptg::Ref3d { addr, .. } => {
                prop_assert!(on_grid);
                prop_assert_eq!(addr.cell(), CellRef::new(row as u32, col as u32));
            }
            Ptg::RefErr3d { .. } => prop_assert!(!on_grid),
            other => panic!("unexpected token {other:?}"),
        }
    }
}
