use formula_model::{AreaAddr, CellAddr, CellRef, ErrorValue};
use formula_ptg::{
    decode_rgce, render_formula, Attr, BinaryOp, NoContext, Ptg, PtgClass, RelCellAddr,
    RenderContext, RenderError, SheetLabel,
};
use pretty_assertions::assert_eq;

struct Book;

impl RenderContext for Book {
    fn sheet_label(&self, ixti: u16) -> SheetLabel {
        match ixti {
            0 => SheetLabel::Local {
                first: "Sheet1".into(),
                last: "Sheet1".into(),
            },
            1 => SheetLabel::Local {
                first: "My Sheet".into(),
                last: "My Sheet".into(),
            },
            2 => SheetLabel::Local {
                first: "Sheet1".into(),
                last: "Sheet3".into(),
            },
            3 => SheetLabel::External {
                book: "1".into(),
                sheet: "Prices".into(),
            },
            4 => SheetLabel::Deleted {
                name: Some("Sheet1".into()),
            },
            _ => SheetLabel::Deleted { name: None },
        }
    }

    fn defined_name(&self, index: u16) -> Option<String> {
        (index == 1).then(|| "TaxRate".to_string())
    }

    fn extern_name(&self, _ixti: u16, index: u16) -> Option<String> {
        (index == 1).then(|| "MYADDIN".to_string())
    }
}

fn render(ptgs: &[Ptg]) -> String {
    render_formula(ptgs, &Book, CellRef::new(1, 1)).expect("render")
}

fn a1(row: u32, col: u32) -> CellAddr {
    CellAddr::new(row, col, true, true)
}

#[test]
fn sum_of_area_with_absolute_markers() {
    let area = AreaAddr::new(CellAddr::new(0, 0, false, false), CellAddr::new(9, 0, true, false));
    let ptgs = [Ptg::area(area), Ptg::func_var(4, 1)];
    assert_eq!(render(&ptgs), "SUM($A$1:$A10)");
}

#[test]
fn parentheses_come_from_the_stream() {
    // (1+2)*3
    let ptgs = [
        Ptg::Int(1),
        Ptg::Int(2),
        Ptg::Binary(BinaryOp::Add),
        Ptg::Paren,
        Ptg::Int(3),
        Ptg::Binary(BinaryOp::Mul),
    ];
    assert_eq!(render(&ptgs), "(1+2)*3");
}

#[test]
fn strings_and_literals() {
    let ptgs = [
        Ptg::str("say \"hi\""),
        Ptg::Num(2.5),
        Ptg::Binary(BinaryOp::Concat),
        Ptg::bool(true),
        Ptg::Binary(BinaryOp::Concat),
        Ptg::Err(ErrorValue::Div0),
        Ptg::Binary(BinaryOp::Concat),
    ];
    assert_eq!(render(&ptgs), "\"say \"\"hi\"\"\"&2.5&TRUE&#DIV/0!");
}

#[test]
fn sheet_prefixes_are_quoted_when_needed() {
    let ptgs = [
        Ptg::Ref3d {
            class: PtgClass::Reference,
            ixti: 0,
            addr: a1(0, 0),
        },
        Ptg::Ref3d {
            class: PtgClass::Reference,
            ixti: 1,
            addr: a1(1, 1),
        },
        Ptg::Binary(BinaryOp::Add),
        Ptg::Area3d {
            class: PtgClass::Reference,
            ixti: 2,
            area: AreaAddr::new(a1(0, 0), a1(1, 0)),
        },
        Ptg::func_var(4, 1),
        Ptg::Binary(BinaryOp::Add),
        Ptg::Ref3d {
            class: PtgClass::Reference,
            ixti: 3,
            addr: a1(0, 2),
        },
        Ptg::Binary(BinaryOp::Add),
    ];
    assert_eq!(
        render(&ptgs),
        "Sheet1!A1+'My Sheet'!B2+SUM(Sheet1:Sheet3!A1:A2)+[1]Prices!C1"
    );
}

#[test]
fn unresolvable_3d_reference_renders_sheet_ref_error() {
    let ptgs = [Ptg::Ref3d {
        class: PtgClass::Value,
        ixti: 4,
        addr: a1(0, 0),
    }];
    assert_eq!(render(&ptgs), "Sheet1!#REF!");

    let unknown = [Ptg::Ref3d {
        class: PtgClass::Value,
        ixti: 99,
        addr: a1(0, 0),
    }];
    assert_eq!(render(&unknown), "#REF!");
}

#[test]
fn error_3d_tokens_keep_their_sheet() {
    let ptgs = [Ptg::RefErr3d {
        class: PtgClass::Reference,
        ixti: 1,
        reserved: [0; 4],
    }];
    assert_eq!(render(&ptgs), "'My Sheet'!#REF!");
}

#[test]
fn relative_refn_renders_against_the_formula_cell() {
    // Formula lives in B2; offset (+1, 0) points at B3.
    let ptgs = [Ptg::RefN {
        class: PtgClass::Value,
        addr: RelCellAddr::new(1, 0, true, true),
    }];
    assert_eq!(render(&ptgs), "B3");
}

#[test]
fn names_and_addin_calls() {
    let ptgs = [
        Ptg::NameX {
            class: PtgClass::Reference,
            ixti: 0,
            index: 1,
            reserved: 0,
        },
        Ptg::Name {
            class: PtgClass::Value,
            index: 1,
            reserved: 0,
        },
        Ptg::func_var(255, 2),
    ];
    assert_eq!(render(&ptgs), "MYADDIN(TaxRate)");
}

#[test]
fn attr_sum_and_control_tokens() {
    let ptgs = [
        Ptg::Attr(Attr::Semi { data: 0 }),
        Ptg::area(AreaAddr::new(a1(0, 0), a1(2, 0))),
        Ptg::Attr(Attr::Sum { data: 0 }),
    ];
    assert_eq!(render(&ptgs), "SUM(A1:A3)");
}

#[test]
fn if_with_jump_attributes_renders_as_a_call() {
    // IF(A1,1,2) as stored: A1 attrIf 1 attrGoto 2 attrGoto funcvar(IF, 3)
    let mut rgce = vec![0x44, 0x00, 0x00, 0x00, 0xC0];
    rgce.extend_from_slice(&[0x19, 0x02, 0x08, 0x00]);
    rgce.extend_from_slice(&[0x1E, 0x01, 0x00]);
    rgce.extend_from_slice(&[0x19, 0x08, 0x07, 0x00]);
    rgce.extend_from_slice(&[0x1E, 0x02, 0x00]);
    rgce.extend_from_slice(&[0x19, 0x08, 0x03, 0x00]);
    rgce.extend_from_slice(&[0x42, 0x03, 0x01, 0x00]);
    let ptgs = decode_rgce(&rgce).unwrap();
    assert_eq!(render(&ptgs), "IF(A1,1,2)");
}

#[test]
fn whole_columns_render_compactly() {
    let area = AreaAddr::new(a1(0, 0), a1(65_535, 1));
    assert_eq!(render(&[Ptg::area(area)]), "A:B");
}

#[test]
fn placeholders_must_be_instantiated_first() {
    let err = render_formula(&[Ptg::Exp { row: 0, col: 0 }], &NoContext, CellRef::new(0, 0))
        .unwrap_err();
    assert_eq!(err, RenderError::UnresolvedPlaceholder { index: 0 });
}

#[test]
fn leftover_operands_are_reported() {
    let err = render_formula(&[Ptg::Int(1), Ptg::Int(2)], &NoContext, CellRef::new(0, 0))
        .unwrap_err();
    assert_eq!(err, RenderError::StackNotSingular { remaining: 2 });
}
