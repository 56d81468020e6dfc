use formula_model::{AreaAddr, CellAddr, CellRef, ErrorValue, Range};
use formula_ptg::{
    decode_rgce, decode_rgce_with_rgcb, encode_rgce, ArrayConstant, ArrayElement, Attr, BinaryOp,
    MemKind, MemPtg, Ptg, PtgClass, PtgString, RelAreaAddr, RelCellAddr, SpaceKind, UnaryOp,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn ptg_int(n: u16) -> [u8; 3] {
    let [lo, hi] = n.to_le_bytes();
    [0x1E, lo, hi]
}

fn ptg_ref(row: u16, col: u16, row_rel: bool, col_rel: bool) -> [u8; 5] {
    let mut col_field = col;
    if row_rel {
        col_field |= 0x4000;
    }
    if col_rel {
        col_field |= 0x8000;
    }
    let [r0, r1] = row.to_le_bytes();
    let [c0, c1] = col_field.to_le_bytes();
    [0x44, r0, r1, c0, c1]
}

/// One well-formed sample per supported token kind, as `(rgce, rgcb)`.
fn samples() -> Vec<(&'static str, Vec<u8>, Vec<u8>)> {
    let mut num = vec![0x1F];
    num.extend_from_slice(&1.5f64.to_le_bytes());

    let mut array_rgcb = vec![0x01, 0x00, 0x00];
    array_rgcb.push(0x01);
    array_rgcb.extend_from_slice(&3.0f64.to_le_bytes());
    array_rgcb.extend_from_slice(&[0x02, 0x02, 0x00, 0x00, b'h', b'i']);

    // Bool, error and nil elements whose unused bytes are not zero.
    let mut padded_rgcb = vec![0x02, 0x00, 0x00];
    padded_rgcb.extend_from_slice(&[0x04, 0x01, 1, 2, 3, 4, 5, 6, 7]);
    padded_rgcb.extend_from_slice(&[0x10, 0x07, 0xAA, 0, 0, 0, 0, 0, 0xBB]);
    padded_rgcb.extend_from_slice(&[0x00, 8, 7, 6, 5, 4, 3, 2, 1]);

    vec![
        ("exp", vec![0x01, 0x04, 0x00, 0x02, 0x00], vec![]),
        ("tbl", vec![0x02, 0x04, 0x00, 0x02, 0x00], vec![]),
        ("binary", vec![0x1E, 1, 0, 0x1E, 2, 0, 0x11], vec![]),
        ("unary", vec![0x1E, 1, 0, 0x13, 0x14, 0x12], vec![]),
        ("paren", vec![0x1E, 1, 0, 0x15], vec![]),
        ("missarg", vec![0x16], vec![]),
        ("str compressed", vec![0x17, 0x03, 0x00, b'a', b'b', b'c'], vec![]),
        ("str utf16", vec![0x17, 0x01, 0x01, 0xAC, 0x20], vec![]),
        ("attr semi", vec![0x19, 0x01, 0x00, 0x00], vec![]),
        ("attr if", vec![0x19, 0x02, 0x07, 0x00], vec![]),
        ("attr goto", vec![0x19, 0x08, 0x03, 0x00], vec![]),
        ("attr sum", vec![0x19, 0x10, 0x00, 0x00], vec![]),
        ("attr baxcel", vec![0x19, 0x21, 0x00, 0x00], vec![]),
        ("attr space", vec![0x19, 0x40, 0x01, 0x02], vec![]),
        ("attr space semi", vec![0x19, 0x41, 0x00, 0x01], vec![]),
        ("attr unknown", vec![0x19, 0x80, 0x34, 0x12], vec![]),
        ("err", vec![0x1C, 0x07], vec![]),
        ("bool", vec![0x1D, 0x01], vec![]),
        ("bool non-canonical", vec![0x1D, 0x02], vec![]),
        ("int", ptg_int(65_535).to_vec(), vec![]),
        ("num", num, vec![]),
        ("array", vec![0x60, 1, 2, 3, 4, 5, 6, 7], array_rgcb),
        ("array padded", vec![0x40, 0, 0, 0, 0, 0, 0, 0], padded_rgcb),
        ("func", vec![0x41, 0x1B, 0x00], vec![]),
        ("funcvar", vec![0x22, 0x83, 0x04, 0x00], vec![]),
        ("name", vec![0x43, 0x02, 0x00, 0x00, 0x00], vec![]),
        ("namex", vec![0x39, 0x01, 0x00, 0x03, 0x00, 0x00, 0x00], vec![]),
        ("ref", ptg_ref(9, 3, true, false).to_vec(), vec![]),
        (
            "area",
            vec![0x25, 0x00, 0x00, 0x04, 0x00, 0x00, 0xC0, 0x01, 0x00],
            vec![],
        ),
        (
            "memarea",
            vec![0x26, 0, 0, 0, 0, 0x03, 0x00],
            vec![0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x01, 0x00],
        ),
        ("memerr", vec![0x27, 0x17, 0, 0, 0, 0x05, 0x00], vec![]),
        ("memnomem", vec![0x28, 0, 0, 0, 0, 0x05, 0x00], vec![]),
        ("memfunc", vec![0x29, 0x08, 0x00], vec![]),
        ("memarean", vec![0x2E, 0x02, 0x00], vec![]),
        ("memnomemn", vec![0x2F, 0x02, 0x00], vec![]),
        ("referr", vec![0x2A, 1, 2, 3, 4], vec![]),
        ("areaerr", vec![0x4B, 1, 2, 3, 4, 5, 6, 7, 8], vec![]),
        ("refn", vec![0x2C, 0xFF, 0xFF, 0xFE, 0xC0], vec![]),
        (
            "arean",
            vec![0x2D, 0x00, 0x00, 0x02, 0x00, 0x00, 0xC0, 0x01, 0xC0],
            vec![],
        ),
        ("ref3d", vec![0x3A, 0x00, 0x00, 0x01, 0x00, 0x02, 0xC0], vec![]),
        (
            "area3d",
            vec![0x3B, 0x01, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00, 0x01, 0x00],
            vec![],
        ),
        ("referr3d", vec![0x3C, 0x02, 0x00, 0, 0, 0, 0], vec![]),
        (
            "areaerr3d",
            vec![0x3D, 0x02, 0x00, 0, 0, 0, 0, 0, 0, 0, 0],
            vec![],
        ),
    ]
}

#[test]
fn every_sample_reencodes_to_identical_bytes() {
    for (label, rgce, rgcb) in samples() {
        let ptgs = decode_rgce_with_rgcb(&rgce, &rgcb)
            .unwrap_or_else(|e| panic!("{label}: decode failed: {e}"));
        let encoded = encode_rgce(&ptgs).unwrap_or_else(|e| panic!("{label}: encode failed: {e}"));
        assert_eq!(encoded.rgce, rgce, "{label}: rgce");
        assert_eq!(encoded.rgcb, rgcb, "{label}: rgcb");
        assert_eq!(
            decode_rgce_with_rgcb(&encoded.rgce, &encoded.rgcb).unwrap(),
            ptgs,
            "{label}: tokens"
        );
    }
}

#[test]
fn refn_payload_decodes_to_signed_offsets() {
    let ptgs = decode_rgce(&[0x2C, 0xFF, 0xFF, 0xFE, 0xC0]).unwrap();
    let Ptg::RefN { class, addr } = &ptgs[0] else {
        panic!("expected PtgRefN, got {ptgs:?}");
    };
    assert_eq!(*class, PtgClass::Reference);
    assert_eq!(addr.row_offset(), Some(-1));
    assert_eq!(addr.col_offset(), Some(-2));
}

#[test]
fn array_constant_reads_its_values_from_rgcb() {
    let (_, rgce, rgcb) = samples()
        .into_iter()
        .find(|(label, _, _)| *label == "array")
        .unwrap();
    let ptgs = decode_rgce_with_rgcb(&rgce, &rgcb).unwrap();
    assert_eq!(
        ptgs,
        vec![Ptg::Array {
            class: PtgClass::Array,
            reserved: [1, 2, 3, 4, 5, 6, 7],
            value: ArrayConstant::new(
                1,
                2,
                vec![ArrayElement::Number(3.0), ArrayElement::Str(PtgString::new("hi"))],
            )
            .unwrap(),
        }]
    );
}

#[test]
fn two_arrays_consume_rgcb_in_token_order() {
    let first = ArrayConstant::new(1, 1, vec![ArrayElement::bool(true)]).unwrap();
    let second = ArrayConstant::new(
        2,
        1,
        vec![ArrayElement::error(ErrorValue::NA), ArrayElement::empty()],
    )
    .unwrap();
    let ptgs = vec![
        Ptg::Array {
            class: PtgClass::Array,
            reserved: [0; 7],
            value: first,
        },
        Ptg::Array {
            class: PtgClass::Value,
            reserved: [0; 7],
            value: second,
        },
        Ptg::Binary(BinaryOp::Add),
    ];
    let encoded = encode_rgce(&ptgs).unwrap();
    assert_eq!(encoded.rgce.len(), 8 + 8 + 1);
    assert_eq!(
        decode_rgce_with_rgcb(&encoded.rgce, &encoded.rgcb).unwrap(),
        ptgs
    );
}

fn arb_class() -> impl Strategy<Value = PtgClass> {
    prop_oneof![
        Just(PtgClass::Reference),
        Just(PtgClass::Value),
        Just(PtgClass::Array)
    ]
}

fn arb_cell() -> impl Strategy<Value = CellAddr> {
    (0u32..65_536, 0u32..256, any::<bool>(), any::<bool>())
        .prop_map(|(row, col, rr, cr)| CellAddr::new(row, col, rr, cr))
}

fn arb_rel() -> impl Strategy<Value = RelCellAddr> {
    (any::<u16>(), 0u16..0x4000, any::<bool>(), any::<bool>()).prop_map(|(row, col, rr, cr)| {
        RelCellAddr {
            row,
            col,
            row_relative: rr,
            col_relative: cr,
        }
    })
}

fn arb_error() -> impl Strategy<Value = ErrorValue> {
    prop::sample::select(ErrorValue::ALL.to_vec())
}

fn arb_element() -> impl Strategy<Value = ArrayElement> {
    prop_oneof![
        any::<[u8; 8]>().prop_map(|reserved| ArrayElement::Empty { reserved }),
        any::<f64>()
            .prop_filter("NaN never compares equal", |n| !n.is_nan())
            .prop_map(ArrayElement::Number),
        "[a-z]{0,8}".prop_map(|s| ArrayElement::Str(PtgString::new(s))),
        (any::<u8>(), any::<[u8; 7]>())
            .prop_map(|(raw, reserved)| ArrayElement::Bool { raw, reserved }),
        (arb_error(), any::<[u8; 7]>())
            .prop_map(|(value, reserved)| ArrayElement::Error { value, reserved }),
    ]
}

fn arb_array() -> impl Strategy<Value = ArrayConstant> {
    (1usize..4, 1usize..4).prop_flat_map(|(rows, cols)| {
        prop::collection::vec(arb_element(), rows * cols)
            .prop_map(move |values| ArrayConstant::new(rows, cols, values).unwrap())
    })
}

fn arb_ptg() -> impl Strategy<Value = Ptg> {
    let binary = prop::sample::select(vec![
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Power,
        BinaryOp::Concat,
        BinaryOp::Lt,
        BinaryOp::Le,
        BinaryOp::Eq,
        BinaryOp::Ge,
        BinaryOp::Gt,
        BinaryOp::Ne,
        BinaryOp::Isect,
        BinaryOp::Union,
        BinaryOp::Range,
    ]);
    let unary = prop::sample::select(vec![UnaryOp::Plus, UnaryOp::Minus, UnaryOp::Percent]);
    prop_oneof![
        (any::<u16>(), any::<u16>()).prop_map(|(row, col)| Ptg::Exp { row, col }),
        binary.prop_map(Ptg::Binary),
        unary.prop_map(Ptg::Unary),
        Just(Ptg::Paren),
        Just(Ptg::MissArg),
        "[ -~]{0,20}".prop_map(|s| Ptg::str(&s)),
        "[\u{100}-\u{2FF}]{1,5}".prop_map(|s| Ptg::str(&s)),
        prop::collection::vec(any::<u16>(), 1..5)
            .prop_map(|offsets| Ptg::Attr(Attr::Choose { offsets })),
        (0u8..8, any::<u8>(), any::<bool>()).prop_map(|(kind, count, volatile)| {
            Ptg::Attr(Attr::Space {
                kind: SpaceKind::from_byte(kind),
                count,
                volatile,
            })
        }),
        arb_error().prop_map(Ptg::Err),
        any::<u8>().prop_map(Ptg::Bool),
        any::<u16>().prop_map(Ptg::Int),
        any::<f64>()
            .prop_filter("NaN never compares equal", |n| !n.is_nan())
            .prop_map(Ptg::Num),
        (arb_class(), any::<[u8; 7]>(), arb_array()).prop_map(|(class, reserved, value)| {
            Ptg::Array {
                class,
                reserved,
                value,
            }
        }),
        (arb_class(), any::<u16>()).prop_map(|(class, iftab)| Ptg::Func { class, iftab }),
        (arb_class(), 0u8..128, any::<bool>(), 0u16..0x8000, any::<bool>()).prop_map(
            |(class, argc, prompt, iftab, command)| Ptg::FuncVar {
                class,
                argc,
                prompt,
                iftab,
                command,
            }
        ),
        (arb_class(), any::<u16>(), any::<u16>()).prop_map(|(class, index, reserved)| {
            Ptg::Name {
                class,
                index,
                reserved,
            }
        }),
        (arb_class(), arb_cell()).prop_map(|(class, addr)| Ptg::Ref { class, addr }),
        (arb_class(), arb_cell(), arb_cell()).prop_map(|(class, a, b)| Ptg::Area {
            class,
            area: AreaAddr::new(a, b),
        }),
        (arb_class(), arb_rel()).prop_map(|(class, addr)| Ptg::RefN { class, addr }),
        (arb_class(), arb_rel(), arb_rel()).prop_map(|(class, first, last)| Ptg::AreaN {
            class,
            area: RelAreaAddr { first, last },
        }),
        (arb_class(), any::<u16>(), arb_cell()).prop_map(|(class, ixti, addr)| Ptg::Ref3d {
            class,
            ixti,
            addr
        }),
        (arb_class(), any::<u16>(), arb_cell(), arb_cell()).prop_map(|(class, ixti, a, b)| {
            Ptg::Area3d {
                class,
                ixti,
                area: AreaAddr::new(a, b),
            }
        }),
        (arb_class(), any::<u16>(), any::<[u8; 8]>()).prop_map(|(class, ixti, reserved)| {
            Ptg::AreaErr3d {
                class,
                ixti,
                reserved,
            }
        }),
        (arb_class(), any::<u16>(), 0u32..100, 0u32..100).prop_map(|(class, cce, r, c)| {
            Ptg::Mem(MemPtg {
                kind: MemKind::Area,
                class,
                reserved: [0; 4],
                cce,
                areas: vec![Range::new(CellRef::new(r, c), CellRef::new(r + 1, c + 2))],
            })
        }),
    ]
}

proptest! {
    #[test]
    fn token_sequences_survive_encode_then_decode(ptgs in prop::collection::vec(arb_ptg(), 0..12)) {
        let encoded = encode_rgce(&ptgs).unwrap();
        let decoded = decode_rgce_with_rgcb(&encoded.rgce, &encoded.rgcb).unwrap();
        prop_assert_eq!(&decoded, &ptgs);
        let again = encode_rgce(&decoded).unwrap();
        prop_assert_eq!(again, encoded);
    }
}
