use proptest::prelude::*;
use rsecl_parser::{CompareOp, Expr, Literal, parse_expression};

const FIELDS: &[&str] = &[
    "async",
    "process.uid",
    "process.comm",
    "exec.file.name",
    "exec.args",
    "open.file.path",
    "process.ancestors.uid",
];

const OPS: &[CompareOp] = &[
    CompareOp::Eq,
    CompareOp::Ne,
    CompareOp::Lt,
    CompareOp::Ge,
    CompareOp::Match,
    CompareOp::In,
    CompareOp::NotIn,
];

fn field() -> impl Strategy<Value = Expr> {
    proptest::sample::select(FIELDS).prop_map(|name| Expr::Field(name.to_string()))
}

fn literal() -> impl Strategy<Value = Literal> {
    let scalar = prop_oneof![
        any::<bool>().prop_map(Literal::Bool),
        (-100_000i64..100_000).prop_map(Literal::Int),
        "[a-zA-Z0-9 _./-]{0,8}".prop_map(Literal::Str),
        "[a-z*]{1,6}".prop_map(Literal::Pattern),
    ];
    prop_oneof![
        3 => scalar.clone(),
        1 => proptest::collection::vec(scalar, 1..4).prop_map(Literal::Array),
    ]
}

fn comparison() -> impl Strategy<Value = Expr> {
    (proptest::sample::select(OPS), field(), literal()).prop_map(|(op, lhs, rhs)| {
        Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(Expr::Literal(rhs)),
        }
    })
}

fn expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![1 => field(), 4 => comparison()];
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 2..4).prop_map(Expr::And),
            proptest::collection::vec(inner.clone(), 2..4).prop_map(Expr::Or),
            inner.prop_map(|e| Expr::Not(Box::new(e))),
        ]
    })
}

proptest! {
    #[test]
    fn printed_expressions_parse_back_to_the_same_tree(tree in expr()) {
        let text = tree.to_string();
        let parsed = parse_expression(&text)
            .map_err(|e| TestCaseError::fail(format!("{text}: {e}")))?;
        let reprinted = parsed.to_string();
        let reparsed = parse_expression(&reprinted)
            .map_err(|e| TestCaseError::fail(format!("{reprinted}: {e}")))?;
        prop_assert_eq!(&parsed, &reparsed, "{} reprinted as {}", text, reprinted);
        prop_assert_eq!(reprinted, reparsed.to_string());
    }
}
