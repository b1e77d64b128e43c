//! Property-based tests for the value model and evaluator
//!
//! These verify the algebraic laws the interpreter's determinism rests
//! on: fingerprints as canonical equality, permutation-invariant set
//! operations, idempotent function self-update, and the tuple/function
//! duality.

use proptest::prelude::*;
use std::collections::HashMap;
use tlai_core::{parse_expression, rewrite_expression};
use tlai_eval::eval::eval_value;
use tlai_eval::{compute_initial_states, Context, FcnValue, SetValue, Value};

// ============================================================================
// Helper functions
// ============================================================================

/// Rewrite, parse, and evaluate a constant TLA+ expression
fn eval_str(src: &str) -> Result<Value, String> {
    let rw = rewrite_expression(src).map_err(|e| e.to_string())?;
    let expr = parse_expression(&rw.text).map_err(|e| e.to_string())?;
    eval_value(&expr, &Context::bare()).map_err(|e| e.to_string())
}

fn tla_bool(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}

fn int_set(values: &[i64]) -> SetValue {
    SetValue::from_iter(values.iter().map(|&v| Value::int(v)))
}

/// Arbitrary nested values: scalars, sets, tuples, records
fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::int),
        "[a-z]{0,6}".prop_map(Value::str),
    ];
    leaf.prop_recursive(3, 24, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::set),
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::tuple),
            prop::collection::vec(("[a-z]{1,4}", inner), 0..4)
                .prop_map(|fields| Value::Fcn(FcnValue::record(fields))),
        ]
    })
}

// ============================================================================
// Fingerprint invariants
// ============================================================================

proptest! {
    #[test]
    fn prop_fingerprint_survives_deep_clone(v in value_strategy()) {
        prop_assert_eq!(v.fingerprint(), v.clone().fingerprint());
    }

    #[test]
    fn prop_set_fingerprint_ignores_insertion_order(mut xs in prop::collection::vec(any::<i64>(), 0..8)) {
        let a = int_set(&xs);
        xs.reverse();
        let b = int_set(&xs);
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn prop_union_commutes(xs in prop::collection::vec(any::<i64>(), 0..8),
                           ys in prop::collection::vec(any::<i64>(), 0..8)) {
        let a = int_set(&xs);
        let b = int_set(&ys);
        prop_assert_eq!(a.union(&b).fingerprint(), b.union(&a).fingerprint());
    }

    #[test]
    fn prop_intersection_commutes(xs in prop::collection::vec(any::<i64>(), 0..8),
                                  ys in prop::collection::vec(any::<i64>(), 0..8)) {
        let a = int_set(&xs);
        let b = int_set(&ys);
        prop_assert_eq!(
            a.intersection(&b).fingerprint(),
            b.intersection(&a).fingerprint()
        );
    }

    #[test]
    fn prop_difference_disjoint_from_subtrahend(
        xs in prop::collection::vec(any::<i64>(), 0..8),
        ys in prop::collection::vec(any::<i64>(), 0..8),
    ) {
        let a = int_set(&xs);
        let b = int_set(&ys);
        let d = a.difference(&b);
        prop_assert!(d.iter().all(|e| !b.contains(e)));
        prop_assert_eq!(d.intersection(&a).fingerprint(), d.fingerprint());
    }

    #[test]
    fn prop_fcn_self_update_is_identity(entries in prop::collection::btree_map(any::<i64>(), any::<i64>(), 1..6)) {
        let f = FcnValue::from_pairs(
            entries.iter().map(|(&k, &v)| (Value::int(k), Value::int(v))),
        );
        for d in f.domain_elems().to_vec() {
            let v = f.apply(&d).expect("domain element").clone();
            prop_assert_eq!(f.update(&d, v).fingerprint(), f.fingerprint());
        }
    }

    #[test]
    fn prop_tuple_fcn_round_trip(elems in prop::collection::vec(any::<i64>(), 0..6)) {
        let t = Value::tuple(elems.iter().map(|&e| Value::int(e)).collect());
        let back = t
            .to_fcn()
            .expect("tuple converts")
            .to_tuple()
            .expect("integral domain");
        prop_assert_eq!(Value::tuple(back).fingerprint(), t.fingerprint());
    }

    #[test]
    fn prop_value_roundtrip_through_itf(v in value_strategy()) {
        let json = tlai_eval::itf::value_to_itf(&v);
        let back = tlai_eval::itf::value_from_itf(&json).expect("round trip");
        prop_assert_eq!(back.fingerprint(), v.fingerprint());
    }
}

// ============================================================================
// Evaluator laws
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_and_commutes(a: bool, b: bool) {
        let lhs = eval_str(&format!("{} /\\ {}", tla_bool(a), tla_bool(b))).unwrap();
        let rhs = eval_str(&format!("{} /\\ {}", tla_bool(b), tla_bool(a))).unwrap();
        prop_assert_eq!(lhs, rhs);
    }

    #[test]
    fn prop_or_matches_rust(a: bool, b: bool) {
        let result = eval_str(&format!("{} \\/ {}", tla_bool(a), tla_bool(b))).unwrap();
        prop_assert_eq!(result, Value::Bool(a || b));
    }

    #[test]
    fn prop_de_morgan(a: bool, b: bool) {
        let lhs = eval_str(&format!("~({} /\\ {})", tla_bool(a), tla_bool(b))).unwrap();
        let rhs = eval_str(&format!("~{} \\/ ~{}", tla_bool(a), tla_bool(b))).unwrap();
        prop_assert_eq!(lhs, rhs);
    }

    #[test]
    fn prop_implication_truth_table(a: bool, b: bool) {
        let result = eval_str(&format!("{} => {}", tla_bool(a), tla_bool(b))).unwrap();
        prop_assert_eq!(result, Value::Bool(!a || b));
    }

    #[test]
    fn prop_add_commutes(a in -1000i64..1000, b in -1000i64..1000) {
        let lhs = eval_str(&format!("({}) + ({})", a, b)).unwrap();
        let rhs = eval_str(&format!("({}) + ({})", b, a)).unwrap();
        prop_assert_eq!(lhs, rhs);
    }

    #[test]
    fn prop_arithmetic_matches_rust(a in -100i64..100, b in -100i64..100) {
        prop_assert_eq!(
            eval_str(&format!("({}) + ({})", a, b)).unwrap(),
            Value::int(a + b)
        );
        prop_assert_eq!(
            eval_str(&format!("({}) * ({})", a, b)).unwrap(),
            Value::int(a * b)
        );
        prop_assert_eq!(
            eval_str(&format!("({}) - ({})", a, b)).unwrap(),
            Value::int(a - b)
        );
    }

    #[test]
    fn prop_mod_is_floor_mod(a in -100i64..100, b in 1i64..20) {
        let result = eval_str(&format!("({}) % {}", a, b)).unwrap();
        prop_assert_eq!(result, Value::int(a.rem_euclid(b)));
    }

    #[test]
    fn prop_range_cardinality(a in -20i64..20, b in -20i64..20) {
        let result = eval_str(&format!("Cardinality(({})..({}))", a, b)).unwrap();
        let expected = if b >= a { b - a + 1 } else { 0 };
        prop_assert_eq!(result, Value::int(expected));
    }

    #[test]
    fn prop_comparison_matches_rust(a in -100i64..100, b in -100i64..100) {
        prop_assert_eq!(
            eval_str(&format!("({}) < ({})", a, b)).unwrap(),
            Value::Bool(a < b)
        );
        prop_assert_eq!(
            eval_str(&format!("({}) = ({})", a, b)).unwrap(),
            Value::Bool(a == b)
        );
    }

    #[test]
    fn prop_membership_matches_contains(x in 0i64..10, lo in 0i64..5, hi in 3i64..10) {
        let result = eval_str(&format!("{} \\in {}..{}", x, lo, hi)).unwrap();
        prop_assert_eq!(result, Value::Bool(x >= lo && x <= hi));
    }

    #[test]
    fn prop_init_states_deduplicate(a in 0i64..5, b in 0i64..5) {
        let src = format!(
            "---- MODULE Test ----\nVARIABLE x\nInit == x \\in {{{}, {}, {}}}\nNext == x' = x\n====",
            a, b, a
        );
        let init = compute_initial_states(&src, &HashMap::new()).unwrap();
        let expected = if a == b { 1 } else { 2 };
        prop_assert_eq!(init.len(), expected);
    }

    #[test]
    fn prop_choose_picks_a_member(xs in prop::collection::btree_set(0i64..50, 1..8)) {
        let elems: Vec<String> = xs.iter().map(|x| x.to_string()).collect();
        let src = format!("CHOOSE x \\in {{{}}} : TRUE", elems.join(", "));
        let result = eval_str(&src).unwrap();
        let Value::Int(n) = result else { panic!("expected int") };
        let n: i64 = (&n).try_into().unwrap();
        prop_assert!(xs.contains(&n));
    }
}
