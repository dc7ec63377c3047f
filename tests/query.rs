use keyed_collection::{Collection, Error, Expression, Limit, Value};
use rstest::rstest;
use std::num::NonZeroUsize;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn digits() -> Collection {
    (0..10).collect()
}

fn ints(values: impl Iterator<Item = Value>) -> Vec<i64> {
    values.map(|v| v.as_int().expect("int value")).collect()
}

fn sum(map: &Collection) -> i64 {
    map.values().filter_map(Value::as_int).sum()
}

#[test]
fn parity_finds_split_the_map() {
    init_logging();
    let m = digits();
    let even = m.find("value % 2 == 0").unwrap();
    let odd = m.find("value % 2 == 1").unwrap();
    assert_eq!(even.len(), 5);
    assert_eq!(odd.len(), 5);
    assert_eq!(even.len() + odd.len(), m.len());
}

#[test]
fn first_is_a_prefix_of_find() {
    let m = digits();
    let all = m.find("value > 2").unwrap();
    let three = m.first("value > 2", 3).unwrap();
    assert_eq!(three.len(), 3);
    assert_eq!(three.snapshot(), all.snapshot()[..3].to_vec());
    assert_eq!(m.first("value > 8", 3).unwrap().len(), 1);
}

#[test]
fn last_draws_from_the_tail_nearest_first() {
    let m = digits();
    let tail = m.last("value % 3 == 0", 2).unwrap();
    assert_eq!(ints(tail.keys().cloned()), vec![9, 6]);
    assert!(tail.every("value % 3 == 0").unwrap());
    assert_eq!(ints(m.last_one("true").unwrap().values().cloned()), vec![9]);
}

#[rstest]
#[case(Limit::All, vec![0, 2, 4, 6, 8])]
#[case(Limit::First(NonZeroUsize::new(2).unwrap()), vec![0, 2])]
#[case(Limit::Last(NonZeroUsize::new(2).unwrap()), vec![8, 6])]
#[case(Limit::Last(NonZeroUsize::new(9).unwrap()), vec![8, 6, 4, 2, 0])]
fn grep_limits(#[case] limit: Limit, #[case] expected: Vec<i64>) {
    let found = digits().grep("value % 2 == 0", limit).unwrap();
    assert_eq!(ints(found.values().cloned()), expected);
}

#[rstest]
#[case(0)]
fn non_positive_counts_are_rejected(#[case] n: usize) {
    let m = digits();
    assert!(matches!(m.first("true", n), Err(Error::InvalidArgument(_))));
    assert!(matches!(m.last("true", n), Err(Error::InvalidArgument(_))));
}

#[rstest]
#[case("value >= 0", true, true, false)]
#[case("value > 4", false, true, false)]
#[case("value > 100", false, false, true)]
#[case("0", true, true, false)]
fn quantifiers(
    #[case] expr: &str,
    #[case] every: bool,
    #[case] some: bool,
    #[case] none: bool,
) {
    let m = digits();
    assert_eq!(m.every(expr).unwrap(), every);
    assert_eq!(m.some(expr).unwrap(), some);
    assert_eq!(m.none(expr).unwrap(), none);
}

#[test]
fn quantifiers_on_an_empty_map() {
    let m = Collection::new();
    assert!(m.every("false").unwrap());
    assert!(!m.some("true").unwrap());
    assert!(m.none("true").unwrap());
}

#[test]
fn filter_keeps_zero_and_drops_exact_false() {
    let m = Collection::from_pairs([("zero", 0), ("reject", 1), ("keep", 2)]).unwrap();
    let kept = m.filter("key == 'zero' ? 0 : (key == 'reject' ? false : true)").unwrap();
    let keys: Vec<_> = kept.keys().cloned().collect();
    assert_eq!(keys, vec![Value::from("zero"), Value::from("keep")]);

    let by_closure = m
        .filter(|v: &Value, _: &Value| if v.as_int() == Some(1) { Value::Bool(false) } else { Value::Int(0) })
        .unwrap();
    assert_eq!(by_closure, kept);
}

#[test]
fn map_replaces_values_and_keeps_keys() {
    let m = Collection::from_pairs([("a", 1), ("b", 2)]).unwrap();
    let doubled = m.map("value * 2").unwrap();
    assert_eq!(
        doubled.snapshot(),
        vec![(Value::from("a"), Value::Int(2)), (Value::from("b"), Value::Int(4))]
    );
    assert_eq!(m.get("a").unwrap(), Some(&Value::Int(1)));
}

#[test]
fn rekey_later_entries_overwrite() {
    let m = digits();
    let by_parity = m.rekey("value % 2 == 0 ? 'even' : 'odd'").unwrap();
    assert_eq!(
        by_parity.snapshot(),
        vec![(Value::from("even"), Value::Int(8)), (Value::from("odd"), Value::Int(9))]
    );

    let appended = Collection::from_pairs([("x", 1), ("y", 2)])
        .unwrap()
        .rekey("null")
        .unwrap();
    assert_eq!(ints(appended.keys().cloned()), vec![0, 1]);
}

#[test]
fn reduce_sums() {
    let m: Collection = (0..4).collect();
    assert_eq!(m.reduce("carry + value", 0).unwrap(), Value::Int(6));
    let closure_sum = m
        .reduce(
            |c: &Value, v: &Value, _: &Value| c.as_int().unwrap_or(0) + v.as_int().unwrap_or(0),
            0,
        )
        .unwrap();
    assert_eq!(closure_sum, Value::Int(6));
}

#[test]
fn reduce_with_finishes_the_carry() {
    let m: Collection = (0..4).collect();
    let label = m.reduce_with("carry + value", 0, "'total ' + str(carry)").unwrap();
    assert_eq!(label, Value::from("total 6"));
    assert_eq!(Collection::new().reduce("carry + 1", 42).unwrap(), Value::Int(42));
}

#[test]
fn partition_groups_in_discovery_order() {
    init_logging();
    let groups = digits().partition("value % 2 == 0 ? 'even' : 'odd'").unwrap();
    assert_eq!(
        groups.keys().cloned().collect::<Vec<_>>(),
        vec![Value::from("even"), Value::from("odd")]
    );
    assert!(groups.guard().is_none());

    let even = groups.get("even").unwrap().and_then(Value::as_map).unwrap().borrow().clone();
    let odd = groups.get("odd").unwrap().and_then(Value::as_map).unwrap().borrow().clone();
    assert_eq!(even.len(), 5);
    assert_eq!(sum(&even), 20);
    assert_eq!(odd.len(), 5);
    assert_eq!(sum(&odd), 25);
    assert_eq!(ints(odd.keys().cloned()), vec![1, 3, 5, 7, 9]);
}

#[test]
fn partition_inner_maps_keep_the_guard() {
    let mut m = Collection::with_guard("value >= 0").unwrap();
    for i in 0..4 {
        m.push(i).unwrap();
    }
    let groups = m.partition("value < 2").unwrap();
    let low = groups.get(true).unwrap().and_then(Value::as_map).unwrap().clone();
    assert!(low.borrow().guard().is_some());
    assert!(low.borrow_mut().set("neg", -1).is_err());
    assert_eq!(low.borrow().len(), 2);
}

#[test]
fn nested_maps_are_reachable_from_expressions() {
    let groups = digits().partition("value % 2 == 0 ? 'even' : 'odd'").unwrap();
    let sizes = groups.map("len(value)").unwrap();
    assert_eq!(sizes.get("even").unwrap(), Some(&Value::Int(5)));
    let firsts = groups.map("value[0] ?? value[1]").unwrap();
    assert_eq!(firsts.get("even").unwrap(), Some(&Value::Int(0)));
    assert_eq!(firsts.get("odd").unwrap(), Some(&Value::Int(1)));
}

#[test]
fn compiled_and_closure_expressions_agree() {
    let m = digits();
    let compiled = m.find("value > 6").unwrap();
    let closure = m.find(Expression::binary(|v, _| v.as_int().unwrap_or(0) > 6)).unwrap();
    assert_eq!(compiled, closure);
}

#[test]
fn invalid_expressions_fail_before_scanning() {
    let m = digits();
    for bad in ["value +", "nope(value)", "other > 1", "value ? 1"] {
        assert!(
            matches!(m.find(bad), Err(Error::InvalidExpression { .. })),
            "{bad} should not compile"
        );
    }
}

#[test]
fn queries_never_change_the_source() {
    let m = digits();
    let before = m.snapshot();
    let _ = m.find("value > 3").unwrap();
    let _ = m.map("value * value").unwrap();
    let _ = m.partition("value % 3").unwrap();
    assert!(m.find("value / 0").is_err());
    assert_eq!(m.snapshot(), before);
}

#[test]
fn overflowing_division_fails_the_query() {
    let m: Collection = [i64::MIN].into_iter().collect();
    assert!(matches!(m.map("value / -1"), Err(Error::Evaluation(_))));
    assert_eq!(m.map("value / 2").unwrap().get(0).unwrap(), Some(&Value::Int(i64::MIN / 2)));
}
