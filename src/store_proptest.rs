#![cfg(test)]

// Property tests for OrderedStore kept inside the crate so they can reach
// the store and registry without feature gates.

use crate::registry::{KeyRegistry, Token};
use crate::store::OrderedStore;
use crate::value::Value;
use proptest::prelude::*;

// Pool-indexed operations so shrinking moves towards earlier keys and
// shorter op lists.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i64),
    Remove(usize),
    Get(usize),
    Mutate(usize, i64),
    Pop,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<Value>, Vec<Op>)> {
    let key = prop_oneof![
        (-20i64..20).prop_map(Value::Int),
        "[a-z]{0,3}".prop_map(Value::Str),
        proptest::collection::vec(0i64..3, 0..3).prop_map(Value::from),
    ];
    proptest::collection::vec(key, 1..=8).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            (idx.clone(), any::<i64>()).prop_map(|(i, v)| Op::Insert(i, v)),
            idx.clone().prop_map(Op::Remove),
            idx.clone().prop_map(Op::Get),
            (idx, any::<i64>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            Just(Op::Pop),
            Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Property: the store behaves like a Vec of (token, value) in insertion
// order where overwrites stay in place and removals close the gap.
// - `insert` returns the replaced value exactly when the model had one.
// - `pop` takes the model's last entry.
// - forward and backward iteration match the model and its reverse.
// - `next_index` is one past the highest integer key ever inserted.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_vec_model((pool, ops) in arb_scenario()) {
        let mut registry = KeyRegistry::new();
        let tokens: Vec<Token> = pool.iter().map(|k| registry.register(k).unwrap()).collect();
        let mut sut = OrderedStore::new();
        let mut model: Vec<(Token, i64)> = Vec::new();
        let mut high_water = 0i64;

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let t = tokens[i];
                    let prev = sut.insert(t, Value::Int(v));
                    match model.iter_mut().find(|(mt, _)| *mt == t) {
                        Some((_, mv)) => {
                            prop_assert_eq!(prev, Some(Value::Int(*mv)));
                            *mv = v;
                        }
                        None => {
                            prop_assert!(prev.is_none());
                            model.push((t, v));
                        }
                    }
                    if let Some(n) = pool[i].as_int() {
                        high_water = high_water.max(n + 1);
                    }
                }
                Op::Remove(i) => {
                    let t = tokens[i];
                    let removed = sut.remove(t);
                    match model.iter().position(|(mt, _)| *mt == t) {
                        Some(at) => {
                            let (_, mv) = model.remove(at);
                            prop_assert_eq!(removed, Some(Value::Int(mv)));
                        }
                        None => prop_assert!(removed.is_none()),
                    }
                }
                Op::Get(i) => {
                    let t = tokens[i];
                    let expected = model.iter().find(|(mt, _)| *mt == t).map(|(_, v)| Value::Int(*v));
                    prop_assert_eq!(sut.get(t).cloned(), expected);
                    prop_assert_eq!(sut.contains(t), sut.get(t).is_some());
                }
                Op::Mutate(i, d) => {
                    let t = tokens[i];
                    if let Some(Value::Int(v)) = sut.get_mut(t) {
                        *v = v.wrapping_add(d);
                    }
                    if let Some((_, mv)) = model.iter_mut().find(|(mt, _)| *mt == t) {
                        *mv = mv.wrapping_add(d);
                    }
                }
                Op::Pop => {
                    let popped = sut.pop();
                    prop_assert_eq!(popped, model.pop().map(|(t, v)| (t, Value::Int(v))));
                }
                Op::Iterate => {
                    let forward: Vec<_> = sut.iter().map(|(t, v)| (t, v.clone())).collect();
                    let expected: Vec<_> = model.iter().map(|(t, v)| (*t, Value::Int(*v))).collect();
                    prop_assert_eq!(&forward, &expected);
                    let mut backward: Vec<_> = sut.iter().rev().map(|(t, v)| (t, v.clone())).collect();
                    backward.reverse();
                    prop_assert_eq!(backward, expected);
                }
            }

            // Post-conditions after each op
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            prop_assert_eq!(sut.next_index(), high_water);
            prop_assert_eq!(sut.first().and_then(|p| sut.entry(p)).map(|(t, _)| t), model.first().map(|(t, _)| *t));
            prop_assert_eq!(sut.last().and_then(|p| sut.entry(p)).map(|(t, _)| t), model.last().map(|(t, _)| *t));
        }
    }
}
