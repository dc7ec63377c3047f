//! QueryOps: search and transform operations over a [`Collection`].
//!
//! Every search is a [`Collection::grep`] with some [`Limit`]; the
//! transforms run the same read-only scan and build a fresh map. None of
//! them touch the source map.
//!
//! An expression result *passes* unless it is exactly `false`. `0`, `""` and
//! `null` all pass.

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::expr::{Binary, IntoExpression, Ternary, Unary};
use crate::traverse::{Direction, Signal};
use crate::value::Value;
use log::trace;
use std::num::NonZeroUsize;

/// How many passing entries [`Collection::grep`] collects, and from which
/// end.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Limit {
    /// Scan forward through the whole map.
    All,
    /// Scan forward, stop after `n` matches.
    First(NonZeroUsize),
    /// Scan backward, stop after `n` matches. Matches are kept in the order
    /// they were found, so the result runs from the end of the map towards
    /// its start.
    Last(NonZeroUsize),
}

fn positive(n: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(n).ok_or_else(|| Error::InvalidArgument("n must be positive".to_owned()))
}

impl Collection {
    /// Copies every entry whose `expression(value, key)` passes into a new
    /// map carrying this map's guard.
    pub fn grep(&self, expression: impl IntoExpression<Binary>, limit: Limit) -> Result<Collection> {
        let expression = expression.into_expression()?;
        let (direction, cap) = match limit {
            Limit::All => (Direction::Forward, None),
            Limit::First(n) => (Direction::Forward, Some(n.get())),
            Limit::Last(n) => (Direction::Backward, Some(n.get())),
        };
        let mut found = self.empty_like();
        self.scan(direction, |value, key| {
            if expression.evaluate(&[value, key])?.passes() {
                found.insert_unchecked(key.clone(), value.clone())?;
                if cap.is_some_and(|n| found.len() >= n) {
                    return Ok(Signal::Stop);
                }
            }
            Ok(Signal::Continue)
        })?;
        trace!("grep {limit:?} matched {} of {} entries", found.len(), self.len());
        Ok(found)
    }

    pub fn find(&self, expression: impl IntoExpression<Binary>) -> Result<Collection> {
        self.grep(expression, Limit::All)
    }

    /// The first `n` passing entries. `n == 0` is an
    /// [`Error::InvalidArgument`].
    pub fn first(&self, expression: impl IntoExpression<Binary>, n: usize) -> Result<Collection> {
        let n = positive(n)?;
        self.grep(expression, Limit::First(n))
    }

    pub fn first_one(&self, expression: impl IntoExpression<Binary>) -> Result<Collection> {
        self.grep(expression, Limit::First(NonZeroUsize::MIN))
    }

    /// The last `n` passing entries, nearest to the end first.
    pub fn last(&self, expression: impl IntoExpression<Binary>, n: usize) -> Result<Collection> {
        let n = positive(n)?;
        self.grep(expression, Limit::Last(n))
    }

    pub fn last_one(&self, expression: impl IntoExpression<Binary>) -> Result<Collection> {
        self.grep(expression, Limit::Last(NonZeroUsize::MIN))
    }

    /// True when every entry passes. Vacuously true for an empty map.
    pub fn every(&self, expression: impl IntoExpression<Binary>) -> Result<bool> {
        Ok(self.find(expression)?.len() == self.len())
    }

    pub fn some(&self, expression: impl IntoExpression<Binary>) -> Result<bool> {
        Ok(self.first_one(expression)?.len() == 1)
    }

    pub fn none(&self, expression: impl IntoExpression<Binary>) -> Result<bool> {
        Ok(self.first_one(expression)?.is_empty())
    }

    /// Entries whose expression passes, in order, under this map's guard.
    pub fn filter(&self, expression: impl IntoExpression<Binary>) -> Result<Collection> {
        self.grep(expression, Limit::All)
    }

    /// Same keys in the same order, each value replaced by
    /// `expression(value, key)`. The result has no guard.
    pub fn map(&self, expression: impl IntoExpression<Binary>) -> Result<Collection> {
        let expression = expression.into_expression()?;
        let mut mapped = Collection::with_capacity(self.len());
        self.scan(Direction::Forward, |value, key| {
            let value = expression.evaluate(&[value, key])?;
            mapped.insert_unchecked(key.clone(), value)?;
            Ok(Signal::Continue)
        })?;
        Ok(mapped)
    }

    /// Same values in order, each key replaced by `expression(value, key)`.
    /// When two entries land on the same key the later value wins and the
    /// earlier position stays; a `null` key appends. The result has no guard.
    pub fn rekey(&self, expression: impl IntoExpression<Binary>) -> Result<Collection> {
        let expression = expression.into_expression()?;
        let mut rekeyed = Collection::with_capacity(self.len());
        self.scan(Direction::Forward, |value, key| {
            let key = expression.evaluate(&[value, key])?;
            rekeyed.set(key, value.clone())?;
            Ok(Signal::Continue)
        })?;
        Ok(rekeyed)
    }

    /// Folds forward with `carry = expression(carry, value, key)`.
    pub fn reduce(
        &self,
        expression: impl IntoExpression<Ternary>,
        initial: impl Into<Value>,
    ) -> Result<Value> {
        let expression = expression.into_expression()?;
        let mut carry = initial.into();
        self.scan(Direction::Forward, |value, key| {
            carry = expression.evaluate(&[&carry, value, key])?;
            Ok(Signal::Continue)
        })?;
        Ok(carry)
    }

    /// [`Collection::reduce`], then `finish(carry)` as the result.
    pub fn reduce_with(
        &self,
        expression: impl IntoExpression<Ternary>,
        initial: impl Into<Value>,
        finish: impl IntoExpression<Unary>,
    ) -> Result<Value> {
        let finish = finish.into_expression()?;
        let carry = self.reduce(expression, initial)?;
        finish.evaluate(&[&carry])
    }

    /// Groups entries by `expression(value, key)`.
    ///
    /// The result maps each group key, in order of first appearance, to a
    /// nested map ([`Value::Map`]) of that group's entries in their original
    /// order. Nested maps carry this map's guard; the outer map has none. A
    /// `null` group key is an [`Error::UnsupportedKeyType`].
    pub fn partition(&self, expression: impl IntoExpression<Binary>) -> Result<Collection> {
        let expression = expression.into_expression()?;
        let mut groups = Collection::new();
        self.scan(Direction::Forward, |value, key| {
            let group = expression.evaluate(&[value, key])?;
            match groups.get(&group)?.and_then(Value::as_map).cloned() {
                Some(inner) => {
                    inner
                        .borrow_mut()
                        .insert_unchecked(key.clone(), value.clone())?;
                }
                None => {
                    let mut inner = self.empty_like();
                    inner.insert_unchecked(key.clone(), value.clone())?;
                    groups.insert_unchecked(group, Value::from(inner))?;
                }
            }
            Ok(Signal::Continue)
        })?;
        trace!("partition formed {} groups", groups.len());
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits() -> Collection {
        (0..10).collect()
    }

    #[test]
    fn last_collects_from_the_end() {
        let tail = digits().last("value % 2 == 0", 2).unwrap();
        let keys: Vec<_> = tail.keys().cloned().collect();
        assert_eq!(keys, vec![Value::Int(8), Value::Int(6)]);
    }

    #[test]
    fn zero_limit_is_rejected_before_compiling() {
        let map = digits();
        assert!(matches!(
            map.first("value +", 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(map.last("value", 0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn grep_results_keep_the_guard() {
        let mut map = Collection::with_guard("value >= 0").unwrap();
        map.set("a", 1).unwrap();
        let mut found = map.find("true").unwrap();
        assert!(found.guard().is_some());
        assert!(found.set("b", -1).is_err());
        assert!(map.map("value").unwrap().guard().is_none());
    }

    #[test]
    fn evaluation_errors_abort_the_query() {
        let map: Collection = vec![Value::Int(1), Value::from("x")].into_iter().collect();
        assert!(matches!(
            map.find("value * 2 > 1"),
            Err(Error::Evaluation(_))
        ));
    }

    #[test]
    fn null_group_key_is_rejected() {
        assert_eq!(
            digits().partition("null").unwrap_err(),
            Error::UnsupportedKeyType("null")
        );
    }
}
