//! `Collection`: the ordered map with keys of any category.
//!
//! This is the surface that ties the key registry, the ordered store and the
//! optional guard together. Query operations live in [`crate::query`] and
//! are built on the scans this module exposes to the crate.

use crate::error::{Error, Result};
use crate::expr::{Binary, Expression, IntoExpression};
use crate::registry::KeyRegistry;
use crate::store::{self, OrderedStore};
use crate::traverse::{self, check_guard, Direction, Signal};
use crate::value::Value;
use log::trace;
use std::collections::BTreeMap;
use std::fmt;

/// Construction-time settings for [`Collection::with_options`].
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Checked against every write; a result of exactly `false` rejects it.
    pub guard: Option<Expression>,
    /// Entries to reserve room for.
    pub capacity: usize,
}

/// Insertion-ordered map from any supported [`Value`] key to a [`Value`].
///
/// Keys are classified into tokens by a per-map registry: numbers and bools
/// compare by integer value, text by content, lists and records by their
/// serialized content, and objects, functions and nested maps by identity.
/// Order is the order in which keys were first set; overwriting keeps the
/// position, forgetting and setting again moves the key to the end.
///
/// ```
/// use keyed_collection::{Collection, Value};
///
/// let mut map = Collection::new();
/// map.set("a", 1)?;
/// map.set(vec![1, 2], "list key")?;
/// map.push(3)?;
/// assert_eq!(map.get("a")?, Some(&Value::Int(1)));
/// assert!(map.has(vec![1, 2])?);
/// assert_eq!(map.len(), 3);
/// # Ok::<(), keyed_collection::Error>(())
/// ```
pub struct Collection {
    registry: KeyRegistry,
    store: OrderedStore,
    guard: Option<Expression>,
}

impl Collection {
    pub fn new() -> Self {
        Self {
            registry: KeyRegistry::new(),
            store: OrderedStore::new(),
            guard: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: OrderedStore::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// An empty map whose writes are checked by `guard` (`value`, `key`).
    pub fn with_guard(guard: impl IntoExpression<Binary>) -> Result<Self> {
        Ok(Self {
            guard: Some(guard.into_expression()?),
            ..Self::new()
        })
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            guard: options.guard,
            ..Self::with_capacity(options.capacity)
        }
    }

    /// Builds a map from a list (keys `0..n`), a record or object (field
    /// names as keys) or a nested map (entries and guard copied).
    pub fn from_value(source: Value) -> Result<Self> {
        let (pairs, guard) = pairs_of(source)?;
        let mut map = Self::with_options(Options {
            guard,
            capacity: pairs.len(),
        });
        map.set_all(pairs)?;
        Ok(map)
    }

    /// Like [`Collection::from_value`], with `guard` replacing any guard the
    /// source carries and checked against every initial entry.
    pub fn from_value_with_guard(
        source: Value,
        guard: impl IntoExpression<Binary>,
    ) -> Result<Self> {
        let guard = guard.into_expression()?;
        let (pairs, _) = pairs_of(source)?;
        let mut map = Self::with_options(Options {
            guard: Some(guard),
            capacity: pairs.len(),
        });
        map.set_all(pairs)?;
        Ok(map)
    }

    /// Sets each pair in order. Fails on the first unsupported key.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let mut map = Self::new();
        for (key, value) in pairs {
            map.set(key, value)?;
        }
        Ok(map)
    }

    fn set_all(&mut self, pairs: Vec<(Value, Value)>) -> Result<()> {
        for (key, value) in pairs {
            self.set(key, value)?;
        }
        Ok(())
    }

    pub fn guard(&self) -> Option<&Expression> {
        self.guard.as_ref()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn has(&self, key: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        Ok(match self.registry.lookup(&key)? {
            Some(token) => self.store.contains(token),
            None => false,
        })
    }

    pub fn get(&self, key: impl Into<Value>) -> Result<Option<&Value>> {
        let key = key.into();
        Ok(match self.registry.lookup(&key)? {
            Some(token) => self.store.get(token),
            None => None,
        })
    }

    /// The stored value, or `default` when `key` is absent.
    pub fn get_or(&self, key: impl Into<Value>, default: impl Into<Value>) -> Result<Value> {
        Ok(match self.get(key)? {
            Some(v) => v.clone(),
            None => default.into(),
        })
    }

    /// Mutable access to a stored value. Writes through the returned
    /// reference are not seen by the guard.
    pub fn get_mut(&mut self, key: impl Into<Value>) -> Result<Option<&mut Value>> {
        let key = key.into();
        Ok(match self.registry.lookup(&key)? {
            Some(token) => self.store.get_mut(token),
            None => None,
        })
    }

    /// Inserts or overwrites, returning the previous value. A `null` key
    /// appends under the next unused integer key.
    ///
    /// The key is classified and the guard consulted before anything
    /// changes, so a failed call leaves the map as it was.
    pub fn set(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = match key.into() {
            Value::Null => Value::Int(self.store.next_index()),
            key => key,
        };
        let value = value.into();
        self.registry.lookup(&key)?;
        if let Some(guard) = &self.guard {
            check_guard(guard, &value, &key)?;
        }
        self.insert_unchecked(key, value)
    }

    /// Writes without consulting the guard. Used for entries that already
    /// passed it in the map they were copied from.
    pub(crate) fn insert_unchecked(&mut self, key: Value, value: Value) -> Result<Option<Value>> {
        let token = self.registry.register(&key)?;
        Ok(self.store.insert(token, value))
    }

    /// Removes `key`, returning its value. The key stays registered.
    pub fn forget(&mut self, key: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        Ok(match self.registry.lookup(&key)? {
            Some(token) => self.store.remove(token),
            None => None,
        })
    }

    /// Appends under the next unused integer key and returns that key.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<Value> {
        let key = Value::Int(self.store.next_index());
        self.set(key.clone(), value)?;
        Ok(key)
    }

    /// Removes and returns the value at the last position.
    pub fn pop(&mut self) -> Result<Value> {
        self.store
            .pop()
            .map(|(_, value)| value)
            .ok_or(Error::EmptyCollection)
    }

    /// Entries in order as `(key, value)`.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            registry: &self.registry,
            inner: self.store.iter(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &Value> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &Value> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Owned copy of every entry, unaffected by later changes to the map.
    pub fn snapshot(&self) -> Vec<(Value, Value)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Visits entries first to last; see [`Collection::walk_backward`].
    pub fn walk_forward<F>(&mut self, visitor: F) -> Result<bool>
    where
        F: FnMut(&mut Value, &Value) -> Signal,
    {
        traverse::walk(
            &self.registry,
            &mut self.store,
            self.guard.as_ref(),
            Direction::Forward,
            visitor,
        )
    }

    /// Visits entries last to first. The visitor may rewrite each value in
    /// place and returns [`Signal::Stop`] to end the walk early; the result
    /// is `true` when every entry was visited.
    ///
    /// With a guard, each rewritten value is checked as it is produced. A
    /// rejected value is restored and the walk fails with
    /// [`Error::GuardRejected`]; values rewritten earlier in the walk stay.
    pub fn walk_backward<F>(&mut self, visitor: F) -> Result<bool>
    where
        F: FnMut(&mut Value, &Value) -> Signal,
    {
        traverse::walk(
            &self.registry,
            &mut self.store,
            self.guard.as_ref(),
            Direction::Backward,
            visitor,
        )
    }

    pub(crate) fn scan<F>(&self, direction: Direction, visit: F) -> Result<bool>
    where
        F: FnMut(&Value, &Value) -> Result<Signal>,
    {
        traverse::scan(&self.registry, &self.store, direction, visit)
    }

    /// An empty map with this map's guard.
    pub(crate) fn empty_like(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            ..Self::new()
        }
    }

    /// Plain structure for export: a map keyed exactly `0..n` in order
    /// becomes a list, anything else a record keyed by each key's text.
    /// Nested maps, lists and records are flattened the same way.
    ///
    /// A map must not contain itself.
    pub fn to_value(&self) -> Value {
        let sequential = self
            .keys()
            .enumerate()
            .all(|(i, k)| k.as_int() == i64::try_from(i).ok());
        if sequential {
            Value::List(self.values().map(flatten).collect())
        } else {
            Value::Record(
                self.iter()
                    .map(|(k, v)| (k.to_string(), flatten(v)))
                    .collect(),
            )
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_value()).map_err(|e| Error::Serialization(e.to_string()))
    }
}

fn flatten(value: &Value) -> Value {
    match value {
        Value::Map(m) => m.borrow().to_value(),
        Value::List(items) => Value::List(items.iter().map(flatten).collect()),
        Value::Record(fields) => Value::Record(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), flatten(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn pairs_of(source: Value) -> Result<(Vec<(Value, Value)>, Option<Expression>)> {
    let pairs = match source {
        Value::List(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i), v))
            .collect(),
        Value::Record(fields) => record_pairs(fields),
        Value::Object(o) => {
            let fields = o.fields().clone();
            record_pairs(fields)
        }
        Value::Map(m) => {
            let map = m.borrow();
            return Ok((map.snapshot(), map.guard.clone()));
        }
        other => {
            trace!("refusing to build a collection from {}", other.type_name());
            return Err(Error::NotCollectionLike(other.type_name()));
        }
    };
    Ok((pairs, None))
}

fn record_pairs(fields: BTreeMap<String, Value>) -> Vec<(Value, Value)> {
    fields.into_iter().map(|(k, v)| (Value::Str(k), v)).collect()
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies entries and guard into a fresh registry.
impl Clone for Collection {
    fn clone(&self) -> Self {
        let mut copy = self.empty_like();
        for (key, value) in self.iter() {
            copy.insert_unchecked(key.clone(), value.clone())
                .expect("key classified by the source map must classify again");
        }
        copy
    }
}

/// Same entries in the same order. Guards are not compared.
impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Appends each value under the next integer key.
impl<V: Into<Value>> FromIterator<V> for Collection {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut map = Self::new();
        for value in iter {
            let key = Value::Int(map.store.next_index());
            let token = map
                .registry
                .register(&key)
                .expect("integer keys always classify");
            map.store.insert(token, value.into());
        }
        map
    }
}

pub struct Iter<'a> {
    registry: &'a KeyRegistry,
    inner: store::Iter<'a>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Value, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let (token, value) = self.inner.next()?;
        let key = self
            .registry
            .resolve(token)
            .expect("stored token must be registered");
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let (token, value) = self.inner.next_back()?;
        let key = self
            .registry
            .resolve(token)
            .expect("stored token must be registered");
        Some((key, value))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a Collection {
    type Item = (&'a Value, &'a Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl IntoIterator for Collection {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshot().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    #[test]
    fn null_key_appends() {
        let mut map = Collection::new();
        map.set(5, "five").unwrap();
        map.set(Value::Null, "six").unwrap();
        assert_eq!(map.get(6).unwrap(), Some(&Value::from("six")));
        assert_eq!(map.push("seven").unwrap(), Value::Int(7));
    }

    #[test]
    fn rejected_write_leaves_map_untouched() {
        let mut map = Collection::with_guard("value >= 0").unwrap();
        map.set("a", 1).unwrap();
        assert_eq!(
            map.set("a", -1),
            Err(Error::GuardRejected("a".to_string()))
        );
        assert_eq!(map.get("a").unwrap(), Some(&Value::Int(1)));
        assert!(map.set("b", -1).is_err());
        assert!(!map.has("b").unwrap());
        assert_eq!(map.registry.len(), 1);
    }

    #[test]
    fn clone_is_independent() {
        let mut map = Collection::from_pairs([("a", 1), ("b", 2)]).unwrap();
        let copy = map.clone();
        map.set("a", 10).unwrap();
        assert_eq!(copy.get("a").unwrap(), Some(&Value::Int(1)));
        assert_eq!(copy.keys().cloned().collect::<Vec<_>>(), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn clone_keeps_every_key_category() {
        let obj = Value::from(Object::from_fields([("x", 1)]));
        let mut map = Collection::new();
        map.set(1.5, "float").unwrap();
        map.set(vec![1, 2], "list").unwrap();
        map.set(obj.clone(), "object").unwrap();
        let copy = map.clone();
        assert_eq!(copy, map);
        assert_eq!(copy.get(obj).unwrap(), Some(&Value::from("object")));
    }

    #[test]
    fn iteration_length_is_exact_in_both_directions() {
        let mut map: Collection = (0..6).collect();
        map.forget(2).unwrap();
        map.pop().unwrap();
        let mut iter = map.iter();
        assert_eq!(iter.len(), 4);
        iter.next();
        iter.next_back();
        assert_eq!(iter.len(), 2);
        assert_eq!(iter.count(), 2);
        assert_eq!(map.iter().rev().count(), map.len());
    }

    #[test]
    fn object_fields_become_entries() {
        let o = Object::from_fields([("x", 1), ("y", 2)]);
        let map = Collection::from_value(Value::from(o)).unwrap();
        assert_eq!(map.get("y").unwrap(), Some(&Value::Int(2)));
        assert_eq!(
            Collection::from_value(Value::Int(3)).unwrap_err(),
            Error::NotCollectionLike("int")
        );
    }

    #[test]
    fn sequential_maps_export_as_lists() {
        let map: Collection = vec![1, 2, 3].into_iter().collect();
        assert_eq!(map.to_json().unwrap(), "[1,2,3]");
        let mut sparse = map.clone();
        sparse.forget(0).unwrap();
        assert_eq!(sparse.to_json().unwrap(), r#"{"1":2,"2":3}"#);
    }
}
