//! OrderedStore: insertion-ordered storage addressed by key tokens.
//!
//! Entries live in a generational arena and are threaded on a doubly
//! linked list in first-insertion order; a hash table maps each token to its
//! arena slot. Overwriting a value keeps its position, removal unlinks in
//! O(1) without touching the order of the rest.

use crate::registry::Token;
use crate::value::Value;
use core::hash::BuildHasher;
use core::mem;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

/// Stable position of an entry, valid until that entry is removed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Position(DefaultKey);

#[derive(Debug)]
struct Node {
    token: Token,
    value: Value,
    hash: u64,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

pub struct OrderedStore<S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Node>, // storage using generational keys
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
    next_index: i64,
}

impl OrderedStore {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashTable::with_capacity(capacity),
            slots: SlotMap::with_capacity_and_key(capacity),
            ..Self::new()
        }
    }
}

impl Default for OrderedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> OrderedStore<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            head: None,
            tail: None,
            next_index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Next unused non-negative integer key: one past the highest integer
    /// key ever inserted. Removing that key does not lower it.
    pub fn next_index(&self) -> i64 {
        self.next_index
    }

    fn slot_of(&self, token: Token) -> Option<DefaultKey> {
        let hash = self.hasher.hash_one(token);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|n| n.token == token)
                    .unwrap_or(false)
            })
            .copied()
    }

    pub fn contains(&self, token: Token) -> bool {
        self.slot_of(token).is_some()
    }

    pub fn get(&self, token: Token) -> Option<&Value> {
        let k = self.slot_of(token)?;
        self.slots.get(k).map(|n| &n.value)
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Value> {
        let k = self.slot_of(token)?;
        self.slots.get_mut(k).map(|n| &mut n.value)
    }

    /// Overwrites in place when `token` is present, otherwise appends.
    /// Returns the replaced value.
    pub fn insert(&mut self, token: Token, value: Value) -> Option<Value> {
        if let Some(k) = self.slot_of(token) {
            return self.slots.get_mut(k).map(|n| mem::replace(&mut n.value, value));
        }

        let hash = self.hasher.hash_one(token);
        let k = self.slots.insert(Node {
            token,
            value,
            hash,
            prev: self.tail,
            next: None,
        });
        match self.tail.and_then(|t| self.slots.get_mut(t)) {
            Some(tail) => tail.next = Some(k),
            None => self.head = Some(k),
        }
        self.tail = Some(k);
        self.index
            .insert_unique(hash, k, |&kk| self.slots.get(kk).map(|n| n.hash).unwrap_or(0));

        if let Some(i) = token.as_index() {
            if i >= self.next_index {
                self.next_index = i.saturating_add(1);
            }
        }
        None
    }

    pub fn remove(&mut self, token: Token) -> Option<Value> {
        let hash = self.hasher.hash_one(token);
        let entry = self
            .index
            .find_entry(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|n| n.token == token)
                    .unwrap_or(false)
            })
            .ok()?;
        let (k, _) = entry.remove();
        self.unlink(k).map(|n| n.value)
    }

    /// Removes the entry at the last position.
    pub fn pop(&mut self) -> Option<(Token, Value)> {
        let token = self.slots.get(self.tail?)?.token;
        self.remove(token).map(|v| (token, v))
    }

    // Index entry must already be gone.
    fn unlink(&mut self, k: DefaultKey) -> Option<Node> {
        let node = self.slots.remove(k)?;
        match node.prev.and_then(|p| self.slots.get_mut(p)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|n| self.slots.get_mut(n)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }
        Some(node)
    }

    pub fn first(&self) -> Option<Position> {
        self.head.map(Position)
    }

    pub fn last(&self) -> Option<Position> {
        self.tail.map(Position)
    }

    pub fn next(&self, pos: Position) -> Option<Position> {
        self.slots.get(pos.0)?.next.map(Position)
    }

    pub fn prev(&self, pos: Position) -> Option<Position> {
        self.slots.get(pos.0)?.prev.map(Position)
    }

    pub fn entry(&self, pos: Position) -> Option<(Token, &Value)> {
        self.slots.get(pos.0).map(|n| (n.token, &n.value))
    }

    pub fn entry_mut(&mut self, pos: Position) -> Option<(Token, &mut Value)> {
        self.slots.get_mut(pos.0).map(|n| (n.token, &mut n.value))
    }

    /// Entries in store order; `.rev()` walks from the last position.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            slots: &self.slots,
            front: self.head,
            back: self.tail,
            remaining: self.slots.len(),
        }
    }
}

pub struct Iter<'a> {
    slots: &'a SlotMap<DefaultKey, Node>,
    front: Option<DefaultKey>,
    back: Option<DefaultKey>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (Token, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.slots.get(self.front?)?;
        self.front = node.next;
        self.remaining -= 1;
        Some((node.token, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a> DoubleEndedIterator for Iter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.slots.get(self.back?)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some((node.token, &node.value))
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::KeyRegistry;

    fn tokens(reg: &mut KeyRegistry, keys: &[&str]) -> Vec<Token> {
        keys.iter()
            .map(|k| reg.register(&Value::from(*k)).unwrap())
            .collect()
    }

    #[test]
    fn overwrite_keeps_position() {
        let mut reg = KeyRegistry::new();
        let t = tokens(&mut reg, &["a", "b", "c"]);
        let mut s = OrderedStore::new();
        for (i, &tok) in t.iter().enumerate() {
            assert!(s.insert(tok, Value::from(i)).is_none());
        }
        assert_eq!(s.insert(t[0], Value::from(10)), Some(Value::Int(0)));
        let order: Vec<_> = s.iter().map(|(tok, _)| tok).collect();
        assert_eq!(order, t);
        assert_eq!(s.get(t[0]), Some(&Value::Int(10)));
    }

    #[test]
    fn remove_and_reinsert_moves_to_end() {
        let mut reg = KeyRegistry::new();
        let t = tokens(&mut reg, &["a", "b", "c"]);
        let mut s = OrderedStore::new();
        for &tok in &t {
            s.insert(tok, Value::Null);
        }
        assert_eq!(s.remove(t[0]), Some(Value::Null));
        assert!(s.remove(t[0]).is_none());
        s.insert(t[0], Value::Null);
        let order: Vec<_> = s.iter().map(|(tok, _)| tok).collect();
        assert_eq!(order, vec![t[1], t[2], t[0]]);
        let rev: Vec<_> = s.iter().rev().map(|(tok, _)| tok).collect();
        assert_eq!(rev, vec![t[0], t[2], t[1]]);
    }

    #[test]
    fn next_index_tracks_highest_integer_key() {
        let mut reg = KeyRegistry::new();
        let mut s = OrderedStore::new();
        assert_eq!(s.next_index(), 0);
        s.insert(reg.register(&Value::Int(-5)).unwrap(), Value::Null);
        assert_eq!(s.next_index(), 0);
        let seven = reg.register(&Value::Int(7)).unwrap();
        s.insert(seven, Value::Null);
        s.insert(reg.register(&Value::from("x")).unwrap(), Value::Null);
        assert_eq!(s.next_index(), 8);
        s.remove(seven);
        assert_eq!(s.next_index(), 8);
    }

    #[test]
    fn pop_takes_last_position() {
        let mut reg = KeyRegistry::new();
        let t = tokens(&mut reg, &["a", "b"]);
        let mut s = OrderedStore::new();
        s.insert(t[0], Value::Int(1));
        s.insert(t[1], Value::Int(2));
        assert_eq!(s.pop(), Some((t[1], Value::Int(2))));
        assert_eq!(s.pop(), Some((t[0], Value::Int(1))));
        assert_eq!(s.pop(), None);
        assert!(s.is_empty());
        assert_eq!(s.first(), None);
        assert_eq!(s.last(), None);
    }

    #[test]
    fn cursor_walks_both_ways() {
        let mut reg = KeyRegistry::new();
        let t = tokens(&mut reg, &["a", "b", "c"]);
        let mut s = OrderedStore::new();
        for &tok in &t {
            s.insert(tok, Value::Null);
        }
        s.remove(t[1]);
        let first = s.first().unwrap();
        let second = s.next(first).unwrap();
        assert_eq!(s.entry(second).map(|(tok, _)| tok), Some(t[2]));
        assert_eq!(s.next(second), None);
        assert_eq!(s.prev(second), Some(first));
    }
}
