//! KeyRegistry: turns keys of any category into stable lookup tokens and
//! back.
//!
//! Classification:
//! - ints, floats and bools hash by their integer-normalized value, so `1`,
//!   `1.0` and `true` are the same key;
//! - text hashes by content under its own tag, so `"1"` and `1` differ;
//! - lists and records hash by an MD5 digest of their canonical
//!   serialization, so equal content means equal key; nested floats,
//!   records, objects and maps are tagged in that form so they never
//!   collide with each other or with plain lists;
//! - objects, functions and nested maps get a surrogate id per distinct
//!   allocation, so equal content in two allocations means two keys;
//! - `null` (and composites that cannot be serialized) is rejected.
//!
//! Entries are never removed. The registry owns a clone of every key it has
//! seen, which keeps identity allocations alive and their addresses unique
//! for as long as the registry lives; tokens are therefore never reused.

use crate::error::{Error, Result};
use crate::value::{Canonical, Value};
use hashbrown::HashMap;
use log::trace;

/// Opaque storage index derived from a key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Token(Repr);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
enum Repr {
    Number(i64),
    Text([u8; 16]),
    Content([u8; 16]),
    Identity(u64),
}

impl Token {
    /// The integer key behind a numeric token, used for append indexing.
    pub(crate) fn as_index(&self) -> Option<i64> {
        match self.0 {
            Repr::Number(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct KeyRegistry {
    keys: HashMap<Token, Value>,
    identities: HashMap<usize, u64>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys ever registered.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Token for `key`, minting one on first sight. Idempotent.
    ///
    /// When several equal keys are registered (`1` and `1.0`), the first one
    /// is what [`KeyRegistry::resolve`] returns.
    pub fn register(&mut self, key: &Value) -> Result<Token> {
        let token = match key.identity() {
            Some(addr) => {
                let next = self.identities.len() as u64;
                let id = *self.identities.entry(addr).or_insert_with(|| {
                    trace!("minted identity {next} for {} key", key.type_name());
                    next
                });
                Token(Repr::Identity(id))
            }
            None => content_token(key)?,
        };
        self.keys.entry(token).or_insert_with(|| key.clone());
        Ok(token)
    }

    /// Token for `key` without registering it. `Ok(None)` means the key is a
    /// reference the registry has never seen, so no entry can exist for it.
    pub fn lookup(&self, key: &Value) -> Result<Option<Token>> {
        match key.identity() {
            Some(addr) => Ok(self
                .identities
                .get(&addr)
                .map(|&id| Token(Repr::Identity(id)))),
            None => content_token(key).map(Some),
        }
    }

    pub fn resolve(&self, token: Token) -> Result<&Value> {
        self.keys.get(&token).ok_or(Error::TokenNotFound)
    }
}

fn content_token(key: &Value) -> Result<Token> {
    let repr = match key {
        Value::Bool(b) => Repr::Number(i64::from(*b)),
        Value::Int(i) => Repr::Number(*i),
        // Truncates toward zero; saturates out of range and maps NaN to 0.
        Value::Float(f) => Repr::Number(*f as i64),
        Value::Str(s) => Repr::Text(md5::compute(s.as_bytes()).0),
        Value::List(_) | Value::Record(_) => {
            let canonical = serde_json::to_vec(&Canonical(key))
                .map_err(|_| Error::UnsupportedKeyType(key.type_name()))?;
            Repr::Content(md5::compute(canonical).0)
        }
        _ => return Err(Error::UnsupportedKeyType(key.type_name())),
    };
    Ok(Token(repr))
}
