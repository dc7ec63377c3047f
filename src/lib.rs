//! keyed-collection: a single-threaded, insertion-ordered map whose keys
//! can be of any category, with a query API driven by caller-supplied
//! expressions.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: accept numbers, text, lists, records, objects, functions and
//!   nested maps as keys without asking them to implement `Hash`, and keep
//!   a stable order through every operation.
//! - Layers:
//!   - KeyRegistry: classifies a key into a `Token` and remembers the
//!     first key seen for each token so it can be handed back.
//!   - OrderedStore: `Token -> Value` storage threaded on a linked list in
//!     first-insertion order, with O(1) removal.
//!   - Expression: a closure or compiled source text with fixed positional
//!     parameters (`value`, `key`, and `carry` for folds).
//!   - traverse: forward/backward scans with an explicit `Signal` to stop
//!     early; the mutating scan writes values back in place.
//!   - Collection: public map tying the layers together, plus an optional
//!     guard checked on every write. Query operations (`grep` and friends)
//!     are `Collection` methods.
//!
//! Constraints
//! - Single-threaded: values hold `Rc`s, so `Collection` is `!Send`/`!Sync`.
//! - Equal keys share a token: `1`, `1.0` and `true` are one key; two lists
//!   with the same content are one key; two objects with the same fields are
//!   two keys.
//! - Keys must not change after they are registered.
//! - A failed call leaves the map as it was.
//!
//! Registry lifetime
//! - Registry entries are never removed. A forgotten key stays resolvable,
//!   and because the registry holds a clone of every identity key, an
//!   address cannot be reused by a new allocation while the map lives.
//!
//! Pass rule
//! - Query and guard results pass unless they are exactly `false`. This is
//!   separate from the truthiness used by `!`, `&&` and `||` inside the
//!   expression language.
//!
//! Notes and non-goals
//! - No persistence and no validation of value shapes beyond the guard.
//! - `last` keeps matches in the order found, nearest to the end first.

mod collection;
mod error;
mod expr;
mod query;
mod registry;
mod store;
mod store_proptest;
mod traverse;
mod value;

// Public surface
pub use collection::{Collection, Iter, Options};
pub use error::{Error, Result};
pub use expr::{Arity, Binary, Expression, IntoExpression, Ternary, Unary};
pub use query::Limit;
pub use traverse::Signal;
pub use value::{Function, MapRef, Object, Value};

// Internal layers, exposed for benchmarks only.
#[cfg(feature = "bench_internal")]
pub use registry::{KeyRegistry, Token};
#[cfg(feature = "bench_internal")]
pub use store::OrderedStore;
