//! Error type shared by every fallible operation of the crate.

use thiserror::Error;

/// Everything that can go wrong while registering keys, mutating a
/// [`Collection`](crate::Collection) or running an expression over it.
///
/// A failed call never leaves the map partially mutated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The key's category has no hashing rule (`null`, or a composite that
    /// holds a function).
    #[error("unsupported key type `{0}`")]
    UnsupportedKeyType(&'static str),
    /// The guard returned exactly `false` for a write.
    #[error("guard rejected value for key `{0}`")]
    GuardRejected(String),
    /// A token was resolved that the registry never minted. This is a bug in
    /// the crate, not a recoverable condition.
    #[error("token not found in key registry")]
    TokenNotFound,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("`{0}` cannot be converted into a collection")]
    NotCollectionLike(&'static str),
    #[error("invalid expression `{source_text}`: {reason}")]
    InvalidExpression { source_text: String, reason: String },
    #[error("cannot pop from an empty collection")]
    EmptyCollection,
    /// Export hit a value with no plain representation (a function).
    #[error("cannot serialize collection: {0}")]
    Serialization(String),
    /// A compiled expression failed while running (type mismatch, division by
    /// zero, bad builtin call).
    #[error("expression evaluation failed: {0}")]
    Evaluation(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
