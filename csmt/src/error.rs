//! Error types for the csmt crate.

use thiserror::Error;

/// Errors surfaced by tree construction and the update engines.
///
/// All of these are fatal at the call boundary: the engines never retry, and
/// no node lock is held across an error return. Live self-cancellation is
/// silent and is not an error.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter is out of its accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A key has the wrong length for the tree or names no leaf.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The tree topology disagrees with what the operation required.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

/// Result type alias for csmt operations.
pub type Result<T> = std::result::Result<T, Error>;
