//! Error types for the debug session.

use thiserror::Error;

use crate::protocol::ScopeType;

/// Errors from protocol gateway round-trips.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level communication error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The browser rejected the request.
    #[error("protocol rejected request: {message}")]
    Rejected {
        /// The rejection message from the browser.
        message: String,
    },

    /// A response did not have the expected shape.
    #[error("unexpected protocol value: {0}")]
    UnexpectedValue(String),
}

/// A module's bytecode could not be turned into debug information.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The binary is not a well-formed module.
    #[error("malformed module: {0}")]
    Malformed(String),

    /// The module carries no usable debug sections.
    #[error("module has no debug information")]
    NoDebugInfo,
}

/// A paused frame's scope chain did not have the shape the variable
/// store needs.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaMismatch {
    /// A required scope kind is absent from the chain.
    #[error("scope chain has no `{}` scope", .0.as_str())]
    MissingScope(ScopeType),

    /// A scope kind appears more than once.
    #[error("scope chain has more than one `{}` scope", .0.as_str())]
    DuplicateScope(ScopeType),

    /// An object that must be enumerable has no object id.
    #[error("`{0}` has no object id")]
    NotEnumerable(String),

    /// The module scope carries no `globals` entry.
    #[error("module scope has no `globals` entry")]
    MissingGlobals,
}

/// Failure while building a frame's variable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The scope chain has an unexpected shape.
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),

    /// A property enumeration round-trip failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors surfaced by session commands.
///
/// Unavailable data and commands issued while running are not errors;
/// they are reported through [`Reply`](crate::session::Reply).
#[derive(Debug, Error)]
pub enum DebugError {
    /// A gateway round-trip failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The requested frame index is beyond the current stack.
    #[error("frame {index} out of range (stack has {len} frames)")]
    FrameOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of frames in the current stack.
        len: usize,
    },
}
