use thiserror::Error;

use crate::fields::Scope;

/// Error taxonomy for the whole crate, grounded on `sven-p2p`'s `P2pError`.
///
/// Receive-path errors are caught at the dispatch boundary in `router` and
/// logged; they never propagate across datagrams. Send-path errors are
/// returned to the caller.
#[derive(Debug, Error)]
pub enum LsnpError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("schema error: field {field}")]
    SchemaError { field: String },

    #[error("token has expired")]
    TokenExpired,

    #[error("token scope mismatch: expected {expected}, got {got}")]
    ScopeMismatch { expected: Scope, got: Scope },

    #[error("token owner mismatch")]
    OwnerMismatch,

    #[error("token has been revoked")]
    RevokedToken,

    #[error("message is not addressed to this user")]
    NotForMe,

    #[error("duplicate group id: {0}")]
    DuplicateGroup(String),

    #[error("incomplete file transfer: {0}")]
    IncompleteTransfer(String),

    #[error("ack timeout waiting for message {0}")]
    AckTimeout(String),

    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("turn mismatch")]
    TurnMismatch,

    #[error("socket not initialized")]
    SocketUninitialized,

    #[error("invalid user input: {0}")]
    InvalidUserInput(String),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("unknown game: {0}")]
    GameNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid network address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
}
