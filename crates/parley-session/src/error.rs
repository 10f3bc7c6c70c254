//! Error types for parley-session

use thiserror::Error;

use crate::plan::PendingKind;

/// Result type alias using parley-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire layer
    #[error(transparent)]
    Wire(#[from] parley_wire::Error),

    /// A response was attempted with nothing awaiting one
    #[error("No pending {0} to respond to")]
    NoPending(PendingKind),

    /// Neither the event nor the active session names an agent session
    #[error("No agent session to route the response to")]
    MissingCorrelation,

    /// The selection violates the request's constraints
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// A mutation targeted a conversation that is not loaded
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}
