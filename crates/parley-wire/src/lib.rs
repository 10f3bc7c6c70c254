//! parley-wire: wire protocol for streaming agent sessions
//!
//! This crate decodes the orchestrator's `data:` framed event stream into typed
//! events and defines the request bodies sent back to the agent.

pub mod a2a;
pub mod client;
pub mod decoder;
pub mod error;
pub mod events;
pub mod requests;
pub mod types;

pub use client::{AgentClient, ClientConfig};
pub use decoder::{EventStream, decode_stream};
pub use error::{Error, Result};
pub use events::{AgentEvent, RouteHint, progress_label};
pub use requests::OutgoingRequest;
pub use types::*;
