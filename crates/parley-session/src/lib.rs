//! parley-session: session engine for streaming agent conversations
//!
//! This crate drives a multi-turn conversation with a remote agent: it sends
//! user turns and plan-mode answers, folds the agent's event stream into a
//! transcript and a phase machine, and applies conversation mutations
//! optimistically.

pub mod correlation;
pub mod engine;
pub mod error;
pub mod handle;
pub mod optimistic;
pub mod phase;
pub mod plan;
pub mod reducer;
pub mod store;
pub mod transcript;
pub mod transport;

pub use correlation::{SessionContext, SessionCorrelation, resolve_correlation};
pub use engine::{SessionEngine, UserTurn};
pub use error::{Error, Result};
pub use handle::SessionHandle;
pub use optimistic::{ConversationList, MutationManager, with_optimistic_update};
pub use phase::{Phase, PlanPhase, UserResponse};
pub use plan::{PendingInputs, PendingKind, PlanModeContext};
pub use reducer::{SessionAction, SessionState, apply, reduce};
pub use store::{ConversationStore, ConversationSummary, HttpConversationStore};
pub use transcript::Transcript;
pub use transport::{HttpTransport, RetryConfig, Transport};
