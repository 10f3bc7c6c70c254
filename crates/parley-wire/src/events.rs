//! Protocol event types received from the orchestrator stream

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ClarificationQuestion, DiscoveredItem, PlanStep};

/// Event types this client understands. Anything else is ignored.
pub const KNOWN_EVENT_TYPES: &[&str] = &[
    "thinking",
    "content",
    "complete",
    "error",
    "clarification_needed",
    "search_plan",
    "progress",
    "file_created",
    "discovery_result",
    "selection_required",
    "preview_ready",
    "done",
];

/// Routing fields an event may carry to identify its agent session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

/// The agent needs answers before it continues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationRequest {
    pub clarification_id: String,
    #[serde(default)]
    pub questions: Vec<ClarificationQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(flatten)]
    pub route: RouteHint,
}

/// Items the agent discovered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub discovery_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_type: Option<String>,
    #[serde(default)]
    pub items: Vec<DiscoveredItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(flatten)]
    pub route: RouteHint,
}

/// The agent asks the user to pick among items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub selection_id: String,
    #[serde(default)]
    pub items: Vec<DiscoveredItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_select: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_select: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(flatten)]
    pub route: RouteHint,
}

/// A plan offered for approval, used by both `search_plan` and `preview_ready`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProposal {
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default = "default_true")]
    pub requires_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(flatten)]
    pub route: RouteHint,
}

fn default_true() -> bool {
    true
}

fn default_step_kind() -> String {
    "reasoning".to_string()
}

/// Events decoded from the agent stream, one variant per `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum AgentEvent {
    /// A thinking step started or progressed
    Thinking {
        #[serde(default = "default_step_kind", alias = "stepType")]
        step: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        is_complete: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },

    /// Content delta for the streaming message
    Content {
        #[serde(alias = "content")]
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// The streaming message is finished (the turn may continue)
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// Agent-reported failure
    Error {
        #[serde(default, alias = "error")]
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    ClarificationNeeded(ClarificationRequest),

    SearchPlan(PlanProposal),

    /// Execution progress
    Progress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// The agent wrote a file
    FileCreated {
        path: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        format: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    DiscoveryResult(DiscoveryResult),

    SelectionRequired(SelectionRequest),

    PreviewReady(PlanProposal),

    /// The turn ended
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completed: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

/// Why a payload could not become an [`AgentEvent`]
#[derive(Error, Debug)]
pub enum EventDecodeError {
    #[error("payload has no string `type` field")]
    MissingType,

    #[error("unknown event type `{0}`")]
    UnknownType(String),

    #[error("invalid `{kind}` payload: {source}")]
    Invalid {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AgentEvent {
    /// Validate a JSON payload and coerce it into a typed event
    pub fn from_value(value: serde_json::Value) -> Result<Self, EventDecodeError> {
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(EventDecodeError::MissingType)?
            .to_string();

        if !KNOWN_EVENT_TYPES.contains(&kind.as_str()) {
            return Err(EventDecodeError::UnknownType(kind));
        }

        serde_json::from_value(value).map_err(|source| EventDecodeError::Invalid { kind, source })
    }

    /// The wire `type` of this event
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Thinking { .. } => "thinking",
            AgentEvent::Content { .. } => "content",
            AgentEvent::Complete { .. } => "complete",
            AgentEvent::Error { .. } => "error",
            AgentEvent::ClarificationNeeded(_) => "clarification_needed",
            AgentEvent::SearchPlan(_) => "search_plan",
            AgentEvent::Progress { .. } => "progress",
            AgentEvent::FileCreated { .. } => "file_created",
            AgentEvent::DiscoveryResult(_) => "discovery_result",
            AgentEvent::SelectionRequired(_) => "selection_required",
            AgentEvent::PreviewReady(_) => "preview_ready",
            AgentEvent::Done { .. } => "done",
        }
    }

    /// Routing hint carried by plan-mode events
    pub fn route(&self) -> Option<&RouteHint> {
        match self {
            AgentEvent::ClarificationNeeded(r) => Some(&r.route),
            AgentEvent::SearchPlan(p) | AgentEvent::PreviewReady(p) => Some(&p.route),
            AgentEvent::DiscoveryResult(d) => Some(&d.route),
            AgentEvent::SelectionRequired(s) => Some(&s.route),
            _ => None,
        }
    }

    /// Explicit target message id, if the agent sent one
    pub fn message_id(&self) -> Option<&str> {
        match self {
            AgentEvent::Thinking { message_id, .. }
            | AgentEvent::Content { message_id, .. }
            | AgentEvent::Complete { message_id }
            | AgentEvent::Progress { message_id, .. }
            | AgentEvent::FileCreated { message_id, .. } => message_id.as_deref(),
            _ => None,
        }
    }

    /// Whether this event pauses the turn for user input
    pub fn awaits_user(&self) -> bool {
        matches!(
            self,
            AgentEvent::ClarificationNeeded(_)
                | AgentEvent::SearchPlan(_)
                | AgentEvent::DiscoveryResult(_)
                | AgentEvent::SelectionRequired(_)
                | AgentEvent::PreviewReady(_)
        )
    }

    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done { .. } | AgentEvent::Error { .. })
    }

    /// For `done` events: whether the payload signals completion
    pub fn signals_completion(&self) -> bool {
        match self {
            AgentEvent::Done {
                state, completed, ..
            } => completed.unwrap_or(false) || state.as_deref() == Some("completed"),
            _ => false,
        }
    }
}

/// Render progress as "Step 2 of 5: message", leaving out missing parts
pub fn progress_label(step: Option<u32>, total: Option<u32>, message: Option<&str>) -> String {
    let position = match (step, total) {
        (Some(step), Some(total)) => Some(format!("Step {} of {}", step, total)),
        (Some(step), None) => Some(format!("Step {}", step)),
        _ => None,
    };
    match (position, message) {
        (Some(p), Some(m)) => format!("{}: {}", p, m),
        (Some(p), None) => p,
        (None, Some(m)) => m.to_string(),
        (None, None) => "Working".to_string(),
    }
}
