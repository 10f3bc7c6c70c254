//! Outgoing request bodies

use serde::{Deserialize, Serialize};

use crate::types::Attachment;

/// Opens a new turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: String,
    /// Absent until the session knows which agent it talks to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub plan_mode: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Answers to a clarification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationResponse {
    pub clarification_id: String,
    pub answers: serde_json::Map<String, serde_json::Value>,
    pub agent_url: String,
    pub session_id: String,
}

/// Items the user picked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub selection_id: String,
    pub selected_ids: Vec<String>,
    pub session_id: String,
    pub agent_url: String,
}

/// Approval or rejection of a previewed plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub plan_id: String,
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_plan: Option<serde_json::Value>,
    pub agent_url: String,
    pub session_id: String,
}

impl PreviewResponse {
    pub const KIND: &'static str = "preview_response";

    pub fn new(
        plan_id: impl Into<String>,
        approved: bool,
        edited_plan: Option<serde_json::Value>,
        agent_url: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            plan_id: plan_id.into(),
            approved,
            edited_plan,
            agent_url: agent_url.into(),
            session_id: session_id.into(),
        }
    }
}

/// Decision on a proposed search plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanApproval {
    pub approved: bool,
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub agent_url: String,
    pub session_id: String,
}

/// Envelope for a plan decision, keyed by conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanApprovalRequest {
    pub conversation_id: String,
    pub response: PlanApproval,
}

/// Any request that opens an event stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutgoingRequest {
    Chat(ChatRequest),
    Clarification(ClarificationResponse),
    Selection(SelectionResponse),
    Preview(PreviewResponse),
    PlanApproval(PlanApprovalRequest),
}

/// Which orchestrator endpoint a request goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Chat,
    Respond,
    PlanApproval,
}

impl OutgoingRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            OutgoingRequest::Chat(_) => Endpoint::Chat,
            OutgoingRequest::Clarification(_)
            | OutgoingRequest::Selection(_)
            | OutgoingRequest::Preview(_) => Endpoint::Respond,
            OutgoingRequest::PlanApproval(_) => Endpoint::PlanApproval,
        }
    }

    /// Short name for logs
    pub fn label(&self) -> &'static str {
        match self {
            OutgoingRequest::Chat(_) => "chat",
            OutgoingRequest::Clarification(_) => "clarification",
            OutgoingRequest::Selection(_) => "selection",
            OutgoingRequest::Preview(_) => "preview",
            OutgoingRequest::PlanApproval(_) => "plan_approval",
        }
    }
}
