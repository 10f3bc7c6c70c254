//! Plan-mode context and the requests awaiting a user answer

use std::fmt;

use parley_wire::events::{ClarificationRequest, DiscoveryResult, PlanProposal, SelectionRequest};
use parley_wire::DiscoveredItem;

use crate::correlation::{SessionContext, SessionCorrelation};
use crate::phase::PlanPhase;

/// Everything negotiated so far in one plan-mode interaction.
///
/// At most one exists per conversation. Starting a new plan-mode turn
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanModeContext {
    pub phase: PlanPhase,
    pub agent_id: Option<String>,
    pub agent_url: Option<String>,
    pub session_id: String,
    /// Clarification answers, merged across rounds
    pub answers: serde_json::Map<String, serde_json::Value>,
    pub discovered_items: Vec<DiscoveredItem>,
    pub selected_items: Vec<String>,
    /// The latest plan the agent proposed
    pub plan: Option<PlanProposal>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PlanModeContext {
    pub fn new(session: &SessionContext) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            phase: PlanPhase::Idle,
            agent_id: session.agent_id.clone(),
            agent_url: session.agent_url.clone(),
            session_id: session.session_id.clone(),
            answers: serde_json::Map::new(),
            discovered_items: vec![],
            selected_items: vec![],
            plan: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new fine phase
    pub fn set_phase(&mut self, phase: PlanPhase) {
        if self.phase != phase {
            tracing::debug!("Plan phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
        self.touch();
    }

    /// Follow the active session after an event re-routed it
    pub fn sync_session(&mut self, session: &SessionContext) {
        self.agent_id = session.agent_id.clone();
        self.agent_url = session.agent_url.clone();
        self.session_id = session.session_id.clone();
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// The kinds of request that wait on the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKind {
    Clarification,
    Discovery,
    Selection,
    Preview,
    Plan,
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PendingKind::Clarification => "clarification",
            PendingKind::Discovery => "discovery",
            PendingKind::Selection => "selection",
            PendingKind::Preview => "preview",
            PendingKind::Plan => "plan approval",
        };
        f.write_str(name)
    }
}

/// An agent request waiting on the user, with the session it came from.
///
/// `correlation` is resolved when the event arrives; it is `None` only if
/// neither the event nor the active session named an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<T> {
    pub request: T,
    pub correlation: Option<SessionCorrelation>,
    pub received_at: i64,
}

impl<T> Pending<T> {
    pub fn new(request: T, correlation: Option<SessionCorrelation>) -> Self {
        Self {
            request,
            correlation,
            received_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

pub type PendingClarification = Pending<ClarificationRequest>;
pub type PendingDiscovery = Pending<DiscoveryResult>;
pub type PendingSelection = Pending<SelectionRequest>;
pub type PendingPreview = Pending<PlanProposal>;
pub type PendingPlan = Pending<PlanProposal>;

/// At most one outstanding request of each kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingInputs {
    pub clarification: Option<PendingClarification>,
    pub discovery: Option<PendingDiscovery>,
    pub selection: Option<PendingSelection>,
    pub preview: Option<PendingPreview>,
    pub plan: Option<PendingPlan>,
}

impl PendingInputs {
    /// Kinds currently waiting, in negotiation order
    pub fn kinds(&self) -> Vec<PendingKind> {
        let mut kinds = Vec::new();
        if self.clarification.is_some() {
            kinds.push(PendingKind::Clarification);
        }
        if self.discovery.is_some() {
            kinds.push(PendingKind::Discovery);
        }
        if self.selection.is_some() {
            kinds.push(PendingKind::Selection);
        }
        if self.preview.is_some() {
            kinds.push(PendingKind::Preview);
        }
        if self.plan.is_some() {
            kinds.push(PendingKind::Plan);
        }
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
