//! Plan-mode phase machine.
//!
//! The coarse [`Phase`] drives the conversation; the fine [`PlanPhase`] on the
//! plan context refines it while a plan is being negotiated. Transitions are
//! pure functions of the current phase and the input.

use std::fmt;

use parley_wire::AgentEvent;
use serde::{Deserialize, Serialize};

/// Where the conversation stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    WaitingClarification,
    WaitingApproval,
    Executing,
    Completed,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::WaitingClarification => "waiting_clarification",
            Phase::WaitingApproval => "waiting_approval",
            Phase::Executing => "executing",
            Phase::Completed => "completed",
            Phase::Error => "error",
        }
    }

    /// Whether the agent is paused on user input
    pub fn is_waiting(&self) -> bool {
        matches!(self, Phase::WaitingClarification | Phase::WaitingApproval)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of an active plan negotiation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPhase {
    #[default]
    Idle,
    Discovery,
    Selection,
    Preview,
    Executing,
}

/// A decision the user sent back to the agent
#[derive(Debug, Clone, PartialEq)]
pub enum UserResponse {
    Clarification {
        answers: serde_json::Map<String, serde_json::Value>,
    },
    Selection {
        selected_ids: Vec<String>,
    },
    Preview {
        approved: bool,
        edited_plan: Option<serde_json::Value>,
    },
    Plan {
        approved: bool,
        feedback: Option<String>,
    },
}

/// Phase after applying `event` in `current`.
///
/// A `done` that does not signal completion returns to `Idle`, except from a
/// waiting phase: there it leaves the phase alone, so a pause announced
/// earlier in the same stream survives the stream's end and still matches
/// the pending request it belongs to.
pub fn next_phase(current: Phase, event: &AgentEvent) -> Phase {
    match event {
        AgentEvent::ClarificationNeeded(_) => Phase::WaitingClarification,
        AgentEvent::SearchPlan(_)
        | AgentEvent::DiscoveryResult(_)
        | AgentEvent::SelectionRequired(_)
        | AgentEvent::PreviewReady(_) => Phase::WaitingApproval,
        AgentEvent::Error { .. } => Phase::Error,
        AgentEvent::Done { .. } if event.signals_completion() => Phase::Completed,
        AgentEvent::Done { .. } if current.is_waiting() => current,
        AgentEvent::Done { .. } => Phase::Idle,
        _ => current,
    }
}

/// Phase after the user answered the agent
pub fn after_response(response: &UserResponse) -> Phase {
    match response {
        UserResponse::Plan {
            approved: false, ..
        } => Phase::Idle,
        _ => Phase::Executing,
    }
}

/// Fine phase after the user answered, given the one before
pub fn plan_phase_after_response(current: PlanPhase, response: &UserResponse) -> PlanPhase {
    match response {
        UserResponse::Clarification { .. } => current,
        UserResponse::Selection { .. } => PlanPhase::Executing,
        UserResponse::Preview { approved, .. } | UserResponse::Plan { approved, .. } => {
            if *approved {
                PlanPhase::Executing
            } else {
                PlanPhase::Idle
            }
        }
    }
}

/// Fine phase an event moves the plan context into, if it moves it at all
pub fn plan_phase_for(event: &AgentEvent) -> Option<PlanPhase> {
    match event {
        AgentEvent::DiscoveryResult(_) => Some(PlanPhase::Discovery),
        AgentEvent::SelectionRequired(_) => Some(PlanPhase::Selection),
        AgentEvent::PreviewReady(_) | AgentEvent::SearchPlan(_) => Some(PlanPhase::Preview),
        AgentEvent::ClarificationNeeded(_) | AgentEvent::Error { .. } => Some(PlanPhase::Idle),
        _ => None,
    }
}

/// Whether `event` is expected in `current`.
///
/// Unexpected events are still applied; this only feeds logging.
pub fn accepts(current: Phase, event: &AgentEvent) -> bool {
    if event.awaits_user() || matches!(event, AgentEvent::Error { .. }) {
        return true;
    }
    match event {
        AgentEvent::Done { .. } => matches!(current, Phase::Executing) || current.is_waiting(),
        _ => current == Phase::Executing,
    }
}

/// Whether a coarse phase and a fine plan phase agree
pub fn is_consistent(phase: Phase, plan_phase: PlanPhase) -> bool {
    match plan_phase {
        PlanPhase::Discovery | PlanPhase::Selection | PlanPhase::Preview => {
            phase == Phase::WaitingApproval
        }
        PlanPhase::Executing => phase == Phase::Executing,
        PlanPhase::Idle => phase != Phase::WaitingApproval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> AgentEvent {
        AgentEvent::from_value(value).unwrap()
    }

    const ALL: [Phase; 6] = [
        Phase::Idle,
        Phase::WaitingClarification,
        Phase::WaitingApproval,
        Phase::Executing,
        Phase::Completed,
        Phase::Error,
    ];

    #[test]
    fn test_clarification_from_any_phase() {
        let e = event(json!({"type": "clarification_needed", "clarificationId": "c1"}));
        for phase in ALL {
            assert_eq!(next_phase(phase, &e), Phase::WaitingClarification);
            assert!(accepts(phase, &e));
        }
    }

    #[test]
    fn test_approval_events() {
        for e in [
            event(json!({"type": "search_plan", "planId": "p"})),
            event(json!({"type": "discovery_result", "discoveryId": "d"})),
            event(json!({"type": "selection_required", "selectionId": "s"})),
            event(json!({"type": "preview_ready", "planId": "p"})),
        ] {
            assert_eq!(next_phase(Phase::Executing, &e), Phase::WaitingApproval);
        }
    }

    #[test]
    fn test_done_transitions() {
        let completed = event(json!({"type": "done", "state": "completed"}));
        let bare = event(json!({"type": "done"}));
        assert_eq!(next_phase(Phase::Executing, &completed), Phase::Completed);
        assert_eq!(next_phase(Phase::Executing, &bare), Phase::Idle);
        assert_eq!(
            next_phase(Phase::WaitingClarification, &bare),
            Phase::WaitingClarification
        );
        assert_eq!(
            next_phase(Phase::WaitingApproval, &completed),
            Phase::Completed
        );
    }

    #[test]
    fn test_error_and_streaming_events() {
        let err = event(json!({"type": "error", "message": "boom"}));
        assert_eq!(next_phase(Phase::WaitingApproval, &err), Phase::Error);

        let content = event(json!({"type": "content", "delta": "x"}));
        assert_eq!(next_phase(Phase::Executing, &content), Phase::Executing);
        assert!(accepts(Phase::Executing, &content));
        assert!(!accepts(Phase::Completed, &content));
        assert_eq!(next_phase(Phase::Completed, &content), Phase::Completed);
    }

    #[test]
    fn test_responses() {
        let reject_plan = UserResponse::Plan {
            approved: false,
            feedback: None,
        };
        let reject_preview = UserResponse::Preview {
            approved: false,
            edited_plan: None,
        };
        let select = UserResponse::Selection {
            selected_ids: vec!["a".into()],
        };
        assert_eq!(after_response(&reject_plan), Phase::Idle);
        assert_eq!(after_response(&reject_preview), Phase::Executing);
        assert_eq!(after_response(&select), Phase::Executing);

        assert_eq!(
            plan_phase_after_response(PlanPhase::Selection, &select),
            PlanPhase::Executing
        );
        assert_eq!(
            plan_phase_after_response(PlanPhase::Preview, &reject_preview),
            PlanPhase::Idle
        );
        assert_eq!(
            plan_phase_after_response(
                PlanPhase::Idle,
                &UserResponse::Clarification {
                    answers: Default::default()
                }
            ),
            PlanPhase::Idle
        );
    }

    #[test]
    fn test_consistency() {
        assert!(is_consistent(Phase::WaitingApproval, PlanPhase::Preview));
        assert!(!is_consistent(Phase::Executing, PlanPhase::Preview));
        assert!(is_consistent(Phase::Executing, PlanPhase::Executing));
        assert!(!is_consistent(Phase::Idle, PlanPhase::Executing));
        assert!(!is_consistent(Phase::WaitingApproval, PlanPhase::Idle));
        assert!(is_consistent(Phase::WaitingClarification, PlanPhase::Idle));
    }

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(
            serde_json::to_value(Phase::WaitingClarification).unwrap(),
            json!("waiting_clarification")
        );
        assert_eq!(Phase::Error.to_string(), "error");
    }
}
