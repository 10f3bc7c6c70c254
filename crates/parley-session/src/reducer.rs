//! Conversation state and the pure functions that advance it.
//!
//! [`reduce`] folds one agent event into the state; [`apply`] does the same
//! for things the engine itself decides (a user turn, a response, the end of
//! a stream). Both take the state by value and hand back the next one.

use parley_wire::events::PlanProposal;
use parley_wire::{AgentEvent, FileOutput, Message, ThinkingStep, progress_label};

use crate::correlation::{SessionContext, resolve_correlation};
use crate::phase::{self, Phase, PlanPhase, UserResponse};
use crate::plan::{Pending, PendingInputs, PlanModeContext};
use crate::transcript::Transcript;

/// Everything the engine knows about one conversation
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub conversation_id: String,
    pub transcript: Transcript,
    /// The assistant message currently receiving tokens
    pub streaming_message_id: Option<String>,
    pub is_loading: bool,
    pub phase: Phase,
    pub plan: Option<PlanModeContext>,
    pub pending: PendingInputs,
    pub session: SessionContext,
    /// Last failure reported by the agent or the transport
    pub error: Option<String>,
}

impl SessionState {
    pub fn new(session: SessionContext) -> Self {
        Self {
            conversation_id: uuid::Uuid::new_v4().to_string(),
            session,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn plan_phase(&self) -> Option<PlanPhase> {
        self.plan.as_ref().map(|p| p.phase)
    }

    /// Whether the coarse phase and the plan context agree
    pub fn is_consistent(&self) -> bool {
        self.plan
            .as_ref()
            .is_none_or(|plan| phase::is_consistent(self.phase, plan.phase))
    }

    fn plan_mut(&mut self) -> &mut PlanModeContext {
        let session = &self.session;
        self.plan.get_or_insert_with(|| {
            tracing::debug!("Plan-mode event without a plan context, creating one");
            PlanModeContext::new(session)
        })
    }

    fn target(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(String::from)
            .or_else(|| self.streaming_message_id.clone())
    }

    fn end_stream(&mut self) {
        if let Some(id) = self.streaming_message_id.take() {
            self.transcript.finalize(&id);
        }
        self.is_loading = false;
    }
}

/// Things that happen to a conversation besides agent events
#[derive(Debug, Clone)]
pub enum SessionAction {
    /// The user sent a new message
    UserTurn { message: Message, plan_mode: bool },
    /// The user answered a pending request
    Responded(UserResponse),
    /// A stream is about to open; its tokens go to a new assistant message
    StreamStarted { assistant_id: String },
    /// The stream ended without a terminal event, or was aborted
    StreamClosed { aborted: bool },
    /// The stream could not be opened or broke mid-way
    StreamFailed { error: String },
    /// Start over with an empty conversation
    Reset,
}

/// Apply one agent event
pub fn reduce(mut state: SessionState, event: &AgentEvent) -> SessionState {
    if !phase::accepts(state.phase, event) {
        tracing::debug!(
            "Applying out-of-phase `{}` event in phase {}",
            event.kind(),
            state.phase
        );
    }
    let next = phase::next_phase(state.phase, event);
    if next != state.phase {
        tracing::debug!("Phase {} -> {} on `{}`", state.phase, next, event.kind());
    }

    if let Some(route) = event.route() {
        if state.session.observe(route) {
            let session = state.session.clone();
            if let Some(plan) = state.plan.as_mut() {
                plan.sync_session(&session);
            }
        }
    }

    match event {
        AgentEvent::Thinking {
            step,
            content,
            is_complete,
            message_id,
            metadata,
        } => match state.target(message_id.as_deref()) {
            Some(id) => {
                state.transcript.attach_thinking_step(
                    &id,
                    ThinkingStep {
                        kind: step.clone(),
                        content: content.clone(),
                        is_complete: *is_complete,
                        timestamp: chrono::Utc::now().timestamp_millis(),
                        metadata: metadata.clone(),
                    },
                );
            }
            None => tracing::warn!("Thinking step with no target message"),
        },

        AgentEvent::Content { delta, message_id } => match state.target(message_id.as_deref()) {
            Some(id) => {
                state.transcript.append(&id, delta);
            }
            None => tracing::warn!("Content delta with no target message"),
        },

        AgentEvent::Progress {
            message,
            step,
            total,
            message_id,
        } => {
            if let Some(id) = state.target(message_id.as_deref()) {
                let content = progress_label(*step, *total, message.as_deref());
                let done = matches!((step, total), (Some(s), Some(t)) if s >= t);
                state.transcript.attach_thinking_step(
                    &id,
                    ThinkingStep {
                        kind: "progress".to_string(),
                        content,
                        is_complete: done,
                        timestamp: chrono::Utc::now().timestamp_millis(),
                        metadata: None,
                    },
                );
            }
        }

        AgentEvent::FileCreated {
            path,
            name,
            format,
            size,
            summary,
            message_id,
        } => {
            let target = state.target(message_id.as_deref());
            state.transcript.attach_file_output(
                target.as_deref(),
                FileOutput {
                    path: path.clone(),
                    name: name.clone(),
                    format: format.clone(),
                    size: *size,
                    summary: summary.clone(),
                    created_at: chrono::Utc::now().timestamp_millis(),
                },
            );
        }

        AgentEvent::Complete { message_id } => {
            if let Some(id) = state.target(message_id.as_deref()) {
                state.transcript.finalize(&id);
                if state.streaming_message_id.as_deref() == Some(id.as_str()) {
                    state.streaming_message_id = None;
                }
            }
        }

        AgentEvent::Error { message, code } => {
            tracing::warn!("Agent reported an error ({:?}): {}", code, message);
            state.end_stream();
            state.error = Some(message.clone());
        }

        AgentEvent::ClarificationNeeded(request) => {
            let correlation = resolve_correlation(&request.route, &state.session);
            state.pending.clarification = Some(Pending::new(request.clone(), correlation));
            state.plan_mut();
            state.is_loading = false;
        }

        AgentEvent::DiscoveryResult(result) => {
            let correlation = resolve_correlation(&result.route, &state.session);
            state.pending.discovery = Some(Pending::new(result.clone(), correlation));
            let plan = state.plan_mut();
            plan.discovered_items = result.items.clone();
            state.is_loading = false;
        }

        AgentEvent::SelectionRequired(request) => {
            let correlation = resolve_correlation(&request.route, &state.session);
            state.pending.selection = Some(Pending::new(request.clone(), correlation));
            let plan = state.plan_mut();
            if plan.discovered_items.is_empty() {
                plan.discovered_items = request.items.clone();
            }
            state.is_loading = false;
        }

        AgentEvent::PreviewReady(proposal) => {
            let correlation = resolve_correlation(&proposal.route, &state.session);
            state.pending.preview = Some(Pending::new(proposal.clone(), correlation));
            record_plan(&mut state, proposal);
        }

        AgentEvent::SearchPlan(proposal) => {
            let correlation = resolve_correlation(&proposal.route, &state.session);
            state.pending.plan = Some(Pending::new(proposal.clone(), correlation));
            record_plan(&mut state, proposal);
        }

        AgentEvent::Done { message, .. } => {
            if let Some(text) = message {
                tracing::debug!("Turn done: {}", text);
            }
            state.end_stream();
            if next == Phase::Completed {
                state.pending.clear();
            }
        }
    }

    if let Some(fine) = phase::plan_phase_for(event) {
        if let Some(plan) = state.plan.as_mut() {
            plan.set_phase(fine);
        }
    }
    if !next.is_waiting() && next != Phase::Executing {
        if let Some(plan) = state.plan.as_mut() {
            plan.set_phase(PlanPhase::Idle);
        }
    }

    state.phase = next;
    state
}

fn record_plan(state: &mut SessionState, proposal: &PlanProposal) {
    state.plan_mut().plan = Some(proposal.clone());
    state.is_loading = false;
}

/// Apply one engine-side action
pub fn apply(mut state: SessionState, action: SessionAction) -> SessionState {
    match action {
        SessionAction::UserTurn { message, plan_mode } => {
            if plan_mode {
                state.plan = Some(PlanModeContext::new(&state.session));
            } else if let Some(plan) = state.plan.as_mut() {
                plan.set_phase(PlanPhase::Idle);
            }
            state.transcript.push(message);
            state.error = None;
            state.phase = Phase::Executing;
        }

        SessionAction::Responded(response) => {
            let next = phase::after_response(&response);
            tracing::debug!("Phase {} -> {} on user response", state.phase, next);
            let plan = state.plan_mut();
            let fine = phase::plan_phase_after_response(plan.phase, &response);
            match &response {
                UserResponse::Clarification { answers } => {
                    plan.answers
                        .extend(answers.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                UserResponse::Selection { selected_ids } => {
                    plan.selected_items = selected_ids.clone();
                }
                UserResponse::Preview { .. } | UserResponse::Plan { .. } => {}
            }
            plan.set_phase(fine);

            match response {
                UserResponse::Clarification { .. } => state.pending.clarification = None,
                UserResponse::Selection { .. } => {
                    state.pending.selection = None;
                    state.pending.discovery = None;
                }
                UserResponse::Preview { .. } => state.pending.preview = None,
                UserResponse::Plan { .. } => state.pending.plan = None,
            }
            state.error = None;
            state.phase = next;
        }

        SessionAction::StreamStarted { assistant_id } => {
            state
                .transcript
                .push(Message::assistant_streaming(assistant_id.clone()));
            state.streaming_message_id = Some(assistant_id);
            state.is_loading = true;
        }

        SessionAction::StreamClosed { aborted } => {
            if aborted {
                tracing::debug!("Stream aborted, keeping partial content");
            }
            state.end_stream();
            if state.phase == Phase::Executing {
                state.phase = Phase::Idle;
                if let Some(plan) = state.plan.as_mut() {
                    plan.set_phase(PlanPhase::Idle);
                }
            }
        }

        SessionAction::StreamFailed { error } => {
            tracing::warn!("Stream failed: {}", error);
            state.end_stream();
            state.error = Some(error);
            state.phase = Phase::Error;
            if let Some(plan) = state.plan.as_mut() {
                plan.set_phase(PlanPhase::Idle);
            }
        }

        SessionAction::Reset => {
            state = SessionState::new(state.session);
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> AgentEvent {
        AgentEvent::from_value(value).unwrap()
    }

    fn streaming_state() -> SessionState {
        let session = SessionContext::new().with_agent_url("http://agent");
        let state = apply(
            SessionState::new(session),
            SessionAction::UserTurn {
                message: Message::user("u1", "hi"),
                plan_mode: false,
            },
        );
        apply(
            state,
            SessionAction::StreamStarted {
                assistant_id: "a1".into(),
            },
        )
    }

    fn fold(state: SessionState, events: &[AgentEvent]) -> SessionState {
        events.iter().fold(state, reduce)
    }

    #[test]
    fn test_content_then_completed_done() {
        let state = fold(
            streaming_state(),
            &[
                event(json!({"type": "content", "delta": "Hello"})),
                event(json!({"type": "content", "delta": " world"})),
                event(json!({"type": "done", "state": "completed"})),
            ],
        );
        let msg = state.transcript.get("a1").unwrap();
        assert_eq!(msg.content, "Hello world");
        assert!(!msg.is_streaming);
        assert_eq!(state.phase, Phase::Completed);
        assert!(state.streaming_message_id.is_none());
        assert!(!state.is_loading);
    }

    #[test]
    fn test_clarification_sets_pending_from_any_phase() {
        for start in [Phase::Idle, Phase::Completed, Phase::Error, Phase::WaitingApproval] {
            let mut state = streaming_state();
            state.phase = start;
            let state = reduce(
                state,
                &event(json!({"type": "clarification_needed", "clarificationId": "c1"})),
            );
            assert_eq!(state.phase, Phase::WaitingClarification);
            let pending = state.pending.clarification.as_ref().unwrap();
            assert_eq!(pending.request.clarification_id, "c1");
            assert_eq!(
                pending.correlation.as_ref().unwrap().agent_url,
                "http://agent"
            );
            assert!(!state.is_loading);
            assert!(state.is_consistent());
        }
    }

    #[test]
    fn test_event_route_updates_session() {
        let state = reduce(
            streaming_state(),
            &event(json!({
                "type": "selection_required",
                "selectionId": "s1",
                "agentUrl": "http://other",
                "sessionId": "remote",
                "items": [{"id": "a"}, {"id": "b"}]
            })),
        );
        assert_eq!(state.session.agent_url.as_deref(), Some("http://other"));
        assert_eq!(state.session.session_id, "remote");
        let plan = state.plan.as_ref().unwrap();
        assert_eq!(plan.session_id, "remote");
        assert_eq!(plan.phase, PlanPhase::Selection);
        assert_eq!(plan.discovered_items.len(), 2);
    }

    #[test]
    fn test_error_event_clears_pointer() {
        let state = fold(
            streaming_state(),
            &[
                event(json!({"type": "content", "delta": "part"})),
                event(json!({"type": "error", "error": "agent crashed"})),
            ],
        );
        assert_eq!(state.phase, Phase::Error);
        assert!(state.streaming_message_id.is_none());
        assert_eq!(state.error.as_deref(), Some("agent crashed"));
        let msg = state.transcript.get("a1").unwrap();
        assert_eq!(msg.content, "part");
        assert!(!msg.is_streaming);
    }

    #[test]
    fn test_thinking_and_progress_target_streaming_message() {
        let state = fold(
            streaming_state(),
            &[
                event(json!({"type": "thinking", "step": "search", "content": "looking"})),
                event(json!({"type": "progress", "step": 1, "total": 3})),
                event(json!({"type": "progress", "step": 3, "total": 3})),
            ],
        );
        let msg = state.transcript.get("a1").unwrap();
        assert_eq!(msg.thinking_steps.len(), 2);
        assert_eq!(msg.thinking_steps[1].kind, "progress");
        assert_eq!(msg.thinking_steps[1].content, "Step 3 of 3");
        assert!(msg.thinking_steps[1].is_complete);
        assert!(msg.is_thinking, "search step still open");
    }

    #[test]
    fn test_progress_step_keeps_message_text() {
        let state = fold(
            streaming_state(),
            &[event(json!({"type": "progress", "step": 2, "total": 3, "message": "Ranking posts"}))],
        );
        let msg = state.transcript.get("a1").unwrap();
        assert_eq!(msg.thinking_steps[0].content, "Step 2 of 3: Ranking posts");
        assert!(!msg.thinking_steps[0].is_complete);
    }

    #[test]
    fn test_file_created_without_streaming_id() {
        let mut state = streaming_state();
        state = apply(state, SessionAction::StreamClosed { aborted: false });
        state = apply(
            state,
            SessionAction::StreamStarted {
                assistant_id: "a2".into(),
            },
        );
        state = apply(state, SessionAction::StreamClosed { aborted: false });
        assert!(state.streaming_message_id.is_none());

        let state = reduce(
            state,
            &event(json!({"type": "file_created", "path": "/out/report.html", "name": "report.html"})),
        );
        assert!(state.transcript.get("a1").unwrap().file_outputs.is_empty());
        assert_eq!(state.transcript.get("a2").unwrap().file_outputs.len(), 1);
    }

    #[test]
    fn test_done_after_pause_keeps_waiting() {
        let state = fold(
            streaming_state(),
            &[
                event(json!({"type": "preview_ready", "planId": "p1"})),
                event(json!({"type": "done"})),
            ],
        );
        assert_eq!(state.phase, Phase::WaitingApproval);
        assert!(state.pending.preview.is_some());
        assert_eq!(state.plan_phase(), Some(PlanPhase::Preview));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_completed_done_clears_pending() {
        let state = fold(
            streaming_state(),
            &[
                event(json!({"type": "search_plan", "planId": "p1"})),
                event(json!({"type": "done", "completed": true})),
            ],
        );
        assert_eq!(state.phase, Phase::Completed);
        assert!(state.pending.is_empty());
        assert_eq!(state.plan_phase(), Some(PlanPhase::Idle));
    }

    #[test]
    fn test_selection_response_updates_plan() {
        let state = fold(
            streaming_state(),
            &[
                event(json!({"type": "discovery_result", "discoveryId": "d1", "items": [{"id": "a"}]})),
                event(json!({"type": "selection_required", "selectionId": "s1"})),
            ],
        );
        assert!(state.pending.discovery.is_some());

        let state = apply(
            state,
            SessionAction::Responded(UserResponse::Selection {
                selected_ids: vec!["a".into()],
            }),
        );
        assert_eq!(state.phase, Phase::Executing);
        assert!(state.pending.selection.is_none());
        assert!(state.pending.discovery.is_none());
        let plan = state.plan.as_ref().unwrap();
        assert_eq!(plan.selected_items, vec!["a".to_string()]);
        assert_eq!(plan.phase, PlanPhase::Executing);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_plan_rejection_goes_idle() {
        let state = reduce(
            streaming_state(),
            &event(json!({"type": "search_plan", "planId": "p1"})),
        );
        let state = apply(
            state,
            SessionAction::Responded(UserResponse::Plan {
                approved: false,
                feedback: Some("narrower".into()),
            }),
        );
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.pending.plan.is_none());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_clarification_answers_merge() {
        let mut state = streaming_state();
        for (key, value) in [("topic", "tech"), ("depth", "quick")] {
            state = reduce(
                state,
                &event(json!({"type": "clarification_needed", "clarificationId": key})),
            );
            let mut answers = serde_json::Map::new();
            answers.insert(key.into(), json!(value));
            state = apply(
                state,
                SessionAction::Responded(UserResponse::Clarification { answers }),
            );
        }
        let plan = state.plan.as_ref().unwrap();
        assert_eq!(plan.answers.len(), 2);
        assert_eq!(plan.answers["depth"], json!("quick"));
        assert!(state.pending.clarification.is_none());
    }

    #[test]
    fn test_stream_closed_without_done() {
        let state = reduce(streaming_state(), &event(json!({"type": "content", "delta": "x"})));
        let state = apply(state, SessionAction::StreamClosed { aborted: true });
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.streaming_message_id.is_none());
        assert!(!state.transcript.get("a1").unwrap().is_streaming);
        assert_eq!(state.transcript.get("a1").unwrap().content, "x");
    }

    #[test]
    fn test_stream_failed() {
        let state = apply(
            streaming_state(),
            SessionAction::StreamFailed {
                error: "connection refused".into(),
            },
        );
        assert_eq!(state.phase, Phase::Error);
        assert!(state.streaming_message_id.is_none());
        assert!(!state.is_loading);
    }

    #[test]
    fn test_reset_keeps_session() {
        let state = reduce(
            streaming_state(),
            &event(json!({"type": "clarification_needed", "clarificationId": "c1"})),
        );
        let before = state.conversation_id.clone();
        let session = state.session.clone();
        let state = apply(state, SessionAction::Reset);
        assert_ne!(state.conversation_id, before);
        assert_eq!(state.session, session);
        assert!(state.transcript.is_empty());
        assert!(state.pending.is_empty());
        assert!(state.plan.is_none());
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn test_plan_mode_turn_replaces_context() {
        let state = reduce(
            streaming_state(),
            &event(json!({"type": "search_plan", "planId": "p1"})),
        );
        assert!(state.plan.as_ref().unwrap().plan.is_some());
        let state = apply(
            state,
            SessionAction::UserTurn {
                message: Message::user("u2", "new plan"),
                plan_mode: true,
            },
        );
        let plan = state.plan.as_ref().unwrap();
        assert!(plan.plan.is_none());
        assert_eq!(plan.phase, PlanPhase::Idle);
    }
}
