//! The session engine: drives one conversation with a remote agent

use std::sync::Arc;

use futures::StreamExt;
use parley_wire::requests::{
    ChatRequest, ClarificationResponse, PlanApproval, PlanApprovalRequest, PreviewResponse,
    SelectionResponse,
};
use parley_wire::{AgentEvent, Attachment, Message, OutgoingRequest};
use tokio::sync::broadcast;

use crate::correlation::{SessionContext, SessionCorrelation, resolve_correlation};
use crate::error::{Error, Result};
use crate::handle::SessionHandle;
use crate::phase::UserResponse;
use crate::plan::{Pending, PendingKind};
use crate::reducer::{self, SessionAction, SessionState};
use crate::transport::Transport;

/// A message from the user opening a new turn
#[derive(Debug, Clone, Default)]
pub struct UserTurn {
    pub content: String,
    pub attachments: Vec<Attachment>,
    /// Start a new plan-mode negotiation with this turn
    pub plan_mode: bool,
}

impl UserTurn {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn plan_mode(mut self) -> Self {
        self.plan_mode = true;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Drives a conversation: sends user input, consumes the agent's event
/// stream and folds it into [`SessionState`].
///
/// Respond operations fail only on local preconditions, checked before any
/// state changes. Network failures put the session in the `error` phase.
pub struct SessionEngine {
    transport: Arc<dyn Transport>,
    state: SessionState,
    event_tx: broadcast::Sender<AgentEvent>,
    handle: SessionHandle,
}

impl SessionEngine {
    /// Create an engine for a fresh conversation
    pub fn new(transport: Arc<dyn Transport>, context: SessionContext) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            transport,
            state: SessionState::new(context),
            event_tx,
            handle: SessionHandle::new(),
        }
    }

    /// Subscribe to every event applied to the session
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_tx.subscribe()
    }

    /// Get the current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Get a cloneable handle for aborting from another task
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Abort the current stream
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Send a plain user message
    pub async fn send_user_turn(&mut self, content: impl Into<String>) -> Result<()> {
        self.send_turn(UserTurn::new(content)).await
    }

    /// Send a user message with options
    pub async fn send_turn(&mut self, turn: UserTurn) -> Result<()> {
        if let Some(id) = &self.state.streaming_message_id {
            tracing::warn!("New turn while message {} is still streaming", id);
        }

        let message = Message::user(uuid::Uuid::new_v4().to_string(), turn.content.clone())
            .with_attachments(turn.attachments.clone());
        self.dispatch(SessionAction::UserTurn {
            message,
            plan_mode: turn.plan_mode,
        });

        let session = &self.state.session;
        let request = OutgoingRequest::Chat(ChatRequest {
            message: turn.content,
            conversation_id: self.state.conversation_id.clone(),
            agent_url: session.agent_url.clone(),
            agent_id: session.agent_id.clone(),
            session_id: session.session_id.clone(),
            plan_mode: turn.plan_mode,
            attachments: turn.attachments,
        });
        self.run_stream(request).await;
        Ok(())
    }

    /// Answer the pending clarification
    pub async fn respond_to_clarification(
        &mut self,
        answers: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let pending = self
            .state
            .pending
            .clarification
            .as_ref()
            .ok_or(Error::NoPending(PendingKind::Clarification))?;
        let correlation = self.correlate(pending)?;
        let request = OutgoingRequest::Clarification(ClarificationResponse {
            clarification_id: pending.request.clarification_id.clone(),
            answers: answers.clone(),
            agent_url: correlation.agent_url,
            session_id: correlation.session_id,
        });

        self.dispatch(SessionAction::Responded(UserResponse::Clarification {
            answers,
        }));
        self.run_stream(request).await;
        Ok(())
    }

    /// Answer the pending selection with the chosen item ids
    pub async fn respond_to_selection(&mut self, selected_ids: Vec<String>) -> Result<()> {
        let pending = self
            .state
            .pending
            .selection
            .as_ref()
            .ok_or(Error::NoPending(PendingKind::Selection))?;
        validate_selection(&pending.request, &selected_ids)?;
        let correlation = self.correlate(pending)?;
        let request = OutgoingRequest::Selection(SelectionResponse {
            selection_id: pending.request.selection_id.clone(),
            selected_ids: selected_ids.clone(),
            session_id: correlation.session_id,
            agent_url: correlation.agent_url,
        });

        self.dispatch(SessionAction::Responded(UserResponse::Selection {
            selected_ids,
        }));
        self.run_stream(request).await;
        Ok(())
    }

    /// Approve or reject the pending preview, optionally with an edited plan
    pub async fn respond_to_preview(
        &mut self,
        approved: bool,
        edited_plan: Option<serde_json::Value>,
    ) -> Result<()> {
        let pending = self
            .state
            .pending
            .preview
            .as_ref()
            .ok_or(Error::NoPending(PendingKind::Preview))?;
        let correlation = self.correlate(pending)?;
        let request = OutgoingRequest::Preview(PreviewResponse::new(
            pending.request.plan_id.clone(),
            approved,
            edited_plan.clone(),
            correlation.agent_url,
            correlation.session_id,
        ));

        self.dispatch(SessionAction::Responded(UserResponse::Preview {
            approved,
            edited_plan,
        }));
        self.run_stream(request).await;
        Ok(())
    }

    /// Approve or reject the pending search plan
    pub async fn respond_to_plan(&mut self, approved: bool, feedback: Option<String>) -> Result<()> {
        let pending = self
            .state
            .pending
            .plan
            .as_ref()
            .ok_or(Error::NoPending(PendingKind::Plan))?;
        let correlation = self.correlate(pending)?;
        let request = OutgoingRequest::PlanApproval(PlanApprovalRequest {
            conversation_id: self.state.conversation_id.clone(),
            response: PlanApproval {
                approved,
                plan_id: pending.request.plan_id.clone(),
                feedback: feedback.clone(),
                agent_url: correlation.agent_url,
                session_id: correlation.session_id,
            },
        });

        self.dispatch(SessionAction::Responded(UserResponse::Plan {
            approved,
            feedback,
        }));
        self.run_stream(request).await;
        Ok(())
    }

    /// Start over with an empty conversation on the same agent session
    pub fn reset(&mut self) {
        if self.handle.is_streaming() {
            self.handle.abort();
        }
        self.dispatch(SessionAction::Reset);
    }

    fn correlate<T>(&self, pending: &Pending<T>) -> Result<SessionCorrelation>
    where
        T: RoutedRequest,
    {
        pending
            .correlation
            .clone()
            .or_else(|| resolve_correlation(pending.request.route(), &self.state.session))
            .ok_or(Error::MissingCorrelation)
    }

    fn dispatch(&mut self, action: SessionAction) {
        let state = std::mem::take(&mut self.state);
        self.state = reducer::apply(state, action);
    }

    fn apply_event(&mut self, event: &AgentEvent) {
        let state = std::mem::take(&mut self.state);
        self.state = reducer::reduce(state, event);
        let _ = self.event_tx.send(event.clone());
    }

    /// Open a stream for `request` and apply its events until it ends.
    async fn run_stream(&mut self, request: OutgoingRequest) {
        let cancel = self.handle.begin();
        self.dispatch(SessionAction::StreamStarted {
            assistant_id: uuid::Uuid::new_v4().to_string(),
        });
        tracing::debug!("Sending {} request", request.label());

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.transport.open(request, cancel.clone()) => Some(result),
        };

        let mut stream = match opened {
            None => {
                self.dispatch(SessionAction::StreamClosed { aborted: true });
                self.handle.end();
                return;
            }
            Some(Err(e)) => {
                self.fail(e.to_string());
                return;
            }
            Some(Ok(stream)) => stream,
        };

        let mut aborted = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    aborted = true;
                    break;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    self.apply_event(&event);
                    if event.is_terminal() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    self.fail(e.to_string());
                    return;
                }
                None => break,
            }
        }

        self.dispatch(SessionAction::StreamClosed { aborted });
        self.handle.end();
    }

    fn fail(&mut self, error: String) {
        self.dispatch(SessionAction::StreamFailed {
            error: error.clone(),
        });
        let _ = self.event_tx.send(AgentEvent::Error {
            message: error,
            code: Some("transport".to_string()),
        });
        self.handle.end();
    }
}

/// Requests that carry routing fields
trait RoutedRequest {
    fn route(&self) -> &parley_wire::RouteHint;
}

impl RoutedRequest for parley_wire::events::ClarificationRequest {
    fn route(&self) -> &parley_wire::RouteHint {
        &self.route
    }
}

impl RoutedRequest for parley_wire::events::SelectionRequest {
    fn route(&self) -> &parley_wire::RouteHint {
        &self.route
    }
}

impl RoutedRequest for parley_wire::events::PlanProposal {
    fn route(&self) -> &parley_wire::RouteHint {
        &self.route
    }
}

/// Check a selection against the request's bounds and offered items
fn validate_selection(
    request: &parley_wire::events::SelectionRequest,
    selected_ids: &[String],
) -> Result<()> {
    if let Some(min) = request.min_select {
        if selected_ids.len() < min {
            return Err(Error::InvalidSelection(format!(
                "at least {} item(s) required, got {}",
                min,
                selected_ids.len()
            )));
        }
    }
    if let Some(max) = request.max_select {
        if selected_ids.len() > max {
            return Err(Error::InvalidSelection(format!(
                "at most {} item(s) allowed, got {}",
                max,
                selected_ids.len()
            )));
        }
    }
    if !request.items.is_empty() {
        if let Some(unknown) = selected_ids
            .iter()
            .find(|id| !request.items.iter().any(|item| &item.id == *id))
        {
            return Err(Error::InvalidSelection(format!(
                "`{}` was not offered",
                unknown
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{Phase, PlanPhase};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use parley_wire::EventStream;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    /// What the mock answers to the next request
    enum Script {
        Events(Vec<AgentEvent>),
        /// Raw SSE chunks run through the real decoder
        Sse(Vec<&'static str>),
        /// Yield these events, then never finish
        Hang(Vec<AgentEvent>),
        /// Yield these events, then a read error
        Break(Vec<AgentEvent>),
        FailOpen(u16),
    }

    /// A mock transport that plays back scripted responses and records
    /// the requests it received.
    struct MockTransport {
        scripts: Mutex<Vec<Script>>,
        requests: Mutex<Vec<serde_json::Value>>,
    }

    impl MockTransport {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts),
                requests: Mutex::new(vec![]),
            })
        }

        fn sent(&self) -> Vec<serde_json::Value> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(
            &self,
            request: OutgoingRequest,
            _cancel: CancellationToken,
        ) -> parley_wire::Result<EventStream> {
            self.requests
                .lock()
                .push(serde_json::to_value(&request).unwrap());
            let script = {
                let mut scripts = self.scripts.lock();
                if scripts.is_empty() {
                    Script::Events(vec![])
                } else {
                    scripts.remove(0)
                }
            };

            let stream: EventStream = match script {
                Script::Events(events) => Box::pin(async_stream::stream! {
                    for event in events {
                        yield Ok(event);
                    }
                }),
                Script::Sse(chunks) => parley_wire::decode_stream(futures::stream::iter(
                    chunks
                        .into_iter()
                        .map(|c| Ok::<_, parley_wire::Error>(c.as_bytes().to_vec())),
                )),
                Script::Hang(events) => Box::pin(async_stream::stream! {
                    for event in events {
                        yield Ok(event);
                    }
                    futures::future::pending::<()>().await;
                }),
                Script::Break(events) => Box::pin(async_stream::stream! {
                    for event in events {
                        yield Ok(event);
                    }
                    yield Err(parley_wire::Error::Sse("connection reset".into()));
                }),
                Script::FailOpen(status) => {
                    return Err(parley_wire::Error::status(status, "unavailable"));
                }
            };
            Ok(stream)
        }
    }

    fn event(value: serde_json::Value) -> AgentEvent {
        AgentEvent::from_value(value).unwrap()
    }

    fn engine(scripts: Vec<Script>) -> (SessionEngine, Arc<MockTransport>) {
        let transport = MockTransport::new(scripts);
        let context = SessionContext::new()
            .with_agent_url("http://agent:9999")
            .with_session_id("s1");
        (SessionEngine::new(transport.clone(), context), transport)
    }

    fn last_assistant(engine: &SessionEngine) -> &Message {
        let state = engine.state();
        let id = state.transcript.last_assistant_id().unwrap();
        state.transcript.get(id).unwrap()
    }

    #[tokio::test]
    async fn test_streamed_reply_completes() {
        let (mut engine, transport) = engine(vec![Script::Events(vec![
            event(json!({"type": "content", "delta": "Hello"})),
            event(json!({"type": "content", "delta": " world"})),
            event(json!({"type": "done", "state": "completed"})),
        ])]);

        engine.send_user_turn("hi").await.unwrap();

        let state = engine.state();
        assert_eq!(state.messages().len(), 2);
        let reply = last_assistant(&engine);
        assert_eq!(reply.content, "Hello world");
        assert!(!reply.is_streaming);
        assert_eq!(state.phase, Phase::Completed);
        assert!(state.streaming_message_id.is_none());
        assert!(!engine.handle().is_streaming());

        let sent = transport.sent();
        assert_eq!(sent[0]["message"], "hi");
        assert_eq!(sent[0]["agentUrl"], "http://agent:9999");
        assert_eq!(sent[0]["sessionId"], "s1");
    }

    #[tokio::test]
    async fn test_clarification_round_trip() {
        let (mut engine, transport) = engine(vec![
            Script::Events(vec![event(json!({
                "type": "clarification_needed",
                "clarificationId": "c1",
                "questions": [{"questionId": "topic", "questionType": "free_text", "question": "Which topic?"}],
                "sessionId": "agent-session"
            }))]),
            Script::Events(vec![event(json!({"type": "done", "completed": true}))]),
        ]);

        engine
            .send_turn(UserTurn::new("find trends").plan_mode())
            .await
            .unwrap();
        let state = engine.state();
        assert_eq!(state.phase, Phase::WaitingClarification);
        assert_eq!(
            state.pending.clarification.as_ref().unwrap().request.clarification_id,
            "c1"
        );
        assert!(!state.is_loading);

        let mut answers = serde_json::Map::new();
        answers.insert("topic".into(), json!("tech"));
        engine.respond_to_clarification(answers).await.unwrap();

        let sent = transport.sent();
        assert_eq!(
            sent[1],
            json!({
                "clarificationId": "c1",
                "answers": {"topic": "tech"},
                "agentUrl": "http://agent:9999",
                "sessionId": "agent-session"
            })
        );
        assert_eq!(engine.state().phase, Phase::Completed);
        assert!(engine.state().pending.clarification.is_none());
    }

    #[tokio::test]
    async fn test_selection_then_preview() {
        let (mut engine, transport) = engine(vec![
            Script::Events(vec![event(json!({
                "type": "selection_required",
                "selectionId": "sel-1",
                "items": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
                "minSelect": 1,
                "maxSelect": 2
            }))]),
            Script::Events(vec![event(json!({
                "type": "preview_ready",
                "planId": "p1",
                "steps": [{"id": "s1", "description": "Fetch posts"}]
            }))]),
        ]);
        let mut events = engine.subscribe();

        engine
            .send_turn(UserTurn::new("analyze").plan_mode())
            .await
            .unwrap();
        assert_eq!(engine.state().phase, Phase::WaitingApproval);

        engine
            .respond_to_selection(vec!["a".into(), "b".into()])
            .await
            .unwrap();

        let state = engine.state();
        assert_eq!(state.phase, Phase::WaitingApproval);
        let plan = state.plan.as_ref().unwrap();
        assert_eq!(plan.selected_items, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(plan.phase, PlanPhase::Preview);
        assert_eq!(state.pending.preview.as_ref().unwrap().request.plan_id, "p1");
        assert!(state.is_consistent());

        assert_eq!(
            transport.sent()[1],
            json!({
                "selectionId": "sel-1",
                "selectedIds": ["a", "b"],
                "sessionId": "s1",
                "agentUrl": "http://agent:9999"
            })
        );

        let mut kinds = vec![];
        while let Ok(e) = events.try_recv() {
            kinds.push(e.kind());
        }
        assert_eq!(kinds, vec!["selection_required", "preview_ready"]);
    }

    #[tokio::test]
    async fn test_invalid_selection_is_rejected_before_sending() {
        let (mut engine, transport) = engine(vec![Script::Events(vec![event(json!({
            "type": "selection_required",
            "selectionId": "sel-1",
            "items": [{"id": "a"}, {"id": "b"}],
            "maxSelect": 1
        }))])]);
        engine.send_user_turn("go").await.unwrap();

        let err = engine
            .respond_to_selection(vec!["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection(_)));
        let err = engine
            .respond_to_selection(vec!["zzz".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection(_)));

        assert!(engine.state().pending.selection.is_some());
        assert_eq!(engine.state().phase, Phase::WaitingApproval);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_respond_without_pending() {
        let (mut engine, _) = engine(vec![]);
        let err = engine.respond_to_preview(true, None).await.unwrap_err();
        assert!(matches!(err, Error::NoPending(PendingKind::Preview)));
        assert_eq!(engine.state().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_missing_correlation() {
        let transport = MockTransport::new(vec![Script::Events(vec![event(
            json!({"type": "search_plan", "planId": "p1"}),
        )])]);
        let mut engine = SessionEngine::new(transport.clone(), SessionContext::new());
        engine.send_user_turn("plan it").await.unwrap();

        let err = engine.respond_to_plan(true, None).await.unwrap_err();
        assert!(matches!(err, Error::MissingCorrelation));
        assert!(engine.state().pending.plan.is_some());
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_plan_approval_body() {
        let (mut engine, transport) = engine(vec![
            Script::Events(vec![event(json!({
                "type": "search_plan",
                "planId": "p1",
                "agentUrl": "http://planner"
            }))]),
            Script::Events(vec![]),
        ]);
        engine.send_user_turn("plan it").await.unwrap();
        engine
            .respond_to_plan(false, Some("too broad".into()))
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(
            sent[1],
            json!({
                "conversationId": engine.state().conversation_id,
                "response": {
                    "approved": false,
                    "planId": "p1",
                    "feedback": "too broad",
                    "agentUrl": "http://planner",
                    "sessionId": "s1"
                }
            })
        );
        assert_eq!(engine.state().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_preview_response_body() {
        let (mut engine, transport) = engine(vec![
            Script::Events(vec![event(json!({"type": "preview_ready", "planId": "p9"}))]),
            Script::Events(vec![event(json!({"type": "content", "delta": "Running"}))]),
        ]);
        engine.send_user_turn("go").await.unwrap();
        engine
            .respond_to_preview(true, Some(json!({"steps": []})))
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent[1]["type"], "preview_response");
        assert_eq!(sent[1]["planId"], "p9");
        assert_eq!(sent[1]["approved"], true);
        assert_eq!(sent[1]["editedPlan"], json!({"steps": []}));
        // The stream ended without `done`
        assert_eq!(engine.state().phase, Phase::Idle);
        assert_eq!(last_assistant(&engine).content, "Running");
    }

    #[tokio::test]
    async fn test_file_attaches_to_latest_assistant() {
        let (mut engine, _) = engine(vec![
            Script::Events(vec![event(json!({"type": "content", "delta": "one"}))]),
            Script::Events(vec![event(json!({"type": "content", "delta": "two"}))]),
        ]);
        engine.send_user_turn("first").await.unwrap();
        engine.send_user_turn("second").await.unwrap();
        assert!(engine.state().streaming_message_id.is_none());

        let state = reducer::reduce(
            engine.state().clone(),
            &event(json!({"type": "file_created", "path": "/out/r.html", "name": "r.html"})),
        );
        let assistants: Vec<&Message> = state
            .messages()
            .iter()
            .filter(|m| m.is_assistant())
            .collect();
        assert_eq!(assistants.len(), 2);
        assert!(assistants[0].file_outputs.is_empty());
        assert_eq!(assistants[1].file_outputs[0].path, "/out/r.html");
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let (mut engine, _) = engine(vec![Script::Sse(vec![
            "data: {not json\n\n",
            "data: {\"type\":\"content\",\"delta\":\"ok\"}\n\n",
            "data: [DONE]\n\n",
        ])]);
        engine.send_user_turn("hi").await.unwrap();

        assert_eq!(last_assistant(&engine).content, "ok");
        assert_ne!(engine.state().phase, Phase::Error);
    }

    #[tokio::test]
    async fn test_open_failure_sets_error_phase() {
        let (mut engine, _) = engine(vec![Script::FailOpen(502)]);
        let mut events = engine.subscribe();
        engine.send_user_turn("hi").await.unwrap();

        let state = engine.state();
        assert_eq!(state.phase, Phase::Error);
        assert!(state.streaming_message_id.is_none());
        assert!(state.error.as_deref().unwrap().contains("502"));
        assert!(matches!(events.try_recv(), Ok(AgentEvent::Error { .. })));
        assert!(!engine.handle().is_streaming());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial_content() {
        let (mut engine, _) = engine(vec![Script::Break(vec![event(
            json!({"type": "content", "delta": "partial"}),
        )])]);
        engine.send_user_turn("hi").await.unwrap();

        assert_eq!(engine.state().phase, Phase::Error);
        let reply = last_assistant(&engine);
        assert_eq!(reply.content, "partial");
        assert!(!reply.is_streaming);
    }

    #[tokio::test]
    async fn test_error_event_recovers_on_next_turn() {
        let (mut engine, _) = engine(vec![
            Script::Events(vec![event(json!({"type": "error", "message": "boom"}))]),
            Script::Events(vec![event(json!({"type": "done", "state": "completed"}))]),
        ]);
        engine.send_user_turn("first").await.unwrap();
        assert_eq!(engine.state().phase, Phase::Error);

        engine.send_user_turn("again").await.unwrap();
        assert_eq!(engine.state().phase, Phase::Completed);
        assert!(engine.state().error.is_none());
    }

    #[tokio::test]
    async fn test_abort_keeps_partial_content() {
        let (mut engine, _) = engine(vec![Script::Hang(vec![event(
            json!({"type": "content", "delta": "so far"}),
        )])]);
        let handle = engine.handle();

        let (result, _) = tokio::join!(engine.send_user_turn("long task"), async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            handle.abort();
        });
        result.unwrap();

        let state = engine.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.streaming_message_id.is_none());
        let reply = last_assistant(&engine);
        assert_eq!(reply.content, "so far");
        assert!(!reply.is_streaming);
        assert!(!engine.handle().is_streaming());
    }

    #[tokio::test]
    async fn test_reset_clears_conversation() {
        let (mut engine, _) = engine(vec![Script::Events(vec![event(
            json!({"type": "clarification_needed", "clarificationId": "c1"}),
        )])]);
        engine
            .send_turn(UserTurn::new("x").plan_mode())
            .await
            .unwrap();
        let before = engine.state().conversation_id.clone();

        engine.reset();

        let state = engine.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.pending.is_empty());
        assert!(state.plan.is_none());
        assert!(state.transcript.is_empty());
        assert_ne!(state.conversation_id, before);
        assert_eq!(state.session.session_id, "s1");
    }

    #[test]
    fn test_validate_selection_bounds() {
        let request: parley_wire::events::SelectionRequest = serde_json::from_value(json!({
            "selectionId": "s",
            "minSelect": 2
        }))
        .unwrap();
        assert!(validate_selection(&request, &["x".to_string()]).is_err());
        // No offered items means any ids are accepted
        assert!(validate_selection(&request, &["x".to_string(), "y".to_string()]).is_ok());
    }
}
