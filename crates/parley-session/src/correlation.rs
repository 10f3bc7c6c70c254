//! Which agent endpoint and session an exchange belongs to

use parley_wire::RouteHint;

/// The agent session a conversation is currently talking to.
///
/// Passed explicitly into the engine; events that carry routing fields
/// update it as they arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub agent_id: Option<String>,
    pub agent_url: Option<String>,
    pub session_id: String,
}

impl SessionContext {
    /// Create a context with a freshly generated session id
    pub fn new() -> Self {
        Self {
            agent_id: None,
            agent_url: None,
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_agent_url(mut self, url: impl Into<String>) -> Self {
        self.agent_url = Some(url.into());
        self
    }

    pub fn with_agent_id(mut self, id: impl Into<String>) -> Self {
        self.agent_id = Some(id.into());
        self
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = id.into();
        self
    }

    /// The active correlation, if the agent endpoint is known
    pub fn correlation(&self) -> Option<SessionCorrelation> {
        resolve_correlation(&RouteHint::default(), self)
    }

    /// Adopt the routing fields an event carried.
    ///
    /// Returns `true` if anything changed.
    pub fn observe(&mut self, hint: &RouteHint) -> bool {
        let mut changed = false;
        if let Some(url) = non_empty(&hint.agent_url) {
            if self.agent_url.as_deref() != Some(url) {
                tracing::debug!("Active agent changed to {}", url);
                self.agent_url = Some(url.to_string());
                changed = true;
            }
        }
        if let Some(session) = non_empty(&hint.session_id) {
            if self.session_id != session {
                tracing::debug!("Active session changed to {}", session);
                self.session_id = session.to_string();
                changed = true;
            }
        }
        if let Some(id) = non_empty(&hint.agent_id) {
            if self.agent_id.as_deref() != Some(id) {
                self.agent_id = Some(id.to_string());
                changed = true;
            }
        }
        changed
    }
}

/// An unambiguous (agent url, session id) pair attached to every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCorrelation {
    pub agent_url: String,
    pub session_id: String,
}

/// Resolve the correlation for an event.
///
/// Fields the event carries win; missing fields fall back to the active
/// session. Returns `None` when no agent url is known from either side.
pub fn resolve_correlation(
    hint: &RouteHint,
    active: &SessionContext,
) -> Option<SessionCorrelation> {
    let agent_url = non_empty(&hint.agent_url).or_else(|| non_empty(&active.agent_url))?;
    let session_id = non_empty(&hint.session_id)
        .or_else(|| Some(active.session_id.as_str()).filter(|s| !s.is_empty()))?;
    Some(SessionCorrelation {
        agent_url: agent_url.to_string(),
        session_id: session_id.to_string(),
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(url: Option<&str>, session: Option<&str>) -> RouteHint {
        RouteHint {
            agent_url: url.map(String::from),
            session_id: session.map(String::from),
            agent_id: None,
        }
    }

    fn active() -> SessionContext {
        SessionContext::new()
            .with_agent_url("http://active")
            .with_session_id("active-session")
    }

    #[test]
    fn test_event_fields_win() {
        let c = resolve_correlation(&hint(Some("http://event"), Some("event-session")), &active())
            .unwrap();
        assert_eq!(c.agent_url, "http://event");
        assert_eq!(c.session_id, "event-session");
    }

    #[test]
    fn test_missing_fields_fall_back_independently() {
        let c = resolve_correlation(&hint(None, Some("event-session")), &active()).unwrap();
        assert_eq!(c.agent_url, "http://active");
        assert_eq!(c.session_id, "event-session");

        let c = resolve_correlation(&hint(Some("http://event"), None), &active()).unwrap();
        assert_eq!(c.agent_url, "http://event");
        assert_eq!(c.session_id, "active-session");
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        let c = resolve_correlation(&hint(Some(""), Some("")), &active()).unwrap();
        assert_eq!(c, active().correlation().unwrap());
    }

    #[test]
    fn test_no_agent_url_anywhere() {
        let ctx = SessionContext::new();
        assert!(resolve_correlation(&hint(None, Some("s")), &ctx).is_none());
        assert!(ctx.correlation().is_none());
    }

    #[test]
    fn test_generated_session_id() {
        let a = SessionContext::new();
        let b = SessionContext::new();
        assert!(!a.session_id.is_empty());
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_observe_updates_active_session() {
        let mut ctx = active();
        assert!(!ctx.observe(&hint(None, None)));
        assert!(ctx.observe(&hint(Some("http://other"), Some("s2"))));
        assert_eq!(ctx.agent_url.as_deref(), Some("http://other"));
        assert_eq!(ctx.session_id, "s2");
        assert!(!ctx.observe(&hint(Some("http://other"), Some("s2"))));
    }
}
