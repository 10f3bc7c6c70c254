//! Unwrapping of A2A JSON-RPC stream envelopes
//!
//! Agents that speak A2A wrap every update in a JSON-RPC response:
//!
//! ```json
//! {"jsonrpc": "2.0", "id": "1", "result": {
//!     "kind": "status-update",
//!     "sessionId": "s1",
//!     "status": {"state": "input-required", "message": {"parts": [{"data": {...}}]}}
//! }}
//! ```
//!
//! Each envelope becomes zero or more flat event payloads with a `type` field,
//! which then go through the normal event validation.

use serde_json::{Map, Value, json};

/// Whether a payload is a JSON-RPC envelope rather than a flat event
pub fn is_envelope(value: &Value) -> bool {
    value.get("jsonrpc").is_some() && value.get("type").is_none()
}

/// Flatten one envelope into event payloads
pub fn unwrap_envelope(value: Value) -> Vec<Value> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Agent returned a JSON-RPC error");
        return vec![json!({"type": "error", "message": message})];
    }

    let Some(result) = value.get("result") else {
        tracing::debug!("JSON-RPC envelope without result");
        return vec![];
    };

    let session_id = result.get("sessionId").and_then(Value::as_str);
    let kind = result.get("kind").and_then(Value::as_str).unwrap_or("");

    match kind {
        "status-update" => {
            let state = result
                .pointer("/status/state")
                .and_then(Value::as_str)
                .unwrap_or("working");
            let parts = result
                .pointer("/status/message/parts")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let metadata = result.pointer("/status/message/metadata");
            status_update_events(state, &parts, metadata, session_id)
        }
        "message" => {
            let parts = result
                .get("parts")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let mut events: Vec<Value> = parts
                .iter()
                .filter_map(|part| part_event(part, session_id, content))
                .collect();
            events.push(json!({"type": "done", "state": "completed"}));
            events
        }
        other => {
            tracing::debug!("Ignoring A2A result kind: {}", other);
            vec![]
        }
    }
}

fn status_update_events(
    state: &str,
    parts: &[Value],
    metadata: Option<&Value>,
    session_id: Option<&str>,
) -> Vec<Value> {
    let mut events: Vec<Value> = parts
        .iter()
        .filter_map(|part| {
            part_event(part, session_id, |text| match state {
                "failed" => json!({"type": "error", "message": text}),
                "working" => progress(text, metadata),
                _ => content(text),
            })
        })
        .collect();

    match state {
        "failed" if events.is_empty() => {
            events.push(json!({"type": "error", "message": "Agent reported failure"}));
        }
        "completed" => events.push(json!({"type": "done", "state": "completed"})),
        _ => {}
    }
    events
}

fn part_event(
    part: &Value,
    session_id: Option<&str>,
    on_text: impl Fn(&str) -> Value,
) -> Option<Value> {
    if let Some(Value::Object(data)) = part.get("data") {
        if data.contains_key("type") {
            return Some(Value::Object(with_session(data.clone(), session_id)));
        }
    }
    part.get("text").and_then(Value::as_str).map(on_text)
}

fn with_session(mut data: Map<String, Value>, session_id: Option<&str>) -> Map<String, Value> {
    if let Some(id) = session_id {
        data.entry("sessionId")
            .or_insert_with(|| Value::String(id.to_string()));
    }
    data
}

fn content(text: &str) -> Value {
    json!({"type": "content", "delta": text})
}

/// Progress text, with the step counters the agent put in the message metadata
fn progress(text: &str, metadata: Option<&Value>) -> Value {
    let mut event = json!({"type": "progress", "message": text});
    for key in ["step", "total"] {
        if let Some(n) = metadata.and_then(|m| m.get(key)).and_then(Value::as_u64) {
            event[key] = n.into();
        }
    }
    event
}
