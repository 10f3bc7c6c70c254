//! Decoding of `data:` framed event streams
//!
//! SSE framing is handled by `eventsource-stream`; this module turns each
//! message's data into typed events.

use std::pin::Pin;

use async_stream::stream;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;
use tokio_stream::Stream;

use crate::{
    a2a,
    error::{Error, Result},
    events::{AgentEvent, EventDecodeError},
};

/// Payload that ends the stream without being parsed
pub const DONE_SENTINEL: &str = "[DONE]";

/// A stream of decoded events. Transport failures end it with an `Err`.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send>>;

/// Turn one record payload into typed events.
///
/// Malformed JSON and unknown or ill-shaped events are logged and skipped.
/// A2A JSON-RPC envelopes may expand into several events.
pub fn parse_payload(payload: &str) -> Vec<AgentEvent> {
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Skipping malformed event payload: {}", e);
            return vec![];
        }
    };

    let values = if a2a::is_envelope(&value) {
        a2a::unwrap_envelope(value)
    } else {
        vec![value]
    };

    values
        .into_iter()
        .filter_map(|value| match AgentEvent::from_value(value) {
            Ok(event) => Some(event),
            Err(EventDecodeError::UnknownType(kind)) => {
                tracing::warn!("Ignoring unknown event type: {}", kind);
                None
            }
            Err(e) => {
                tracing::warn!("Skipping event that failed validation: {}", e);
                None
            }
        })
        .collect()
}

/// Lazily decode a chunked byte stream into events.
///
/// The returned stream ends when the body closes or `[DONE]` arrives,
/// whichever comes first. A record the server never terminated with a blank
/// line is dropped. A read error is yielded once and ends the stream.
pub fn decode_stream<S, B, E>(body: S) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let body = body
        .map(|chunk| chunk.map(Chunk::Body))
        .chain(futures::stream::iter([Ok(Chunk::End)]));

    Box::pin(stream! {
        let mut messages = Box::pin(body.eventsource());

        while let Some(message) = messages.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    yield Err(framing_error(e));
                    return;
                }
            };

            let payload = message.data.trim();
            if payload.is_empty() {
                continue;
            }
            if payload == DONE_SENTINEL {
                tracing::debug!("Stream finished with sentinel");
                return;
            }
            for event in parse_payload(payload) {
                yield Ok(event);
            }
        }
    })
}

/// A body chunk, or the line feed sent after the body closes so that a
/// trailing bare CR still ends its line
enum Chunk<B> {
    Body(B),
    End,
}

impl<B: AsRef<[u8]>> AsRef<[u8]> for Chunk<B> {
    fn as_ref(&self) -> &[u8] {
        match self {
            Chunk::Body(bytes) => bytes.as_ref(),
            Chunk::End => b"\n",
        }
    }
}

fn framing_error<E: Into<Error>>(error: EventStreamError<E>) -> Error {
    match error {
        EventStreamError::Transport(e) => e.into(),
        EventStreamError::Utf8(e) => Error::Sse(format!("Invalid UTF-8 in stream: {}", e)),
        EventStreamError::Parser(e) => Error::Sse(format!("Malformed stream: {:?}", e)),
    }
}
