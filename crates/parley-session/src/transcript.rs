//! The conversation transcript and the streaming updates applied to it.

use std::collections::HashMap;

use parley_wire::{FileOutput, Message, ThinkingStep};

/// Ordered messages with an id index, so every update touches only the
/// message it targets.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
    last_assistant: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message at the end. A duplicate id is ignored.
    pub fn push(&mut self, message: Message) {
        if self.index.contains_key(&message.id) {
            tracing::warn!("Ignoring duplicate message id: {}", message.id);
            return;
        }
        let position = self.messages.len();
        if message.is_assistant() {
            self.last_assistant = Some(position);
        }
        self.index.insert(message.id.clone(), position);
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index.get(id).map(|&i| &self.messages[i])
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Id of the most recently added assistant message
    pub fn last_assistant_id(&self) -> Option<&str> {
        self.last_assistant.map(|i| self.messages[i].id.as_str())
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        let i = *self.index.get(id)?;
        Some(&mut self.messages[i])
    }

    /// Append a token to a message's content.
    ///
    /// Returns `false` (and logs) when no message has this id.
    pub fn append(&mut self, id: &str, token: &str) -> bool {
        let Some(message) = self.get_mut(id) else {
            tracing::warn!("Dropping content for unknown message: {}", id);
            return false;
        };
        message.content.push_str(token);
        message.updated_at = chrono::Utc::now().timestamp_millis();
        true
    }

    /// Insert a thinking step, replacing an earlier step of the same kind.
    pub fn attach_thinking_step(&mut self, id: &str, step: ThinkingStep) -> bool {
        let Some(message) = self.get_mut(id) else {
            tracing::warn!("Dropping thinking step for unknown message: {}", id);
            return false;
        };
        match message
            .thinking_steps
            .iter_mut()
            .find(|existing| existing.kind == step.kind)
        {
            Some(existing) => *existing = step,
            None => message.thinking_steps.push(step),
        }
        message.is_thinking = message.thinking_steps.iter().any(|s| !s.is_complete);
        message.updated_at = chrono::Utc::now().timestamp_millis();
        true
    }

    /// Attach a file output, at most once per path.
    ///
    /// Agents do not reliably tag file events with a message id, so when
    /// `target` is missing or names no message the file goes to the most
    /// recently added assistant message. Returns the id of the message that
    /// holds the file, or `None` if there is no assistant message at all.
    pub fn attach_file_output(&mut self, target: Option<&str>, file: FileOutput) -> Option<String> {
        let position = match target.and_then(|id| self.index.get(id).copied()) {
            Some(i) => i,
            None => {
                let Some(i) = self.last_assistant else {
                    tracing::warn!("No assistant message to attach file {} to", file.path);
                    return None;
                };
                tracing::debug!(
                    "File {} has no live target ({:?}), attaching to latest assistant message",
                    file.path,
                    target
                );
                i
            }
        };

        let message = &mut self.messages[position];
        if !message.file_outputs.iter().any(|f| f.path == file.path) {
            message.file_outputs.push(file);
            message.updated_at = chrono::Utc::now().timestamp_millis();
        }
        Some(message.id.clone())
    }

    /// Clear the streaming and thinking flags.
    ///
    /// Returns `true` only for the call that actually ended the stream.
    pub fn finalize(&mut self, id: &str) -> bool {
        let Some(message) = self.get_mut(id) else {
            tracing::warn!("Cannot finalize unknown message: {}", id);
            return false;
        };
        message.is_thinking = false;
        if !message.is_streaming {
            return false;
        }
        message.is_streaming = false;
        message.updated_at = chrono::Utc::now().timestamp_millis();
        true
    }
}
