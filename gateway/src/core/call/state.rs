//! Per-call conversation and turn-taking state.
//!
//! A [`CallState`] is owned by exactly one call session and is only ever
//! mutated from that session's task.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Speaker role of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Direction of the phone call.
///
/// Outbound calls seed the greeting as a `user` turn so the assistant
/// answers it; inbound calls seed it as the assistant's own opener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    #[default]
    Outbound,
    Inbound,
}

impl CallType {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outbound => "outbound",
            Self::Inbound => "inbound",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "inbound" => Self::Inbound,
            _ => Self::Outbound,
        }
    }

    /// Role used for the seeded greeting right after the system message.
    pub fn greeting_role(&self) -> Role {
        match self {
            Self::Outbound => Role::User,
            Self::Inbound => Role::Assistant,
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable record of one call's identity, timing and transcript.
///
/// `response_start_timestamp` is `Some` only while the AI is producing audio
/// for the current turn. The first entry of `conversation_history`, when
/// present, is always the system message.
#[derive(Debug, Clone, Default)]
pub struct CallState {
    pub stream_id: Option<String>,
    pub call_id: Option<String>,
    pub call_type: CallType,

    pub from_number: String,
    pub to_number: String,

    pub call_context: String,
    pub initial_message: String,
    conversation_history: Vec<ConversationMessage>,

    pub latest_media_timestamp: u64,
    pub response_start_timestamp: Option<u64>,
    pub last_assistant_item_id: Option<String>,
    pub mark_queue: VecDeque<String>,
    pub has_seen_media: bool,
}

impl CallState {
    pub fn new(call_type: CallType) -> Self {
        Self {
            call_type,
            ..Default::default()
        }
    }

    /// Set the caller and callee numbers.
    ///
    /// Parties are fixed for the lifetime of a call, so a second call is ignored.
    pub fn set_parties(&mut self, from_number: &str, to_number: &str) {
        if !self.from_number.is_empty() || !self.to_number.is_empty() {
            tracing::debug!("Call parties already set, ignoring update");
            return;
        }
        self.from_number = from_number.to_string();
        self.to_number = to_number.to_string();
    }

    /// Replace the transcript with the system prompt followed by the greeting.
    pub fn seed_conversation(&mut self, call_context: String, initial_message: &str) {
        self.initial_message = initial_message.to_string();
        self.call_context = call_context;
        self.conversation_history = vec![
            ConversationMessage::new(Role::System, self.call_context.clone()),
            ConversationMessage::new(self.call_type.greeting_role(), initial_message),
        ];
    }

    /// Append a message to the transcript.
    ///
    /// Empty content is skipped, and a `system` entry is only accepted as the
    /// very first message.
    pub fn push_message(&mut self, role: Role, content: &str) -> bool {
        if content.trim().is_empty() {
            return false;
        }
        if role == Role::System && !self.conversation_history.is_empty() {
            tracing::warn!("Rejecting system message appended mid-conversation");
            return false;
        }
        self.conversation_history
            .push(ConversationMessage::new(role, content));
        true
    }

    pub fn conversation_history(&self) -> &[ConversationMessage] {
        &self.conversation_history
    }

    /// Record the start of a new spoken AI turn. The first value wins.
    pub fn mark_response_start(&mut self) -> bool {
        if self.response_start_timestamp.is_some() {
            return false;
        }
        self.response_start_timestamp = Some(self.latest_media_timestamp);
        true
    }

    /// Clear all turn-tracking state after a truncation or turn completion.
    pub fn reset_turn(&mut self) {
        self.mark_queue.clear();
        self.last_assistant_item_id = None;
        self.response_start_timestamp = None;
    }

    /// Drop the oldest pending mark, if any.
    pub fn acknowledge_mark(&mut self) -> Option<String> {
        self.mark_queue.pop_front()
    }

    /// Reset stream timing at the start of a new media stream.
    pub fn begin_stream(&mut self, stream_id: String, call_id: Option<String>) {
        self.stream_id = Some(stream_id);
        self.call_id = call_id;
        self.latest_media_timestamp = 0;
        self.response_start_timestamp = None;
    }
}
