//! Conversation transcript and the chat-model seam

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Role name in the two-role vocabulary of hosted chat models
    pub fn remote_name(&self) -> &'static str {
        match self {
            Role::System | Role::User => "user",
            Role::Assistant => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Ordered conversation history, starting with the system prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::new(Role::System, prompt)],
        }
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(role, content));
    }

    /// Record one completed turn
    pub fn record_turn(&mut self, user: &str, reply: &str) {
        self.push(Role::User, user);
        self.push(Role::Assistant, reply);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Hosted conversational model
///
/// Implementations map failures (missing credentials, transport errors,
/// empty answers) to `PredictError::UpstreamUnavailable`.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Answer `message` given the prior `history`
    async fn complete(&self, history: &[ChatMessage], message: &str) -> Result<String>;

    /// Model identifier shown at startup
    fn model_name(&self) -> &str;
}
