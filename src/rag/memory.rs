//! Bounded conversation memory and per-caller sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Exchanges a session keeps.
pub const SESSION_BOUND: usize = 10;

/// Exchanges kept from a caller-supplied transcript.
pub const REQUEST_BOUND: usize = 5;

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationExchange {
    pub question: String,
    pub answer: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationExchange {
    /// Create an exchange stamped with the current time.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            timestamp: Utc::now(),
        }
    }
}

/// FIFO of exchanges that never grows past its bound.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    exchanges: VecDeque<ConversationExchange>,
    bound: usize,
}

impl ConversationMemory {
    /// Create an empty memory holding at most `bound` exchanges (minimum 1).
    pub fn new(bound: usize) -> Self {
        let bound = bound.max(1);
        Self {
            exchanges: VecDeque::with_capacity(bound),
            bound,
        }
    }

    /// Build a memory from a transcript, keeping only its most recent `bound` entries.
    pub fn from_transcript(transcript: &[ConversationExchange], bound: usize) -> Self {
        let mut memory = Self::new(bound);
        for exchange in transcript {
            memory.append(exchange.clone());
        }
        memory
    }

    /// Append an exchange, evicting the oldest ones beyond the bound.
    pub fn append(&mut self, exchange: ConversationExchange) {
        self.exchanges.push_back(exchange);
        while self.exchanges.len() > self.bound {
            self.exchanges.pop_front();
        }
    }

    /// The last `n` exchanges, oldest first.
    pub fn window(&self, n: usize) -> Vec<ConversationExchange> {
        let skip = self.exchanges.len().saturating_sub(n);
        self.exchanges.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationExchange> {
        self.exchanges.iter()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(SESSION_BOUND)
    }
}

/// A caller's conversation with the assistant.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub memory: ConversationMemory,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session with a generated id.
    pub fn new(bound: usize) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), bound)
    }

    pub fn with_id(id: impl Into<String>, bound: usize) -> Self {
        Self {
            id: id.into(),
            memory: ConversationMemory::new(bound),
            created_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SESSION_BOUND)
    }
}

/// Render exchanges as the history block appended to the prompt context.
///
/// Returns an empty string when there is no history.
pub fn render_history(exchanges: &[ConversationExchange]) -> String {
    if exchanges.is_empty() {
        return String::new();
    }

    let mut rendered = String::from("\n\nPrevious conversation context:\n");
    for exchange in exchanges {
        rendered.push_str(&format!("Q: {}\nA: {}\n", exchange.question, exchange.answer));
    }
    rendered
}
