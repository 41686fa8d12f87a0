//! Bounded conversation memory
//!
//! Keeps the most recent turns of the conversation for building model
//! context. Shared between the voice loop and the chat API, so every
//! operation takes `&self` and reads hand back owned snapshots.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Maximum number of turns retained
pub const MAX_TURNS: usize = 20;

/// Number of most recent turns sent to the model
pub const CONTEXT_WINDOW: usize = 5;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// A single utterance in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Speaker,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// FIFO log of conversation turns capped at [`MAX_TURNS`]
#[derive(Debug, Default)]
pub struct ConversationMemory {
    turns: Mutex<VecDeque<ConversationTurn>>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, evicting the oldest turns beyond capacity
    pub fn append(&self, turn: ConversationTurn) {
        let mut turns = self.lock();
        push_bounded(&mut turns, turn);
    }

    /// Append a user turn and the assistant reply under one lock
    pub fn append_exchange(&self, user: impl Into<String>, assistant: impl Into<String>) {
        let mut turns = self.lock();
        push_bounded(&mut turns, ConversationTurn::user(user));
        push_bounded(&mut turns, ConversationTurn::assistant(assistant));
    }

    /// Snapshot of the last [`CONTEXT_WINDOW`] turns, oldest first
    pub fn context_window(&self) -> Vec<ConversationTurn> {
        let turns = self.lock();
        let skip = turns.len().saturating_sub(CONTEXT_WINDOW);
        turns.iter().skip(skip).cloned().collect()
    }

    /// Snapshot of every retained turn, oldest first
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the deque half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<ConversationTurn>> {
        self.turns.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn push_bounded(turns: &mut VecDeque<ConversationTurn>, turn: ConversationTurn) {
    turns.push_back(turn);
    while turns.len() > MAX_TURNS {
        turns.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_append_evicts_oldest() {
        let memory = ConversationMemory::new();
        for i in 0..25 {
            memory.append(ConversationTurn::user(format!("turn {i}")));
        }

        let turns = memory.turns();
        assert_eq!(turns.len(), MAX_TURNS);
        assert_eq!(turns.first().unwrap().text, "turn 5");
        assert_eq!(turns.last().unwrap().text, "turn 24");
    }

    #[test]
    fn test_context_window_is_most_recent_five() {
        let memory = ConversationMemory::new();
        for i in 0..8 {
            memory.append(ConversationTurn::user(format!("turn {i}")));
        }

        let window = memory.context_window();
        let texts: Vec<_> = window.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["turn 3", "turn 4", "turn 5", "turn 6", "turn 7"]);
    }

    #[test]
    fn test_context_window_shorter_than_capacity() {
        let memory = ConversationMemory::new();
        assert!(memory.context_window().is_empty());

        memory.append_exchange("hi", "hello");
        let window = memory.context_window();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].role, Speaker::User);
        assert_eq!(window[1].role, Speaker::Assistant);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_appends() {
        let memory = ConversationMemory::new();
        memory.append_exchange("what is rust", "a language");

        let snapshot = memory.context_window();
        memory.append_exchange("and tokio", "a runtime");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].text, "what is rust");
        assert_eq!(memory.len(), 4);
    }

    #[test]
    fn test_concurrent_appends_stay_bounded() {
        let memory = Arc::new(ConversationMemory::new());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let memory = Arc::clone(&memory);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        memory.append_exchange(format!("u{worker}-{i}"), format!("a{worker}-{i}"));
                        assert!(memory.context_window().len() <= CONTEXT_WINDOW);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(memory.len(), MAX_TURNS);
        // Exchanges are appended atomically, so turns alternate user/assistant.
        let turns = memory.turns();
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, Speaker::User);
            assert_eq!(pair[1].role, Speaker::Assistant);
        }
    }
}
