//! Outer phase machine for the voice loop
//!
//! Tracks whether the loop is waiting for the wake word, for a command, or
//! for the next answer of a voice flow, plus the run of consecutive
//! recognition failures.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Phase of the voice loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Listening for the wake word
    #[default]
    Idle,
    /// Wake word heard, listening for a command
    Awake,
    /// A voice flow is waiting for its next answer
    AwaitingFlowInput,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Awake => write!(f, "awake"),
            Phase::AwaitingFlowInput => write!(f, "awaiting_flow_input"),
        }
    }
}

/// A completed phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    /// Time spent in the phase being left
    pub duration_ms: u64,
}

/// Loop-local state: the phase and the recognition failure streak
#[derive(Debug)]
pub struct DispatchState {
    phase: Phase,
    recognition_failures: u32,
    phase_entered_at: Instant,
}

impl DispatchState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            recognition_failures: 0,
            phase_entered_at: Instant::now(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn recognition_failures(&self) -> u32 {
        self.recognition_failures
    }

    /// Move to `to`; `None` when already there
    pub fn transition_to(&mut self, to: Phase) -> Option<Transition> {
        let from = self.phase;
        if from == to {
            return None;
        }

        let duration_ms = self.phase_entered_at.elapsed().as_millis() as u64;
        info!(%from, %to, duration_ms, "phase transition");

        self.phase = to;
        self.phase_entered_at = Instant::now();

        Some(Transition {
            from,
            to,
            duration_ms,
        })
    }

    /// Count a failed recognition
    ///
    /// Returns the streak length when it reaches `threshold`; the counter is
    /// reset at that point.
    pub fn record_recognition_failure(&mut self, threshold: u32) -> Option<u32> {
        self.recognition_failures += 1;
        if self.recognition_failures < threshold {
            return None;
        }

        let failures = self.recognition_failures;
        warn!(failures, "repeated recognition failures, resetting");
        self.recognition_failures = 0;
        Some(failures)
    }

    pub fn clear_recognition_failures(&mut self) {
        self.recognition_failures = 0;
    }
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive wake word match anywhere in the utterance
pub fn contains_wake_word(text: &str, wake_word: &str) -> bool {
    let wake_word = wake_word.trim().to_lowercase();
    !wake_word.is_empty() && text.to_lowercase().contains(&wake_word)
}
