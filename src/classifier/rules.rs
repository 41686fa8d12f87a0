//! Ordered classification rules
//!
//! The table is evaluated top to bottom and the first rule whose trigger
//! occurs in the (lowercased) utterance decides the action. Overlapping
//! utterances such as "date and time" are resolved by position alone.

use super::{Action, LocalCommand};
use crate::flow::FlowKind;

/// Delay before a shutdown or restart takes effect
const POWER_DELAY_SECS: u32 = 10;

/// Trigger phrase for launching applications
const OPEN_TRIGGER: &str = "open ";

/// A trigger set and the action it builds
pub struct Rule {
    /// Short name for logs and tests
    pub name: &'static str,
    /// Lowercase substrings, any of which selects this rule
    pub triggers: &'static [&'static str],
    build: fn(&str, &str) -> Option<Action>,
}

impl Rule {
    /// Apply the rule to lowercased text
    ///
    /// Returns `None` when no trigger occurs, or when the builder rejects
    /// the match (an `open` with nothing to open).
    pub fn apply(&self, lowered: &str) -> Option<Action> {
        let trigger = self
            .triggers
            .iter()
            .find(|trigger| lowered.contains(**trigger))?;
        (self.build)(lowered, trigger)
    }
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "volume_up",
        triggers: &["volume up"],
        build: |_, _| Some(Action::Local(LocalCommand::Volume { delta: 1 })),
    },
    Rule {
        name: "volume_down",
        triggers: &["volume down"],
        build: |_, _| Some(Action::Local(LocalCommand::Volume { delta: -1 })),
    },
    Rule {
        name: "brightness_up",
        triggers: &["brightness up"],
        build: |_, _| Some(Action::Local(LocalCommand::Brightness { delta: 1 })),
    },
    Rule {
        name: "brightness_down",
        triggers: &["brightness down"],
        build: |_, _| Some(Action::Local(LocalCommand::Brightness { delta: -1 })),
    },
    Rule {
        name: "open_app",
        triggers: &[OPEN_TRIGGER],
        build: open_app,
    },
    Rule {
        name: "close_window",
        triggers: &["close", "band karo"],
        build: |_, _| Some(Action::Local(LocalCommand::CloseWindow)),
    },
    Rule {
        name: "get_time",
        triggers: &["time", "samay"],
        build: |_, _| Some(Action::Local(LocalCommand::GetTime)),
    },
    Rule {
        name: "get_date",
        triggers: &["date", "tarikh"],
        build: |_, _| Some(Action::Local(LocalCommand::GetDate)),
    },
    Rule {
        name: "send_message",
        triggers: &["whatsapp", "message"],
        build: |_, _| Some(Action::FlowStart(FlowKind::SendMessage)),
    },
    Rule {
        name: "shutdown",
        triggers: &["shutdown", "switch off"],
        build: |_, _| {
            Some(Action::Local(LocalCommand::Shutdown {
                delay_secs: POWER_DELAY_SECS,
            }))
        },
    },
    Rule {
        name: "restart",
        triggers: &["restart"],
        build: |_, _| {
            Some(Action::Local(LocalCommand::Restart {
                delay_secs: POWER_DELAY_SECS,
            }))
        },
    },
    Rule {
        name: "greet",
        triggers: &["hello", "hi", "hey"],
        build: |_, _| Some(Action::Local(LocalCommand::Greet)),
    },
];

/// Everything after the first trigger occurrence, trimmed
fn open_app(lowered: &str, trigger: &str) -> Option<Action> {
    let start = lowered.find(trigger)? + trigger.len();
    let app = lowered[start..].trim();
    if app.is_empty() {
        return None;
    }
    Some(Action::Local(LocalCommand::OpenApp {
        app: app.to_string(),
    }))
}
