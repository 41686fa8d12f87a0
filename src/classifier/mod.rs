//! Utterance classification
//!
//! Maps recognized text onto an [`Action`] using an ordered rule table.
//! Classification is pure: the same text always yields the same action.

mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::flow::{FlowId, FlowKind};

use rules::RULES;

/// A local system action and its argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocalCommand {
    /// Step the output volume up (+1) or down (-1)
    Volume { delta: i8 },
    /// Step the screen brightness up (+1) or down (-1)
    Brightness { delta: i8 },
    OpenApp { app: String },
    CloseWindow,
    GetTime,
    GetDate,
    Shutdown { delay_secs: u32 },
    Restart { delay_secs: u32 },
    Greet,
}

impl LocalCommand {
    pub fn kind(&self) -> ActionKind {
        match self {
            LocalCommand::Volume { .. } => ActionKind::Volume,
            LocalCommand::Brightness { .. } => ActionKind::Brightness,
            LocalCommand::OpenApp { .. } => ActionKind::OpenApp,
            LocalCommand::CloseWindow => ActionKind::CloseWindow,
            LocalCommand::GetTime => ActionKind::GetTime,
            LocalCommand::GetDate => ActionKind::GetDate,
            LocalCommand::Shutdown { .. } => ActionKind::Shutdown,
            LocalCommand::Restart { .. } => ActionKind::Restart,
            LocalCommand::Greet => ActionKind::Greet,
        }
    }
}

/// Payload-free tag for an action, used in events and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Volume,
    Brightness,
    OpenApp,
    CloseWindow,
    GetTime,
    GetDate,
    Shutdown,
    Restart,
    Greet,
    FlowStart,
    FlowContinue,
    Query,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Volume => "volume",
            ActionKind::Brightness => "brightness",
            ActionKind::OpenApp => "open_app",
            ActionKind::CloseWindow => "close_window",
            ActionKind::GetTime => "get_time",
            ActionKind::GetDate => "get_date",
            ActionKind::Shutdown => "shutdown",
            ActionKind::Restart => "restart",
            ActionKind::Greet => "greet",
            ActionKind::FlowStart => "flow_start",
            ActionKind::FlowContinue => "flow_continue",
            ActionKind::Query => "query",
        };
        f.write_str(name)
    }
}

/// What to do with an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run a local system action
    Local(LocalCommand),
    /// Begin a multi-turn flow
    FlowStart(FlowKind),
    /// Feed the next utterance into the active flow
    FlowContinue { flow_id: FlowId, input: String },
    /// Ask the language model
    Query(String),
    /// Nothing matched; callers fall back to [`Action::Query`]
    None,
}

impl Action {
    /// Tag for logging, `None` for [`Action::None`]
    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            Action::Local(command) => Some(command.kind()),
            Action::FlowStart(_) => Some(ActionKind::FlowStart),
            Action::FlowContinue { .. } => Some(ActionKind::FlowContinue),
            Action::Query(_) => Some(ActionKind::Query),
            Action::None => None,
        }
    }
}

/// Classify an utterance against [`RULES`], first match wins
pub fn classify(text: &str) -> Action {
    let lowered = text.to_lowercase();

    RULES
        .iter()
        .find_map(|rule| {
            let action = rule.apply(&lowered)?;
            debug!(rule = rule.name, "rule matched");
            Some(action)
        })
        .unwrap_or(Action::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_up() {
        assert_eq!(
            classify("volume up please"),
            Action::Local(LocalCommand::Volume { delta: 1 })
        );
        assert_eq!(
            classify("Volume Down"),
            Action::Local(LocalCommand::Volume { delta: -1 })
        );
    }

    #[test]
    fn test_brightness() {
        assert_eq!(
            classify("brightness up"),
            Action::Local(LocalCommand::Brightness { delta: 1 })
        );
        assert_eq!(
            classify("turn the brightness down"),
            Action::Local(LocalCommand::Brightness { delta: -1 })
        );
    }

    #[test]
    fn test_open_app_takes_remainder() {
        assert_eq!(
            classify("open chrome"),
            Action::Local(LocalCommand::OpenApp {
                app: "chrome".into()
            })
        );
        assert_eq!(
            classify("please Open  Visual Studio Code "),
            Action::Local(LocalCommand::OpenApp {
                app: "visual studio code".into()
            })
        );
    }

    #[test]
    fn test_open_without_app_falls_through() {
        // "open " with nothing after it is not an app launch.
        assert_eq!(classify("open "), Action::None);
    }

    #[test]
    fn test_close_and_hindi_alias() {
        assert_eq!(classify("close this"), Action::Local(LocalCommand::CloseWindow));
        assert_eq!(classify("window band karo"), Action::Local(LocalCommand::CloseWindow));
    }

    #[test]
    fn test_time_and_date() {
        assert_eq!(classify("what time is it"), Action::Local(LocalCommand::GetTime));
        assert_eq!(classify("kya samay hua"), Action::Local(LocalCommand::GetTime));
        assert_eq!(
            classify("what's the tarikh today"),
            Action::Local(LocalCommand::GetDate)
        );
    }

    #[test]
    fn test_message_starts_flow() {
        assert_eq!(
            classify("send a whatsapp"),
            Action::FlowStart(FlowKind::SendMessage)
        );
        assert_eq!(
            classify("Message someone"),
            Action::FlowStart(FlowKind::SendMessage)
        );
    }

    #[test]
    fn test_power_commands() {
        assert_eq!(
            classify("shutdown the computer"),
            Action::Local(LocalCommand::Shutdown { delay_secs: 10 })
        );
        assert_eq!(
            classify("switch off"),
            Action::Local(LocalCommand::Shutdown { delay_secs: 10 })
        );
        assert_eq!(
            classify("restart"),
            Action::Local(LocalCommand::Restart { delay_secs: 10 })
        );
    }

    #[test]
    fn test_greeting() {
        assert_eq!(classify("hello"), Action::Local(LocalCommand::Greet));
        assert_eq!(classify("hey there"), Action::Local(LocalCommand::Greet));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(classify("tell me a joke"), Action::None);
        assert_eq!(classify(""), Action::None);
    }

    #[test]
    fn test_time_beats_date() {
        // Both "time" and "date" appear; the time rule is listed first.
        let text = "what is the date and time";
        for _ in 0..3 {
            assert_eq!(classify(text), Action::Local(LocalCommand::GetTime));
        }
    }

    #[test]
    fn test_earlier_rules_shadow_later_ones() {
        // open (2) before time (4)
        assert_eq!(
            classify("open time tracker"),
            Action::Local(LocalCommand::OpenApp {
                app: "time tracker".into()
            })
        );
        // close (3) before message (6)
        assert_eq!(
            classify("close the message window"),
            Action::Local(LocalCommand::CloseWindow)
        );
        // message (6) before shutdown (7)
        assert_eq!(
            classify("message: shutdown at noon"),
            Action::FlowStart(FlowKind::SendMessage)
        );
        // restart (8) before greeting (9)
        assert_eq!(
            classify("hey restart"),
            Action::Local(LocalCommand::Restart { delay_secs: 10 })
        );
    }

    #[test]
    fn test_substring_matching_is_literal() {
        // "hi" inside "this" is still a greeting match.
        assert_eq!(classify("is this thing on"), Action::Local(LocalCommand::Greet));
    }

    #[test]
    fn test_action_kind_tags() {
        assert_eq!(classify("restart").kind(), Some(ActionKind::Restart));
        assert_eq!(classify("tell me a joke").kind(), None);
        assert_eq!(Action::Query("x".into()).kind(), Some(ActionKind::Query));
    }
}
