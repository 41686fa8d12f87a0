//! Response output
//!
//! Replies leave the assistant through an [`OutputSink`]: `speak` for the
//! voice channel, `display` for on-screen text.

use tracing::info;

/// Destination for assistant replies
pub trait OutputSink: Send + Sync {
    /// Say the text aloud
    fn speak(&self, text: &str);

    /// Show the text without speaking it
    fn display(&self, text: &str);
}

/// Prints replies to the terminal in place of a speech engine
pub struct ConsoleOutput {
    assistant_name: String,
}

impl ConsoleOutput {
    pub fn new(assistant_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
        }
    }

    fn line(&self, text: &str) -> String {
        format!("{}: {}", self.assistant_name.to_uppercase(), text)
    }
}

impl OutputSink for ConsoleOutput {
    fn speak(&self, text: &str) {
        info!(chars = text.chars().count(), "speaking");
        println!("{}", self.line(text));
    }

    fn display(&self, text: &str) {
        println!("{}", self.line(text));
    }
}
