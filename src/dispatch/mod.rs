//! Dispatch module
//!
//! Turns recognized utterances into replies. The voice loop owns the
//! wake-word phase machine; command handling itself is shared with the chat
//! API.

mod handler;
mod machine;
mod runner;

pub use handler::CommandHandler;
pub use machine::Phase;
pub use runner::DispatchLoop;
