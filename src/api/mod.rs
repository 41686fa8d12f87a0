//! HTTP chat API
//!
//! Lets other programs talk to the assistant over the text channel while the
//! voice loop keeps running.

mod server;
mod types;

pub use server::Server;
