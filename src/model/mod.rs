//! Language model access
//!
//! [`ModelClient`] is the only entry point the dispatcher uses; the
//! provider itself sits behind the [`ChatCompletion`] trait.

mod client;
mod error;
mod http;

pub use client::{system_prompt, ChatCompletion, CompletionRequest, ModelClient};
pub use error::ModelError;
pub use http::HttpCompletion;
