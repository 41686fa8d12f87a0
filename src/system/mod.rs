//! System automation collaborators
//!
//! Local commands and message delivery are carried out by external
//! automation. The dispatcher only sees these two traits.

mod host;

use async_trait::async_trait;

use crate::classifier::LocalCommand;

pub use host::{HostActions, HostMessenger};

/// Failure of a system action
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The capability does not exist on this machine
    #[error("{0} not available")]
    Unavailable(String),

    /// The capability exists but the action failed
    #[error("action failed: {0}")]
    Failed(String),
}

impl ExecutorError {
    /// Message shown or spoken to the user
    pub fn user_message(&self) -> String {
        match self {
            ExecutorError::Unavailable(feature) => format!("{feature} not available"),
            ExecutorError::Failed(_) => "Sorry, I couldn't do that".to_string(),
        }
    }
}

/// Executes local system commands
#[async_trait]
pub trait SystemActionExecutor: Send + Sync {
    /// Run the command and describe the result for the user
    async fn execute(&self, command: &LocalCommand) -> Result<String, ExecutorError>;
}

/// Sends a composed message to a contact
#[async_trait]
pub trait MessagingAutomation: Send + Sync {
    async fn send(&self, recipient: &str, body: &str) -> Result<(), ExecutorError>;
}
