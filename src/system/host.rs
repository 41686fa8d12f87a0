//! Host automation
//!
//! Answers clock and greeting commands directly and records every other
//! command as the automation it would trigger. Brightness is tracked as a
//! simulated level so stepping clamps the way a real panel does.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use tracing::info;

use super::{ExecutorError, MessagingAutomation, SystemActionExecutor};
use crate::classifier::LocalCommand;

/// Key presses per volume step
const VOLUME_PRESSES: u8 = 5;

/// Percentage points per brightness step
const BRIGHTNESS_STEP: u8 = 20;

/// Clock time as spoken, e.g. "03:07 PM"
pub fn format_time<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%I:%M %p").to_string()
}

/// Calendar date as spoken, e.g. "October 15, 2026"
pub fn format_date<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%B %d, %Y").to_string()
}

/// Executor for the local machine
pub struct HostActions {
    user_name: String,
    /// Simulated panel brightness, `None` when the display has no control
    brightness: Option<Mutex<u8>>,
}

impl HostActions {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            brightness: Some(Mutex::new(50)),
        }
    }

    /// Executor for a display without brightness control
    pub fn without_brightness(user_name: impl Into<String>) -> Self {
        Self {
            brightness: None,
            ..Self::new(user_name)
        }
    }

    fn step_brightness(&self, delta: i8) -> Result<String, ExecutorError> {
        let level = self
            .brightness
            .as_ref()
            .ok_or_else(|| ExecutorError::Unavailable("Brightness control".to_string()))?;
        let mut level = level
            .lock()
            .map_err(|_| ExecutorError::Failed("brightness state poisoned".to_string()))?;

        *level = if delta > 0 {
            level.saturating_add(BRIGHTNESS_STEP).min(100)
        } else {
            level.saturating_sub(BRIGHTNESS_STEP)
        };
        info!(level = *level, "brightness set");

        Ok(if delta > 0 {
            "Brightness increased".to_string()
        } else {
            "Brightness decreased".to_string()
        })
    }
}

#[async_trait]
impl SystemActionExecutor for HostActions {
    async fn execute(&self, command: &LocalCommand) -> Result<String, ExecutorError> {
        match command {
            LocalCommand::Volume { delta } => {
                let key = if *delta > 0 { "volumeup" } else { "volumedown" };
                info!(key, presses = VOLUME_PRESSES, "volume key");
                Ok(if *delta > 0 {
                    "Volume increased".to_string()
                } else {
                    "Volume decreased".to_string()
                })
            }
            LocalCommand::Brightness { delta } => self.step_brightness(*delta),
            LocalCommand::OpenApp { app } => {
                info!(app = %app, "launch application");
                Ok(format!("Opening {app}"))
            }
            LocalCommand::CloseWindow => {
                info!("close focused window");
                Ok("Window closed".to_string())
            }
            LocalCommand::GetTime => Ok(format!("The time is {}", format_time(&Local::now()))),
            LocalCommand::GetDate => {
                Ok(format!("Today's date is {}", format_date(&Local::now())))
            }
            LocalCommand::Shutdown { delay_secs } => {
                info!(delay_secs, "schedule shutdown");
                Ok(format!("Shutting down in {delay_secs} seconds"))
            }
            LocalCommand::Restart { delay_secs } => {
                info!(delay_secs, "schedule restart");
                Ok(format!("Restarting in {delay_secs} seconds"))
            }
            LocalCommand::Greet => Ok(format!("Hello {}, how can I help you?", self.user_name)),
        }
    }
}

/// Message delivery through the desktop chat client
#[derive(Debug, Default)]
pub struct HostMessenger;

#[async_trait]
impl MessagingAutomation for HostMessenger {
    async fn send(&self, recipient: &str, body: &str) -> Result<(), ExecutorError> {
        if recipient.trim().is_empty() {
            return Err(ExecutorError::Failed("no recipient".to_string()));
        }
        info!(recipient, chars = body.chars().count(), "deliver message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 15, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_time_format() {
        assert_eq!(format_time(&at(15, 7)), "03:07 PM");
        assert_eq!(format_time(&at(9, 30)), "09:30 AM");
    }

    #[test]
    fn test_date_format() {
        assert_eq!(format_date(&at(12, 0)), "October 15, 2026");
    }

    #[tokio::test]
    async fn test_brightness_clamps() {
        let host = HostActions::new("Sam");
        for _ in 0..4 {
            host.execute(&LocalCommand::Brightness { delta: 1 }).await.unwrap();
        }
        assert_eq!(*host.brightness.as_ref().unwrap().lock().unwrap(), 100);

        for _ in 0..7 {
            host.execute(&LocalCommand::Brightness { delta: -1 }).await.unwrap();
        }
        assert_eq!(*host.brightness.as_ref().unwrap().lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_brightness_unavailable() {
        let host = HostActions::without_brightness("Sam");
        let err = host
            .execute(&LocalCommand::Brightness { delta: 1 })
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Brightness control not available");
    }

    #[tokio::test]
    async fn test_command_replies() {
        let host = HostActions::new("Sam");
        async fn reply(host: &HostActions, command: LocalCommand) -> String {
            host.execute(&command).await.unwrap()
        }

        assert_eq!(
            reply(&host, LocalCommand::Volume { delta: 1 }).await,
            "Volume increased"
        );
        assert_eq!(
            reply(&host, LocalCommand::OpenApp { app: "chrome".into() }).await,
            "Opening chrome"
        );
        assert_eq!(
            reply(&host, LocalCommand::Greet).await,
            "Hello Sam, how can I help you?"
        );
        assert_eq!(
            reply(&host, LocalCommand::Shutdown { delay_secs: 10 }).await,
            "Shutting down in 10 seconds"
        );
        assert!(reply(&host, LocalCommand::GetTime).await.starts_with("The time is "));
        assert!(reply(&host, LocalCommand::GetDate).await.starts_with("Today's date is "));
    }

    #[tokio::test]
    async fn test_messenger_requires_recipient() {
        let messenger = HostMessenger;
        assert!(messenger.send("Alice", "hi").await.is_ok());
        assert!(messenger.send(" ", "hi").await.is_err());
    }
}
