//! cutie-daemon: voice and chat assistant daemon
//!
//! Runs two tasks over one shared context:
//! - the voice dispatch loop (wake word, local commands, message flows,
//!   language model fallback)
//! - the HTTP chat API (`POST /chat`, `GET /status`)
//!
//! Recognized speech is read line by line from stdin and replies are
//! printed to the terminal.

mod api;
mod classifier;
mod config;
mod context;
mod dispatch;
mod events;
mod flow;
mod input;
mod lifecycle;
mod memory;
mod model;
mod output;
mod system;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::Server;
use crate::config::Config;
use crate::context::{AssistantContext, Collaborators};
use crate::dispatch::DispatchLoop;
use crate::events::AssistantEvent;
use crate::input::StdinInput;
use crate::lifecycle::{ShutdownSignal, StopFlag};
use crate::model::HttpCompletion;
use crate::output::ConsoleOutput;
use crate::system::{HostActions, HostMessenger};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "cutie-daemon starting");

    let config = Config::load()?;
    info!(
        bind_addr = %config.bind_addr,
        model = %config.model.model,
        wake_word = %config.wake_word,
        "configuration loaded"
    );
    if config.model.api_key.is_none() {
        warn!("GROQ_API_KEY not set - completion requests will likely be rejected");
    }

    let shutdown = ShutdownSignal::new();
    let stop = StopFlag::new();

    let ctx = Arc::new(AssistantContext::new(
        &config,
        Collaborators {
            completion: Arc::new(HttpCompletion::new(&config.model)),
            executor: Arc::new(HostActions::new(config.user_name.clone())),
            messenger: Arc::new(HostMessenger),
        },
    ));

    // Subscribe before anything can emit
    let mut events = ctx.subscribe();

    let server = Arc::new(Server::bind(config.bind_addr, ctx.clone()).await?);
    info!(addr = %server.local_addr(), "chat API listening");
    let server_task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!(?e, "chat API error");
            }
        })
    };

    let input = StdinInput::start().context("failed to start stdin listener")?;
    let output = Arc::new(ConsoleOutput::new(config.assistant_name.clone()));
    let mut dispatch = DispatchLoop::new(
        ctx.clone(),
        Box::new(input),
        output,
        config.wake_word.clone(),
        config.listen.clone(),
        stop.clone(),
    );
    let dispatch_task = tokio::spawn(async move { dispatch.run().await });

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Keep the status view in step with the voice loop
        _ = async {
            loop {
                match events.recv().await {
                    Ok(AssistantEvent::PhaseChanged { to, .. }) => server.set_phase(to).await,
                    Ok(event) => debug!(%event, "assistant event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "assistant event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("event handler exited");
        }

        // Wait for shutdown signal
        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(?e, "failed to install signal handlers"),
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    stop.stop();
    server.shutdown();

    if let Err(e) = server_task.await {
        error!(?e, "chat API task failed");
    }
    if let Err(e) = dispatch_task.await {
        error!(?e, "dispatch loop task failed");
    }

    info!("cutie-daemon stopped");

    Ok(())
}
