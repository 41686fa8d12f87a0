//! Line-based input from the terminal
//!
//! Stands in for a speech recognizer: each line typed on stdin is one
//! utterance. Reading happens on a dedicated thread because stdin reads
//! block; lines are forwarded over a bounded channel.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{InputSource, ListenError};

/// Reads utterances from stdin on a background thread
pub struct StdinInput {
    line_rx: mpsc::Receiver<String>,
    running: Arc<AtomicBool>,
}

impl StdinInput {
    /// Spawn the reader thread
    pub fn start() -> std::io::Result<Self> {
        let (line_tx, line_rx) = mpsc::channel(32);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        thread::Builder::new()
            .name("stdin-listener".to_string())
            .spawn(move || {
                info!("stdin listener thread started");
                read_lines(std::io::stdin().lock(), &line_tx, &thread_running);
                thread_running.store(false, Ordering::SeqCst);
                info!("stdin listener thread stopped");
            })?;

        Ok(Self { line_rx, running })
    }

    /// Ask the reader thread to exit after its current read
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for StdinInput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_lines(input: impl BufRead, line_tx: &mpsc::Sender<String>, running: &AtomicBool) {
    for line in input.lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match line {
            Ok(line) => {
                if line_tx.blocking_send(line).is_err() {
                    warn!("failed to forward line - channel closed?");
                    break;
                }
            }
            Err(e) => {
                warn!(?e, "stdin read error");
                break;
            }
        }
    }
}

#[async_trait]
impl InputSource for StdinInput {
    // Typed lines arrive whole, so the phrase limit has nothing to bound.
    async fn listen(
        &mut self,
        timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<String, ListenError> {
        match tokio::time::timeout(timeout, self.line_rx.recv()).await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    Err(ListenError::Unrecognized)
                } else {
                    debug!(text = line, "heard");
                    Ok(line.to_string())
                }
            }
            Ok(None) => Err(ListenError::Transport("stdin closed".to_string())),
            Err(_) => Err(ListenError::Timeout),
        }
    }
}
