//! What the user sees while the modal wait blocks.

use crate::owner::{CancelAction, ModalResult};
use std::io::BufRead;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A visible progress indicator with a single cancel action.
///
/// Both methods are called on the owner thread. `open` hands over the
/// cancel action; the surface may trigger it from any thread.
pub trait ProgressSurface {
    fn open(&mut self, message: &str, cancel: CancelAction);
    fn close(&mut self, result: ModalResult);
}

/// Surface with no UI. Logs, and can cancel on its own after a delay.
#[derive(Debug)]
pub struct HeadlessSurface {
    cancel_after: Option<Duration>,
    keep_cancel: bool,
    cancel: Option<CancelAction>,
    message: Option<String>,
    closes: usize,
    last_result: Option<ModalResult>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self {
            cancel_after: None,
            keep_cancel: true,
            cancel: None,
            message: None,
            closes: 0,
            last_result: None,
        }
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the cancel action `delay` after the surface opens.
    pub fn cancel_after(delay: Duration) -> Self {
        Self {
            cancel_after: Some(delay),
            ..Self::default()
        }
    }

    /// Drop the cancel action on open instead of holding it.
    pub fn without_cancel(mut self) -> Self {
        self.keep_cancel = false;
        self
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn cancel_action(&self) -> Option<CancelAction> {
        self.cancel.clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes
    }

    pub fn last_result(&self) -> Option<ModalResult> {
        self.last_result
    }
}

impl ProgressSurface for HeadlessSurface {
    fn open(&mut self, message: &str, cancel: CancelAction) {
        info!(message = %message, "Waiting for background work");
        self.message = Some(message.to_string());

        if let Some(delay) = self.cancel_after {
            let timed = cancel.clone();
            let spawned = std::thread::Builder::new()
                .name("kfr-headless-cancel".to_string())
                .spawn(move || {
                    std::thread::sleep(delay);
                    timed.trigger();
                });
            if let Err(e) = spawned {
                warn!(error = %e, "Failed to start delayed cancel");
            }
        }

        if self.keep_cancel {
            self.cancel = Some(cancel);
        }
    }

    fn close(&mut self, result: ModalResult) {
        info!(result = %result, "Background wait finished");
        self.closes += 1;
        self.last_result = Some(result);
    }
}

/// Surface for interactive terminals.
///
/// Prints the message to stderr; a line on stdin is the cancel action.
/// The stdin reader thread may outlive the wait, its late cancel is ignored.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    opened_at: Option<Instant>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSurface for TerminalSurface {
    fn open(&mut self, message: &str, cancel: CancelAction) {
        self.opened_at = Some(Instant::now());
        eprintln!("{} (press Enter to cancel)", message);

        let spawned = std::thread::Builder::new()
            .name("kfr-stdin-cancel".to_string())
            .spawn(move || {
                let mut line = String::new();
                match std::io::stdin().lock().read_line(&mut line) {
                    Ok(0) => debug!("stdin closed, cancel not available"),
                    Ok(_) => {
                        cancel.trigger();
                    }
                    Err(e) => debug!(error = %e, "Failed to read stdin"),
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start stdin reader, cancel not available");
        }
    }

    fn close(&mut self, result: ModalResult) {
        let elapsed = self
            .opened_at
            .take()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        match result {
            ModalResult::CancelRequested => {
                eprintln!("Cancelled after {:.1}s", elapsed.as_secs_f64())
            }
            ModalResult::WorkFinished => eprintln!("Done in {:.1}s", elapsed.as_secs_f64()),
        }
    }
}
