//! Terminal feedback while an analysis runs
//!
//! Shows a spinner on stderr and prints user-facing warnings as they are
//! published by the sync engine.

use std::io::Write;

use colored::Colorize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::notifications::{SyncEvent, SyncEventKind};

const BRAILLE_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Spinner only on an interactive stderr with quiet logging
pub fn should_show_spinner() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr()) && !log::log_enabled!(log::Level::Info)
}

pub struct ProgressSpinner {
    frame_index: usize,
    enabled: bool,
}

impl ProgressSpinner {
    pub fn new(enabled: bool) -> Self {
        Self {
            frame_index: 0,
            enabled,
        }
    }

    pub fn tick(&mut self) {
        let frame = BRAILLE_FRAMES[self.frame_index];
        self.frame_index = (self.frame_index + 1) % BRAILLE_FRAMES.len();
        if self.enabled {
            eprint!("\r{frame}");
            let _ = std::io::stderr().flush();
        }
    }

    pub fn finish(&self) {
        if self.enabled {
            eprint!("\r \r");
            let _ = std::io::stderr().flush();
        }
    }
}

/// Text shown to the user for a warning-class event
pub fn warning_text(event: &SyncEvent, color: bool) -> Option<String> {
    let text = match &event.kind {
        SyncEventKind::Warning { message, .. } => message.clone(),
        SyncEventKind::LoginRequired => format!(
            "Authentication for {} failed: the session token was rejected",
            event.project
        ),
        _ => return None,
    };
    if color {
        Some(format!("{} {}", "warning:".yellow().bold(), text))
    } else {
        Some(format!("warning: {}", text))
    }
}

/// Run until `shutdown` flips to true or the event channel closes
pub async fn run_status_reporter(
    mut events: UnboundedReceiver<SyncEvent>,
    mut shutdown: watch::Receiver<bool>,
    show_spinner: bool,
    color: bool,
) {
    let mut spinner = ProgressSpinner::new(show_spinner);
    let mut update_interval = interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(text) = warning_text(&event, color) {
                    spinner.finish();
                    eprintln!("{}", text);
                }
            }
            _ = update_interval.tick() => spinner.tick(),
        }
    }

    // Drain warnings published just before shutdown
    while let Ok(event) = events.try_recv() {
        if let Some(text) = warning_text(&event, color) {
            spinner.finish();
            eprintln!("{}", text);
        }
    }
    spinner.finish();
}
