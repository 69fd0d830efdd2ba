//! Page and view implementations for the headless binary: toasts and
//! progress go to the log, confirmations are asked on stdin.

use std::cell::Cell;
use std::rc::Rc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::batch::{BatchControl, BatchPhase};
use crate::delete::DocumentRows;
use crate::dify::ConnectionPanel;
use crate::document::ChunkProgressView;
use crate::models::KnowledgeBase;
use crate::page::{Alert, Confirm, DialogIcon, Page, ToastLevel};
use crate::upload::UploadView;

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPage {
    assume_yes: bool,
}

impl TerminalPage {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    async fn prompt(&self, question: &str) -> bool {
        let mut stderr = tokio::io::stderr();
        if stderr
            .write_all(format!("{question} [y/N] ").as_bytes())
            .await
            .is_err()
        {
            return false;
        }
        let _ = stderr.flush().await;

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(_) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes" | "是"),
            Err(err) => {
                warn!("failed reading confirmation: {err}");
                false
            }
        }
    }
}

impl Page for TerminalPage {
    fn toast(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Success | ToastLevel::Info => info!("{message}"),
            ToastLevel::Warning => warn!("{message}"),
            ToastLevel::Error => error!("{message}"),
        }
    }

    async fn confirm(&self, dialog: &Confirm) -> bool {
        if self.assume_yes {
            info!(title = %dialog.title, "{} (assumed yes)", dialog.text);
            return true;
        }
        self.prompt(&format!("{}: {}", dialog.title, dialog.text))
            .await
    }

    async fn alert(&self, dialog: &Alert) {
        match dialog.icon {
            DialogIcon::Error => error!("{}: {}", dialog.title, dialog.text),
            DialogIcon::Warning => warn!("{}: {}", dialog.title, dialog.text),
            DialogIcon::Success | DialogIcon::Question => {
                info!("{}: {}", dialog.title, dialog.text)
            }
        }
    }

    fn reload(&self) {
        debug!("nothing to reload in terminal mode");
    }

    fn reloads(&self) -> bool {
        false
    }
}

/// Logs upload progress in steps of ten percent.
#[derive(Debug, Clone, Default)]
pub struct TerminalUploadView {
    last_step: Rc<Cell<Option<u8>>>,
}

impl UploadView for TerminalUploadView {
    fn show(&self) {}

    fn set_progress(&self, percent: u8) {
        let step = percent / 10;
        if self.last_step.get() != Some(step) {
            self.last_step.set(Some(step));
            info!("upload {percent}%");
        }
    }

    fn set_status(&self, text: &str) {
        debug!("{text}");
    }

    fn mark_failed(&self) {}
}

#[derive(Debug, Default)]
pub struct TerminalChunkView;

impl ChunkProgressView for TerminalChunkView {
    fn show(&self) {}

    fn hide(&self) {}

    fn set_busy(&self, _busy: bool) {}

    fn set_status(&self, text: &str) {
        info!("{text}");
    }

    fn set_progress(&self, percent: f64) {
        info!("chunking {percent:.0}%");
    }

    fn mark_done(&self) {}

    fn mark_failed(&self) {}
}

#[derive(Debug, Default)]
pub struct TerminalControl;

impl BatchControl for TerminalControl {
    fn show_phase(&self, phase: &BatchPhase) {
        match phase {
            BatchPhase::Processing { task_id } => info!(task_id = %task_id, "task started"),
            other => debug!(phase = ?other, "batch phase"),
        }
    }
}

/// There is no listing to update; every delete is reported as removed.
#[derive(Debug, Default)]
pub struct NoRows;

impl DocumentRows for NoRows {
    fn remove_row(&self, _document_id: i64) -> bool {
        true
    }
}

/// Prints the knowledge bases once the connection works.
#[derive(Debug, Default)]
pub struct TerminalPanel;

impl ConnectionPanel for TerminalPanel {
    fn set_connecting(&self) {
        info!("testing dify connection");
    }

    fn restore(&self) {}

    fn show_knowledge_bases(&self, bases: &[KnowledgeBase]) {
        for base in bases {
            println!("{}\t{}", base.id, base.name);
        }
    }
}
