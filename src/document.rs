//! Chunking of a single document from its detail page.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::ChunkGoApi;
use crate::error::ClientError;
use crate::models::{DocumentStatus, JobState, Strategy};
use crate::page::{Alert, Confirm, DialogIcon, Page};
use crate::poller::{
    CHUNK_POLL_INTERVAL, ChunkStatusSource, ErrorPolicy, PollEvent, PollHandle, PollOutcome,
    Poller, Sleeper,
};
use crate::progress::{ProgressMeter, WAITING_LABEL, phase_label};
use crate::validation::{ChunkForm, ValidationError};

const DONE_ALERT_TIMER: Duration = Duration::from_millis(1500);

/// The document a detail page is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContext {
    pub id: i64,
    pub filename: String,
    pub status: Option<DocumentStatus>,
}

impl DocumentContext {
    pub fn is_processing(&self) -> bool {
        self.status == Some(DocumentStatus::Processing)
    }

    pub fn is_chunked(&self) -> bool {
        self.status == Some(DocumentStatus::Chunked)
    }
}

/// Progress area and submit button of the chunk form.
pub trait ChunkProgressView {
    fn show(&self);
    fn hide(&self);
    fn set_busy(&self, busy: bool);
    fn set_status(&self, text: &str);
    fn set_progress(&self, percent: f64);
    fn mark_done(&self);
    fn mark_failed(&self);
}

/// Strategies offered for one file type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyChoice {
    pub file_ext: String,
    pub strategies: Vec<Strategy>,
    /// Shown under the select when there is nothing to choose between.
    pub hint: Option<String>,
}

pub fn single_strategy_hint(file_ext: &str, display_name: &str) -> String {
    format!("{file_ext}文件类型仅支持{display_name}")
}

/// Fetches the strategies available for `file_ext` (`.docx`). An empty list
/// is announced with a warning alert and yields `None`.
pub async fn load_strategies<A: ChunkGoApi, P: Page>(
    api: &A,
    page: &P,
    file_ext: &str,
) -> Result<Option<StrategyChoice>, ClientError> {
    let list = api.strategies_for(file_ext).await?;
    if list.strategies.is_empty() {
        page.alert(&Alert::new(
            DialogIcon::Warning,
            "注意",
            format!("没有找到支持{file_ext}文件类型的切块策略"),
        ))
        .await;
        return Ok(None);
    }

    let hint = match list.strategies.as_slice() {
        [only] => Some(single_strategy_hint(file_ext, &only.display_name)),
        _ => None,
    };
    debug!(file_ext, count = list.strategies.len(), "loaded strategies");
    Ok(Some(StrategyChoice {
        file_ext: file_ext.to_string(),
        strategies: list.strategies,
        hint,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSubmitOutcome {
    Invalid(ValidationError),
    /// The user kept the existing chunks.
    Declined,
    /// Accepted as a background job; follow it with [`watch_document_chunk`].
    Processing,
    /// Chunked synchronously; the page was reloaded.
    Done,
    Failed(String),
}

/// Submits the chunk form. An already chunked document asks before its
/// chunks are overwritten.
pub async fn submit_document_chunk<A, P, V>(
    api: &A,
    page: &P,
    view: &V,
    document: &DocumentContext,
    form: &ChunkForm,
) -> ChunkSubmitOutcome
where
    A: ChunkGoApi,
    P: Page,
    V: ChunkProgressView,
{
    let params = match form.validate_document() {
        Ok(params) => params,
        Err(err) => return ChunkSubmitOutcome::Invalid(err),
    };

    view.set_busy(true);
    view.show();
    view.set_status("准备处理...");

    if document.is_chunked() {
        let confirm = Confirm::destructive(
            "确认重新切块",
            "文档已有切块结果，重新切块将覆盖现有结果，是否继续？",
            "确定",
        );
        if !page.confirm(&confirm).await {
            view.set_busy(false);
            view.hide();
            return ChunkSubmitOutcome::Declined;
        }
    }

    info!(
        document_id = document.id,
        strategy = %params.strategy,
        chunk_size = params.chunk_size,
        overlap = params.overlap,
        "submitting chunk job"
    );
    match api.submit_document_chunk(document.id, &params).await {
        Ok(response) if response.is_processing() => ChunkSubmitOutcome::Processing,
        Ok(_) => {
            page.alert(&chunked_alert()).await;
            page.reload();
            ChunkSubmitOutcome::Done
        }
        Err(err) => {
            warn!(document_id = document.id, error = %err, "chunk submission failed");
            let message = if err.is_timeout() {
                "服务器响应超时，请稍后查看处理结果或重试".to_string()
            } else {
                err.server_message().unwrap_or_else(|| "切块失败".to_string())
            };
            page.alert(&Alert::new(DialogIcon::Error, "切块失败", message.clone()))
                .await;
            view.set_busy(false);
            view.hide();
            ChunkSubmitOutcome::Failed(message)
        }
    }
}

fn chunked_alert() -> Alert {
    Alert::new(DialogIcon::Success, "切块成功", "文档切块已完成").timed(DONE_ALERT_TIMER)
}

/// A running chunk job of one document.
#[derive(Debug, Clone)]
pub struct ChunkWatch {
    pub document_id: i64,
    pub interval: Duration,
    meter: ProgressMeter,
    handle: PollHandle,
}

impl ChunkWatch {
    /// A job found running when the page was opened.
    pub fn resumed(document_id: i64) -> Self {
        Self {
            document_id,
            interval: CHUNK_POLL_INTERVAL,
            meter: ProgressMeter::default(),
            handle: PollHandle::default(),
        }
    }

    /// A job just accepted by the backend. Its first progress report is
    /// always rendered.
    pub fn submitted(document_id: i64) -> Self {
        Self {
            meter: ProgressMeter::primed(),
            ..Self::resumed(document_id)
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn handle(&self) -> PollHandle {
        self.handle.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkWatchOutcome {
    Completed,
    Failed(Option<String>),
    Cancelled,
}

/// Polls the chunk status every interval, first query right away. Failed
/// queries never stop polling; a timeout only nudges the progress.
pub async fn watch_document_chunk<A, P, S, V>(
    api: &A,
    page: &P,
    sleeper: &S,
    view: &V,
    watch: ChunkWatch,
) -> ChunkWatchOutcome
where
    A: ChunkGoApi,
    P: Page,
    S: Sleeper,
    V: ChunkProgressView,
{
    view.show();
    view.set_busy(true);
    view.set_status(phase_label(0.0));

    let document_id = watch.document_id;
    let mut meter = watch.meter;
    let outcome = Poller::new(ChunkStatusSource::new(api, document_id), sleeper, watch.interval)
        .immediate(true)
        .on_error(ErrorPolicy::Continue)
        .with_handle(watch.handle)
        .run(|event| match event {
            PollEvent::Pending(status) if status.status == JobState::Processing => {
                if let Some(progress) = meter.observe(status.progress.unwrap_or_default()) {
                    view.set_progress(progress);
                    view.set_status(phase_label(progress));
                }
            }
            PollEvent::Pending(_) => {}
            PollEvent::Failed(err) if err.is_timeout() => {
                warn!(document_id, "chunk status check timed out, retrying");
                if meter.nudge() {
                    view.set_status(WAITING_LABEL);
                }
            }
            PollEvent::Failed(err) => {
                warn!(document_id, error = %err, "chunk status check failed, retrying");
            }
        })
        .await;

    match outcome {
        PollOutcome::Finished(status) if status.status == JobState::Completed => {
            view.set_progress(100.0);
            view.mark_done();
            view.set_status("处理完成！");
            page.alert(&chunked_alert()).await;
            page.reload();
            ChunkWatchOutcome::Completed
        }
        PollOutcome::Finished(status) => {
            let message = status.message.filter(|text| !text.trim().is_empty());
            warn!(document_id, message = ?message, "chunk job failed");
            view.mark_failed();
            view.set_status(&format!(
                "处理错误: {}",
                message.as_deref().unwrap_or("未知错误")
            ));
            page.alert(&Alert::new(
                DialogIcon::Error,
                "切块失败",
                message.as_deref().unwrap_or("处理过程中发生错误"),
            ))
            .await;
            view.set_busy(false);
            ChunkWatchOutcome::Failed(message)
        }
        PollOutcome::Cancelled | PollOutcome::Aborted(_) => ChunkWatchOutcome::Cancelled,
    }
}
