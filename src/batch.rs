//! Folder-level batch jobs: chunking every selected document, or pushing
//! chunked documents into a Dify knowledge base.

use std::time::Duration;

use tracing::{info, warn};

use crate::api::ChunkGoApi;
use crate::error::ClientError;
use crate::models::{
    BatchJobRequest, BatchKind, ChunkBatchRequest, JobState, PushBatchRequest, TaskStatus,
};
use crate::page::{Alert, Confirm, DialogIcon, Page, ToastLevel};
use crate::poller::{PollEvent, PollHandle, PollOutcome, Poller, Sleeper, TASK_POLL_INTERVAL, TaskSource};
use crate::validation::{ChunkForm, ValidationError, validate_dataset};

const TAB_SWITCH_DELAY: Duration = Duration::from_millis(1000);
const RESULT_ALERT_TIMER: Duration = Duration::from_millis(3000);

impl BatchKind {
    /// Confirmation shown when nothing is selected and the job would cover
    /// the whole folder.
    pub fn confirm_all_text(self) -> &'static str {
        match self {
            Self::Chunk => "您没有选择任何文档，将处理文件夹中所有可切块的文档。确定继续吗？",
            Self::Push => "您没有选择任何文档，将处理文件夹中所有已切块的文档。确定继续吗？",
        }
    }

    pub fn started_text(self) -> &'static str {
        match self {
            Self::Chunk => "批量切块任务已启动",
            Self::Push => "批量推送任务已启动",
        }
    }

    pub fn failed_text(self) -> &'static str {
        match self {
            Self::Chunk => "启动批量切块任务失败",
            Self::Push => "启动批量推送任务失败",
        }
    }

    /// Tab listing the jobs of this kind on the folder page.
    pub fn tab_id(self) -> &'static str {
        match self {
            Self::Chunk => "chunk-tasks-tab",
            Self::Push => "dify-tasks-tab",
        }
    }
}

/// Parameters of a batch job as read from the folder page, not yet
/// validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAction {
    Chunk(ChunkForm),
    Push { dataset_id: String },
}

impl BatchAction {
    pub fn kind(&self) -> BatchKind {
        match self {
            Self::Chunk(_) => BatchKind::Chunk,
            Self::Push { .. } => BatchKind::Push,
        }
    }

    pub fn to_request(&self, document_ids: Vec<i64>) -> Result<BatchJobRequest, ValidationError> {
        Ok(match self {
            Self::Chunk(form) => {
                let params = form.validate_batch()?;
                BatchJobRequest::Chunk(ChunkBatchRequest {
                    document_ids,
                    chunk_strategy: params.strategy,
                    chunk_size: params.chunk_size,
                    overlap: params.overlap,
                })
            }
            Self::Push { dataset_id } => BatchJobRequest::Push(PushBatchRequest {
                document_ids,
                dataset_id: validate_dataset(dataset_id)?,
            }),
        })
    }
}

/// Lifecycle of one batch job as seen by its trigger control.
/// `Submitting` only moves on to `Processing` on a `processing`
/// acknowledgement; any other answer drops back to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Submitting,
    Processing { task_id: String },
    Completed,
    Failed,
}

/// The button (or terminal line) that starts a batch job.
pub trait BatchControl {
    fn show_phase(&self, phase: &BatchPhase);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Invalid(ValidationError),
    /// The user declined to run the job over the whole folder.
    Declined,
    Started { task_id: String },
    Refused { message: String },
    Unreachable(ClientError),
}

/// Validates the action, confirms a whole-folder run when nothing is
/// selected and submits the job.
pub async fn trigger_batch<A, P, C>(
    api: &A,
    page: &P,
    control: &C,
    folder_id: i64,
    selected: Vec<i64>,
    action: &BatchAction,
) -> TriggerOutcome
where
    A: ChunkGoApi,
    P: Page,
    C: BatchControl,
{
    let kind = action.kind();
    let request = match action.to_request(selected) {
        Ok(request) => request,
        Err(err) => {
            page.toast(ToastLevel::Warning, &err.to_string());
            return TriggerOutcome::Invalid(err);
        }
    };

    if request.document_ids().is_empty() {
        let confirm = Confirm::question("未选择文档", kind.confirm_all_text());
        if !page.confirm(&confirm).await {
            return TriggerOutcome::Declined;
        }
    }

    control.show_phase(&BatchPhase::Submitting);
    info!(
        folder_id,
        kind = kind.as_str(),
        documents = request.document_ids().len(),
        "submitting batch job"
    );

    match api.submit_batch(folder_id, &request).await {
        Ok(response) if response.is_processing() => {
            // A missing id still means the job started; the page reload in
            // `watch_batch_job` picks it up from the task list.
            let task_id = response.task_id.unwrap_or_default();
            page.toast(ToastLevel::Success, kind.started_text());
            control.show_phase(&BatchPhase::Processing {
                task_id: task_id.clone(),
            });
            TriggerOutcome::Started { task_id }
        }
        Ok(response) => {
            let message = response.message().unwrap_or(kind.failed_text()).to_string();
            warn!(folder_id, %message, "batch job refused");
            control.show_phase(&BatchPhase::Idle);
            page.toast(ToastLevel::Error, &message);
            TriggerOutcome::Refused { message }
        }
        Err(err) => {
            warn!(folder_id, error = %err, "batch job submission failed");
            control.show_phase(&BatchPhase::Idle);
            page.toast(ToastLevel::Error, &format!("{}: {err}", kind.failed_text()));
            TriggerOutcome::Unreachable(err)
        }
    }
}

/// A started batch job to follow until it finishes.
#[derive(Debug, Clone)]
pub struct JobWatch {
    pub kind: BatchKind,
    pub task_id: String,
    pub interval: Duration,
    handle: PollHandle,
}

impl JobWatch {
    pub fn new(kind: BatchKind, task_id: impl Into<String>) -> Self {
        Self {
            kind,
            task_id: task_id.into(),
            interval: TASK_POLL_INTERVAL,
            handle: PollHandle::default(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Cancels the poller started for this job.
    pub fn handle(&self) -> PollHandle {
        self.handle.clone()
    }
}

#[derive(Debug, PartialEq)]
pub enum WatchOutcome {
    /// The page did not list the task yet and was reloaded instead.
    Reloaded,
    Finished(TaskStatus),
    Cancelled,
    Aborted(ClientError),
}

/// Switches to the job's tab a second after submission, then polls the task
/// until it finishes. A page that does not list the task yet is reloaded
/// right away.
pub async fn watch_batch_job<A, P, S, C>(
    api: &A,
    page: &P,
    sleeper: &S,
    control: &C,
    watch: JobWatch,
) -> WatchOutcome
where
    A: ChunkGoApi,
    P: Page,
    S: Sleeper,
    C: BatchControl,
{
    sleeper.sleep(TAB_SWITCH_DELAY).await;
    page.activate_tab(watch.kind.tab_id());

    if !page.has_task_row(&watch.task_id) {
        page.reload();
        return WatchOutcome::Reloaded;
    }

    poll_batch_task(api, page, sleeper, control, watch).await
}

/// Polls a batch task at the watch interval. A terminal status is announced
/// with a timed alert and the page reloads; a failed query ends polling.
pub async fn poll_batch_task<A, P, S, C>(
    api: &A,
    page: &P,
    sleeper: &S,
    control: &C,
    watch: JobWatch,
) -> WatchOutcome
where
    A: ChunkGoApi,
    P: Page,
    S: Sleeper,
    C: BatchControl,
{
    let task_id = watch.task_id.clone();
    let outcome = Poller::new(TaskSource::new(api, watch.task_id), sleeper, watch.interval)
        .with_handle(watch.handle)
        .run(|event| {
            if let PollEvent::Pending(status) = event {
                info!(
                    task_id = %task_id,
                    progress = status.progress.unwrap_or_default(),
                    done = status.success_count + status.error_count,
                    total = status.total_count,
                    "task running"
                );
            }
        })
        .await;

    match outcome {
        PollOutcome::Finished(status) => {
            let completed = status.status == JobState::Completed;
            control.show_phase(if completed {
                &BatchPhase::Completed
            } else {
                &BatchPhase::Failed
            });
            let alert = Alert::new(
                if completed {
                    DialogIcon::Success
                } else {
                    DialogIcon::Error
                },
                format!(
                    "任务{}：{}",
                    if completed { "已完成" } else { "失败" },
                    status.name
                ),
                format!("成功: {}，失败: {}", status.success_count, status.error_count),
            )
            .timed(RESULT_ALERT_TIMER);
            page.alert(&alert).await;
            page.reload();
            WatchOutcome::Finished(status)
        }
        PollOutcome::Cancelled => WatchOutcome::Cancelled,
        PollOutcome::Aborted(err) => {
            warn!(task_id = %task_id, error = %err, "polling task status failed");
            WatchOutcome::Aborted(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchSubmitResponse;
    use crate::testing::{
        ApiCall, FakeApi, FakeControl, FakePage, InstantSleeper, PageEvent, task_status,
    };

    fn chunk(size: &str, overlap: &str) -> BatchAction {
        BatchAction::Chunk(ChunkForm::new("word", size, overlap))
    }

    fn processing(task_id: &str) -> BatchSubmitResponse {
        BatchSubmitResponse {
            status: "processing".into(),
            task_id: Some(task_id.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn invalid_parameters_send_no_request() {
        let api = FakeApi::default();
        let page = FakePage::default();
        let control = FakeControl::default();

        let outcome = trigger_batch(&api, &page, &control, 1, vec![1], &chunk("30", "10")).await;
        assert_eq!(outcome, TriggerOutcome::Invalid(ValidationError::ChunkSizeOutOfRange));

        let outcome = trigger_batch(&api, &page, &control, 1, vec![1], &chunk("500", "250")).await;
        assert_eq!(outcome, TriggerOutcome::Invalid(ValidationError::OverlapOutOfRange));

        let push = BatchAction::Push {
            dataset_id: String::new(),
        };
        let outcome = trigger_batch(&api, &page, &control, 1, vec![1], &push).await;
        assert_eq!(outcome, TriggerOutcome::Invalid(ValidationError::MissingDataset));

        assert!(api.calls().is_empty());
        assert!(control.phases().is_empty());
        assert_eq!(
            page.events(),
            vec![
                PageEvent::Toast(ToastLevel::Warning, "请输入有效的切块大小(50-2000)".into()),
                PageEvent::Toast(ToastLevel::Warning, "请输入有效的重叠度(0-200)".into()),
                PageEvent::Toast(ToastLevel::Warning, "请选择知识库".into()),
            ]
        );
    }

    #[tokio::test]
    async fn empty_selection_is_sent_only_after_confirmation() {
        let api = FakeApi::default().submit_reply(Ok(processing("t-1")));
        let page = FakePage::default();
        let control = FakeControl::default();

        let outcome = trigger_batch(&api, &page, &control, 9, vec![], &chunk("500", "50")).await;

        assert_eq!(
            outcome,
            TriggerOutcome::Started {
                task_id: "t-1".into()
            }
        );
        assert_eq!(
            api.calls(),
            vec![ApiCall::SubmitBatch(
                9,
                BatchJobRequest::Chunk(ChunkBatchRequest {
                    document_ids: vec![],
                    chunk_strategy: "word".into(),
                    chunk_size: 500,
                    overlap: 50,
                })
            )]
        );
        assert_eq!(
            page.events(),
            vec![
                PageEvent::Confirm {
                    title: "未选择文档".into(),
                    text: BatchKind::Chunk.confirm_all_text().into(),
                },
                PageEvent::Toast(ToastLevel::Success, "批量切块任务已启动".into()),
            ]
        );
        assert_eq!(
            control.phases(),
            vec![
                BatchPhase::Submitting,
                BatchPhase::Processing {
                    task_id: "t-1".into()
                }
            ]
        );
    }

    #[tokio::test]
    async fn declined_confirmation_sends_nothing() {
        let api = FakeApi::default();
        let page = FakePage::declining();
        let control = FakeControl::default();
        let push = BatchAction::Push {
            dataset_id: "kb-1".into(),
        };

        let outcome = trigger_batch(&api, &page, &control, 9, vec![], &push).await;

        assert_eq!(outcome, TriggerOutcome::Declined);
        assert!(api.calls().is_empty());
        assert!(control.phases().is_empty());
    }

    #[tokio::test]
    async fn refusal_and_transport_errors_restore_the_control() {
        let api = FakeApi::default()
            .submit_reply(Ok(BatchSubmitResponse {
                status: "error".into(),
                message: Some("文件夹中没有可推送的文档".into()),
                ..Default::default()
            }))
            .submit_reply(Ok(BatchSubmitResponse::default()))
            .submit_reply(Err(ClientError::Transport("connection refused".into())));
        let page = FakePage::default();
        let control = FakeControl::default();
        let push = BatchAction::Push {
            dataset_id: "kb-1".into(),
        };

        let first = trigger_batch(&api, &page, &control, 3, vec![4], &push).await;
        let second = trigger_batch(&api, &page, &control, 3, vec![4], &push).await;
        let third = trigger_batch(&api, &page, &control, 3, vec![4], &push).await;

        assert_eq!(
            first,
            TriggerOutcome::Refused {
                message: "文件夹中没有可推送的文档".into()
            }
        );
        assert_eq!(
            second,
            TriggerOutcome::Refused {
                message: "启动批量推送任务失败".into()
            }
        );
        assert!(matches!(third, TriggerOutcome::Unreachable(_)));
        assert_eq!(
            page.events().last(),
            Some(&PageEvent::Toast(
                ToastLevel::Error,
                "启动批量推送任务失败: network error: connection refused".into()
            ))
        );
        assert_eq!(control.phases().last(), Some(&BatchPhase::Idle));
        assert_eq!(
            control
                .phases()
                .iter()
                .filter(|phase| **phase == BatchPhase::Idle)
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn watch_polls_task_until_terminal_then_alerts_and_reloads() {
        let api = FakeApi::default()
            .task_reply(Ok(task_status(JobState::Processing, "批量切块", 1, 0)))
            .task_reply(Ok(task_status(JobState::Unknown, "批量切块", 2, 0)))
            .task_reply(Ok(task_status(JobState::Completed, "批量切块", 3, 1)));
        let page = FakePage::default();
        let sleeper = InstantSleeper::default();
        let control = FakeControl::default();

        let outcome = watch_batch_job(
            &api,
            &page,
            &sleeper,
            &control,
            JobWatch::new(BatchKind::Chunk, "T"),
        )
        .await;

        assert!(matches!(outcome, WatchOutcome::Finished(ref s) if s.success_count == 3));
        assert_eq!(
            api.calls(),
            vec![ApiCall::TaskStatus("T".into()); 3],
            "no request after the terminal body"
        );
        assert_eq!(
            sleeper.naps(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(2000),
                Duration::from_millis(2000),
            ]
        );
        assert_eq!(
            page.events(),
            vec![
                PageEvent::ActivateTab("chunk-tasks-tab".into()),
                PageEvent::Alert {
                    title: "任务已完成：批量切块".into(),
                    text: "成功: 3，失败: 1".into(),
                    timer: Some(Duration::from_millis(3000)),
                },
                PageEvent::Reload,
            ]
        );
        assert_eq!(control.phases(), vec![BatchPhase::Completed]);
    }

    #[tokio::test]
    async fn watch_reloads_when_task_row_is_missing() {
        let api = FakeApi::default();
        let page = FakePage::default().without_task_rows();
        let sleeper = InstantSleeper::default();

        let outcome = watch_batch_job(
            &api,
            &page,
            &sleeper,
            &FakeControl::default(),
            JobWatch::new(BatchKind::Push, "T"),
        )
        .await;

        assert_eq!(outcome, WatchOutcome::Reloaded);
        assert!(api.calls().is_empty());
        assert_eq!(
            page.events(),
            vec![PageEvent::ActivateTab("dify-tasks-tab".into()), PageEvent::Reload]
        );
    }

    #[tokio::test]
    async fn failed_status_query_stops_polling() {
        let api = FakeApi::default()
            .task_reply(Err(ClientError::Transport("reset".into())))
            .task_reply(Ok(task_status(JobState::Completed, "x", 1, 0)));
        let page = FakePage::default();

        let outcome = poll_batch_task(
            &api,
            &page,
            &InstantSleeper::default(),
            &FakeControl::default(),
            JobWatch::new(BatchKind::Chunk, "T"),
        )
        .await;

        assert!(matches!(outcome, WatchOutcome::Aborted(_)));
        assert_eq!(api.calls().len(), 1);
        assert!(page.events().is_empty());
    }

    #[tokio::test]
    async fn cancelled_watch_issues_no_request() {
        let api = FakeApi::default();
        let watch = JobWatch::new(BatchKind::Chunk, "T");
        watch.handle().cancel();

        let outcome = poll_batch_task(
            &api,
            &FakePage::default(),
            &InstantSleeper::default(),
            &FakeControl::default(),
            watch,
        )
        .await;

        assert_eq!(outcome, WatchOutcome::Cancelled);
        assert!(api.calls().is_empty());
    }
}
