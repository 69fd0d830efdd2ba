use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::api::ChunkGoApi;
use crate::error::ClientError;
use crate::models::{ChunkStatus, JobState, TaskStatus};

pub const TASK_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const CHUNK_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Timer used between polls; each runtime supplies its own.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        (**self).sleep(duration)
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[cfg(feature = "cli")]
impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

/// Anything carrying a job state.
pub trait JobStatus {
    fn state(&self) -> JobState;
}

impl JobStatus for TaskStatus {
    fn state(&self) -> JobState {
        self.status
    }
}

impl JobStatus for ChunkStatus {
    fn state(&self) -> JobState {
        self.status
    }
}

/// One status query against the backend.
pub trait StatusSource {
    type Status: JobStatus;

    fn fetch(&self) -> impl Future<Output = Result<Self::Status, ClientError>>;
}

/// Status of a folder-level batch task.
pub struct TaskSource<'a, A> {
    api: &'a A,
    task_id: String,
}

impl<'a, A: ChunkGoApi> TaskSource<'a, A> {
    pub fn new(api: &'a A, task_id: impl Into<String>) -> Self {
        Self {
            api,
            task_id: task_id.into(),
        }
    }
}

impl<A: ChunkGoApi> StatusSource for TaskSource<'_, A> {
    type Status = TaskStatus;

    fn fetch(&self) -> impl Future<Output = Result<TaskStatus, ClientError>> {
        self.api.task_status(&self.task_id)
    }
}

/// Chunking status of a single document.
pub struct ChunkStatusSource<'a, A> {
    api: &'a A,
    document_id: i64,
}

impl<'a, A: ChunkGoApi> ChunkStatusSource<'a, A> {
    pub fn new(api: &'a A, document_id: i64) -> Self {
        Self { api, document_id }
    }
}

impl<A: ChunkGoApi> StatusSource for ChunkStatusSource<'_, A> {
    type Status = ChunkStatus;

    fn fetch(&self) -> impl Future<Output = Result<ChunkStatus, ClientError>> {
        self.api.chunk_status(self.document_id)
    }
}

/// What a failed status query does to the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Stop,
    Continue,
}

pub enum PollEvent<'a, S> {
    /// Non-terminal status.
    Pending(&'a S),
    Failed(&'a ClientError),
}

#[derive(Debug, PartialEq)]
pub enum PollOutcome<S> {
    Finished(S),
    Cancelled,
    /// A query failed under [`ErrorPolicy::Stop`].
    Aborted(ClientError),
}

/// Cancels the poller it was taken from. Cloning shares the same poller;
/// handles from different pollers never affect each other.
#[derive(Debug, Clone, Default)]
pub struct PollHandle {
    cancelled: Arc<AtomicBool>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Fixed-interval status poller.
///
/// Queries are serialized: the next one starts only after the previous
/// response was handled and the interval elapsed, so a slow backend never
/// sees overlapping requests from the same poller.
pub struct Poller<Src, Sl> {
    source: Src,
    sleeper: Sl,
    interval: Duration,
    policy: ErrorPolicy,
    immediate: bool,
    handle: PollHandle,
}

impl<Src: StatusSource, Sl: Sleeper> Poller<Src, Sl> {
    pub fn new(source: Src, sleeper: Sl, interval: Duration) -> Self {
        Self {
            source,
            sleeper,
            interval,
            policy: ErrorPolicy::Stop,
            immediate: false,
            handle: PollHandle::default(),
        }
    }

    pub fn on_error(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Issue the first query right away instead of after one interval.
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    /// Shares an existing handle, e.g. one the caller keeps to stop polling
    /// when the user leaves the view.
    pub fn with_handle(mut self, handle: PollHandle) -> Self {
        self.handle = handle;
        self
    }

    pub fn handle(&self) -> PollHandle {
        self.handle.clone()
    }

    pub async fn run<F>(self, mut observe: F) -> PollOutcome<Src::Status>
    where
        F: FnMut(PollEvent<'_, Src::Status>),
    {
        let mut first = true;
        loop {
            if !(first && self.immediate) {
                self.sleeper.sleep(self.interval).await;
            }
            first = false;

            if self.handle.is_cancelled() {
                debug!("poller cancelled");
                return PollOutcome::Cancelled;
            }

            match self.source.fetch().await {
                Ok(status) if status.state().is_terminal() => {
                    debug!(state = status.state().as_str(), "poller reached terminal state");
                    return PollOutcome::Finished(status);
                }
                Ok(status) => observe(PollEvent::Pending(&status)),
                Err(err) => {
                    observe(PollEvent::Failed(&err));
                    if self.policy == ErrorPolicy::Stop {
                        return PollOutcome::Aborted(err);
                    }
                }
            }
        }
    }
}
