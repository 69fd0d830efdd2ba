//! In-memory stand-ins for the backend and the page, shared by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use crate::api::ChunkGoApi;
use crate::batch::{BatchControl, BatchPhase};
use crate::delete::DocumentRows;
use crate::dify::ConnectionPanel;
use crate::document::ChunkProgressView;
use crate::error::ClientError;
use crate::models::{
    BatchJobRequest, BatchSubmitResponse, ChunkStatus, ChunkSubmitResponse, ConnectionCheck,
    DeleteResponse, JobState, KnowledgeBase, KnowledgeBaseList, StrategyList, TaskStatus,
};
use crate::page::{Alert, Confirm, Page, ToastLevel};
use crate::poller::Sleeper;
use crate::selection::Checkbox;
use crate::upload::{NamedFile, RawResponse, UploadProgress, UploadTransport, UploadView};
use crate::validation::ChunkParams;

type Replies<T> = RefCell<VecDeque<Result<T, ClientError>>>;

fn next<T>(replies: &Replies<T>) -> Result<T, ClientError> {
    replies
        .borrow_mut()
        .pop_front()
        .unwrap_or_else(|| Err(ClientError::Transport("no scripted reply".into())))
}

pub fn task_status(state: JobState, name: &str, success: u64, error: u64) -> TaskStatus {
    TaskStatus {
        task_id: None,
        name: name.into(),
        status: state,
        success_count: success,
        error_count: error,
        total_count: success + error,
        progress: None,
    }
}

#[derive(Default)]
pub struct InstantSleeper {
    naps: RefCell<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn naps(&self) -> Vec<Duration> {
        self.naps.borrow().clone()
    }
}

impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.naps.borrow_mut().push(duration);
    }
}

pub struct FakeCheckbox {
    value: String,
    checked: Cell<bool>,
    disabled: bool,
}

impl FakeCheckbox {
    pub fn new(value: &str, disabled: bool) -> Self {
        Self {
            value: value.into(),
            checked: Cell::new(false),
            disabled,
        }
    }
}

impl Checkbox for FakeCheckbox {
    fn is_checked(&self) -> bool {
        self.checked.get()
    }

    fn set_checked(&self, checked: bool) {
        self.checked.set(checked);
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn value(&self) -> String {
        self.value.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    SubmitBatch(i64, BatchJobRequest),
    TaskStatus(String),
    TestDify,
    KnowledgeBases,
    Strategies(String),
    SubmitChunk(i64, ChunkParams),
    ChunkStatus(i64),
    Delete(i64),
}

/// Scripted backend. Each operation answers from its own queue; an empty
/// queue answers with a transport error.
#[derive(Default)]
pub struct FakeApi {
    calls: RefCell<Vec<ApiCall>>,
    submit: Replies<BatchSubmitResponse>,
    tasks: Replies<TaskStatus>,
    dify_check: Replies<ConnectionCheck>,
    knowledge_bases: Replies<KnowledgeBaseList>,
    strategies: Replies<StrategyList>,
    chunk_submit: Replies<ChunkSubmitResponse>,
    chunk_status: Replies<ChunkStatus>,
    deletes: RefCell<HashMap<i64, Result<DeleteResponse, ClientError>>>,
}

impl FakeApi {
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.borrow().clone()
    }

    pub fn submit_reply(self, reply: Result<BatchSubmitResponse, ClientError>) -> Self {
        self.submit.borrow_mut().push_back(reply);
        self
    }

    pub fn task_reply(self, reply: Result<TaskStatus, ClientError>) -> Self {
        self.tasks.borrow_mut().push_back(reply);
        self
    }

    pub fn dify_check_reply(self, reply: Result<ConnectionCheck, ClientError>) -> Self {
        self.dify_check.borrow_mut().push_back(reply);
        self
    }

    pub fn knowledge_bases_reply(self, reply: Result<KnowledgeBaseList, ClientError>) -> Self {
        self.knowledge_bases.borrow_mut().push_back(reply);
        self
    }

    pub fn strategies_reply(self, reply: Result<StrategyList, ClientError>) -> Self {
        self.strategies.borrow_mut().push_back(reply);
        self
    }

    pub fn chunk_submit_reply(self, reply: Result<ChunkSubmitResponse, ClientError>) -> Self {
        self.chunk_submit.borrow_mut().push_back(reply);
        self
    }

    pub fn chunk_status_reply(self, reply: Result<ChunkStatus, ClientError>) -> Self {
        self.chunk_status.borrow_mut().push_back(reply);
        self
    }

    pub fn delete_reply(self, id: i64, reply: Result<DeleteResponse, ClientError>) -> Self {
        self.deletes.borrow_mut().insert(id, reply);
        self
    }

    fn record(&self, call: ApiCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl ChunkGoApi for FakeApi {
    async fn submit_batch(
        &self,
        folder_id: i64,
        request: &BatchJobRequest,
    ) -> Result<BatchSubmitResponse, ClientError> {
        self.record(ApiCall::SubmitBatch(folder_id, request.clone()));
        next(&self.submit)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, ClientError> {
        self.record(ApiCall::TaskStatus(task_id.into()));
        next(&self.tasks)
    }

    async fn test_dify_connection(&self) -> Result<ConnectionCheck, ClientError> {
        self.record(ApiCall::TestDify);
        next(&self.dify_check)
    }

    async fn knowledge_bases(&self) -> Result<KnowledgeBaseList, ClientError> {
        self.record(ApiCall::KnowledgeBases);
        next(&self.knowledge_bases)
    }

    async fn strategies_for(&self, file_ext: &str) -> Result<StrategyList, ClientError> {
        self.record(ApiCall::Strategies(file_ext.into()));
        next(&self.strategies)
    }

    async fn submit_document_chunk(
        &self,
        document_id: i64,
        params: &ChunkParams,
    ) -> Result<ChunkSubmitResponse, ClientError> {
        self.record(ApiCall::SubmitChunk(document_id, params.clone()));
        next(&self.chunk_submit)
    }

    async fn chunk_status(&self, document_id: i64) -> Result<ChunkStatus, ClientError> {
        self.record(ApiCall::ChunkStatus(document_id));
        next(&self.chunk_status)
    }

    async fn delete_document(&self, document_id: i64) -> Result<DeleteResponse, ClientError> {
        self.record(ApiCall::Delete(document_id));
        self.deletes
            .borrow_mut()
            .remove(&document_id)
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted reply".into())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Toast(ToastLevel, String),
    Confirm {
        title: String,
        text: String,
    },
    Alert {
        title: String,
        text: String,
        timer: Option<Duration>,
    },
    Reload,
    ActivateTab(String),
}

pub struct FakePage {
    events: RefCell<Vec<PageEvent>>,
    answer: bool,
    task_rows: bool,
    reloads: bool,
}

impl Default for FakePage {
    fn default() -> Self {
        Self {
            events: RefCell::default(),
            answer: true,
            task_rows: true,
            reloads: true,
        }
    }
}

impl FakePage {
    /// A user who cancels every confirmation.
    pub fn declining() -> Self {
        Self {
            answer: false,
            ..Self::default()
        }
    }

    pub fn without_task_rows(self) -> Self {
        Self {
            task_rows: false,
            ..self
        }
    }

    /// A page without anything to reload, like a terminal.
    pub fn static_page(self) -> Self {
        Self {
            reloads: false,
            ..self
        }
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.events.borrow().clone()
    }

    fn push(&self, event: PageEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl Page for FakePage {
    fn toast(&self, level: ToastLevel, message: &str) {
        self.push(PageEvent::Toast(level, message.into()));
    }

    async fn confirm(&self, dialog: &Confirm) -> bool {
        self.push(PageEvent::Confirm {
            title: dialog.title.clone(),
            text: dialog.text.clone(),
        });
        self.answer
    }

    async fn alert(&self, dialog: &Alert) {
        self.push(PageEvent::Alert {
            title: dialog.title.clone(),
            text: dialog.text.clone(),
            timer: dialog.timer,
        });
    }

    fn reload(&self) {
        self.push(PageEvent::Reload);
    }

    fn reloads(&self) -> bool {
        self.reloads
    }

    fn activate_tab(&self, tab_id: &str) {
        self.push(PageEvent::ActivateTab(tab_id.into()));
    }

    fn has_task_row(&self, _task_id: &str) -> bool {
        self.task_rows
    }
}

#[derive(Default)]
pub struct FakeControl {
    phases: RefCell<Vec<BatchPhase>>,
}

impl FakeControl {
    pub fn phases(&self) -> Vec<BatchPhase> {
        self.phases.borrow().clone()
    }
}

impl BatchControl for FakeControl {
    fn show_phase(&self, phase: &BatchPhase) {
        self.phases.borrow_mut().push(phase.clone());
    }
}

/// A file identified by its path below the upload root.
pub struct FakeFile {
    path: String,
}

impl FakeFile {
    pub fn new(path: &str) -> Self {
        Self { path: path.into() }
    }
}

impl NamedFile for FakeFile {
    fn file_name(&self) -> String {
        self.path.rsplit('/').next().unwrap_or_default().to_string()
    }

    fn relative_path(&self) -> String {
        self.path.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentUpload {
    pub url: String,
    pub field: String,
    pub paths: Vec<String>,
}

/// Reports half and then full progress before answering.
pub struct FakeUploadTransport {
    reply: Result<(u16, String), ClientError>,
    requests: RefCell<Vec<SentUpload>>,
}

impl FakeUploadTransport {
    pub fn replying(status: u16, body: &str) -> Self {
        Self {
            reply: Ok((status, body.into())),
            requests: RefCell::default(),
        }
    }

    pub fn failing(err: ClientError) -> Self {
        Self {
            reply: Err(err),
            requests: RefCell::default(),
        }
    }

    pub fn requests(&self) -> Vec<SentUpload> {
        self.requests.borrow().clone()
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "",
    }
}

impl UploadTransport for FakeUploadTransport {
    type File = FakeFile;

    async fn upload<P>(
        &self,
        url: &str,
        field: &str,
        files: Vec<FakeFile>,
        mut on_progress: P,
    ) -> Result<RawResponse, ClientError>
    where
        P: FnMut(UploadProgress) + 'static,
    {
        self.requests.borrow_mut().push(SentUpload {
            url: url.into(),
            field: field.into(),
            paths: files.iter().map(NamedFile::relative_path).collect(),
        });
        let (status, body) = self.reply.clone()?;
        on_progress(UploadProgress { loaded: 1, total: 2 });
        on_progress(UploadProgress { loaded: 2, total: 2 });
        Ok(RawResponse {
            status,
            status_text: reason_phrase(status).into(),
            body,
        })
    }
}

#[derive(Default)]
struct UploadViewState {
    shown: bool,
    failed: bool,
    statuses: Vec<String>,
    progress: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct FakeUploadView {
    state: Rc<RefCell<UploadViewState>>,
}

impl FakeUploadView {
    pub fn statuses(&self) -> Vec<String> {
        self.state.borrow().statuses.clone()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.state.borrow().progress.clone()
    }

    pub fn is_shown(&self) -> bool {
        self.state.borrow().shown
    }

    pub fn is_failed(&self) -> bool {
        self.state.borrow().failed
    }
}

impl UploadView for FakeUploadView {
    fn show(&self) {
        self.state.borrow_mut().shown = true;
    }

    fn set_progress(&self, percent: u8) {
        self.state.borrow_mut().progress.push(percent);
    }

    fn set_status(&self, text: &str) {
        self.state.borrow_mut().statuses.push(text.into());
    }

    fn mark_failed(&self) {
        self.state.borrow_mut().failed = true;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Shown,
    Hidden,
    Busy(bool),
    Status(String),
    Progress(f64),
    Done,
    Failed,
}

#[derive(Default)]
pub struct FakeChunkView {
    events: RefCell<Vec<ViewEvent>>,
}

impl FakeChunkView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.borrow().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Status(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<f64> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Progress(value) => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn is_busy(&self) -> bool {
        self.events
            .borrow()
            .iter()
            .rev()
            .find_map(|event| match event {
                ViewEvent::Busy(busy) => Some(*busy),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn push(&self, event: ViewEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl ChunkProgressView for FakeChunkView {
    fn show(&self) {
        self.push(ViewEvent::Shown);
    }

    fn hide(&self) {
        self.push(ViewEvent::Hidden);
    }

    fn set_busy(&self, busy: bool) {
        self.push(ViewEvent::Busy(busy));
    }

    fn set_status(&self, text: &str) {
        self.push(ViewEvent::Status(text.into()));
    }

    fn set_progress(&self, percent: f64) {
        self.push(ViewEvent::Progress(percent));
    }

    fn mark_done(&self) {
        self.push(ViewEvent::Done);
    }

    fn mark_failed(&self) {
        self.push(ViewEvent::Failed);
    }
}

#[derive(Default)]
pub struct FakeRows {
    ids: RefCell<Vec<i64>>,
}

impl FakeRows {
    pub fn with_ids(ids: &[i64]) -> Self {
        Self {
            ids: RefCell::new(ids.to_vec()),
        }
    }

    pub fn ids(&self) -> Vec<i64> {
        self.ids.borrow().clone()
    }
}

impl DocumentRows for FakeRows {
    fn remove_row(&self, document_id: i64) -> bool {
        let mut ids = self.ids.borrow_mut();
        let before = ids.len();
        ids.retain(|id| *id != document_id);
        ids.len() != before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PanelState {
    #[default]
    Idle,
    Connecting,
    Restored,
    Connected(Vec<KnowledgeBase>),
}

#[derive(Default)]
pub struct FakePanel {
    state: RefCell<PanelState>,
}

impl FakePanel {
    pub fn state(&self) -> PanelState {
        self.state.borrow().clone()
    }
}

impl ConnectionPanel for FakePanel {
    fn set_connecting(&self) {
        *self.state.borrow_mut() = PanelState::Connecting;
    }

    fn restore(&self) {
        *self.state.borrow_mut() = PanelState::Restored;
    }

    fn show_knowledge_bases(&self, bases: &[KnowledgeBase]) {
        *self.state.borrow_mut() = PanelState::Connected(bases.to_vec());
    }
}
