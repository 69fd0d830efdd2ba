use std::future::Future;

use crate::error::ClientError;
use crate::models::{
    BatchJobRequest, BatchSubmitResponse, ChunkStatus, ChunkSubmitResponse, ConnectionCheck,
    DeleteResponse, KnowledgeBaseList, StrategyList, TaskStatus,
};
use crate::validation::ChunkParams;

pub const DEFAULT_CHUNKGO_ROOT: &str = "/chunkgo";
pub const DEFAULT_CHUNKLAB_ROOT: &str = "/chunklab";

/// URL builder for the two route families the backend mounts: the folder
/// oriented `/chunkgo` routes and the per-document `/chunklab` routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
    chunkgo_root: String,
    chunklab_root: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new("", DEFAULT_CHUNKGO_ROOT, DEFAULT_CHUNKLAB_ROOT)
    }
}

impl Endpoints {
    /// `base` is the scheme and authority (empty for same-origin requests).
    pub fn new(base: &str, chunkgo_root: &str, chunklab_root: &str) -> Self {
        Self {
            base: base.trim().trim_end_matches('/').to_string(),
            chunkgo_root: normalize_root(chunkgo_root),
            chunklab_root: normalize_root(chunklab_root),
        }
    }

    pub fn folder_upload(&self, folder_id: i64) -> String {
        self.chunkgo(&format!("/folders/{folder_id}/upload"))
    }

    pub fn folder_chunk(&self, folder_id: i64) -> String {
        self.chunkgo(&format!("/folders/{folder_id}/chunk"))
    }

    pub fn folder_to_dify(&self, folder_id: i64) -> String {
        self.chunkgo(&format!("/folders/{folder_id}/to-dify"))
    }

    pub fn batch_submit(&self, folder_id: i64, request: &BatchJobRequest) -> String {
        match request {
            BatchJobRequest::Chunk(_) => self.folder_chunk(folder_id),
            BatchJobRequest::Push(_) => self.folder_to_dify(folder_id),
        }
    }

    pub fn task(&self, task_id: &str) -> String {
        self.chunkgo(&format!("/tasks/{}", task_id.trim()))
    }

    pub fn dify_test_connection(&self) -> String {
        self.chunkgo("/dify/test-connection")
    }

    pub fn dify_knowledge_bases(&self) -> String {
        self.chunkgo("/dify/knowledge-bases")
    }

    pub fn single_upload(&self) -> String {
        self.chunklab("/upload")
    }

    /// Takes the file extension as a `file_ext` query parameter.
    pub fn strategies_for_filetype(&self) -> String {
        self.chunklab("/strategies/for-filetype")
    }

    pub fn document(&self, document_id: i64) -> String {
        self.chunklab(&format!("/documents/{document_id}"))
    }

    pub fn document_chunk(&self, document_id: i64) -> String {
        self.chunklab(&format!("/documents/{document_id}/chunk"))
    }

    pub fn document_chunk_status(&self, document_id: i64) -> String {
        self.chunklab(&format!("/documents/{document_id}/chunk/status"))
    }

    fn chunkgo(&self, path: &str) -> String {
        format!("{}{}{}", self.base, self.chunkgo_root, path)
    }

    fn chunklab(&self, path: &str) -> String {
        format!("{}{}{}", self.base, self.chunklab_root, path)
    }
}

fn normalize_root(root: &str) -> String {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Backend operations used by the client flows.
///
/// Implementations decide how a non-2xx answer is surfaced: routes whose
/// body is meaningful on error (batch submit, task status, delete, Dify)
/// decode it regardless of status, the others return
/// [`ClientError::Status`].
pub trait ChunkGoApi {
    fn submit_batch(
        &self,
        folder_id: i64,
        request: &BatchJobRequest,
    ) -> impl Future<Output = Result<BatchSubmitResponse, ClientError>>;

    fn task_status(&self, task_id: &str) -> impl Future<Output = Result<TaskStatus, ClientError>>;

    fn test_dify_connection(&self) -> impl Future<Output = Result<ConnectionCheck, ClientError>>;

    fn knowledge_bases(&self) -> impl Future<Output = Result<KnowledgeBaseList, ClientError>>;

    fn strategies_for(
        &self,
        file_ext: &str,
    ) -> impl Future<Output = Result<StrategyList, ClientError>>;

    fn submit_document_chunk(
        &self,
        document_id: i64,
        params: &ChunkParams,
    ) -> impl Future<Output = Result<ChunkSubmitResponse, ClientError>>;

    fn chunk_status(
        &self,
        document_id: i64,
    ) -> impl Future<Output = Result<ChunkStatus, ClientError>>;

    fn delete_document(
        &self,
        document_id: i64,
    ) -> impl Future<Output = Result<DeleteResponse, ClientError>>;
}
