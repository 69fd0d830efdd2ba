use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Processing state of a document as rendered by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentStatus {
    #[serde(rename = "未切块")]
    Unchunked,
    #[serde(rename = "已切块")]
    Chunked,
    #[serde(rename = "处理中")]
    Processing,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unchunked => "未切块",
            Self::Chunked => "已切块",
            Self::Processing => "处理中",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "未切块" | "unchunked" => Self::Unchunked,
            "已切块" | "chunked" => Self::Chunked,
            "处理中" | "processing" => Self::Processing,
            _ => return Err(()),
        })
    }
}

/// Status of a backend job, batch or single document.
///
/// The batch endpoints report `completed`/`failed`, the single document
/// endpoint `success`/`error`; both spellings land on the same variant.
/// Anything unrecognised (`pending`, `unknown`, ...) is treated as still
/// running.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Processing,
    #[serde(alias = "success")]
    Completed,
    #[serde(alias = "error")]
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Chunk,
    Push,
}

impl BatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::Push => "to_dify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkBatchRequest {
    pub document_ids: Vec<i64>,
    pub chunk_strategy: String,
    pub chunk_size: i64,
    pub overlap: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushBatchRequest {
    pub document_ids: Vec<i64>,
    pub dataset_id: String,
}

/// Body of a folder-level batch job submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BatchJobRequest {
    Chunk(ChunkBatchRequest),
    Push(PushBatchRequest),
}

impl BatchJobRequest {
    pub fn kind(&self) -> BatchKind {
        match self {
            Self::Chunk(_) => BatchKind::Chunk,
            Self::Push(_) => BatchKind::Push,
        }
    }

    pub fn document_ids(&self) -> &[i64] {
        match self {
            Self::Chunk(req) => &req.document_ids,
            Self::Push(req) => &req.document_ids,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchSubmitResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub total_documents: Option<u64>,
}

impl BatchSubmitResponse {
    pub fn is_processing(&self) -> bool {
        self.status == "processing"
    }

    pub fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.detail.as_deref())
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub status: JobState,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChunkStatus {
    pub status: JobState,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChunkSubmitResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ChunkSubmitResponse {
    pub fn is_processing(&self) -> bool {
        self.status == "processing"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionCheck {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KnowledgeBaseList {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: Vec<KnowledgeBase>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StrategyList {
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl DeleteResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedDocument {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FailedUpload {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub reason: String,
}

/// Result of a multi-file folder upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadReport {
    pub success: Vec<UploadedDocument>,
    pub failed: Vec<FailedUpload>,
    #[serde(default)]
    pub total: Option<u64>,
}
