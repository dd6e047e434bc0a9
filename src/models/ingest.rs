//! Ingest 批次状态

use serde::{Deserialize, Serialize};

/// Ingest 批次状态值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestState {
    Uploading,
    Preprocessing,
    Enqueued,
    Processing,
    Completed,
    Failed,
}

impl IngestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestState::Uploading => "uploading",
            IngestState::Preprocessing => "preprocessing",
            IngestState::Enqueued => "enqueued",
            IngestState::Processing => "processing",
            IngestState::Completed => "completed",
            IngestState::Failed => "failed",
        }
    }
}

/// `GET /api/ingest/batches/{id}/status` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestBatchStatus {
    pub status: IngestState,
    #[serde(default)]
    pub files_uploaded: u64,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub total_bytes_uploaded: u64,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub root_path: Option<String>,
    #[serde(default)]
    pub parent_pi: Option<String>,
    #[serde(default)]
    pub enqueued_at: Option<String>,
}
