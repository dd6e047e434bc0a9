//! 上传会话 API 的数据结构
//!
//! 字段命名与上游 JSON 保持一致（camelCase）

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 上传会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Initialized,
    Receiving,
    Ready,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Initialized => "initialized",
            SessionStatus::Receiving => "receiving",
            SessionStatus::Ready => "ready",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

/// 上传服务端的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingPhase {
    Scanning,
    Preprocessing,
    Uploading,
    Finalizing,
}

/// 上传会话进度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadProgress {
    pub files_total: u64,
    pub files_processed: u64,
    pub files_uploaded: u64,
    pub files_failed: u64,
    pub bytes_total: u64,
    pub bytes_processed: u64,
    pub bytes_uploaded: u64,
    pub percent_complete: f64,
    pub current_file: Option<String>,
}

/// `GET /api/upload/{session}/status` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    pub status: SessionStatus,
    #[serde(default)]
    pub phase: Option<ProcessingPhase>,
    #[serde(default)]
    pub progress: Option<UploadProgress>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// 上传客户端自身的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkPhase {
    Scanning,
    Uploading,
    Finalizing,
    Complete,
}

impl SdkPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdkPhase::Scanning => "scanning",
            SdkPhase::Uploading => "uploading",
            SdkPhase::Finalizing => "finalizing",
            SdkPhase::Complete => "complete",
        }
    }
}

/// 上传客户端上报的进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkProgress {
    pub phase: SdkPhase,
    pub files_total: u64,
    pub files_uploaded: u64,
    pub bytes_total: u64,
    pub bytes_uploaded: u64,
    #[serde(default)]
    pub current_file: Option<String>,
    pub percent_complete: f64,
}

/// 处理选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    pub ocr: bool,
    pub describe: bool,
    pub pinax: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            ocr: true,
            describe: true,
            pinax: true,
        }
    }
}

/// `POST /api/upload/init` 的请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitSessionRequest {
    pub uploader: String,
    pub root_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_pi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing: Option<ProcessingOptions>,
}

/// `POST /api/upload/init` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitSessionResponse {
    pub session_id: String,
    pub upload_url: String,
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// 文件上传的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFilesResponse {
    pub session_id: String,
    pub files_received: u64,
    pub total_size: u64,
    pub status: String,
}

/// `POST /api/upload/{session}/process` 的请求体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

/// `POST /api/upload/{session}/process` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub session_id: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}
