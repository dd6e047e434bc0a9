pub mod batch;
pub mod ingest;
pub mod orchestrator;
pub mod status;
pub mod upload;

pub use batch::BatchId;
pub use ingest::{IngestBatchStatus, IngestState};
pub use orchestrator::{OrchestratorProgress, OrchestratorState, OrchestratorStatus};
pub use status::{Stage, StatusLog, StatusLogEntry, StatusResponse, StatusResults};
pub use upload::{
    InitSessionRequest, InitSessionResponse, ProcessRequest, ProcessResponse, ProcessingOptions,
    SdkPhase, SdkProgress, SessionStatus, UploadFilesResponse, UploadProgress, UploadStatus,
};

use serde::{Deserialize, Serialize};

/// 各阶段状态的统一表示
///
/// 同一时刻只有一种形态是权威的；进度换算对其做穷尽匹配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum PhaseStatus {
    /// 上传客户端自身上报的进度
    Sdk(SdkProgress),
    /// 上传会话状态
    Upload(UploadStatus),
    Ingest(IngestBatchStatus),
    Orchestrator(OrchestratorStatus),
    /// 统一状态接口
    Unified(StatusResponse),
}

impl PhaseStatus {
    /// 阶段名称（用于日志与监控记录）
    pub fn kind(&self) -> &'static str {
        match self {
            PhaseStatus::Sdk(_) => "sdk",
            PhaseStatus::Upload(_) => "upload",
            PhaseStatus::Ingest(_) => "ingest",
            PhaseStatus::Orchestrator(_) => "orchestrator",
            PhaseStatus::Unified(_) => "unified",
        }
    }

    /// 上游原始状态字符串
    pub fn state_label(&self) -> String {
        match self {
            PhaseStatus::Sdk(p) => p.phase.as_str().to_string(),
            PhaseStatus::Upload(s) => s.status.as_str().to_string(),
            PhaseStatus::Ingest(s) => s.status.as_str().to_string(),
            PhaseStatus::Orchestrator(s) => s.status.as_str().to_string(),
            PhaseStatus::Unified(s) => s.stage.as_str().to_string(),
        }
    }
}

/// 统一进度（0-100，整个工作流内单调不减）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedProgress {
    pub percentage: f64,
    pub phase: String,
    pub description: String,
}
