//! Orchestrator 批次状态

use serde::{Deserialize, Serialize};

/// Orchestrator 状态值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    Ingested,
    OcrInProgress,
    PinaxExtraction,
    Description,
    Done,
    Error,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Ingested => "INGESTED",
            OrchestratorState::OcrInProgress => "OCR_IN_PROGRESS",
            OrchestratorState::PinaxExtraction => "PINAX_EXTRACTION",
            OrchestratorState::Description => "DESCRIPTION",
            OrchestratorState::Done => "DONE",
            OrchestratorState::Error => "ERROR",
        }
    }
}

/// 目录级别的处理进度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorProgress {
    pub directories_total: u64,
    pub directories_snapshot_published: u64,
    pub directories_ocr_complete: u64,
    pub directories_pinax_complete: u64,
    pub directories_description_complete: u64,
}

/// `GET /api/orchestrator/status/{id}` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub status: OrchestratorState,
    #[serde(default)]
    pub progress: OrchestratorProgress,
    #[serde(default)]
    pub root_pi: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl OrchestratorStatus {
    /// 非空的 root_pi
    pub fn root_pi(&self) -> Option<&str> {
        self.root_pi.as_deref().filter(|pi| !pi.trim().is_empty())
    }
}
