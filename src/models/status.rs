//! 统一状态接口（7 阶段）的数据结构

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 统一状态接口的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    QueuePreprocessing,
    Preprocessing,
    QueueOrchestrator,
    Orchestrator,
    Completed,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::QueuePreprocessing => "queue_preprocessing",
            Stage::Preprocessing => "preprocessing",
            Stage::QueueOrchestrator => "queue_orchestrator",
            Stage::Orchestrator => "orchestrator",
            Stage::Completed => "completed",
            Stage::Error => "error",
        }
    }

    /// 展示用名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Ingest => "Upload",
            Stage::QueuePreprocessing => "Queued for Preprocessing",
            Stage::Preprocessing => "Preprocessing",
            Stage::QueueOrchestrator => "Queued for Processing",
            Stage::Orchestrator => "Processing",
            Stage::Completed => "Complete",
            Stage::Error => "Error",
        }
    }

    /// 展示用阶段编号（共 7 个阶段）
    pub fn number(&self) -> u8 {
        match self {
            Stage::Ingest => 1,
            Stage::QueuePreprocessing => 2,
            Stage::Preprocessing => 3,
            Stage::QueueOrchestrator => 4,
            Stage::Orchestrator => 5,
            Stage::Completed | Stage::Error => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Error)
    }
}

/// 阶段总数
pub const STAGE_COUNT: u8 = 7;

/// 处理结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResults {
    #[serde(default)]
    pub root_pi: Option<String>,
}

/// `GET /api/status/{id}` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub batch_id: Option<String>,
    pub stage: Stage,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub results: Option<StatusResults>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl StatusResponse {
    /// 非空的 root_pi
    pub fn root_pi(&self) -> Option<&str> {
        self.results
            .as_ref()
            .and_then(|r| r.root_pi.as_deref())
            .filter(|pi| !pi.trim().is_empty())
    }
}

/// 单条批次日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub timestamp: String,
    pub stage: String,
    pub phase: String,
    #[serde(default)]
    pub worker_response: JsonValue,
    #[serde(default)]
    pub status_changed: bool,
}

/// `GET /api/logs/{id}` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLog {
    pub batch_id: String,
    pub log_count: u64,
    pub logs: Vec<StatusLogEntry>,
    pub source: String,
}
