//! Orchestrator 批次状态客户端

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::clients::{fetch_until_found, PhaseClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::StatusTransport;
use crate::models::{BatchId, OrchestratorState, OrchestratorStatus, PhaseStatus};
use crate::services::poller::{PollOutcome, RetryPolicy};

pub const QUEUE_TIMEOUT_MESSAGE: &str = "Timeout waiting for batch to appear in processing queue";
pub const ORCHESTRATOR_FAILED_MESSAGE: &str = "Orchestrator processing failed";

/// Orchestrator 客户端
///
/// 批次进入处理队列前接口返回 404 / `Batch not found`，按策略 A 退避等待（约 2 分钟）
pub struct OrchestratorClient {
    transport: Arc<dyn StatusTransport>,
    batch_id: BatchId,
    appearance: RetryPolicy,
    transient: RetryPolicy,
}

impl OrchestratorClient {
    pub fn new(transport: Arc<dyn StatusTransport>, batch_id: BatchId, config: &Config) -> Self {
        Self {
            transport,
            batch_id,
            appearance: RetryPolicy::appearance(config, QUEUE_TIMEOUT_MESSAGE),
            transient: RetryPolicy::transient(config),
        }
    }

    fn status_path(&self) -> String {
        format!("/api/orchestrator/status/{}", self.batch_id)
    }
}

#[async_trait]
impl PhaseClient for OrchestratorClient {
    type Status = OrchestratorStatus;

    fn name(&self) -> &'static str {
        "orchestrator"
    }

    async fn get_status(&self) -> AppResult<OrchestratorStatus> {
        let path = self.status_path();
        let status: OrchestratorStatus = fetch_until_found(
            self.transport.as_ref(),
            &path,
            &self.appearance,
            &self.transient,
        )
        .await?;

        debug!(
            "[批次 {}] orchestrator 状态: {}",
            self.batch_id.short(),
            status.status.as_str()
        );
        Ok(status)
    }

    fn classify(&self, status: &OrchestratorStatus) -> PollOutcome {
        match status.status {
            OrchestratorState::Done => PollOutcome::Done,
            OrchestratorState::Error => PollOutcome::Failed(
                status
                    .error
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| ORCHESTRATOR_FAILED_MESSAGE.to_string()),
            ),
            _ => PollOutcome::Continue,
        }
    }

    /// 第一次查到状态即视为就绪
    fn is_ready(&self, _status: &OrchestratorStatus) -> bool {
        true
    }

    fn to_phase_status(&self, status: &OrchestratorStatus) -> PhaseStatus {
        PhaseStatus::Orchestrator(status.clone())
    }
}
