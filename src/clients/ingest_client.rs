//! Ingest 批次状态客户端

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::clients::{fetch_until_found, PhaseClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::StatusTransport;
use crate::models::{BatchId, IngestBatchStatus, IngestState, PhaseStatus};
use crate::services::poller::{PollOutcome, RetryPolicy};

pub const ENQUEUE_TIMEOUT_MESSAGE: &str = "Timeout waiting for batch to be enqueued";
pub const INGEST_FAILED_MESSAGE: &str = "Batch failed during ingest/preprocessing";

/// Ingest 客户端
///
/// 批次刚创建时下游可能还查不到，404 按策略 A 退避等待
pub struct IngestClient {
    transport: Arc<dyn StatusTransport>,
    batch_id: BatchId,
    appearance: RetryPolicy,
    transient: RetryPolicy,
}

impl IngestClient {
    pub fn new(transport: Arc<dyn StatusTransport>, batch_id: BatchId, config: &Config) -> Self {
        Self {
            transport,
            batch_id,
            appearance: RetryPolicy::appearance(config, ENQUEUE_TIMEOUT_MESSAGE),
            transient: RetryPolicy::transient(config),
        }
    }

    fn status_path(&self) -> String {
        format!("/api/ingest/batches/{}/status", self.batch_id)
    }
}

#[async_trait]
impl PhaseClient for IngestClient {
    type Status = IngestBatchStatus;

    fn name(&self) -> &'static str {
        "ingest"
    }

    async fn get_status(&self) -> AppResult<IngestBatchStatus> {
        let path = self.status_path();
        let status: IngestBatchStatus = fetch_until_found(
            self.transport.as_ref(),
            &path,
            &self.appearance,
            &self.transient,
        )
        .await?;

        debug!(
            "[批次 {}] ingest 状态: {} ({}/{} 个文件)",
            self.batch_id.short(),
            status.status.as_str(),
            status.files_uploaded,
            status.file_count
        );
        Ok(status)
    }

    fn classify(&self, status: &IngestBatchStatus) -> PollOutcome {
        match status.status {
            IngestState::Completed => PollOutcome::Done,
            IngestState::Failed => PollOutcome::Failed(INGEST_FAILED_MESSAGE.to_string()),
            _ => PollOutcome::Continue,
        }
    }

    fn is_ready(&self, status: &IngestBatchStatus) -> bool {
        matches!(
            status.status,
            IngestState::Enqueued | IngestState::Processing | IngestState::Completed
        )
    }

    fn to_phase_status(&self, status: &IngestBatchStatus) -> PhaseStatus {
        PhaseStatus::Ingest(status.clone())
    }
}
