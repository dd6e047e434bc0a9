//! Ingest 阶段
//!
//! 等待批次完成预处理并进入处理队列（`enqueued` / `processing` / `completed`）

use std::time::Duration;
use tracing::info;

use crate::clients::{IngestClient, PhaseClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::IngestBatchStatus;
use crate::workflow::batch_ctx::BatchCtx;
use crate::workflow::events::ProgressSink;
use crate::workflow::reporter::ProgressReporter;

/// Ingest 阶段
pub struct IngestPhase {
    interval: Duration,
}

impl IngestPhase {
    pub fn new(config: &Config) -> Self {
        Self {
            interval: Duration::from_millis(config.ingest_poll_interval_ms),
        }
    }

    /// 轮询直到批次可以进入 orchestrator
    pub async fn execute<S: ProgressSink>(
        &self,
        client: &IngestClient,
        ctx: &BatchCtx,
        reporter: &mut ProgressReporter<S>,
    ) -> AppResult<IngestBatchStatus> {
        info!("{} 🔍 等待预处理完成...", ctx);

        let status = client
            .wait_until_ready(
                &mut |status: &IngestBatchStatus| {
                    reporter.observe(&client.to_phase_status(status));
                },
                self.interval,
            )
            .await?;

        info!("{} ✓ 已进入处理队列 ({})", ctx, status.status.as_str());
        Ok(status)
    }
}
