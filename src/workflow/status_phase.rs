//! 统一状态监控
//!
//! 只轮询 `/api/status/{id}`，直到 `completed` 或 `error`。
//! 两种终态都作为结果返回，由工作流决定成功或失败

use std::time::Duration;
use tracing::info;

use crate::clients::{PhaseClient, StatusClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::StatusResponse;
use crate::workflow::batch_ctx::BatchCtx;
use crate::workflow::events::ProgressSink;
use crate::workflow::reporter::ProgressReporter;

/// 统一状态监控阶段
pub struct StatusPhase {
    interval: Duration,
}

impl StatusPhase {
    pub fn new(config: &Config) -> Self {
        Self {
            interval: Duration::from_millis(config.status_poll_interval_ms),
        }
    }

    pub async fn execute<S: ProgressSink>(
        &self,
        client: &StatusClient,
        ctx: &BatchCtx,
        reporter: &mut ProgressReporter<S>,
    ) -> AppResult<StatusResponse> {
        info!("{} 📡 开始监控批次状态", ctx);

        let status = client
            .poll_until_complete(
                &mut |status: &StatusResponse| {
                    reporter.observe(&client.to_phase_status(status));
                },
                self.interval,
            )
            .await?;

        info!("{} 终态: {}", ctx, status.stage.as_str());
        Ok(status)
    }
}
