//! Orchestrator 阶段
//!
//! 流程：
//! 1. 提示"等待进入处理队列"，先等待一段宽限期
//! 2. 首次查询（批次尚未出现时按退避策略等待）
//! 3. 固定间隔轮询到 DONE / ERROR
//!
//! 完成时必须拿到 root_pi，否则按失败处理

use std::time::Duration;
use tracing::info;

use crate::clients::{OrchestratorClient, PhaseClient};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::OrchestratorStatus;
use crate::services::PollOutcome;
use crate::workflow::batch_ctx::BatchCtx;
use crate::workflow::events::ProgressSink;
use crate::workflow::reporter::ProgressReporter;

pub const MISSING_ROOT_PI_MESSAGE: &str = "Processing completed but no root_pi received";

/// Orchestrator 阶段
pub struct OrchestratorPhase {
    grace: Duration,
    interval: Duration,
}

impl OrchestratorPhase {
    pub fn new(config: &Config) -> Self {
        Self {
            grace: Duration::from_millis(config.orchestrator_grace_ms),
            interval: Duration::from_millis(config.orchestrator_poll_interval_ms),
        }
    }

    /// 轮询直到处理完成
    ///
    /// # 返回
    /// 归档根 PI
    pub async fn execute<S: ProgressSink>(
        &self,
        client: &OrchestratorClient,
        ctx: &BatchCtx,
        reporter: &mut ProgressReporter<S>,
    ) -> AppResult<String> {
        reporter.queue_waiting(&ctx.batch_id);
        tokio::time::sleep(self.grace).await;

        let initial = client.get_status().await?;
        reporter.observe(&client.to_phase_status(&initial));
        info!("{} ✓ 已进入处理队列: {}", ctx, initial.status.as_str());

        let last = match client.classify(&initial) {
            PollOutcome::Done => initial,
            PollOutcome::Failed(message) => return Err(AppError::processing_failed(message)),
            PollOutcome::Continue => {
                client
                    .poll_until_complete(
                        &mut |status: &OrchestratorStatus| {
                            reporter.observe(&client.to_phase_status(status));
                        },
                        self.interval,
                    )
                    .await?
            }
        };

        match last.root_pi() {
            Some(root_pi) => {
                info!("{} ✅ 处理完成, root_pi: {}", ctx, root_pi);
                Ok(root_pi.to_string())
            }
            None => Err(AppError::missing_result(MISSING_ROOT_PI_MESSAGE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::test_support::{Scripted, ScriptedTransport};
    use crate::models::BatchId;
    use crate::workflow::events::RecordingSink;
    use std::sync::Arc;

    const ORCH: &str = "/api/orchestrator/status/B1";

    fn run_phase(
        responses: Vec<Scripted>,
    ) -> (
        Arc<ScriptedTransport>,
        OrchestratorClient,
        BatchCtx,
        ProgressReporter<RecordingSink>,
    ) {
        let config = Config::default();
        let transport = Arc::new(ScriptedTransport::new().script(ORCH, responses));
        let batch_id = BatchId::parse("B1").unwrap();
        let client = OrchestratorClient::new(transport.clone(), batch_id.clone(), &config);
        let reporter = ProgressReporter::new(RecordingSink::new(), &config);
        (transport, client, BatchCtx::submitted(batch_id), reporter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_with_root_pi() {
        let (transport, client, ctx, mut reporter) = run_phase(vec![
            Scripted::Ok(r#"{"status":"DESCRIPTION","root_pi":"P1","progress":{"directories_total":2,"directories_description_complete":1}}"#.into()),
            Scripted::Ok(r#"{"status":"DONE","root_pi":"P1"}"#.into()),
        ]);

        let root_pi = OrchestratorPhase::new(&Config::default())
            .execute(&client, &ctx, &mut reporter)
            .await
            .unwrap();

        assert_eq!(root_pi, "P1");
        assert_eq!(transport.calls_to(ORCH), 2);
        assert_eq!(reporter.sink().count("queue_waiting"), 1);
        assert_eq!(reporter.sink().count("root_link"), 1);
        assert_eq!(reporter.sink().percentages(), vec![87.5, 100.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_without_root_pi_is_failure() {
        let (_transport, client, ctx, mut reporter) =
            run_phase(vec![Scripted::Ok(r#"{"status":"DONE"}"#.into())]);

        let err = OrchestratorPhase::new(&Config::default())
            .execute(&client, &ctx, &mut reporter)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), MISSING_ROOT_PI_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_error_state_fails_without_polling() {
        let (transport, client, ctx, mut reporter) = run_phase(vec![Scripted::Ok(
            r#"{"status":"ERROR","error":"OCR worker crashed"}"#.into(),
        )]);

        let err = OrchestratorPhase::new(&Config::default())
            .execute(&client, &ctx, &mut reporter)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "OCR worker crashed");
        assert_eq!(transport.calls_to(ORCH), 1);
    }
}
