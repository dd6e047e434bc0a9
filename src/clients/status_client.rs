//! 统一状态接口客户端
//!
//! 取代 ingest / orchestrator 两个客户端的单一数据源：`/api/status/{id}`，
//! 同时负责下载批次日志 `/api/logs/{id}`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::clients::PhaseClient;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{fetch_json, StatusTransport};
use crate::models::{BatchId, PhaseStatus, StatusLog, StatusResponse};
use crate::services::poller::{fetch_with_retry, PollOutcome, RetryPolicy};

/// 统一状态客户端
///
/// 网络错误、5xx、429 按指数退避重试；404 不重试，由调用方判定为无效批次
pub struct StatusClient {
    transport: Arc<dyn StatusTransport>,
    batch_id: BatchId,
    retry: RetryPolicy,
}

impl StatusClient {
    pub fn new(transport: Arc<dyn StatusTransport>, batch_id: BatchId, config: &Config) -> Self {
        Self {
            transport,
            batch_id,
            retry: RetryPolicy::transient(config),
        }
    }

    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    /// 获取批次日志
    pub async fn get_logs(&self) -> AppResult<StatusLog> {
        let path = format!("/api/logs/{}", self.batch_id);
        fetch_json(self.transport.as_ref(), &path).await
    }

    /// 下载批次日志到 `dir/batch-<id>-logs.json`
    ///
    /// # 参数
    /// - `dir`: 输出目录（不存在时创建）
    ///
    /// # 返回
    /// 写入的文件路径
    pub async fn download_logs(&self, dir: &Path) -> AppResult<PathBuf> {
        let logs = self.get_logs().await?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;

        let path = dir.join(format!("batch-{}-logs.json", self.batch_id));
        let content = serde_json::to_string_pretty(&logs)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        info!(
            "[批次 {}] 📥 已下载 {} 条日志: {}",
            self.batch_id.short(),
            logs.log_count,
            path.display()
        );
        Ok(path)
    }
}

#[async_trait]
impl PhaseClient for StatusClient {
    type Status = StatusResponse;

    fn name(&self) -> &'static str {
        "status"
    }

    async fn get_status(&self) -> AppResult<StatusResponse> {
        let path = format!("/api/status/{}", self.batch_id);
        let status: StatusResponse = fetch_with_retry(
            || fetch_json(self.transport.as_ref(), &path),
            &self.retry,
            AppError::is_retryable,
        )
        .await?;

        debug!(
            "[批次 {}] 阶段 {}/{}: {} ({})",
            self.batch_id.short(),
            status.stage.number(),
            crate::models::status::STAGE_COUNT,
            status.stage.display_name(),
            status.phase
        );
        Ok(status)
    }

    /// `completed` 与 `error` 都作为结果返回，由工作流区分
    fn classify(&self, status: &StatusResponse) -> PollOutcome {
        if status.stage.is_terminal() {
            PollOutcome::Done
        } else {
            PollOutcome::Continue
        }
    }

    fn is_ready(&self, status: &StatusResponse) -> bool {
        status.stage.is_terminal()
    }

    fn to_phase_status(&self, status: &StatusResponse) -> PhaseStatus {
        PhaseStatus::Unified(status.clone())
    }
}
