//! 上传工作流 - 编排层
//!
//! ## 职责
//!
//! 把上传、ingest、orchestrator（或统一状态）几个阶段串成一个状态机：
//!
//! ```text
//! Idle ──submit──> Uploading ──> WaitingIngest ──> WaitingOrchestrator ──> Succeeded
//!   │                  │              │                    │
//!   │                  └──────────────┴────────────────────┴──> Failed
//!   └──resume──> Resuming ──> Succeeded / Failed / InvalidBatch
//! ```
//!
//! - 阶段严格串行，任意时刻只有一个阶段在轮询
//! - 拿到批次 ID 后立即写入地址栏，此后可分享、可恢复
//! - 任意阶段失败时，尝试一次 orchestrator 查询以展示部分结果（错误只记录）
//! - 每次运行只产生一个终态

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::{IngestClient, OrchestratorClient, StatusClient};
use crate::config::{Config, MonitorMode};
use crate::error::{AppError, AppResult, WorkflowError};
use crate::infrastructure::{fetch_json, StatusTransport, UrlStateManager};
use crate::models::{BatchId, OrchestratorStatus, Stage};
use crate::services::{UploadFile, UploadRequest, Uploader};
use crate::workflow::{
    BatchCtx, IngestPhase, OrchestratorPhase, ProgressReporter, ProgressSink, StatusPhase,
    TerminalState, UploadPhase, MISSING_ROOT_PI_MESSAGE,
};

/// 统一状态接口返回 error 但没有错误信息时的展示文本
pub const PROCESSING_FAILED_MESSAGE: &str = "Processing failed";

/// 工作流状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Uploading,
    WaitingIngest,
    WaitingOrchestrator,
    Resuming,
    Succeeded,
    Failed,
    InvalidBatch,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "Idle",
            WorkflowState::Uploading => "Uploading",
            WorkflowState::WaitingIngest => "WaitingIngest",
            WorkflowState::WaitingOrchestrator => "WaitingOrchestrator",
            WorkflowState::Resuming => "Resuming",
            WorkflowState::Succeeded => "Succeeded",
            WorkflowState::Failed => "Failed",
            WorkflowState::InvalidBatch => "InvalidBatch",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Succeeded | WorkflowState::Failed | WorkflowState::InvalidBatch
        )
    }

    /// 正在上传或轮询
    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal() && *self != WorkflowState::Idle
    }

    /// 合法的状态迁移
    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        use WorkflowState::*;

        matches!(
            (self, next),
            (Idle, Uploading)
                | (Idle, Resuming)
                | (Uploading, WaitingIngest)
                | (Uploading, WaitingOrchestrator)
                | (Uploading, Failed)
                | (WaitingIngest, WaitingOrchestrator)
                | (WaitingIngest, Failed)
                | (WaitingOrchestrator, Succeeded)
                | (WaitingOrchestrator, Failed)
                | (Resuming, Succeeded)
                | (Resuming, Failed)
                | (Resuming, InvalidBatch)
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 地址栏变化后应采取的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationAction {
    /// 工作流进行中：整体重新加载，不做原地切换
    Reload,
    /// 恢复监控该批次
    Resume(String),
    /// 显示上传表单
    ShowForm,
}

/// 根据当前状态决定地址栏变化的处理方式
pub fn navigation_action(state: WorkflowState, batch_id: Option<String>) -> NavigationAction {
    if state.is_in_flight() {
        return NavigationAction::Reload;
    }
    match batch_id {
        Some(id) => NavigationAction::Resume(id),
        None => NavigationAction::ShowForm,
    }
}

/// 上传工作流
///
/// 所有依赖在构造时注入，不读取任何全局状态
pub struct UploadWorkflow<S> {
    config: Config,
    transport: Arc<dyn StatusTransport>,
    uploader: Arc<dyn Uploader>,
    url_state: UrlStateManager,
    reporter: ProgressReporter<S>,
    state: WorkflowState,
}

impl<S: ProgressSink> UploadWorkflow<S> {
    pub fn new(
        config: Config,
        transport: Arc<dyn StatusTransport>,
        uploader: Arc<dyn Uploader>,
        url_state: UrlStateManager,
        sink: S,
    ) -> Self {
        let reporter = ProgressReporter::new(sink, &config);
        Self {
            config,
            transport,
            uploader,
            url_state,
            reporter,
            state: WorkflowState::Idle,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn url_state(&self) -> &UrlStateManager {
        &self.url_state
    }

    pub fn url_state_mut(&mut self) -> &mut UrlStateManager {
        &mut self.url_state
    }

    pub fn sink(&self) -> &S {
        self.reporter.sink()
    }

    pub fn into_sink(self) -> S {
        self.reporter.into_sink()
    }

    fn transition(&mut self, next: WorkflowState) -> AppResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::Workflow(WorkflowError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            }));
        }
        debug!("工作流状态: {} → {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// 提交新的上传并监控到终态
    ///
    /// # 参数
    /// - `files`: 待上传文件
    /// - `request`: 上传者、根路径等
    ///
    /// # 返回
    /// 终态；只有在非 Idle 状态下调用时才返回错误
    pub async fn submit(
        &mut self,
        files: Vec<UploadFile>,
        request: UploadRequest,
    ) -> AppResult<TerminalState> {
        self.transition(WorkflowState::Uploading)?;
        self.reporter.reset();

        let uploader = self.uploader.clone();
        let receipt = match UploadPhase
            .execute(uploader.as_ref(), files, &request, &mut self.reporter)
            .await
        {
            Ok(receipt) => receipt,
            // 还没有批次 ID，无从恢复
            Err(e) => return self.fail(None, e.to_string(), None),
        };

        let ctx = BatchCtx::submitted(receipt.batch_id);
        self.url_state.set_batch_id(ctx.batch_id.as_str());
        info!("{} 🔗 已写入地址栏: {}", ctx, self.url_state.current_url());

        match self.config.monitor_mode {
            MonitorMode::Phased => self.monitor_phased(&ctx).await,
            MonitorMode::Unified => {
                self.transition(WorkflowState::WaitingOrchestrator)?;
                self.monitor_unified(&ctx).await
            }
        }
    }

    /// 从批次 ID 恢复监控（不重新上传）
    pub async fn resume(&mut self, batch_id: &str) -> AppResult<TerminalState> {
        self.transition(WorkflowState::Resuming)?;
        self.reporter.reset();

        let batch_id = match BatchId::parse(batch_id) {
            Ok(id) => id,
            Err(e) => {
                warn!("⚠️ {}", e);
                return self.invalid_batch(batch_id);
            }
        };

        let ctx = BatchCtx::resumed(batch_id);
        if self.url_state.get_batch_id().as_deref() != Some(ctx.batch_id.as_str()) {
            self.url_state.set_batch_id(ctx.batch_id.as_str());
        }
        self.reporter.resuming(&ctx.batch_id);

        self.monitor_unified(&ctx).await
    }

    /// 冷启动：地址栏中有批次 ID 时恢复，否则返回 None（显示表单）
    pub async fn resume_from_url(&mut self) -> AppResult<Option<TerminalState>> {
        match self.url_state.get_batch_id() {
            Some(batch_id) => self.resume(&batch_id).await.map(Some),
            None => Ok(None),
        }
    }

    /// 地址栏变化（前进/后退）时的处理方式
    pub fn handle_hash_change(&self, batch_id: Option<String>) -> NavigationAction {
        navigation_action(self.state, batch_id)
    }

    /// "开始新的上传"：清除地址栏状态并回到 Idle
    pub fn start_new_upload(&mut self) {
        self.url_state.clear_batch_id();
        self.reporter.reset();
        self.state = WorkflowState::Idle;
        info!("🆕 已重置，等待新的上传");
    }

    // ========== 监控 ==========

    /// ingest → orchestrator 两阶段监控
    async fn monitor_phased(&mut self, ctx: &BatchCtx) -> AppResult<TerminalState> {
        self.transition(WorkflowState::WaitingIngest)?;

        let ingest = IngestClient::new(self.transport.clone(), ctx.batch_id.clone(), &self.config);
        if let Err(e) = IngestPhase::new(&self.config)
            .execute(&ingest, ctx, &mut self.reporter)
            .await
        {
            return self.fail_with_recovery(ctx, e.to_string()).await;
        }

        self.transition(WorkflowState::WaitingOrchestrator)?;

        let orchestrator =
            OrchestratorClient::new(self.transport.clone(), ctx.batch_id.clone(), &self.config);
        match OrchestratorPhase::new(&self.config)
            .execute(&orchestrator, ctx, &mut self.reporter)
            .await
        {
            Ok(root_pi) => self.succeed(ctx, root_pi),
            Err(e) => self.fail_with_recovery(ctx, e.to_string()).await,
        }
    }

    /// 统一状态接口监控（恢复与 Unified 模式共用）
    async fn monitor_unified(&mut self, ctx: &BatchCtx) -> AppResult<TerminalState> {
        let client = StatusClient::new(self.transport.clone(), ctx.batch_id.clone(), &self.config);

        let status = match StatusPhase::new(&self.config)
            .execute(&client, ctx, &mut self.reporter)
            .await
        {
            Ok(status) => status,
            Err(e) if ctx.is_resumed() && e.is_not_found() => {
                warn!("{} ⚠️ 批次不存在: {}", ctx, e);
                return self.invalid_batch(ctx.batch_id.as_str());
            }
            Err(e) => return self.fail_with_recovery(ctx, e.to_string()).await,
        };

        match (status.stage, status.root_pi()) {
            (Stage::Completed, Some(root_pi)) => {
                let root_pi = root_pi.to_string();
                self.succeed(ctx, root_pi)
            }
            (Stage::Completed, None) => {
                self.fail_with_recovery(ctx, MISSING_ROOT_PI_MESSAGE.to_string())
                    .await
            }
            (_, partial) => {
                let message = status
                    .error
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| PROCESSING_FAILED_MESSAGE.to_string());
                match partial {
                    Some(root_pi) => {
                        let root_pi = root_pi.to_string();
                        self.fail(Some(ctx), message, Some(root_pi))
                    }
                    None => self.fail_with_recovery(ctx, message).await,
                }
            }
        }
    }

    // ========== 终态 ==========

    fn succeed(&mut self, ctx: &BatchCtx, root_pi: String) -> AppResult<TerminalState> {
        self.transition(WorkflowState::Succeeded)?;
        self.reporter.show_root_link(&root_pi);

        let link = self.reporter.link_for(&root_pi);
        Ok(self.reporter.finish(TerminalState::Succeeded {
            batch_id: ctx.batch_id.clone(),
            root_pi,
            link,
        }))
    }

    fn fail(
        &mut self,
        ctx: Option<&BatchCtx>,
        message: String,
        root_pi: Option<String>,
    ) -> AppResult<TerminalState> {
        self.transition(WorkflowState::Failed)?;

        let partial_link = root_pi.map(|pi| self.reporter.link_for(&pi));
        Ok(self.reporter.finish(TerminalState::Failed {
            batch_id: ctx.map(|c| c.batch_id.clone()),
            message,
            partial_link,
        }))
    }

    /// 失败前尝试找回已生成的 root_pi
    async fn fail_with_recovery(
        &mut self,
        ctx: &BatchCtx,
        message: String,
    ) -> AppResult<TerminalState> {
        let root_pi = match self.reporter.root_pi() {
            Some(pi) => Some(pi.to_string()),
            None => self.recover_root_pi(ctx).await,
        };
        self.fail(Some(ctx), message, root_pi)
    }

    /// 单次查询 orchestrator，错误只记录不传播
    async fn recover_root_pi(&self, ctx: &BatchCtx) -> Option<String> {
        let path = format!("/api/orchestrator/status/{}", ctx.batch_id);
        match fetch_json::<OrchestratorStatus>(self.transport.as_ref(), &path).await {
            Ok(status) => {
                let root_pi = status.root_pi().map(str::to_string);
                if let Some(pi) = &root_pi {
                    info!("{} 🔗 找回部分结果: {}", ctx, pi);
                }
                root_pi
            }
            Err(e) => {
                debug!("{} 未能找回部分结果: {}", ctx, e);
                None
            }
        }
    }

    fn invalid_batch(&mut self, batch_id: &str) -> AppResult<TerminalState> {
        self.transition(WorkflowState::InvalidBatch)?;
        Ok(self.reporter.finish(TerminalState::InvalidBatch {
            batch_id: batch_id.to_string(),
        }))
    }
}
