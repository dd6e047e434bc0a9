//! 阶段客户端的统一约定
//!
//! 每个客户端包装一个上游状态接口，对外只有两个操作：
//! 单次查询 `get_status` 与轮询到终态 `poll_until_complete`

use async_trait::async_trait;
use std::time::Duration;

use crate::error::AppResult;
use crate::models::PhaseStatus;
use crate::services::poller::{poll_until, PollOutcome};

/// 阶段客户端
#[async_trait]
pub trait PhaseClient: Send + Sync {
    /// 该阶段的状态结构
    type Status: Send + Sync + 'static;

    /// 客户端名称（用于日志）
    fn name(&self) -> &'static str;

    /// 单次查询；不可重试的错误直接返回
    async fn get_status(&self) -> AppResult<Self::Status>;

    /// 终态判断
    fn classify(&self, status: &Self::Status) -> PollOutcome;

    /// "可以进入下一阶段"判断
    fn is_ready(&self, status: &Self::Status) -> bool;

    /// 包装为统一的阶段状态
    fn to_phase_status(&self, status: &Self::Status) -> PhaseStatus;

    /// 固定间隔轮询直到终态
    ///
    /// # 参数
    /// - `on_progress`: 每次请求后的回调（非终态也会调用）
    /// - `interval`: 轮询间隔
    async fn poll_until_complete(
        &self,
        on_progress: &mut (dyn for<'s> FnMut(&'s Self::Status) + Send),
        interval: Duration,
    ) -> AppResult<Self::Status> {
        poll_until(
            || self.get_status(),
            |status| self.classify(status),
            |status| on_progress(status),
            interval,
        )
        .await
    }

    /// 固定间隔轮询直到"可以进入下一阶段"
    ///
    /// 失败终态仍然按失败处理
    async fn wait_until_ready(
        &self,
        on_progress: &mut (dyn for<'s> FnMut(&'s Self::Status) + Send),
        interval: Duration,
    ) -> AppResult<Self::Status> {
        poll_until(
            || self.get_status(),
            |status| match self.classify(status) {
                PollOutcome::Failed(message) => PollOutcome::Failed(message),
                _ if self.is_ready(status) => PollOutcome::Done,
                outcome => outcome,
            },
            |status| on_progress(status),
            interval,
        )
        .await
    }
}
