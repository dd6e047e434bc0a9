//! 状态轮询原语
//!
//! - 策略 A（`fetch_with_retry`）：等待资源出现，指数退避，次数有上限
//! - 策略 B（`poll_until`）：资源已存在，固定间隔轮询直到终态，没有总超时

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// 重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大重试次数（总请求次数 = max_retries + 1）
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 次数耗尽时的超时消息；为 None 时原样返回最后一个错误
    pub timeout_message: Option<String>,
}

impl RetryPolicy {
    /// 策略 A：`min(2^attempt * base, max)`，耗尽后报超时
    pub fn appearance(config: &Config, timeout_message: impl Into<String>) -> Self {
        Self {
            max_retries: config.appearance_max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
            timeout_message: Some(timeout_message.into()),
        }
    }

    /// 瞬时故障重试：`2^attempt * base`，不设上限，耗尽后返回最后一个错误
    pub fn transient(config: &Config) -> Self {
        Self {
            max_retries: config.transient_max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::MAX,
            timeout_message: None,
        }
    }

    /// 第 `attempt` 次失败后的等待时间（attempt 从 0 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u128 << attempt.min(64);
        let millis = self.base_delay.as_millis().saturating_mul(factor);
        let capped = millis.min(self.max_delay.as_millis());
        Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX))
    }
}

/// 单次轮询结果的分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 非终态，继续轮询
    Continue,
    /// 成功终态
    Done,
    /// 失败终态（携带上游错误消息）
    Failed(String),
}

/// 带退避的请求
///
/// 只有 `should_retry` 认可的错误才会重试，其他错误立即返回
///
/// # 参数
/// - `fetch`: 无参数的异步请求函数
/// - `policy`: 重试策略
/// - `should_retry`: 错误分类
///
/// # 返回
/// 成功结果；次数耗尽时返回超时错误（或最后一个错误）
pub async fn fetch_with_retry<T, F, Fut, R>(
    fetch: F,
    policy: &RetryPolicy,
    should_retry: R,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    R: Fn(&AppError) -> bool,
{
    fetch_with_retry_notify(fetch, policy, should_retry, |_, _| {}).await
}

/// 同 `fetch_with_retry`，每次重试前回调 `on_retry(第几次重试, 错误)`
pub async fn fetch_with_retry_notify<T, F, Fut, R, N>(
    mut fetch: F,
    policy: &RetryPolicy,
    should_retry: R,
    mut on_retry: N,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    R: Fn(&AppError) -> bool,
    N: FnMut(u32, &AppError),
{
    let mut attempt: u32 = 0;

    loop {
        let err = match fetch().await {
            Ok(value) => return Ok(value),
            Err(err) if should_retry(&err) => err,
            Err(err) => return Err(err),
        };

        if attempt >= policy.max_retries {
            return Err(match &policy.timeout_message {
                Some(message) => AppError::timeout(message.clone(), attempt + 1),
                None => err,
            });
        }

        let delay = policy.delay_for(attempt);
        warn!(
            "⏳ 第 {}/{} 次重试，{}ms 后再试: {}",
            attempt + 1,
            policy.max_retries,
            delay.as_millis(),
            err
        );
        on_retry(attempt + 1, &err);
        sleep(delay).await;
        attempt += 1;
    }
}

/// 固定间隔轮询直到终态
///
/// 每次请求后先回调 `on_progress`，再判断是否终止
///
/// # 参数
/// - `fetch`: 无参数的异步请求函数
/// - `classify`: 终态判断
/// - `on_progress`: 进度回调（非终态也会调用）
/// - `interval`: 轮询间隔
///
/// # 返回
/// 终态快照；失败终态返回 ProcessingFailed
pub async fn poll_until<T, F, Fut, C, P>(
    mut fetch: F,
    classify: C,
    mut on_progress: P,
    interval: Duration,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    C: Fn(&T) -> PollOutcome,
    P: FnMut(&T),
{
    loop {
        let snapshot = fetch().await?;
        on_progress(&snapshot);

        match classify(&snapshot) {
            PollOutcome::Done => return Ok(snapshot),
            PollOutcome::Failed(message) => return Err(AppError::processing_failed(message)),
            PollOutcome::Continue => sleep(interval).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    fn not_found() -> AppError {
        AppError::http_status("/api/orchestrator/status/B1", 404, "Batch not found")
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::appearance(&Config::default(), "Timeout waiting for batch to be enqueued")
    }

    #[test]
    fn test_delay_schedule() {
        let policy = policy();
        let delays: Vec<u128> = (0..6).map(|i| policy.delay_for(i).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
        assert_eq!(policy.delay_for(200).as_millis(), 10_000);

        let transient = RetryPolicy::transient(&Config::default());
        assert_eq!(transient.delay_for(4).as_millis(), 16_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_total_wait_matches_schedule() {
        let k = 6;
        let calls = Arc::new(AtomicU32::new(0));
        let policy = policy();
        let start = Instant::now();

        let result = fetch_with_retry(
            || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < k {
                        Err(not_found())
                    } else {
                        Ok(n)
                    }
                }
            },
            &policy,
            AppError::is_not_found,
        )
        .await;

        assert_eq!(assert_ok!(result), k);
        let expected: Duration = (0..k).map(|i| policy.delay_for(i)).sum();
        assert_eq!(expected, Duration::from_millis(1000 + 2000 + 4000 + 8000 + 10_000 + 10_000));
        assert_eq!(start.elapsed(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_is_timeout() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = policy();

        let result: AppResult<()> = fetch_with_retry(
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(not_found())
                }
            },
            &policy,
            AppError::is_not_found,
        )
        .await;

        let err = assert_err!(result);
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timeout waiting for batch to be enqueued");
        assert_eq!(calls.load(Ordering::SeqCst), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result: AppResult<()> = fetch_with_retry(
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::http_status("/x", 400, "bad"))
                }
            },
            &policy(),
            AppError::is_not_found,
        )
        .await;

        let err = assert_err!(result);
        assert_eq!(err.http_status_code(), Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_policy_returns_last_error() {
        let result: AppResult<()> = fetch_with_retry(
            || async { Err(AppError::http_status("/api/status/B1", 503, "down")) },
            &RetryPolicy::transient(&Config::default()),
            AppError::is_retryable,
        )
        .await;

        let err = assert_err!(result);
        assert!(!err.is_timeout());
        assert_eq!(err.http_status_code(), Some(503));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_fetches_n_plus_one_times() {
        let n = 4;
        let fetches = Arc::new(AtomicU32::new(0));
        let mut callbacks = 0;

        let result = poll_until(
            || {
                let fetches = fetches.clone();
                async move { Ok::<_, AppError>(fetches.fetch_add(1, Ordering::SeqCst)) }
            },
            |seen| {
                if *seen == n {
                    PollOutcome::Done
                } else {
                    PollOutcome::Continue
                }
            },
            |_| callbacks += 1,
            Duration::from_secs(2),
        )
        .await;

        assert_eq!(assert_ok!(result), n);
        assert_eq!(fetches.load(Ordering::SeqCst), n + 1);
        assert_eq!(callbacks, n + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_failed_state_reports_message() {
        let mut callbacks = 0;
        let result = poll_until(
            || async { Ok::<_, AppError>("ERROR") },
            |_| PollOutcome::Failed("OCR worker crashed".to_string()),
            |_| callbacks += 1,
            Duration::from_secs(5),
        )
        .await;

        let err = assert_err!(result);
        assert_eq!(err.to_string(), "OCR worker crashed");
        assert_eq!(callbacks, 1);
    }
}
