pub mod ingest_client;
pub mod orchestrator_client;
pub mod phase_client;
pub mod status_client;
pub mod upload_session_client;

pub use ingest_client::IngestClient;
pub use orchestrator_client::OrchestratorClient;
pub use phase_client::PhaseClient;
pub use status_client::StatusClient;
pub use upload_session_client::UploadSessionClient;

use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};
use crate::infrastructure::{fetch_json, StatusTransport};
use crate::services::poller::{fetch_with_retry, RetryPolicy};

/// 等待资源出现的查询
///
/// 404 / `Batch not found` 按策略 A 退避，次数耗尽报超时；
/// 5xx、429、连接重置在每次查询内部按瞬时故障重试
pub(crate) async fn fetch_until_found<T: DeserializeOwned>(
    transport: &dyn StatusTransport,
    path: &str,
    appearance: &RetryPolicy,
    transient: &RetryPolicy,
) -> AppResult<T> {
    fetch_with_retry(
        move || fetch_with_retry(move || fetch_json(transport, path), transient, is_transient),
        appearance,
        AppError::is_not_found,
    )
    .await
}

fn is_transient(err: &AppError) -> bool {
    err.is_retryable() && !err.is_not_found()
}

/// 测试用的脚本化状态源
#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use crate::error::{AppError, AppResult};
    use crate::infrastructure::StatusTransport;

    /// 一次脚本化响应
    #[derive(Clone)]
    pub enum Scripted {
        Ok(String),
        Status(u16, String),
    }

    /// 按路径依次返回预设响应；最后一个响应会一直重复
    #[derive(Default)]
    pub struct ScriptedTransport {
        scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(self, path: &str, responses: Vec<Scripted>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(path.to_string(), responses.into());
            self
        }

        pub fn calls_to(&self, path: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|p| *p == path).count()
        }
    }

    #[async_trait]
    impl StatusTransport for ScriptedTransport {
        async fn get_text(&self, path: &str) -> AppResult<String> {
            self.calls.lock().unwrap().push(path.to_string());

            let next = {
                let mut scripts = self.scripts.lock().unwrap();
                let queue = scripts.get_mut(path);
                match queue {
                    Some(q) if q.len() > 1 => q.pop_front(),
                    Some(q) => q.front().cloned(),
                    None => None,
                }
            };

            match next {
                Some(Scripted::Ok(body)) => Ok(body),
                Some(Scripted::Status(code, body)) => Err(AppError::http_status(path, code, body)),
                None => Err(AppError::http_status(path, 404, "Not found")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{Scripted, ScriptedTransport};
    use super::*;
    use crate::config::Config;
    use crate::infrastructure::HttpExecutor;
    use crate::models::{BatchId, IngestState, OrchestratorState, Stage};
    use crate::services::poller::PollOutcome;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    const ORCH: &str = "/api/orchestrator/status/B1";
    const INGEST: &str = "/api/ingest/batches/B1/status";
    const STATUS: &str = "/api/status/B1";

    fn b1() -> BatchId {
        BatchId::parse("B1").unwrap()
    }

    fn ok(body: &str) -> Scripted {
        Scripted::Ok(body.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_orchestrator_waits_for_batch_to_appear() {
        let transport = Arc::new(ScriptedTransport::new().script(
            ORCH,
            vec![
                Scripted::Status(404, r#"{"error":"Batch not found"}"#.into()),
                Scripted::Status(500, r#"{"error":"Batch not found"}"#.into()),
                Scripted::Status(404, String::new()),
                ok(r#"{"status":"INGESTED","progress":{"directories_total":2}}"#),
            ],
        ));
        let client = OrchestratorClient::new(transport.clone(), b1(), &Config::default());
        let start = Instant::now();

        let status = assert_ok!(client.get_status().await);
        assert_eq!(status.status, OrchestratorState::Ingested);
        assert_eq!(transport.calls_to(ORCH), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(1000 + 2000 + 4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_orchestrator_client_errors_propagate() {
        let transport = Arc::new(
            ScriptedTransport::new().script(ORCH, vec![Scripted::Status(400, "bad id".into())]),
        );
        let client = OrchestratorClient::new(transport.clone(), b1(), &Config::default());

        let err = assert_err!(client.get_status().await);
        assert_eq!(err.http_status_code(), Some(400));
        assert_eq!(transport.calls_to(ORCH), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_orchestrator_persistent_server_error_propagates() {
        let transport = Arc::new(
            ScriptedTransport::new().script(ORCH, vec![Scripted::Status(500, "boom".into())]),
        );
        let client = OrchestratorClient::new(transport.clone(), b1(), &Config::default());
        let start = Instant::now();

        let err = assert_err!(client.get_status().await);
        assert_eq!(err.http_status_code(), Some(500));
        assert!(!err.is_timeout());
        // 瞬时故障重试 5 次后放弃
        assert_eq!(transport.calls_to(ORCH), 6);
        assert_eq!(
            start.elapsed(),
            Duration::from_millis(1000 + 2000 + 4000 + 8000 + 16_000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_orchestrator_poll_survives_bad_gateway() {
        let transport = Arc::new(ScriptedTransport::new().script(
            ORCH,
            vec![
                ok(r#"{"status":"OCR_IN_PROGRESS"}"#),
                Scripted::Status(502, "bad gateway".into()),
                ok(r#"{"status":"DONE","root_pi":"P1"}"#),
            ],
        ));
        let client = OrchestratorClient::new(transport.clone(), b1(), &Config::default());

        let mut seen = Vec::new();
        let status = assert_ok!(
            client
                .poll_until_complete(&mut |s| seen.push(s.status), Duration::from_secs(5))
                .await
        );
        assert_eq!(status.root_pi.as_deref(), Some("P1"));
        assert_eq!(seen, vec![OrchestratorState::OcrInProgress, OrchestratorState::Done]);
        assert_eq!(transport.calls_to(ORCH), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_complete_counts_fetches_and_callbacks() {
        let transport = Arc::new(ScriptedTransport::new().script(
            ORCH,
            vec![
                ok(r#"{"status":"INGESTED"}"#),
                ok(r#"{"status":"OCR_IN_PROGRESS"}"#),
                ok(r#"{"status":"PINAX_EXTRACTION"}"#),
                ok(r#"{"status":"DONE","root_pi":"P1"}"#),
            ],
        ));
        let client = OrchestratorClient::new(transport.clone(), b1(), &Config::default());
        let start = Instant::now();

        let mut callbacks = 0;
        assert_ok!(
            client
                .poll_until_complete(&mut |_| callbacks += 1, Duration::from_secs(5))
                .await
        );
        assert_eq!(callbacks, 4);
        assert_eq!(transport.calls_to(ORCH), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_orchestrator_error_state_carries_upstream_message() {
        let transport = Arc::new(ScriptedTransport::new().script(
            ORCH,
            vec![
                ok(r#"{"status":"OCR_IN_PROGRESS"}"#),
                ok(r#"{"status":"ERROR","error":"OCR worker crashed"}"#),
            ],
        ));
        let client = OrchestratorClient::new(transport, b1(), &Config::default());

        let mut seen = Vec::new();
        let err = assert_err!(
            client
                .poll_until_complete(&mut |s| seen.push(s.status), Duration::from_secs(5))
                .await
        );
        assert_eq!(err.to_string(), "OCR worker crashed");
        assert_eq!(seen, vec![OrchestratorState::OcrInProgress, OrchestratorState::Error]);
    }

    #[test]
    fn test_orchestrator_error_without_message() {
        let client = OrchestratorClient::new(
            Arc::new(ScriptedTransport::new()),
            b1(),
            &Config::default(),
        );
        let status = serde_json::from_str(r#"{"status":"ERROR","error":""}"#).unwrap();
        assert_eq!(
            client.classify(&status),
            PollOutcome::Failed("Orchestrator processing failed".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_ready_after_uploading() {
        let transport = Arc::new(ScriptedTransport::new().script(
            INGEST,
            vec![
                ok(r#"{"status":"uploading","files_uploaded":1,"file_count":2}"#),
                ok(r#"{"status":"preprocessing","files_uploaded":2,"file_count":2}"#),
                ok(r#"{"status":"enqueued","files_uploaded":2,"file_count":2}"#),
            ],
        ));
        let client = IngestClient::new(transport.clone(), b1(), &Config::default());

        let mut calls = 0;
        let status = assert_ok!(
            client
                .wait_until_ready(&mut |_| calls += 1, Duration::from_secs(2))
                .await
        );
        assert_eq!(status.status, IngestState::Enqueued);
        assert_eq!(calls, 3);
        assert_eq!(transport.calls_to(INGEST), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_failure_message() {
        let transport = Arc::new(
            ScriptedTransport::new().script(INGEST, vec![ok(r#"{"status":"failed"}"#)]),
        );
        let client = IngestClient::new(transport, b1(), &Config::default());

        let err = assert_err!(client.wait_until_ready(&mut |_| {}, Duration::from_secs(2)).await);
        assert_eq!(err.to_string(), "Batch failed during ingest/preprocessing");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_wait_survives_server_error() {
        let transport = Arc::new(ScriptedTransport::new().script(
            INGEST,
            vec![
                ok(r#"{"status":"uploading","files_uploaded":1,"file_count":2}"#),
                Scripted::Status(503, "busy".into()),
                Scripted::Status(429, "slow down".into()),
                ok(r#"{"status":"enqueued","files_uploaded":2,"file_count":2}"#),
            ],
        ));
        let client = IngestClient::new(transport.clone(), b1(), &Config::default());
        let start = Instant::now();

        let mut seen = Vec::new();
        let status = assert_ok!(
            client
                .wait_until_ready(&mut |s| seen.push(s.status), Duration::from_secs(2))
                .await
        );
        assert_eq!(status.status, IngestState::Enqueued);
        assert_eq!(seen, vec![IngestState::Uploading, IngestState::Enqueued]);
        assert_eq!(transport.calls_to(INGEST), 4);
        // 轮询间隔 2s，加上两次退避 1s + 2s
        assert_eq!(start.elapsed(), Duration::from_secs(2 + 1 + 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_never_appearing_times_out() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = IngestClient::new(transport.clone(), b1(), &Config::default());

        let err = assert_err!(client.get_status().await);
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timeout waiting for batch to be enqueued");
        assert_eq!(transport.calls_to(INGEST), 25);
    }

    #[tokio::test]
    async fn test_upload_session_failure_joins_errors() {
        let transport = Arc::new(ScriptedTransport::new().script(
            "/api/upload/S1/status",
            vec![ok(r#"{"status":"failed","errors":["disk full","quota exceeded"]}"#)],
        ));
        let client = UploadSessionClient::new(transport, "S1");

        let err = assert_err!(client.poll_until_complete(&mut |_| {}, Duration::ZERO).await);
        assert_eq!(err.to_string(), "Upload failed: disk full, quota exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_client_does_not_retry_404() {
        let transport = Arc::new(
            ScriptedTransport::new().script(STATUS, vec![Scripted::Status(404, "Not found".into())]),
        );
        let client = StatusClient::new(transport.clone(), b1(), &Config::default());

        let err = assert_err!(client.get_status().await);
        assert_eq!(err.http_status_code(), Some(404));
        assert_eq!(transport.calls_to(STATUS), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_client_retries_server_errors() {
        let transport = Arc::new(ScriptedTransport::new().script(
            STATUS,
            vec![
                Scripted::Status(503, "unavailable".into()),
                Scripted::Status(429, "slow down".into()),
                ok(r#"{"stage":"completed","phase":"done","results":{"root_pi":"P1"}}"#),
            ],
        ));
        let client = StatusClient::new(transport.clone(), b1(), &Config::default());

        let status = assert_ok!(client.get_status().await);
        assert_eq!(status.stage, Stage::Completed);
        assert_eq!(client.classify(&status), PollOutcome::Done);
        assert_eq!(transport.calls_to(STATUS), 3);
    }

    fn fast_backoff() -> Config {
        Config {
            backoff_base_ms: 5,
            backoff_max_ms: 20,
            ..Config::default()
        }
    }

    fn http_transport(server: &mockito::ServerGuard) -> Arc<HttpExecutor> {
        Arc::new(HttpExecutor::new(&server.url(), Duration::from_secs(5)).unwrap())
    }

    #[tokio::test]
    async fn test_ingest_client_recovers_from_http_503() {
        let mut server = mockito::Server::new_async().await;
        let unavailable = server
            .mock("GET", INGEST)
            .with_status(503)
            .with_body("busy")
            .expect(1)
            .create_async()
            .await;
        let enqueued = server
            .mock("GET", INGEST)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"enqueued","files_uploaded":2,"file_count":2}"#)
            .create_async()
            .await;
        let client = IngestClient::new(http_transport(&server), b1(), &fast_backoff());

        let status = assert_ok!(client.get_status().await);
        assert_eq!(status.status, IngestState::Enqueued);
        unavailable.assert_async().await;
        enqueued.assert_async().await;
    }

    #[tokio::test]
    async fn test_orchestrator_client_recovers_from_http_429() {
        let mut server = mockito::Server::new_async().await;
        let throttled = server
            .mock("GET", ORCH)
            .with_status(429)
            .with_body("slow down")
            .expect(1)
            .create_async()
            .await;
        let done = server
            .mock("GET", ORCH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"DONE","root_pi":"P1"}"#)
            .create_async()
            .await;
        let client = OrchestratorClient::new(http_transport(&server), b1(), &fast_backoff());

        let status = assert_ok!(
            client
                .poll_until_complete(&mut |_| {}, Duration::from_millis(10))
                .await
        );
        assert_eq!(status.status, OrchestratorState::Done);
        throttled.assert_async().await;
        done.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_logs_writes_pretty_json() {
        let transport = Arc::new(ScriptedTransport::new().script(
            "/api/logs/B1",
            vec![ok(r#"{"batch_id":"B1","log_count":1,"logs":[{"timestamp":"t","stage":"ingest","phase":"upload","worker_response":{"ok":true},"status_changed":true}],"source":"d1"}"#)],
        ));
        let client = StatusClient::new(transport, b1(), &Config::default());
        let dir = tempfile::tempdir().unwrap();

        let path = assert_ok!(client.download_logs(dir.path()).await);
        assert!(path.ends_with("batch-B1-logs.json"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \"batch_id\": \"B1\""));
        let logs: crate::models::StatusLog = serde_json::from_str(&content).unwrap();
        assert_eq!(logs.logs.len(), 1);
    }
}
