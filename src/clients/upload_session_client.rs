//! 上传会话状态客户端
//!
//! 以 session id 为键，查询 `/api/upload/{session}/status`

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::clients::PhaseClient;
use crate::error::AppResult;
use crate::infrastructure::{fetch_json, StatusTransport};
use crate::models::{PhaseStatus, SessionStatus, UploadStatus};
use crate::services::poller::PollOutcome;

/// 上传会话客户端
pub struct UploadSessionClient {
    transport: Arc<dyn StatusTransport>,
    session_id: String,
}

impl UploadSessionClient {
    pub fn new(transport: Arc<dyn StatusTransport>, session_id: impl Into<String>) -> Self {
        Self {
            transport,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn status_path(&self) -> String {
        format!("/api/upload/{}/status", self.session_id)
    }
}

#[async_trait]
impl PhaseClient for UploadSessionClient {
    type Status = UploadStatus;

    fn name(&self) -> &'static str {
        "upload"
    }

    async fn get_status(&self) -> AppResult<UploadStatus> {
        let status: UploadStatus = fetch_json(self.transport.as_ref(), &self.status_path()).await?;
        debug!(
            "[会话 {}] 上传状态: {}",
            self.session_id,
            status.status.as_str()
        );
        Ok(status)
    }

    fn classify(&self, status: &UploadStatus) -> PollOutcome {
        match status.status {
            SessionStatus::Completed => PollOutcome::Done,
            SessionStatus::Failed | SessionStatus::Cancelled => {
                let errors = status
                    .errors
                    .as_ref()
                    .filter(|errors| !errors.is_empty())
                    .map(|errors| errors.join(", "))
                    .unwrap_or_else(|| "Unknown error".to_string());
                PollOutcome::Failed(format!("Upload failed: {}", errors))
            }
            _ => PollOutcome::Continue,
        }
    }

    fn is_ready(&self, status: &UploadStatus) -> bool {
        status.status == SessionStatus::Completed && status.batch_id.is_some()
    }

    fn to_phase_status(&self, status: &UploadStatus) -> PhaseStatus {
        PhaseStatus::Upload(status.clone())
    }
}
