//! 边缘服务的错误类型
//!
//! 所有错误响应都是 `{error, message?}` 形式的 JSON

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 经由边缘服务代理的内部状态服务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Ingest,
    Orchestrator,
}

impl Service {
    pub fn key(&self) -> &'static str {
        match self {
            Service::Ingest => "ingest",
            Service::Orchestrator => "orchestrator",
        }
    }

    /// 错误信息中的上游名称
    pub fn upstream_name(&self) -> &'static str {
        match self {
            Service::Ingest => "Ingest worker",
            Service::Orchestrator => "Orchestrator",
        }
    }
}

/// 代理错误
#[derive(Debug, Error)]
pub enum ProxyError {
    /// 上游返回非 2xx
    #[error("{} returned {status}: {body}", .service.upstream_name())]
    UpstreamStatus {
        service: Service,
        status: u16,
        body: String,
    },

    /// 调用上游失败
    #[error("{source}")]
    UpstreamTransport {
        service: Service,
        #[source]
        source: reqwest::Error,
    },

    /// 上传代理失败
    #[error("{0}")]
    Upload(#[source] reqwest::Error),

    /// 未匹配的路由
    #[error("Not found")]
    NotFound,

    /// 内部错误
    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            // 上游 4xx 原样透传，5xx 统一为 500
            ProxyError::UpstreamStatus { status, .. } if (400..500).contains(status) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        let body = match &self {
            ProxyError::UpstreamStatus { service, .. }
            | ProxyError::UpstreamTransport { service, .. } => json!({
                "error": format!("Failed to fetch {} status", service.key()),
                "message": message,
            }),
            ProxyError::Upload(_) => json!({
                "error": "Upload proxy error",
                "message": message,
            }),
            ProxyError::NotFound => json!({ "error": "Not found" }),
            ProxyError::Internal(_) => json!({
                "error": "Internal server error",
                "message": message,
            }),
        };

        (status, Json(body)).into_response()
    }
}
