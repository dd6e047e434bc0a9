//! 状态类接口
//!
//! - `/api/status/{id}`、`/api/logs/{id}`：透明转发到状态服务
//! - `/api/ingest/batches/{id}/status`、`/api/orchestrator/status/{id}`：
//!   2xx 透传，其余转为统一的错误结构

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{error, info};

use crate::api::error::{ProxyError, Service};
use crate::api::EdgeState;

/// 状态类路由
pub fn status_routes() -> Router<EdgeState> {
    Router::new()
        .route("/api/status/:batch_id", get(get_status))
        .route("/api/logs/:batch_id", get(get_logs))
        .route("/api/ingest/batches/:batch_id/status", get(get_ingest_status))
        .route("/api/orchestrator/status/:batch_id", get(get_orchestrator_status))
}

/// GET /api/status/{id}
async fn get_status(
    State(state): State<EdgeState>,
    Path(batch_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    pass_through(&state, &format!("/status/{}", batch_id), query).await
}

/// GET /api/logs/{id}
async fn get_logs(
    State(state): State<EdgeState>,
    Path(batch_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    pass_through(&state, &format!("/logs/{}", batch_id), query).await
}

/// 原样转发到状态服务（状态码与响应体都不变）
async fn pass_through(
    state: &EdgeState,
    path: &str,
    query: Option<String>,
) -> Result<Response, ProxyError> {
    let mut url = format!(
        "{}{}",
        state.config.status_service_url.trim_end_matches('/'),
        path
    );
    if let Some(query) = query {
        url.push('?');
        url.push_str(&query);
    }
    info!("[代理] GET {}", url);

    let upstream = state
        .client
        .get(&url)
        .send()
        .await
        .map_err(|e| ProxyError::Internal(e.to_string()))?;

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let body = upstream
        .bytes()
        .await
        .map_err(|e| ProxyError::Internal(e.to_string()))?;

    let mut headers = HeaderMap::new();
    if let Some(content_type) = content_type {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    Ok((status, headers, body).into_response())
}

/// GET /api/ingest/batches/{id}/status
async fn get_ingest_status(
    State(state): State<EdgeState>,
    Path(batch_id): Path<String>,
) -> Result<Response, ProxyError> {
    let url = format!(
        "{}/api/batches/{}/status",
        state.config.ingest_service_url.trim_end_matches('/'),
        batch_id
    );
    fetch_service_status(&state, Service::Ingest, &url).await
}

/// GET /api/orchestrator/status/{id}
async fn get_orchestrator_status(
    State(state): State<EdgeState>,
    Path(batch_id): Path<String>,
) -> Result<Response, ProxyError> {
    let url = format!(
        "{}/status/{}",
        state.config.orchestrator_service_url.trim_end_matches('/'),
        batch_id
    );
    fetch_service_status(&state, Service::Orchestrator, &url).await
}

async fn fetch_service_status(
    state: &EdgeState,
    service: Service,
    url: &str,
) -> Result<Response, ProxyError> {
    info!("[代理] {} 状态: GET {}", service.key(), url);

    let upstream = state
        .client
        .get(url)
        .send()
        .await
        .map_err(|source| ProxyError::UpstreamTransport { service, source })?;

    let status = upstream.status();
    let body: Bytes = upstream
        .bytes()
        .await
        .map_err(|source| ProxyError::UpstreamTransport { service, source })?;

    if !status.is_success() {
        let body = String::from_utf8_lossy(&body).into_owned();
        error!("[代理] {} 返回 {}: {}", service.key(), status.as_u16(), body);
        return Err(ProxyError::UpstreamStatus {
            service,
            status: status.as_u16(),
            body,
        });
    }

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET"),
        ),
    ];
    Ok((status, headers, body).into_response())
}
