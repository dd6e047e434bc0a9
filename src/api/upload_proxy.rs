//! 上传代理
//!
//! `/api/upload/*` → `{upload_api_url}/api/v1/upload/*`，方法、查询串、
//! Content-Type 与请求体原样转发

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, RawQuery, State},
    http::{header, HeaderMap, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{error, info};

use crate::api::error::ProxyError;
use crate::api::EdgeState;

/// 上传代理路由（不限制请求体大小）
pub fn upload_routes() -> Router<EdgeState> {
    Router::new()
        .route(
            "/api/upload/*path",
            get(proxy_upload).post(proxy_upload).delete(proxy_upload),
        )
        .layer(DefaultBodyLimit::disable())
}

/// 上游地址
pub fn upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!(
        "{}/api/v1/upload/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    url
}

async fn proxy_upload(
    State(state): State<EdgeState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let url = upstream_url(&state.config.upload_api_url, &path, query.as_deref());
    info!("[上传代理] {} {}", method, url);

    let mut request = state.client.request(method, &url);
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        request = request.header(header::CONTENT_TYPE, content_type.clone());
    }
    if !body.is_empty() {
        request = request.body(body);
    }

    let upstream = request.send().await.map_err(|e| {
        error!("[上传代理] 请求失败: {}", e);
        ProxyError::Upload(e)
    })?;

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let body = upstream.bytes().await.map_err(ProxyError::Upload)?;
    info!("[上传代理] 上游响应 {}", status.as_u16());

    let mut headers = HeaderMap::new();
    if let Some(content_type) = content_type {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    Ok((status, headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_rewrites_prefix() {
        assert_eq!(
            upstream_url("https://upload.example/", "init", None),
            "https://upload.example/api/v1/upload/init"
        );
        assert_eq!(
            upstream_url("https://upload.example", "S1/status", Some("verbose=1")),
            "https://upload.example/api/v1/upload/S1/status?verbose=1"
        );
    }
}
