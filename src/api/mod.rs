//! 边缘服务（Edge Layer）
//!
//! 工作流只访问同源的 `/api/*`，由这里转发到各个内部服务：
//!
//! | 路由 | 上游 |
//! |------|------|
//! | `GET /api/status/{id}` | `{status_service_url}/status/{id}` |
//! | `GET /api/logs/{id}` | `{status_service_url}/logs/{id}` |
//! | `GET /api/ingest/batches/{id}/status` | `{ingest_service_url}/api/batches/{id}/status` |
//! | `GET /api/orchestrator/status/{id}` | `{orchestrator_service_url}/status/{id}` |
//! | `GET/POST/DELETE /api/upload/*` | `{upload_api_url}/api/v1/upload/*` |
//!
//! 所有响应都带 `Access-Control-Allow-Origin: *`

pub mod error;
pub mod status;
pub mod upload_proxy;

pub use error::{ProxyError, Service};

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// 边缘服务共享状态
#[derive(Clone)]
pub struct EdgeState {
    pub config: Arc<Config>,
    pub client: reqwest::Client,
}

impl EdgeState {
    pub fn new(config: Config) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::request_failed("edge client", e))?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }
}

/// 构建路由
pub fn build_router(state: EdgeState) -> Router {
    Router::new()
        .merge(status::status_routes())
        .merge(upload_proxy::upload_routes())
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动边缘服务
pub async fn serve(config: Config) -> AppResult<()> {
    let bind_addr = config.bind_addr.clone();
    let router = build_router(EdgeState::new(config)?);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Other(format!("无法监听 {}: {}", bind_addr, e)))?;
    info!("🌐 边缘服务已启动: http://{}", bind_addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| AppError::Other(format!("边缘服务异常退出: {}", e)))
}

async fn not_found() -> ProxyError {
    ProxyError::NotFound
}

/// 预检请求直接应答；其余响应补上允许跨域头
async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return (
            StatusCode::OK,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (
                    header::ACCESS_CONTROL_ALLOW_METHODS,
                    "GET, POST, DELETE, OPTIONS",
                ),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            ],
        )
            .into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}
