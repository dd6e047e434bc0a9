//! HTTP 执行器 - 基础设施层
//!
//! 持有唯一的 reqwest Client，只暴露"发请求"的能力

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// 状态查询能力
///
/// 各阶段客户端共享同一个实现；测试中可以替换为脚本化的假实现
#[async_trait]
pub trait StatusTransport: Send + Sync {
    /// GET `path`，2xx 时返回响应体文本
    ///
    /// 非 2xx 返回 `ApiError::HttpStatus`（携带状态码与响应体）
    async fn get_text(&self, path: &str) -> AppResult<String>;
}

/// GET 并解析 JSON
///
/// # 参数
/// - `transport`: 状态查询能力
/// - `path`: 以 `/` 开头的路径
pub async fn fetch_json<T: DeserializeOwned>(
    transport: &dyn StatusTransport,
    path: &str,
) -> AppResult<T> {
    let body = transport.get_text(path).await?;
    serde_json::from_str(&body).map_err(|e| AppError::decode_failed(path, e))
}

/// HTTP 执行器
///
/// 职责：
/// - 持有唯一的 reqwest Client 与边缘服务地址
/// - 暴露 GET / POST JSON / POST multipart 能力
/// - 不认识批次与阶段
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpExecutor {
    /// 创建新的 HTTP 执行器
    ///
    /// # 参数
    /// - `base_url`: 边缘服务地址
    /// - `timeout`: 单次请求超时
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let base_url = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::request_failed(base_url.as_str(), e))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(
            &config.edge_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 拼接完整地址
    pub fn url(&self, path: &str) -> AppResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// GET 并解析 JSON
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        fetch_json(self, path).await
    }

    /// POST JSON 并解析 JSON 响应
    ///
    /// # 参数
    /// - `path`: 以 `/` 开头的路径
    /// - `body`: 请求体
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::request_failed(path, e))?;

        let text = read_success_body(path, response).await?;
        serde_json::from_str(&text).map_err(|e| AppError::decode_failed(path, e))
    }

    /// POST multipart 表单并解析 JSON 响应
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> AppResult<T> {
        let url = self.url(path)?;
        debug!("POST (multipart) {}", url);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::request_failed(path, e))?;

        let text = read_success_body(path, response).await?;
        serde_json::from_str(&text).map_err(|e| AppError::decode_failed(path, e))
    }
}

#[async_trait]
impl StatusTransport for HttpExecutor {
    async fn get_text(&self, path: &str) -> AppResult<String> {
        let url = self.url(path)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::request_failed(path, e))?;

        read_success_body(path, response).await
    }
}

/// 读取响应体；非 2xx 转为 HttpStatus 错误
async fn read_success_body(endpoint: &str, response: reqwest::Response) -> AppResult<String> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AppError::request_failed(endpoint, e))?;

    if !status.is_success() {
        return Err(AppError::http_status(endpoint, status.as_u16(), text));
    }

    Ok(text)
}
