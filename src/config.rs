use serde::Deserialize;
use std::path::Path;

use crate::error::{AppError, AppResult, ConfigError};

/// 提交新批次后的监控方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    /// 依次轮询 ingest 与 orchestrator 两个阶段
    Phased,
    /// 轮询统一状态接口
    Unified,
}

impl std::str::FromStr for MonitorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phased" => Ok(MonitorMode::Phased),
            "unified" => Ok(MonitorMode::Unified),
            other => Err(format!("未知的监控方式: {}", other)),
        }
    }
}

/// 程序配置
///
/// 启动时构建一次，显式传入工作流与边缘服务，不使用全局状态
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 浏览器侧（工作流）---
    /// 边缘服务地址，工作流通过它访问 `/api/*`
    pub edge_base_url: String,
    /// 归档查看地址，结果链接为 `{arke_institute_url}/{root_pi}`
    pub arke_institute_url: String,
    /// 新批次的监控方式
    pub monitor_mode: MonitorMode,
    /// 并行上传的文件数
    pub parallel_uploads: usize,

    // --- 轮询 ---
    pub upload_poll_interval_ms: u64,
    pub ingest_poll_interval_ms: u64,
    pub orchestrator_poll_interval_ms: u64,
    pub status_poll_interval_ms: u64,
    /// 首次查询 orchestrator 前的等待时间
    pub orchestrator_grace_ms: u64,
    /// 等待批次出现时的最大重试次数
    pub appearance_max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// 统一状态接口遇到瞬时故障时的最大重试次数
    pub transient_max_retries: u32,
    /// 单次请求超时
    pub request_timeout_secs: u64,

    // --- 边缘服务 ---
    pub bind_addr: String,
    pub upload_api_url: String,
    pub status_service_url: String,
    pub ingest_service_url: String,
    pub orchestrator_service_url: String,

    // --- 日志 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 监控记录输出目录
    pub output_log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            edge_base_url: "http://127.0.0.1:8787".to_string(),
            arke_institute_url: "https://arke.institute".to_string(),
            monitor_mode: MonitorMode::Phased,
            parallel_uploads: 5,
            upload_poll_interval_ms: 2000,
            ingest_poll_interval_ms: 2000,
            orchestrator_poll_interval_ms: 5000,
            status_poll_interval_ms: 5000,
            orchestrator_grace_ms: 3000,
            appearance_max_retries: 24,
            backoff_base_ms: 1000,
            backoff_max_ms: 10_000,
            transient_max_retries: 5,
            request_timeout_secs: 30,
            bind_addr: "127.0.0.1:8787".to_string(),
            upload_api_url: "https://upload.arke.institute".to_string(),
            status_service_url: "https://status.arke.institute".to_string(),
            ingest_service_url: "https://ingest.arke.institute".to_string(),
            orchestrator_service_url: "https://orchestrator.arke.institute".to_string(),
            verbose_logging: false,
            output_log_dir: "logs".to_string(),
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取（缺省字段使用默认值）
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

        toml::from_str(&content).map_err(|e| {
            AppError::Config(ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })
    }

    /// 默认值 → TOML 文件（可选）→ 环境变量
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let base = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 用 `UPLOAD_*` 环境变量覆盖；无法解析的值保持原值
    pub fn with_env_overrides(self) -> Self {
        let base = self;
        Self {
            edge_base_url: env_string("UPLOAD_EDGE_BASE_URL").unwrap_or(base.edge_base_url),
            arke_institute_url: env_string("UPLOAD_ARKE_INSTITUTE_URL")
                .unwrap_or(base.arke_institute_url),
            monitor_mode: env_parse("UPLOAD_MONITOR_MODE").unwrap_or(base.monitor_mode),
            parallel_uploads: env_parse("UPLOAD_PARALLEL_UPLOADS").unwrap_or(base.parallel_uploads),
            upload_poll_interval_ms: env_parse("UPLOAD_UPLOAD_POLL_INTERVAL_MS")
                .unwrap_or(base.upload_poll_interval_ms),
            ingest_poll_interval_ms: env_parse("UPLOAD_INGEST_POLL_INTERVAL_MS")
                .unwrap_or(base.ingest_poll_interval_ms),
            orchestrator_poll_interval_ms: env_parse("UPLOAD_ORCHESTRATOR_POLL_INTERVAL_MS")
                .unwrap_or(base.orchestrator_poll_interval_ms),
            status_poll_interval_ms: env_parse("UPLOAD_STATUS_POLL_INTERVAL_MS")
                .unwrap_or(base.status_poll_interval_ms),
            orchestrator_grace_ms: env_parse("UPLOAD_ORCHESTRATOR_GRACE_MS")
                .unwrap_or(base.orchestrator_grace_ms),
            appearance_max_retries: env_parse("UPLOAD_APPEARANCE_MAX_RETRIES")
                .unwrap_or(base.appearance_max_retries),
            backoff_base_ms: env_parse("UPLOAD_BACKOFF_BASE_MS").unwrap_or(base.backoff_base_ms),
            backoff_max_ms: env_parse("UPLOAD_BACKOFF_MAX_MS").unwrap_or(base.backoff_max_ms),
            transient_max_retries: env_parse("UPLOAD_TRANSIENT_MAX_RETRIES")
                .unwrap_or(base.transient_max_retries),
            request_timeout_secs: env_parse("UPLOAD_REQUEST_TIMEOUT_SECS")
                .unwrap_or(base.request_timeout_secs),
            bind_addr: env_string("UPLOAD_BIND_ADDR").unwrap_or(base.bind_addr),
            upload_api_url: env_string("UPLOAD_API_URL").unwrap_or(base.upload_api_url),
            status_service_url: env_string("UPLOAD_STATUS_SERVICE_URL")
                .unwrap_or(base.status_service_url),
            ingest_service_url: env_string("UPLOAD_INGEST_SERVICE_URL")
                .unwrap_or(base.ingest_service_url),
            orchestrator_service_url: env_string("UPLOAD_ORCHESTRATOR_SERVICE_URL")
                .unwrap_or(base.orchestrator_service_url),
            verbose_logging: env_parse("UPLOAD_VERBOSE_LOGGING").unwrap_or(base.verbose_logging),
            output_log_dir: env_string("UPLOAD_OUTPUT_LOG_DIR").unwrap_or(base.output_log_dir),
        }
    }

    /// 校验所有地址都是合法的绝对 URL
    pub fn validate(&self) -> AppResult<()> {
        for value in [
            &self.edge_base_url,
            &self.arke_institute_url,
            &self.upload_api_url,
            &self.status_service_url,
            &self.ingest_service_url,
            &self.orchestrator_service_url,
        ] {
            url::Url::parse(value).map_err(|e| {
                AppError::Config(ConfigError::InvalidUrl {
                    value: value.clone(),
                    reason: e.to_string(),
                })
            })?;
        }
        Ok(())
    }

    /// 归档查看链接
    pub fn root_link(&self, root_pi: &str) -> String {
        format!("{}/{}", self.arke_institute_url.trim_end_matches('/'), root_pi)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
