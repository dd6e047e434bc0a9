use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 上游 API / 网络错误
    Api(ApiError),
    /// 工作流错误（超时、处理失败、缺少结果等）
    Workflow(WorkflowError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Api(e) => write!(f, "{}", e),
            // 工作流错误直接展示给用户，不加前缀
            AppError::Workflow(e) => write!(f, "{}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Api(e) => Some(e),
            AppError::Workflow(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 上游 API 调用错误
#[derive(Debug)]
pub enum ApiError {
    /// 网络请求失败（连接失败、连接重置、超时等）
    RequestFailed {
        endpoint: String,
        /// 是否属于可重试的瞬时故障
        transient: bool,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 上游返回非 2xx 状态码
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// JSON 解析失败
    JsonParseFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::RequestFailed {
                endpoint, source, ..
            } => {
                write!(f, "API请求失败 ({}): {}", endpoint, source)
            }
            ApiError::HttpStatus {
                endpoint,
                status,
                body,
            } => {
                write!(f, "HTTP {} ({}): {}", status, endpoint, body)
            }
            ApiError::JsonParseFailed { endpoint, source } => {
                write!(f, "JSON解析失败 ({}): {}", endpoint, source)
            }
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::RequestFailed { source, .. } | ApiError::JsonParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            ApiError::HttpStatus { .. } => None,
        }
    }
}

/// 工作流错误
#[derive(Debug)]
pub enum WorkflowError {
    /// 等待资源出现时重试次数耗尽
    Timeout { message: String, attempts: u32 },
    /// 上游明确报告失败
    ProcessingFailed { message: String },
    /// 阶段报告成功但缺少下一步需要的数据
    MissingResult { message: String },
    /// 批次 ID 不合法
    InvalidBatchId { value: String },
    /// 非法的状态迁移
    InvalidTransition { from: String, to: String },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::Timeout { message, .. } => write!(f, "{}", message),
            WorkflowError::ProcessingFailed { message } => write!(f, "{}", message),
            WorkflowError::MissingResult { message } => write!(f, "{}", message),
            WorkflowError::InvalidBatchId { value } => write!(f, "Invalid batch id: {:?}", value),
            WorkflowError::InvalidTransition { from, to } => {
                write!(f, "非法的状态迁移: {} → {}", from, to)
            }
        }
    }
}

impl std::error::Error for WorkflowError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 目录不存在
    DirectoryNotFound { path: String },
    /// 目录中没有可上传的文件
    EmptyDirectory { path: String },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::DirectoryNotFound { path } => write!(f, "目录不存在: {}", path),
            FileError::EmptyDirectory { path } => write!(f, "目录中没有文件: {}", path),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. } | FileError::WriteFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// URL 不合法
    InvalidUrl { value: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
            ConfigError::InvalidUrl { value, reason } => {
                write!(f, "URL '{}' 不合法: {}", value, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            ConfigError::InvalidUrl { .. } => None,
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            endpoint: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(ConfigError::InvalidUrl {
            value: String::new(),
            reason: err.to_string(),
        })
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        AppError::Workflow(err)
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::Api(err)
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建网络请求失败错误，自动判断是否为瞬时故障
    pub fn request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        let transient = is_transient_transport(&source);
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            transient,
            source: Box::new(source),
        })
    }

    /// 创建 HTTP 状态码错误
    pub fn http_status(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        AppError::Api(ApiError::HttpStatus {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        })
    }

    /// 创建 JSON 解析错误
    pub fn decode_failed(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建超时错误
    pub fn timeout(message: impl Into<String>, attempts: u32) -> Self {
        AppError::Workflow(WorkflowError::Timeout {
            message: message.into(),
            attempts,
        })
    }

    /// 创建上游处理失败错误
    pub fn processing_failed(message: impl Into<String>) -> Self {
        AppError::Workflow(WorkflowError::ProcessingFailed {
            message: message.into(),
        })
    }

    /// 创建缺少结果错误
    pub fn missing_result(message: impl Into<String>) -> Self {
        AppError::Workflow(WorkflowError::MissingResult {
            message: message.into(),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    // ========== 错误分类 ==========

    /// 上游返回的 HTTP 状态码（如果有）
    pub fn http_status_code(&self) -> Option<u16> {
        match self {
            AppError::Api(ApiError::HttpStatus { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// 是否为"资源尚不存在"（404 或 `Batch not found`）
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::Api(ApiError::HttpStatus { status, body, .. }) => {
                *status == 404 || body.contains("Batch not found")
            }
            _ => false,
        }
    }

    /// 是否为可重试的瞬时故障（5xx、429、连接失败/重置）
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Api(ApiError::HttpStatus { status, .. }) => {
                *status >= 500 || *status == 429
            }
            AppError::Api(ApiError::RequestFailed { transient, .. }) => *transient,
            _ => false,
        }
    }

    /// 是否为等待超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Workflow(WorkflowError::Timeout { .. }))
    }
}

/// 判断 reqwest 错误是否属于瞬时网络故障
fn is_transient_transport(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }

    // 连接重置通常藏在 source 链里的 io::Error 中
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            );
        }
        source = inner.source();
    }
    false
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
