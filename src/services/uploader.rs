//! 上传能力
//!
//! 文件传输本身对工作流是不透明的：工作流只依赖 `Uploader` trait，
//! 通过事件通道接收进度 / 重试 / 恢复事件，最终拿到批次 ID

use async_trait::async_trait;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::clients::{PhaseClient, UploadSessionClient};
use crate::config::Config;
use crate::error::{AppError, AppResult, FileError};
use crate::infrastructure::{HttpExecutor, StatusTransport};
use crate::models::{
    BatchId, InitSessionRequest, InitSessionResponse, ProcessRequest, ProcessResponse,
    ProcessingOptions, SdkPhase, SdkProgress, UploadFilesResponse, UploadStatus,
};
use crate::services::poller::{fetch_with_retry_notify, RetryPolicy};

pub const MISSING_BATCH_ID_MESSAGE: &str = "Upload completed but no batchId received";

/// 上传客户端发出的结构化事件
#[derive(Debug, Clone, PartialEq)]
pub enum UploaderEvent {
    /// 进度更新
    Progress(SdkProgress),
    /// 遇到瞬时故障（503 / 429 / 连接重置），即将重试
    Retrying { attempt: u32, reason: String },
    /// 重试后恢复
    Recovered,
    /// 触发处理后的会话状态
    Session(UploadStatus),
}

/// 待上传的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// 本地路径
    pub path: PathBuf,
    /// 相对于上传根目录的路径（使用 `/` 分隔）
    pub relative_path: String,
    pub size: u64,
}

/// 上传请求
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub uploader: String,
    pub root_path: String,
    pub parent_pi: Option<String>,
    pub metadata: Option<JsonValue>,
    pub processing: ProcessingOptions,
}

/// 上传结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub batch_id: BatchId,
    pub files_uploaded: u64,
    pub bytes_uploaded: u64,
}

/// 上传能力
#[async_trait]
pub trait Uploader: Send + Sync {
    /// 上传一批文件并返回批次 ID
    ///
    /// # 参数
    /// - `files`: 待上传文件
    /// - `request`: 上传者、根路径等信息
    /// - `events`: 事件通道
    async fn upload_batch(
        &self,
        files: Vec<UploadFile>,
        request: &UploadRequest,
        events: mpsc::UnboundedSender<UploaderEvent>,
    ) -> AppResult<UploadReceipt>;
}

/// 扫描目录，收集所有文件
///
/// # 参数
/// - `dir`: 上传根目录
///
/// # 返回
/// 按相对路径排序的文件列表；目录为空时返回错误
pub fn scan_directory(dir: &Path) -> AppResult<Vec<UploadFile>> {
    if !dir.is_dir() {
        return Err(AppError::File(FileError::DirectoryNotFound {
            path: dir.display().to_string(),
        }));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let size = entry
            .metadata()
            .map_err(|e| AppError::file_read_failed(entry.path().display().to_string(), e))?
            .len();

        files.push(UploadFile {
            path: entry.path().to_path_buf(),
            relative_path,
            size,
        });
    }

    if files.is_empty() {
        return Err(AppError::File(FileError::EmptyDirectory {
            path: dir.display().to_string(),
        }));
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

/// 把上游返回的上传地址改写为经由边缘服务代理的路径
///
/// `https://upload.arke.institute/api/v1/upload/S1/files` → `/api/upload/S1/files`
pub fn proxied_upload_path(upload_url: &str) -> AppResult<String> {
    let re = Regex::new(r"/upload/([^/]+)/files").map_err(|e| AppError::Other(e.to_string()))?;

    match re.captures(upload_url).and_then(|c| c.get(1)) {
        Some(session) => Ok(format!("/api/upload/{}/files", session.as_str())),
        None => Err(AppError::Other(format!(
            "无法识别的上传地址: {}",
            upload_url
        ))),
    }
}

/// 基于上传会话 API 的上传实现
///
/// 流程：init → 并行上传文件 → process → 轮询会话状态拿到 batchId
pub struct SessionUploader {
    executor: Arc<HttpExecutor>,
    parallel_uploads: usize,
    poll_interval: Duration,
    retry: RetryPolicy,
}

impl SessionUploader {
    pub fn new(executor: Arc<HttpExecutor>, config: &Config) -> Self {
        Self {
            executor,
            parallel_uploads: config.parallel_uploads.max(1),
            poll_interval: Duration::from_millis(config.upload_poll_interval_ms),
            retry: RetryPolicy::transient(config),
        }
    }

    async fn init_session(
        &self,
        request: &UploadRequest,
        events: &mpsc::UnboundedSender<UploaderEvent>,
    ) -> AppResult<InitSessionResponse> {
        let body = InitSessionRequest {
            uploader: request.uploader.clone(),
            root_path: request.root_path.clone(),
            parent_pi: request.parent_pi.clone(),
            metadata: request.metadata.clone(),
            processing: Some(request.processing.clone()),
        };

        with_retry(&self.retry, events, || {
            self.executor.post_json("/api/upload/init", &body)
        })
        .await
    }

    /// 并行上传文件，同时上传的数量受 `parallel_uploads` 限制
    ///
    /// 任一文件失败后关闭信号量，尚未开始的文件不再上传，进行中的任务被中止
    async fn upload_files(
        &self,
        upload_path: &str,
        files: &[UploadFile],
        events: &mpsc::UnboundedSender<UploaderEvent>,
    ) -> AppResult<(u64, u64)> {
        let semaphore = Arc::new(Semaphore::new(self.parallel_uploads));
        let files_total = files.len() as u64;
        let bytes_total: u64 = files.iter().map(|f| f.size).sum();

        let mut tasks = JoinSet::new();
        for file in files.iter().cloned() {
            let semaphore = semaphore.clone();
            let executor = self.executor.clone();
            let retry = self.retry.clone();
            let events = events.clone();
            let upload_path = upload_path.to_string();

            tasks.spawn(async move {
                // 信号量已关闭：其他文件失败，放弃
                let Ok(_permit) = semaphore.clone().acquire_owned().await else {
                    return Ok(None);
                };
                let result = upload_one(&executor, &upload_path, &file, &retry, &events).await;
                if result.is_err() {
                    semaphore.close();
                }
                result.map(|_| Some(file))
            });
        }

        let mut files_uploaded = 0u64;
        let mut bytes_uploaded = 0u64;
        while let Some(joined) = tasks.join_next().await {
            let uploaded = joined
                .map_err(|e| AppError::Other(format!("上传任务执行失败: {}", e)))
                .and_then(|result| result);

            let file = match uploaded {
                Ok(Some(file)) => file,
                Ok(None) => continue,
                Err(e) => {
                    semaphore.close();
                    tasks.abort_all();
                    warn!("❌ 文件上传失败，取消剩余 {} 个上传任务: {}", tasks.len(), e);
                    return Err(e);
                }
            };

            files_uploaded += 1;
            bytes_uploaded += file.size;
            let _ = events.send(UploaderEvent::Progress(SdkProgress {
                phase: SdkPhase::Uploading,
                files_total,
                files_uploaded,
                bytes_total,
                bytes_uploaded,
                current_file: Some(file.relative_path),
                percent_complete: percent(bytes_uploaded, bytes_total, files_uploaded, files_total),
            }));
        }

        Ok((files_uploaded, bytes_uploaded))
    }
}

#[async_trait]
impl Uploader for SessionUploader {
    async fn upload_batch(
        &self,
        files: Vec<UploadFile>,
        request: &UploadRequest,
        events: mpsc::UnboundedSender<UploaderEvent>,
    ) -> AppResult<UploadReceipt> {
        if files.is_empty() {
            return Err(AppError::File(FileError::EmptyDirectory {
                path: request.root_path.clone(),
            }));
        }

        let files_total = files.len() as u64;
        let bytes_total: u64 = files.iter().map(|f| f.size).sum();
        let progress = |phase: SdkPhase, files_uploaded: u64, bytes_uploaded: u64| {
            UploaderEvent::Progress(SdkProgress {
                phase,
                files_total,
                files_uploaded,
                bytes_total,
                bytes_uploaded,
                current_file: None,
                percent_complete: percent(bytes_uploaded, bytes_total, files_uploaded, files_total),
            })
        };

        let _ = events.send(progress(SdkPhase::Scanning, 0, 0));

        // ========== 1. 初始化会话 ==========
        let session = self.init_session(request, &events).await?;
        let upload_path = proxied_upload_path(&session.upload_url)?;
        info!(
            "[会话 {}] 📤 会话已创建，开始上传 {} 个文件 ({} 字节)",
            session.session_id, files_total, bytes_total
        );
        debug!("[会话 {}] 上传地址: {}", session.session_id, upload_path);

        // ========== 2. 上传文件 ==========
        let (files_uploaded, bytes_uploaded) =
            self.upload_files(&upload_path, &files, &events).await?;

        // ========== 3. 触发处理 ==========
        let _ = events.send(progress(SdkPhase::Finalizing, files_uploaded, bytes_uploaded));
        let process_path = format!("/api/upload/{}/process", session.session_id);
        let process_request = ProcessRequest::default();
        let processed: ProcessResponse = with_retry(&self.retry, &events, || {
            self.executor.post_json(&process_path, &process_request)
        })
        .await?;
        debug!(
            "[会话 {}] 处理已触发: {}",
            processed.session_id, processed.status
        );

        // ========== 4. 等待会话完成 ==========
        let transport: Arc<dyn StatusTransport> = self.executor.clone();
        let client = UploadSessionClient::new(transport, session.session_id.clone());
        let status = client
            .poll_until_complete(
                &mut |status: &UploadStatus| {
                    let _ = events.send(UploaderEvent::Session(status.clone()));
                },
                self.poll_interval,
            )
            .await?;

        let batch_id = match status.batch_id.as_deref() {
            Some(id) => BatchId::parse(id)?,
            None => {
                error!("[会话 {}] ❌ {}", session.session_id, MISSING_BATCH_ID_MESSAGE);
                return Err(AppError::missing_result(MISSING_BATCH_ID_MESSAGE));
            }
        };

        let _ = events.send(progress(SdkPhase::Complete, files_uploaded, bytes_uploaded));
        info!(
            "[批次 {}] ✅ 上传完成: {} 个文件",
            batch_id.short(),
            files_uploaded
        );

        Ok(UploadReceipt {
            batch_id,
            files_uploaded,
            bytes_uploaded,
        })
    }
}

/// 上传单个文件（字段名 `files`，文件名为相对路径）
async fn upload_one(
    executor: &HttpExecutor,
    upload_path: &str,
    file: &UploadFile,
    retry: &RetryPolicy,
    events: &mpsc::UnboundedSender<UploaderEvent>,
) -> AppResult<UploadFilesResponse> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|e| AppError::file_read_failed(file.path.display().to_string(), e))?;

    with_retry(retry, events, || {
        let part = Part::bytes(bytes.clone()).file_name(file.relative_path.clone());
        let form = Form::new().part("files", part);
        executor.post_multipart(upload_path, form)
    })
    .await
}

/// 瞬时故障重试，并把重试 / 恢复转为结构化事件
async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    events: &mpsc::UnboundedSender<UploaderEvent>,
    fetch: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = AppResult<T>>,
{
    let mut retried = false;
    let result = fetch_with_retry_notify(fetch, policy, AppError::is_retryable, |attempt, err| {
        retried = true;
        warn!("⚠️ 上传遇到临时故障，第 {} 次重试: {}", attempt, err);
        let _ = events.send(UploaderEvent::Retrying {
            attempt,
            reason: err.to_string(),
        });
    })
    .await;

    if retried && result.is_ok() {
        let _ = events.send(UploaderEvent::Recovered);
    }
    result
}

fn percent(bytes_done: u64, bytes_total: u64, files_done: u64, files_total: u64) -> f64 {
    let ratio = if bytes_total > 0 {
        bytes_done as f64 / bytes_total as f64
    } else if files_total > 0 {
        files_done as f64 / files_total as f64
    } else {
        0.0
    };
    (ratio * 100.0).clamp(0.0, 100.0)
}
