//! 应用入口 - 负责组装依赖并执行各个子命令

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::api;
use crate::clients::StatusClient;
use crate::config::Config;
use crate::infrastructure::{HttpExecutor, StatusTransport, UrlStateManager};
use crate::models::{BatchId, ProcessingOptions};
use crate::orchestrator::UploadWorkflow;
use crate::services::{scan_directory, MonitorLog, SessionUploader, UploadRequest, Uploader};
use crate::utils::logging::{log_startup, log_workflow_start, print_final_result};
use crate::workflow::{MonitorSink, TerminalState};

/// 上传表单参数
#[derive(Debug, Clone)]
pub struct UploadArgs {
    pub dir: PathBuf,
    pub uploader: String,
    pub institution: String,
    pub parent_pi: Option<String>,
}

impl UploadArgs {
    /// 构建上传请求
    ///
    /// 未指定 parent_pi 时以机构名作为根路径
    pub fn to_request(&self) -> UploadRequest {
        let parent_pi = self
            .parent_pi
            .as_deref()
            .map(str::trim)
            .filter(|pi| !pi.is_empty())
            .map(str::to_string);

        let root_path = match parent_pi {
            Some(_) => "/".to_string(),
            None => format!("/{}", self.institution.trim()),
        };

        UploadRequest {
            uploader: self.uploader.trim().to_string(),
            root_path,
            parent_pi,
            metadata: Some(serde_json::json!({ "institution": self.institution.trim() })),
            processing: ProcessingOptions::default(),
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    executor: Arc<HttpExecutor>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config, command: &str) -> Result<Self> {
        log_startup(&config, command);

        let executor = Arc::new(
            HttpExecutor::from_config(&config).context("无法创建 HTTP 客户端")?,
        );

        Ok(Self { config, executor })
    }

    /// 启动边缘服务
    pub async fn serve(self) -> Result<()> {
        api::serve(self.config).await.context("边缘服务启动失败")
    }

    /// 上传目录并监控到终态
    pub async fn upload(&self, args: UploadArgs) -> Result<()> {
        if args.uploader.trim().is_empty() {
            bail!("请填写上传者姓名 (--uploader)");
        }
        if args.institution.trim().is_empty() {
            bail!("请填写机构名称 (--institution)");
        }

        let files = scan_directory(&args.dir)
            .with_context(|| format!("无法读取上传目录: {}", args.dir.display()))?;
        let total_bytes = files.iter().map(|f| f.size).sum();
        log_workflow_start(&args.dir, files.len(), total_bytes);

        let url_state = UrlStateManager::from_location(&self.config.edge_base_url)?;
        let mut workflow = self.workflow(url_state)?;

        let result = workflow.submit(files, args.to_request()).await?;
        self.finish(workflow, result)
    }

    /// 恢复监控
    ///
    /// # 参数
    /// - `target`: 批次 ID 或带 `#batchId=` 的分享链接
    pub async fn resume(&self, target: &str) -> Result<()> {
        let url_state = if target.contains("://") {
            UrlStateManager::from_location(target)
                .with_context(|| format!("无法解析链接: {}", target))?
        } else {
            UrlStateManager::from_location(&self.config.edge_base_url)?
        };

        let mut workflow = self.workflow(url_state)?;
        let result = if target.contains("://") {
            match workflow.resume_from_url().await? {
                Some(result) => result,
                None => bail!("链接中没有批次 ID: {}", target),
            }
        } else {
            workflow.resume(target).await?
        };

        self.finish(workflow, result)
    }

    /// 下载批次日志
    pub async fn download_logs(&self, batch_id: &str, out: Option<&Path>) -> Result<PathBuf> {
        let batch_id = BatchId::parse(batch_id)?;
        let transport: Arc<dyn StatusTransport> = self.executor.clone();
        let client = StatusClient::new(transport, batch_id, &self.config);

        let dir = out
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&self.config.output_log_dir));
        let path = client.download_logs(&dir).await?;
        info!("📥 日志已保存至: {}", path.display());
        Ok(path)
    }

    fn workflow(&self, url_state: UrlStateManager) -> Result<UploadWorkflow<MonitorSink>> {
        let monitor_log = MonitorLog::create(Path::new(&self.config.output_log_dir))
            .context("无法创建监控记录")?;
        let uploader: Arc<dyn Uploader> =
            Arc::new(SessionUploader::new(self.executor.clone(), &self.config));
        let transport: Arc<dyn StatusTransport> = self.executor.clone();

        Ok(UploadWorkflow::new(
            self.config.clone(),
            transport,
            uploader,
            url_state,
            MonitorSink::new(monitor_log),
        ))
    }

    fn finish(&self, workflow: UploadWorkflow<MonitorSink>, result: TerminalState) -> Result<()> {
        let shared_link = workflow.url_state().current_url().to_string();
        let sink = workflow.into_sink();
        print_final_result(&result, Some(sink.log().path()));

        if result.is_success() {
            return Ok(());
        }
        if !matches!(result, TerminalState::InvalidBatch { .. }) {
            info!("💡 稍后可用此链接继续查看: {}", shared_link);
        }
        bail!("上传未成功完成")
    }
}
