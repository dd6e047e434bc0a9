//! 上传阶段
//!
//! 调用上传能力，同时把它发出的结构化事件转为进度与临时故障提示

use tokio::sync::mpsc;
use tracing::info;

use crate::error::AppResult;
use crate::models::PhaseStatus;
use crate::services::{UploadFile, UploadReceipt, UploadRequest, Uploader, UploaderEvent};
use crate::workflow::events::ProgressSink;
use crate::workflow::reporter::ProgressReporter;

/// 上传阶段
pub struct UploadPhase;

impl UploadPhase {
    /// 执行上传
    ///
    /// # 参数
    /// - `uploader`: 上传能力
    /// - `files`: 待上传文件
    /// - `request`: 上传者、根路径等
    /// - `reporter`: 进度汇报
    ///
    /// # 返回
    /// 上传结果（含批次 ID）
    pub async fn execute<S: ProgressSink>(
        &self,
        uploader: &dyn Uploader,
        files: Vec<UploadFile>,
        request: &UploadRequest,
        reporter: &mut ProgressReporter<S>,
    ) -> AppResult<UploadReceipt> {
        let total_bytes: u64 = files.iter().map(|f| f.size).sum();
        info!(
            "📤 开始上传 {} 个文件 ({:.1} MB) → {}",
            files.len(),
            total_bytes as f64 / 1024.0 / 1024.0,
            request.root_path
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut upload = uploader.upload_batch(files, request, tx);

        let result = loop {
            tokio::select! {
                biased;
                Some(event) = rx.recv() => handle_event(event, reporter),
                result = &mut upload => break result,
            }
        };

        // 上传结束前已发出但尚未处理的事件
        while let Ok(event) = rx.try_recv() {
            handle_event(event, reporter);
        }

        let receipt = result?;
        info!(
            "[批次 {}] ✓ 上传完成: {} 个文件, {} 字节",
            receipt.batch_id.short(),
            receipt.files_uploaded,
            receipt.bytes_uploaded
        );
        Ok(receipt)
    }
}

fn handle_event<S: ProgressSink>(event: UploaderEvent, reporter: &mut ProgressReporter<S>) {
    match event {
        UploaderEvent::Progress(progress) => {
            reporter.observe(&PhaseStatus::Sdk(progress));
        }
        UploaderEvent::Retrying { attempt, reason } => {
            reporter.retry_warning(format!(
                "Upload server busy (attempt {}): {}",
                attempt, reason
            ));
        }
        UploaderEvent::Recovered => reporter.retry_cleared(),
        UploaderEvent::Session(status) => {
            reporter.observe(&PhaseStatus::Upload(status));
        }
    }
}
