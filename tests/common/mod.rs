//! 集成测试共用的假上游

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use upload_workflow::error::{AppError, AppResult};
use upload_workflow::infrastructure::{StatusTransport, UrlStateManager};
use upload_workflow::models::{BatchId, ProcessingOptions, SdkPhase, SdkProgress};
use upload_workflow::services::{UploadFile, UploadReceipt, UploadRequest, Uploader, UploaderEvent};
use upload_workflow::workflow::RecordingSink;
use upload_workflow::{Config, UploadWorkflow};

pub const EDGE: &str = "http://127.0.0.1:8787/";

/// 一次预设响应
#[derive(Clone)]
#[allow(dead_code)]
pub enum Reply {
    Json(String),
    Status(u16, String),
}

#[allow(dead_code)]
pub fn json(body: &str) -> Reply {
    Reply::Json(body.to_string())
}

/// 按路径依次返回预设响应；最后一个响应会一直重复，未预设的路径返回 404
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, path: &str, replies: Vec<Reply>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(path.to_string(), replies.into());
        self
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl StatusTransport for FakeTransport {
    async fn get_text(&self, path: &str) -> AppResult<String> {
        self.calls.lock().unwrap().push(path.to_string());

        let next = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(path) {
                Some(q) if q.len() > 1 => q.pop_front(),
                Some(q) => q.front().cloned(),
                None => None,
            }
        };

        match next {
            Some(Reply::Json(body)) => Ok(body),
            Some(Reply::Status(code, body)) => Err(AppError::http_status(path, code, body)),
            None => Err(AppError::http_status(path, 404, r#"{"error":"Not found"}"#)),
        }
    }
}

/// 发出 0% / 50% / 100% 三次进度后返回固定批次
pub struct FakeUploader {
    pub batch_id: Option<&'static str>,
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload_batch(
        &self,
        files: Vec<UploadFile>,
        _request: &UploadRequest,
        events: mpsc::UnboundedSender<UploaderEvent>,
    ) -> AppResult<UploadReceipt> {
        let total = files.len() as u64;
        for (phase, percent) in [
            (SdkPhase::Scanning, 0.0),
            (SdkPhase::Uploading, 50.0),
            (SdkPhase::Complete, 100.0),
        ] {
            let _ = events.send(UploaderEvent::Progress(SdkProgress {
                phase,
                files_total: total,
                files_uploaded: (total as f64 * percent / 100.0) as u64,
                bytes_total: total * 10,
                bytes_uploaded: (total as f64 * percent / 10.0) as u64,
                current_file: None,
                percent_complete: percent,
            }));
        }

        match self.batch_id {
            Some(id) => Ok(UploadReceipt {
                batch_id: BatchId::parse(id)?,
                files_uploaded: total,
                bytes_uploaded: total * 10,
            }),
            None => Err(AppError::processing_failed("Upload failed: storage unavailable")),
        }
    }
}

#[allow(dead_code)]
pub fn files() -> Vec<UploadFile> {
    (1..=4)
        .map(|i| UploadFile {
            path: format!("/tmp/box/page-{}.tiff", i).into(),
            relative_path: format!("page-{}.tiff", i),
            size: 10,
        })
        .collect()
}

#[allow(dead_code)]
pub fn request() -> UploadRequest {
    UploadRequest {
        uploader: "tester".to_string(),
        root_path: "/Test Archive".to_string(),
        parent_pi: None,
        metadata: None,
        processing: ProcessingOptions::default(),
    }
}

#[allow(dead_code)]
pub fn workflow(
    config: Config,
    transport: Arc<FakeTransport>,
    batch_id: Option<&'static str>,
    location: &str,
) -> UploadWorkflow<RecordingSink> {
    UploadWorkflow::new(
        config,
        transport,
        Arc::new(FakeUploader { batch_id }),
        UrlStateManager::from_location(location).unwrap(),
        RecordingSink::new(),
    )
}
