//! 业务能力层
//!
//! - `poller` - 退避重试与固定间隔轮询
//! - `progress` - 各阶段状态到统一进度的换算
//! - `uploader` - 上传能力（会话 API 实现）
//! - `monitor_log` - 运行过程的 JSON 记录

pub mod monitor_log;
pub mod poller;
pub mod progress;
pub mod uploader;

pub use monitor_log::MonitorLog;
pub use poller::{fetch_with_retry, poll_until, PollOutcome, RetryPolicy};
pub use progress::{unify, ProgressTracker};
pub use uploader::{
    scan_directory, SessionUploader, UploadFile, UploadReceipt, UploadRequest, Uploader,
    UploaderEvent,
};
