//! 流程层
//!
//! 定义"一个批次"从上传到拿到归档链接的各个阶段，只依赖 clients 与 services

pub mod batch_ctx;
pub mod events;
pub mod ingest_phase;
pub mod orchestrator_phase;
pub mod reporter;
pub mod status_phase;
pub mod upload_phase;

pub use batch_ctx::BatchCtx;
pub use events::{
    MonitorSink, ProgressSink, RecordingSink, TerminalState, TracingSink, WorkflowEvent,
};
pub use ingest_phase::IngestPhase;
pub use orchestrator_phase::{OrchestratorPhase, MISSING_ROOT_PI_MESSAGE};
pub use reporter::ProgressReporter;
pub use status_phase::StatusPhase;
pub use upload_phase::UploadPhase;
