//! 工作流事件与渲染出口
//!
//! 工作流只通过 `ProgressSink` 向外输出，不关心展示方式（终端日志、JSON 记录、测试收集）

use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::{BatchId, PhaseStatus, UnifiedProgress};
use crate::services::MonitorLog;
use crate::utils::logging::truncate_text;

/// 终态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalState {
    /// 处理完成
    Succeeded {
        batch_id: BatchId,
        root_pi: String,
        link: String,
    },
    /// 处理失败（可能附带部分结果链接）
    Failed {
        batch_id: Option<BatchId>,
        message: String,
        partial_link: Option<String>,
    },
    /// 批次不存在或已过期（仅恢复时出现）
    InvalidBatch { batch_id: String },
}

impl TerminalState {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalState::Succeeded { .. })
    }

    /// 结果链接（成功链接或部分结果链接）
    pub fn link(&self) -> Option<&str> {
        match self {
            TerminalState::Succeeded { link, .. } => Some(link),
            TerminalState::Failed { partial_link, .. } => partial_link.as_deref(),
            TerminalState::InvalidBatch { .. } => None,
        }
    }
}

/// 工作流向外输出的事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// 上游原始状态快照
    Snapshot { status: PhaseStatus },
    /// 统一进度
    Progress(UnifiedProgress),
    /// 从地址栏恢复批次
    Resuming { batch_id: BatchId },
    /// 等待批次进入处理队列
    QueueWaiting { batch_id: BatchId },
    /// 归档链接首次可用
    RootLink { root_pi: String, link: String },
    /// 临时故障，正在自动重试
    RetryWarning { message: String },
    /// 临时故障已恢复
    RetryCleared,
    /// 阶段切换（7 阶段展示）
    Stage { name: String, number: u8, of: u8 },
    /// 终态
    Finished { result: TerminalState },
}

impl WorkflowEvent {
    /// 事件名称（用于监控记录）
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::Snapshot { .. } => "snapshot",
            WorkflowEvent::Progress(_) => "progress",
            WorkflowEvent::Resuming { .. } => "resuming",
            WorkflowEvent::QueueWaiting { .. } => "queue_waiting",
            WorkflowEvent::RootLink { .. } => "root_link",
            WorkflowEvent::RetryWarning { .. } => "retry_warning",
            WorkflowEvent::RetryCleared => "retry_cleared",
            WorkflowEvent::Stage { .. } => "stage",
            WorkflowEvent::Finished { .. } => "finished",
        }
    }
}

/// 渲染出口
///
/// 只有执行工作流的那个任务会调用它
pub trait ProgressSink: Send {
    fn emit(&mut self, event: &WorkflowEvent);
}

/// 输出到 tracing 日志
#[derive(Debug, Default)]
pub struct TracingSink {
    last_percentage: Option<u64>,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for TracingSink {
    fn emit(&mut self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::Snapshot { .. } => {}
            WorkflowEvent::Progress(p) => {
                // 同一整数百分比只打印一次
                let rounded = p.percentage.floor() as u64;
                if self.last_percentage != Some(rounded) {
                    self.last_percentage = Some(rounded);
                    info!("📊 {:>5.1}% | {} ({})", p.percentage, p.description, p.phase);
                }
            }
            WorkflowEvent::Resuming { batch_id } => {
                info!("[批次 {}] 🔄 正在恢复，检查状态...", batch_id.short());
            }
            WorkflowEvent::QueueWaiting { batch_id } => {
                info!("[批次 {}] ⏳ 等待进入处理队列...", batch_id.short());
            }
            WorkflowEvent::RootLink { link, .. } => {
                info!("🔗 归档已可查看: {} （后台处理继续）", link);
            }
            WorkflowEvent::RetryWarning { message } => {
                warn!("⚠️ 临时故障: {}，自动重试中...", truncate_text(message, 120));
            }
            WorkflowEvent::RetryCleared => info!("✓ 临时故障已恢复"),
            WorkflowEvent::Stage { name, number, of } => {
                info!("📍 阶段 {}/{}: {}", number, of, name);
            }
            WorkflowEvent::Finished { result } => match result {
                TerminalState::Succeeded { link, .. } => info!("✅ 处理完成: {}", link),
                TerminalState::Failed {
                    message,
                    partial_link,
                    ..
                } => {
                    error!("❌ 上传失败: {}", message);
                    if let Some(link) = partial_link {
                        warn!("🔗 部分结果可查看: {}", link);
                    }
                }
                TerminalState::InvalidBatch { batch_id } => {
                    error!("❌ 批次不存在或已过期: {}", batch_id);
                }
            },
        }
    }
}

/// 收集所有事件（供调用方在结束后检查）
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<WorkflowEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    /// 按顺序取出所有进度百分比
    pub fn percentages(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::Progress(p) => Some(p.percentage),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.name() == name).count()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&mut self, event: &WorkflowEvent) {
        self.events.push(event.clone());
    }
}

/// 输出到日志并写入监控记录文件
#[derive(Debug)]
pub struct MonitorSink {
    console: TracingSink,
    log: MonitorLog,
}

impl MonitorSink {
    pub fn new(log: MonitorLog) -> Self {
        Self {
            console: TracingSink::new(),
            log,
        }
    }

    pub fn log(&self) -> &MonitorLog {
        &self.log
    }
}

impl ProgressSink for MonitorSink {
    fn emit(&mut self, event: &WorkflowEvent) {
        self.console.emit(event);

        let (phase, status) = match event {
            WorkflowEvent::Snapshot { status } => (status.kind(), Some(status.state_label())),
            WorkflowEvent::Progress(_) | WorkflowEvent::Stage { .. } => ("progress", None),
            _ => ("workflow", None),
        };

        if let Err(e) = self
            .log
            .record(phase, event.name(), status.as_deref(), event)
        {
            warn!("⚠️ 写入监控记录失败: {}", e);
        }

        // 终态时写盘
        if matches!(event, WorkflowEvent::Finished { .. }) {
            if let Err(e) = self.log.flush() {
                warn!("⚠️ 保存监控记录失败: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_sink_records_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MonitorSink::new(MonitorLog::create(dir.path()).unwrap());

        let status: crate::models::StatusResponse =
            serde_json::from_str(r#"{"stage":"preprocessing","phase":"tiff"}"#).unwrap();
        sink.emit(&WorkflowEvent::Snapshot {
            status: PhaseStatus::Unified(status),
        });
        sink.emit(&WorkflowEvent::RetryCleared);

        assert_eq!(sink.log().entries().len(), 2);
        assert_eq!(sink.log().unique_statuses().to_vec(), vec!["preprocessing"]);
        assert_eq!(sink.log().entries()[0].phase, "unified");
        assert_eq!(sink.log().entries()[0].data["status"]["kind"], "unified");
    }

    #[test]
    fn test_monitor_sink_flushes_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MonitorSink::new(MonitorLog::create(dir.path()).unwrap());
        let saved = |sink: &MonitorSink| -> serde_json::Value {
            serde_json::from_str(&std::fs::read_to_string(sink.log().path()).unwrap()).unwrap()
        };

        sink.emit(&WorkflowEvent::QueueWaiting {
            batch_id: BatchId::parse("B1").unwrap(),
        });
        assert_eq!(saved(&sink)["summary"]["totalLogs"], 0);

        sink.emit(&WorkflowEvent::Finished {
            result: TerminalState::InvalidBatch {
                batch_id: "B1".to_string(),
            },
        });
        let saved = saved(&sink);
        assert_eq!(saved["summary"]["totalLogs"], 2);
        assert_eq!(saved["logs"][1]["event"], "finished");
    }

    #[test]
    fn test_terminal_link() {
        let failed = TerminalState::Failed {
            batch_id: None,
            message: "boom".to_string(),
            partial_link: Some("https://arke.institute/P9".to_string()),
        };
        assert!(!failed.is_success());
        assert_eq!(failed.link(), Some("https://arke.institute/P9"));

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["type"], "failed");
    }
}
