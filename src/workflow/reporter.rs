//! 进度汇报
//!
//! 把各阶段的原始状态换算为统一进度后交给 `ProgressSink`，并负责：
//! - 百分比单调不减
//! - 阶段切换只通知一次
//! - 归档链接只展示一次
//! - 临时故障提示的显示与清除

use crate::config::Config;
use crate::models::{
    BatchId, IngestState, OrchestratorState, PhaseStatus, Stage, UnifiedProgress,
};
use crate::models::status::STAGE_COUNT;
use crate::services::ProgressTracker;
use crate::workflow::events::{ProgressSink, TerminalState, WorkflowEvent};

/// 进度汇报器
pub struct ProgressReporter<S> {
    sink: S,
    tracker: ProgressTracker,
    arke_url: String,
    current_stage: Option<Stage>,
    root_pi: Option<String>,
    retry_warning_active: bool,
}

impl<S: ProgressSink> ProgressReporter<S> {
    pub fn new(sink: S, config: &Config) -> Self {
        Self {
            sink,
            tracker: ProgressTracker::new(),
            arke_url: config.arke_institute_url.trim_end_matches('/').to_string(),
            current_stage: None,
            root_pi: None,
            retry_warning_active: false,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// 已展示过的 root_pi
    pub fn root_pi(&self) -> Option<&str> {
        self.root_pi.as_deref()
    }

    pub fn percentage(&self) -> f64 {
        self.tracker.percentage()
    }

    /// 归档链接
    pub fn link_for(&self, root_pi: &str) -> String {
        format!("{}/{}", self.arke_url, root_pi)
    }

    /// 开始新的一次运行（进度、阶段、链接全部重置）
    pub fn reset(&mut self) {
        self.tracker = ProgressTracker::new();
        self.current_stage = None;
        self.root_pi = None;
        self.retry_warning_active = false;
    }

    /// 处理一次状态快照
    ///
    /// # 返回
    /// 应用单调约束后的统一进度
    pub fn observe(&mut self, status: &PhaseStatus) -> UnifiedProgress {
        self.sink.emit(&WorkflowEvent::Snapshot {
            status: status.clone(),
        });

        if matches!(status, PhaseStatus::Sdk(_)) {
            self.retry_cleared();
        }

        let stage = stage_of(status);
        if self.current_stage != Some(stage) {
            self.current_stage = Some(stage);
            self.sink.emit(&WorkflowEvent::Stage {
                name: stage.display_name().to_string(),
                number: stage.number(),
                of: STAGE_COUNT,
            });
        }

        let progress = self.tracker.observe(status);
        self.sink.emit(&WorkflowEvent::Progress(progress.clone()));

        if let Some(root_pi) = root_pi_of(status) {
            self.show_root_link(&root_pi);
        }

        progress
    }

    /// 展示归档链接（每次运行只展示一次）
    ///
    /// # 返回
    /// 本次是否真的展示了
    pub fn show_root_link(&mut self, root_pi: &str) -> bool {
        if self.root_pi.is_some() {
            return false;
        }
        let link = self.link_for(root_pi);
        self.root_pi = Some(root_pi.to_string());
        self.sink.emit(&WorkflowEvent::RootLink {
            root_pi: root_pi.to_string(),
            link,
        });
        true
    }

    pub fn resuming(&mut self, batch_id: &BatchId) {
        self.sink.emit(&WorkflowEvent::Resuming {
            batch_id: batch_id.clone(),
        });
    }

    pub fn queue_waiting(&mut self, batch_id: &BatchId) {
        self.sink.emit(&WorkflowEvent::QueueWaiting {
            batch_id: batch_id.clone(),
        });
    }

    pub fn retry_warning(&mut self, message: impl Into<String>) {
        self.retry_warning_active = true;
        self.sink.emit(&WorkflowEvent::RetryWarning {
            message: message.into(),
        });
    }

    /// 清除临时故障提示（未显示时不发事件）
    pub fn retry_cleared(&mut self) {
        if self.retry_warning_active {
            self.retry_warning_active = false;
            self.sink.emit(&WorkflowEvent::RetryCleared);
        }
    }

    /// 发出终态并原样返回
    pub fn finish(&mut self, result: TerminalState) -> TerminalState {
        self.retry_cleared();
        self.sink.emit(&WorkflowEvent::Finished {
            result: result.clone(),
        });
        result
    }
}

/// 状态在 7 阶段展示中的位置
fn stage_of(status: &PhaseStatus) -> Stage {
    match status {
        PhaseStatus::Sdk(_) | PhaseStatus::Upload(_) => Stage::Ingest,
        PhaseStatus::Ingest(s) => match s.status {
            IngestState::Uploading => Stage::Ingest,
            IngestState::Preprocessing => Stage::Preprocessing,
            IngestState::Enqueued | IngestState::Processing | IngestState::Completed => {
                Stage::QueueOrchestrator
            }
            IngestState::Failed => Stage::Error,
        },
        PhaseStatus::Orchestrator(s) => match s.status {
            OrchestratorState::Done => Stage::Completed,
            OrchestratorState::Error => Stage::Error,
            _ => Stage::Orchestrator,
        },
        PhaseStatus::Unified(s) => s.stage,
    }
}

fn root_pi_of(status: &PhaseStatus) -> Option<String> {
    match status {
        PhaseStatus::Orchestrator(s) => s.root_pi().map(str::to_string),
        PhaseStatus::Unified(s) => s.root_pi().map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrchestratorProgress, OrchestratorStatus, SdkPhase, SdkProgress};
    use crate::workflow::events::RecordingSink;

    fn orch(status: OrchestratorState, root_pi: Option<&str>) -> PhaseStatus {
        PhaseStatus::Orchestrator(OrchestratorStatus {
            status,
            progress: OrchestratorProgress {
                directories_total: 2,
                ..Default::default()
            },
            root_pi: root_pi.map(str::to_string),
            error: None,
            batch_id: None,
            started_at: None,
            updated_at: None,
            completed_at: None,
        })
    }

    fn sdk(percent: f64) -> PhaseStatus {
        PhaseStatus::Sdk(SdkProgress {
            phase: SdkPhase::Uploading,
            files_total: 2,
            files_uploaded: 1,
            bytes_total: 10,
            bytes_uploaded: 5,
            current_file: None,
            percent_complete: percent,
        })
    }

    fn reporter() -> ProgressReporter<RecordingSink> {
        ProgressReporter::new(RecordingSink::new(), &Config::default())
    }

    #[test]
    fn test_root_link_shown_once() {
        let mut reporter = reporter();
        reporter.observe(&orch(OrchestratorState::Ingested, None));
        reporter.observe(&orch(OrchestratorState::OcrInProgress, Some("P1")));
        reporter.observe(&orch(OrchestratorState::Description, Some("P1")));

        assert_eq!(reporter.sink().count("root_link"), 1);
        assert_eq!(reporter.root_pi(), Some("P1"));
        assert!(reporter.sink().events().contains(&WorkflowEvent::RootLink {
            root_pi: "P1".to_string(),
            link: "https://arke.institute/P1".to_string(),
        }));
    }

    #[test]
    fn test_stage_changes_emitted_once() {
        let mut reporter = reporter();
        reporter.observe(&sdk(10.0));
        reporter.observe(&sdk(50.0));
        reporter.observe(&orch(OrchestratorState::Ingested, None));
        reporter.observe(&orch(OrchestratorState::OcrInProgress, None));

        let stages: Vec<_> = reporter
            .sink()
            .events()
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::Stage { number, .. } => Some(*number),
                _ => None,
            })
            .collect();
        assert_eq!(stages, vec![1, 5]);
    }

    #[test]
    fn test_retry_warning_cleared_by_upload_progress() {
        let mut reporter = reporter();
        reporter.retry_cleared();
        assert_eq!(reporter.sink().count("retry_cleared"), 0);

        reporter.retry_warning("Upload server busy");
        reporter.observe(&sdk(20.0));
        reporter.observe(&sdk(30.0));

        assert_eq!(reporter.sink().count("retry_warning"), 1);
        assert_eq!(reporter.sink().count("retry_cleared"), 1);
    }

    #[test]
    fn test_reset_allows_new_link() {
        let mut reporter = reporter();
        assert!(reporter.show_root_link("P1"));
        assert!(!reporter.show_root_link("P2"));

        reporter.reset();
        assert_eq!(reporter.percentage(), 0.0);
        assert!(reporter.show_root_link("P2"));
    }
}
