//! 进度换算
//!
//! 把各阶段各自的状态映射到同一个 0-100% 刻度上：
//! 上传 0-25%，ingest 队列 25-28%，orchestrator 28-100%
//!
//! 换算表是有版本的常量，修改它属于兼容性变更

use crate::models::{
    IngestBatchStatus, IngestState, OrchestratorState, OrchestratorStatus, PhaseStatus, SdkPhase,
    SdkProgress, Stage, StatusResponse, UnifiedProgress, UploadStatus,
};

/// 换算表版本
pub const PROGRESS_TABLE_VERSION: u32 = 1;

/// 上传阶段所占区间
const UPLOAD_RANGE: f64 = 25.0;

/// 一个状态在总刻度上的区间
#[derive(Debug, Clone, Copy)]
struct Band {
    base: f64,
    range: f64,
    description: &'static str,
}

impl Band {
    const fn new(base: f64, range: f64, description: &'static str) -> Self {
        Self {
            base,
            range,
            description,
        }
    }

    /// `base + done/total * range`，限制在 `[base, base + range]`
    ///
    /// total 或 done 为 0 时停在 base
    fn fill(&self, done: f64, total: f64) -> f64 {
        if total <= 0.0 || done <= 0.0 {
            return self.base;
        }
        (self.base + done / total * self.range).clamp(self.base, self.base + self.range)
    }
}

/// 失败状态：换算结果为 0，由 ProgressTracker 保持最高值
const HOLD: Band = Band::new(0.0, 0.0, "");

fn ingest_band(state: IngestState) -> Band {
    match state {
        IngestState::Uploading => Band::new(25.0, 2.0, "Waiting for upload to finish"),
        IngestState::Preprocessing => Band::new(27.0, 1.0, "Preprocessing files"),
        IngestState::Enqueued | IngestState::Processing | IngestState::Completed => {
            Band::new(28.0, 0.0, "Queued for processing")
        }
        IngestState::Failed => Band { description: "Ingest failed", ..HOLD },
    }
}

fn orchestrator_band(state: OrchestratorState) -> Band {
    match state {
        OrchestratorState::Ingested => Band::new(28.0, 7.0, "Discovering files"),
        OrchestratorState::OcrInProgress => Band::new(35.0, 25.0, "Processing OCR"),
        OrchestratorState::PinaxExtraction => Band::new(60.0, 20.0, "Extracting metadata"),
        OrchestratorState::Description => Band::new(80.0, 15.0, "Generating descriptions"),
        OrchestratorState::Done => Band::new(100.0, 0.0, "Complete"),
        OrchestratorState::Error => Band { description: "Error occurred", ..HOLD },
    }
}

fn stage_band(stage: Stage) -> Band {
    match stage {
        Stage::Ingest => Band::new(0.0, UPLOAD_RANGE, "Uploading files"),
        Stage::QueuePreprocessing => Band::new(25.0, 0.0, "Queued for preprocessing"),
        Stage::Preprocessing => Band::new(26.0, 2.0, "Preprocessing files"),
        Stage::QueueOrchestrator => Band::new(28.0, 0.0, "Queued for processing"),
        Stage::Orchestrator => Band::new(35.0, 0.0, "Processing"),
        Stage::Completed => Band::new(100.0, 0.0, "Complete"),
        Stage::Error => Band { description: "Error occurred", ..HOLD },
    }
}

/// 换算任意阶段状态
pub fn unify(status: &PhaseStatus) -> UnifiedProgress {
    match status {
        PhaseStatus::Sdk(progress) => unify_sdk(progress),
        PhaseStatus::Upload(status) => unify_upload(status),
        PhaseStatus::Ingest(status) => unify_ingest(status),
        PhaseStatus::Orchestrator(status) => unify_orchestrator(status),
        PhaseStatus::Unified(status) => unify_stage(status),
    }
}

/// 上传客户端进度（0-25%）
pub fn unify_sdk(progress: &SdkProgress) -> UnifiedProgress {
    let description = match progress.phase {
        SdkPhase::Scanning => "Scanning files",
        SdkPhase::Uploading => "Uploading files",
        SdkPhase::Finalizing => "Finalizing upload",
        SdkPhase::Complete => "Upload complete",
    };
    let band = Band::new(0.0, UPLOAD_RANGE, description);

    finish(
        band.fill(progress.percent_complete, 100.0),
        progress.phase.as_str(),
        band.description,
    )
}

/// 上传会话进度（0-25%）
pub fn unify_upload(status: &UploadStatus) -> UnifiedProgress {
    let band = Band::new(0.0, UPLOAD_RANGE, "Uploading files");
    let percent = status
        .progress
        .as_ref()
        .map(|p| p.percent_complete)
        .unwrap_or(0.0);

    finish(
        band.fill(percent, 100.0),
        status.status.as_str(),
        band.description,
    )
}

/// Ingest 批次进度（25-28%）
pub fn unify_ingest(status: &IngestBatchStatus) -> UnifiedProgress {
    let band = ingest_band(status.status);
    let percentage = match status.status {
        IngestState::Uploading => {
            band.fill(status.files_uploaded as f64, status.file_count as f64)
        }
        _ => band.base,
    };

    finish(percentage, status.status.as_str(), band.description)
}

/// Orchestrator 批次进度（28-100%）
pub fn unify_orchestrator(status: &OrchestratorStatus) -> UnifiedProgress {
    let band = orchestrator_band(status.status);
    let p = &status.progress;

    let completed = match status.status {
        OrchestratorState::Ingested => p.directories_snapshot_published,
        OrchestratorState::OcrInProgress => p.directories_ocr_complete,
        OrchestratorState::PinaxExtraction => p.directories_pinax_complete,
        OrchestratorState::Description => p.directories_description_complete,
        OrchestratorState::Done | OrchestratorState::Error => 0,
    };

    finish(
        band.fill(completed as f64, p.directories_total as f64),
        status.status.as_str(),
        band.description,
    )
}

/// 统一状态接口的阶段进度
pub fn unify_stage(status: &StatusResponse) -> UnifiedProgress {
    let band = stage_band(status.stage);
    finish(band.base, status.stage.as_str(), band.description)
}

fn finish(percentage: f64, phase: &str, description: &str) -> UnifiedProgress {
    UnifiedProgress {
        percentage: percentage.clamp(0.0, 100.0),
        phase: phase.to_string(),
        description: description.to_string(),
    }
}

/// 单调进度跟踪
///
/// 整个工作流内百分比只增不减；失败状态保持已达到的最高值
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    high_water: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 换算并保证不回退
    pub fn observe(&mut self, status: &PhaseStatus) -> UnifiedProgress {
        let progress = unify(status);
        self.clamp(progress)
    }

    /// 对已换算的进度应用单调约束
    pub fn clamp(&mut self, mut progress: UnifiedProgress) -> UnifiedProgress {
        if progress.percentage < self.high_water {
            progress.percentage = self.high_water;
        } else {
            self.high_water = progress.percentage;
        }
        progress
    }

    pub fn percentage(&self) -> f64 {
        self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrchestratorProgress;

    fn orch(status: OrchestratorState, total: u64, done: u64) -> PhaseStatus {
        PhaseStatus::Orchestrator(OrchestratorStatus {
            status,
            progress: OrchestratorProgress {
                directories_total: total,
                directories_snapshot_published: done,
                directories_ocr_complete: done,
                directories_pinax_complete: done,
                directories_description_complete: done,
            },
            root_pi: None,
            error: None,
            batch_id: None,
            started_at: None,
            updated_at: None,
            completed_at: None,
        })
    }

    fn ingest(status: IngestState, uploaded: u64, count: u64) -> PhaseStatus {
        PhaseStatus::Ingest(IngestBatchStatus {
            status,
            files_uploaded: uploaded,
            file_count: count,
            total_bytes_uploaded: 0,
            total_size: 0,
            batch_id: None,
            session_id: None,
            uploader: None,
            root_path: None,
            parent_pi: None,
            enqueued_at: None,
        })
    }

    fn sdk(phase: SdkPhase, percent: f64) -> PhaseStatus {
        PhaseStatus::Sdk(SdkProgress {
            phase,
            files_total: 10,
            files_uploaded: 0,
            bytes_total: 0,
            bytes_uploaded: 0,
            current_file: None,
            percent_complete: percent,
        })
    }

    fn stage(stage: Stage) -> PhaseStatus {
        PhaseStatus::Unified(StatusResponse {
            batch_id: None,
            stage,
            phase: String::new(),
            results: None,
            error: None,
            started_at: None,
            updated_at: None,
            completed_at: None,
        })
    }

    #[test]
    fn test_orchestrator_bands() {
        let ocr_half = unify(&orch(OrchestratorState::OcrInProgress, 4, 2));
        assert_eq!(ocr_half.percentage, 47.5);
        assert_eq!(ocr_half.phase, "OCR_IN_PROGRESS");
        assert_eq!(ocr_half.description, "Processing OCR");

        assert_eq!(unify(&orch(OrchestratorState::Ingested, 4, 4)).percentage, 35.0);
        assert_eq!(unify(&orch(OrchestratorState::Description, 4, 4)).percentage, 95.0);
        assert_eq!(unify(&orch(OrchestratorState::Done, 4, 4)).percentage, 100.0);
    }

    #[test]
    fn test_zero_units_pin_to_base() {
        assert_eq!(unify(&orch(OrchestratorState::PinaxExtraction, 0, 0)).percentage, 60.0);
        assert_eq!(unify(&orch(OrchestratorState::PinaxExtraction, 5, 0)).percentage, 60.0);
        assert_eq!(unify(&ingest(IngestState::Uploading, 0, 0)).percentage, 25.0);
    }

    #[test]
    fn test_overshoot_is_clamped_to_band() {
        assert_eq!(unify(&orch(OrchestratorState::OcrInProgress, 2, 9)).percentage, 60.0);
        assert_eq!(unify(&sdk(SdkPhase::Uploading, 250.0)).percentage, 25.0);
        assert_eq!(unify(&ingest(IngestState::Uploading, 3, 2)).percentage, 27.0);
    }

    #[test]
    fn test_sdk_descriptions() {
        let p = unify(&sdk(SdkPhase::Finalizing, 50.0));
        assert_eq!(p.percentage, 12.5);
        assert_eq!(p.description, "Finalizing upload");
        assert_eq!(unify(&sdk(SdkPhase::Complete, 100.0)).description, "Upload complete");
    }

    #[test]
    fn test_unified_stages() {
        assert_eq!(unify(&stage(Stage::QueueOrchestrator)).percentage, 28.0);
        assert_eq!(unify(&stage(Stage::Orchestrator)).description, "Processing");
        assert_eq!(unify(&stage(Stage::Completed)).percentage, 100.0);
        assert_eq!(unify(&stage(Stage::Error)).percentage, 0.0);
    }

    #[test]
    fn test_tracker_never_decreases() {
        let sequence = vec![
            sdk(SdkPhase::Scanning, 0.0),
            sdk(SdkPhase::Uploading, 40.0),
            sdk(SdkPhase::Complete, 100.0),
            ingest(IngestState::Uploading, 1, 4),
            ingest(IngestState::Preprocessing, 4, 4),
            ingest(IngestState::Enqueued, 4, 4),
            orch(OrchestratorState::Ingested, 4, 0),
            orch(OrchestratorState::OcrInProgress, 4, 3),
            orch(OrchestratorState::Error, 4, 3),
            stage(Stage::Orchestrator),
            orch(OrchestratorState::Done, 4, 4),
        ];

        let mut tracker = ProgressTracker::new();
        let mut last = 0.0;
        for status in &sequence {
            let p = tracker.observe(status);
            assert!(p.percentage >= last, "{} < {}", p.percentage, last);
            last = p.percentage;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn test_tracker_holds_on_error() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(&orch(OrchestratorState::PinaxExtraction, 4, 2));
        let p = tracker.observe(&orch(OrchestratorState::Error, 4, 2));
        assert_eq!(p.percentage, 70.0);
        assert_eq!(p.description, "Error occurred");
    }
}
