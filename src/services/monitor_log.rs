//! 监控记录
//!
//! 把一次上传运行中观察到的每个状态快照与事件写入
//! `<dir>/upload-<时间戳>.json`。记录先缓存在内存中，由 `flush` 写盘

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::services::progress::PROGRESS_TABLE_VERSION;

/// 单条记录
#[derive(Debug, Clone, Serialize)]
pub struct MonitorEntry {
    pub timestamp: String,
    pub phase: String,
    pub event: String,
    pub data: JsonValue,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MonitorSummary<'a> {
    total_logs: usize,
    phases: &'a BTreeMap<String, usize>,
    progress_table_version: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MonitorFile<'a> {
    logs: &'a [MonitorEntry],
    unique_statuses: &'a [String],
    summary: MonitorSummary<'a>,
}

/// 监控记录器
#[derive(Debug)]
pub struct MonitorLog {
    path: PathBuf,
    entries: Vec<MonitorEntry>,
    unique_statuses: Vec<String>,
    phase_counts: BTreeMap<String, usize>,
}

impl MonitorLog {
    /// 在 `dir` 下创建新的记录文件
    ///
    /// # 参数
    /// - `dir`: 输出目录（不存在时创建）
    pub fn create(dir: &Path) -> AppResult<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;

        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S-%3f");
        let log = Self {
            path: dir.join(format!("upload-{}.json", timestamp)),
            entries: Vec::new(),
            unique_statuses: Vec::new(),
            phase_counts: BTreeMap::new(),
        };
        log.save()?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[MonitorEntry] {
        &self.entries
    }

    pub fn unique_statuses(&self) -> &[String] {
        &self.unique_statuses
    }

    /// 记录一条事件（只写入内存）
    ///
    /// # 参数
    /// - `phase`: 所属阶段（upload / ingest / orchestrator / status / workflow）
    /// - `event`: 事件描述
    /// - `status`: 上游状态值（会被加入去重后的状态列表）
    /// - `data`: 任意可序列化的附加数据
    pub fn record<T: Serialize>(
        &mut self,
        phase: &str,
        event: &str,
        status: Option<&str>,
        data: &T,
    ) -> AppResult<()> {
        let data = serde_json::to_value(data)?;

        self.entries.push(MonitorEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            phase: phase.to_string(),
            event: event.to_string(),
            data,
        });
        *self.phase_counts.entry(phase.to_string()).or_insert(0) += 1;

        if let Some(status) = status {
            if !self.unique_statuses.iter().any(|s| s == status) {
                self.unique_statuses.push(status.to_string());
            }
        }

        Ok(())
    }

    /// 把当前全部记录写入文件
    pub fn flush(&self) -> AppResult<()> {
        self.save()
    }

    fn save(&self) -> AppResult<()> {
        let file = MonitorFile {
            logs: &self.entries,
            unique_statuses: &self.unique_statuses,
            summary: MonitorSummary {
                total_logs: self.entries.len(),
                phases: &self.phase_counts,
                progress_table_version: PROGRESS_TABLE_VERSION,
            },
        };
        let content = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, content)
            .map_err(|e| AppError::file_write_failed(self.path.display().to_string(), e))
    }
}
