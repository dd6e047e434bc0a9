//! 批次标识
//!
//! 上传阶段生成的唯一关联键，贯穿后续所有阶段，也是唯一写入地址栏的状态

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::{AppError, AppResult, WorkflowError};

/// 批次 ID（实际为 ULID 形态的字符串）
///
/// 只允许 URL 安全字符 `[A-Za-z0-9_-]`，一旦创建不可修改
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchId(String);

impl BatchId {
    /// 解析并校验批次 ID
    pub fn parse(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if !valid {
            return Err(AppError::Workflow(WorkflowError::InvalidBatchId { value }));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 日志中使用的短格式（前 8 位）
    pub fn short(&self) -> String {
        if self.0.chars().count() > 8 {
            format!("{}...", self.0.chars().take(8).collect::<String>())
        } else {
            self.0.clone()
        }
    }
}

impl Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BatchId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BatchId::parse(value)
    }
}

impl std::str::FromStr for BatchId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BatchId::parse(s)
    }
}

impl From<BatchId> for String {
    fn from(id: BatchId) -> Self {
        id.0
    }
}

impl AsRef<str> for BatchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
