//! 批次处理上下文
//!
//! 封装"我正在跟踪哪个批次、以哪种方式进入"这一信息

use std::fmt::Display;

use crate::models::BatchId;

/// 批次的进入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// 本次运行提交的上传
    Submitted,
    /// 从地址栏恢复
    Resumed,
}

/// 批次处理上下文
#[derive(Debug, Clone)]
pub struct BatchCtx {
    /// 批次ID
    pub batch_id: BatchId,

    /// 进入方式
    pub entry: Entry,
}

impl BatchCtx {
    pub fn submitted(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            entry: Entry::Submitted,
        }
    }

    pub fn resumed(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            entry: Entry::Resumed,
        }
    }

    /// 是否为恢复的批次（404 需要判定为无效批次）
    pub fn is_resumed(&self) -> bool {
        self.entry == Entry::Resumed
    }
}

impl Display for BatchCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[批次 {}]", self.batch_id.short())
    }
}
