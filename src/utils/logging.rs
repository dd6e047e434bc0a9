/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::workflow::TerminalState;

/// 初始化 tracing 日志
///
/// `RUST_LOG` 优先；否则默认 info，verbose 时为 debug
///
/// # 参数
/// - `verbose`: 是否显示详细日志
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 当前配置
/// - `command`: 子命令名称
pub fn log_startup(config: &Config, command: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {}", command);
    info!(
        "🕐 {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🌐 边缘服务: {}", config.edge_base_url);
    info!("📊 监控方式: {:?} | 并行上传: {}", config.monitor_mode, config.parallel_uploads);
    info!("{}", "=".repeat(60));
}

/// 记录上传开始信息
///
/// # 参数
/// - `dir`: 上传目录
/// - `file_count`: 文件数量
/// - `total_bytes`: 总字节数
pub fn log_workflow_start(dir: &Path, file_count: usize, total_bytes: u64) {
    info!("\n{}", "─".repeat(60));
    info!("📁 上传目录: {}", dir.display());
    info!(
        "📄 共 {} 个文件, {:.2} MB",
        file_count,
        total_bytes as f64 / 1024.0 / 1024.0
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终结果
///
/// # 参数
/// - `result`: 工作流终态
/// - `monitor_log`: 监控记录文件路径（如果有）
pub fn print_final_result(result: &TerminalState, monitor_log: Option<&Path>) {
    info!("\n{}", "=".repeat(60));
    info!("📊 处理结果");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));

    match result {
        TerminalState::Succeeded {
            batch_id,
            root_pi,
            link,
        } => {
            info!("✅ 成功");
            info!("批次: {}", batch_id);
            info!("root_pi: {}", root_pi);
            info!("🔗 {}", link);
        }
        TerminalState::Failed {
            batch_id,
            message,
            partial_link,
        } => {
            error!("❌ 失败: {}", message);
            if let Some(batch_id) = batch_id {
                info!("批次: {}", batch_id);
            }
            if let Some(link) = partial_link {
                warn!("🔗 部分结果: {}", link);
            }
        }
        TerminalState::InvalidBatch { batch_id } => {
            error!("❌ 批次不存在或已过期: {}", batch_id);
            info!("💡 请重新上传");
        }
    }

    info!("{}", "=".repeat(60));
    if let Some(path) = monitor_log {
        info!("\n监控记录已保存至: {}", path.display());
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
