use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use upload_workflow::app::{App, UploadArgs};
use upload_workflow::config::Config;
use upload_workflow::utils::logging;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "upload-workflow")]
#[command(about = "上传目录到归档并跟踪处理进度")]
#[command(version)]
struct Args {
    /// TOML 配置文件
    #[arg(short, long, global = true, env = "UPLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// 显示详细日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动边缘服务
    Serve,

    /// 上传目录并跟踪到完成
    Upload {
        /// 要上传的目录
        dir: PathBuf,

        /// 上传者姓名
        #[arg(long)]
        uploader: String,

        /// 机构名称
        #[arg(long)]
        institution: String,

        /// 挂载到已有实体下
        #[arg(long)]
        parent_pi: Option<String>,
    },

    /// 继续跟踪已有批次（批次 ID 或分享链接）
    Resume { target: String },

    /// 下载批次日志
    Logs {
        batch_id: String,

        /// 输出目录（默认为配置中的日志目录）
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 加载配置
    let mut config = Config::load(args.config.as_deref()).context("加载配置失败")?;
    config.verbose_logging |= args.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    match args.command {
        Command::Serve => App::initialize(config, "边缘服务")?.serve().await,
        Command::Upload {
            dir,
            uploader,
            institution,
            parent_pi,
        } => {
            App::initialize(config, "上传")?
                .upload(UploadArgs {
                    dir,
                    uploader,
                    institution,
                    parent_pi,
                })
                .await
        }
        Command::Resume { target } => {
            App::initialize(config, "恢复监控")?.resume(&target).await
        }
        Command::Logs { batch_id, out } => {
            App::initialize(config, "下载日志")?
                .download_logs(&batch_id, out.as_deref())
                .await?;
            Ok(())
        }
    }
}
