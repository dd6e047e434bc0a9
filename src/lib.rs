//! # Upload Workflow
//!
//! 把一个目录上传到归档，并跟踪批次经过预处理、排队、OCR、元数据抽取、
//! 描述生成直到拿到归档链接的全过程
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - HTTP 访问与地址栏状态，只暴露能力
//! - `HttpExecutor` - 访问边缘服务 `/api/*` 的唯一 HTTP 客户端
//! - `UrlStateManager` - 把批次 ID 写入 / 读出地址栏 `#batchId=`
//!
//! ### ② 业务能力层（Services / Clients）
//! - `services/` - 退避重试、轮询、进度换算、上传、监控记录
//! - `clients/` - 每个上游状态接口一个客户端（上传会话 / ingest / orchestrator / 统一状态）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个批次"的各个阶段
//! - `BatchCtx` - 上下文封装（batch_id + 进入方式）
//! - `ProgressReporter` - 单调进度、阶段切换、归档链接
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/upload_workflow` - 状态机，串联各阶段并产生唯一终态
//!
//! ### 边缘服务（Edge）
//! - `api/` - axum 路由，把 `/api/*` 转发到各内部服务
//!
//! ## 模块结构
//!
//! ```text
//! api/             边缘服务路由与错误结构
//! app.rs           命令行子命令的实现
//! clients/         阶段客户端（上传会话 / ingest / orchestrator / 统一状态）
//! config.rs        配置（默认值 → TOML → 环境变量）
//! error.rs         错误分类
//! infrastructure/  HttpExecutor、AddressBar、UrlStateManager
//! models/          批次 ID 与各上游状态结构
//! orchestrator/    上传工作流状态机
//! services/        轮询、进度换算、上传、监控记录
//! utils/           日志初始化与横幅
//! workflow/        各阶段、进度汇报、事件出口
//! ```

pub mod api;
pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, MonitorMode};
pub use error::{AppError, AppResult};
pub use models::BatchId;
pub use orchestrator::{NavigationAction, UploadWorkflow, WorkflowState};
pub use workflow::{ProgressSink, TerminalState, WorkflowEvent};
