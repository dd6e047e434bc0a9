//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层是整个上传流程的"指挥中心"：持有所有依赖，按顺序驱动各阶段，
//! 并把结果归结为唯一的终态。
//!
//! ## 层次关系
//!
//! ```text
//! upload_workflow (状态机：Idle → ... → 终态)
//!     ↓
//! workflow (各阶段：upload / ingest / orchestrator / status)
//!     ↓
//! clients + services (状态查询、退避重试、进度换算、上传)
//!     ↓
//! infrastructure (HttpExecutor、UrlStateManager)
//! ```
//!
//! ## 设计原则
//!
//! 1. **阶段串行**：同一时刻只有一个阶段在轮询
//! 2. **依赖注入**：配置、HTTP、上传能力、渲染出口都由构造函数传入
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **唯一终态**：每次运行只渲染一个终态

pub mod upload_workflow;

// 重新导出主要类型
pub use upload_workflow::{navigation_action, NavigationAction, UploadWorkflow, WorkflowState};
