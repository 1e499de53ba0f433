// ==========================================
// 病房床位分配系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + axum
// 系统定位: 多日病房床位分配调度引擎
//   (外部需求模型 + 外部单日求解服务, 本库负责编排与持久化)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分配流程
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/表结构）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - HTTP 集成
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AllocationContext, BedCategory, DayStatus, Gender, OptimizationMode};

// 领域实体
pub use domain::{
    AllocationOutcome, AllocationRequest, DayAllocation, Diagnosis, Patient, PatientAllocation,
    PatientTrajectory, Room, ScenarioEntry, TreatmentStep, Ward,
};

// 引擎
pub use engine::{AllocationCoordinator, AllocationError, DaySolver, NeedsModel, RoomIndexMap};

// API
pub use api::{AllocateRequest, AllocationApi, AllocationResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "病房床位分配系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";
