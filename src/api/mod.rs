// ==========================================
// 病房床位分配系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供 HTTP 路由调用
// ==========================================

pub mod allocation_api;
pub mod error;

// 重导出核心类型
pub use allocation_api::{AllocateRequest, AllocationApi, AllocationResponse, FAILED_CHANGE_COUNT};
pub use error::{ApiError, ApiResult};
