use crate::api::error::ApiError;
use crate::api::AllocationResponse;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

// ==========================================
// 公共工具：错误映射
// ==========================================

/// 错误响应（非分配接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn from_api_error(err: &ApiError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

/// ApiError → HTTP 状态码
///
/// - 请求校验 / 全部日期无解: 400
/// - 需求模型 / 求解服务失败: 502
/// - 其他: 500
pub fn status_for(err: &ApiError) -> StatusCode {
    if err.is_bad_request() {
        StatusCode::BAD_REQUEST
    } else if err.is_upstream_failure() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// 分配失败 → (状态码, 失败响应体)
pub fn map_allocation_error(err: ApiError) -> (StatusCode, AllocationResponse) {
    (status_for(&err), AllocationResponse::failure(&err))
}
