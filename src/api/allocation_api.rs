// ==========================================
// 病房床位分配系统 - 分配 API
// ==========================================
// 职责: allocate (实际分配) / simulate (模拟分配, 带时间偏移) / 查询分配记录
// 返回: 成功 → 逐日分配列表 + 总变更数; 失败 → 空分配 + 变更数 -1 + 原因
// ==========================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::allocation::{
    AllocationOutcome, AllocationRequest, DayAllocation, PatientAllocation, ScenarioEntry,
};
use crate::domain::types::{AllocationContext, OptimizationMode};
use crate::engine::coordinator::AllocationCoordinator;
use crate::i18n::{t, t_with_args};

/// 失败响应中的变更数哨兵值
pub const FAILED_CHANGE_COUNT: i64 = -1;

// ==========================================
// 请求 / 响应
// ==========================================

/// 分配请求（allocate / simulate 共用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateRequest {
    pub scenario: Vec<ScenarioEntry>,
    pub ward_name: String,
    pub hospital_code: String,
    /// 优化模式: min_changes / min_max_occupancy
    pub mode: String,
    /// 模拟时间偏移（天）, 仅 simulate 使用
    #[serde(default)]
    pub iteration: Option<i32>,
}

/// 分配响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub success: bool,
    pub run_id: Option<String>,
    pub context: Option<AllocationContext>,
    /// 逐日分配（含被跳过的日期）
    pub allocations: Vec<DayAllocation>,
    /// 总变更数; 失败时为 -1
    pub total_changes: i64,
    /// 患者 → 最终房间号
    pub final_rooms: BTreeMap<String, i32>,
    pub message: String,
    /// 失败时的错误代码
    pub code: Option<String>,
}

impl AllocationResponse {
    pub fn from_outcome(outcome: AllocationOutcome) -> Self {
        Self {
            success: true,
            run_id: Some(outcome.run_id),
            context: Some(outcome.context),
            message: t_with_args(
                "allocation.success",
                &[("days", &outcome.days.len().to_string())],
            ),
            allocations: outcome.days,
            total_changes: outcome.total_changes as i64,
            final_rooms: outcome.final_rooms,
            code: None,
        }
    }

    pub fn failure(err: &ApiError) -> Self {
        Self {
            success: false,
            run_id: None,
            context: None,
            allocations: Vec::new(),
            total_changes: FAILED_CHANGE_COUNT,
            final_rooms: BTreeMap::new(),
            message: t_with_args("allocation.failed", &[("reason", &err.to_string())]),
            code: Some(err.code().to_string()),
        }
    }
}

// ==========================================
// AllocationApi - 分配 API
// ==========================================

pub struct AllocationApi {
    coordinator: Arc<AllocationCoordinator>,
}

impl AllocationApi {
    pub fn new(coordinator: Arc<AllocationCoordinator>) -> Self {
        Self { coordinator }
    }

    /// 实际分配
    pub async fn allocate(&self, request: AllocateRequest) -> ApiResult<AllocationResponse> {
        let request = build_request(request, AllocationContext::Live)?;
        self.run(request).await
    }

    /// 模拟分配（iteration 为时间偏移, 缺省 0）
    pub async fn simulate(&self, request: AllocateRequest) -> ApiResult<AllocationResponse> {
        let request = build_request(request, AllocationContext::Simulated)?;
        self.run(request).await
    }

    /// 查询上下文内的分配记录
    ///
    /// # 参数
    /// - context: "live" / "simulated"
    pub fn list_allocations(&self, context: &str) -> ApiResult<Vec<PatientAllocation>> {
        let context = AllocationContext::from_str(context).ok_or_else(|| {
            ApiError::InvalidInput(t_with_args("allocation.invalid_context", &[("context", context)]))
        })?;
        Ok(self.coordinator.list_allocations(context)?)
    }

    async fn run(&self, request: AllocationRequest) -> ApiResult<AllocationResponse> {
        match self.coordinator.run_allocation(&request).await {
            Ok(outcome) => {
                info!(
                    run_id = %outcome.run_id,
                    total_changes = outcome.total_changes,
                    "分配请求处理完成"
                );
                Ok(AllocationResponse::from_outcome(outcome))
            }
            Err(e) => {
                warn!(context = %request.context, error = %e, "分配请求失败");
                Err(e.into())
            }
        }
    }
}

/// 校验并构建引擎请求
fn build_request(request: AllocateRequest, context: AllocationContext) -> ApiResult<AllocationRequest> {
    if request.ward_name.trim().is_empty() || request.hospital_code.trim().is_empty() {
        return Err(ApiError::InvalidInput(t("allocation.missing_ward")));
    }
    if request.scenario.is_empty() {
        return Err(ApiError::InvalidInput(t("allocation.empty_scenario")));
    }
    if request.scenario.iter().any(|e| e.patient_id.trim().is_empty()) {
        return Err(ApiError::InvalidInput(t("allocation.blank_patient")));
    }

    let mode = OptimizationMode::parse(&request.mode).ok_or_else(|| {
        ApiError::InvalidInput(t_with_args("allocation.invalid_mode", &[("mode", &request.mode)]))
    })?;

    let ward_name = request.ward_name.trim();
    let hospital_code = request.hospital_code.trim();
    Ok(match context {
        AllocationContext::Live => {
            AllocationRequest::live(request.scenario, ward_name, hospital_code, mode)
        }
        AllocationContext::Simulated => AllocationRequest::simulated(
            request.scenario,
            ward_name,
            hospital_code,
            mode,
            request.iteration.unwrap_or(0),
        ),
    })
}
