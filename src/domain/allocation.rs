// ==========================================
// 病房床位分配系统 - 分配领域模型
// ==========================================
// 实体: PatientAllocation / PatientTrajectory
// 请求与结果: AllocationRequest / DayAllocation / AllocationOutcome
// ==========================================

use crate::domain::types::{AllocationContext, DayStatus, OptimizationMode, UNASSIGNED_ROOM};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// PatientAllocation - 患者分配记录
// ==========================================
// 主键: (patient_id, context)
// 对齐: patient_allocation 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientAllocation {
    pub patient_id: String,
    pub context: AllocationContext,
    pub iteration: i32, // 模拟运行的时间偏移 (天); 实际分配恒为 0

    pub room_number: i32, // 当前房间号, -1 = 未分配

    // ===== 诊断 =====
    pub diagnosis_code: Option<String>,
    pub diagnosis_name: Option<String>,
    pub severity_categories: Vec<String>,

    // ===== 预计出院 =====
    pub due_date: NaiveDate,
}

impl PatientAllocation {
    /// 创建占位分配记录 (未分配房间)
    pub fn placeholder(
        patient_id: &str,
        context: AllocationContext,
        iteration: i32,
        diagnosis_code: Option<String>,
        diagnosis_name: Option<String>,
        severity_categories: Vec<String>,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            context,
            iteration,
            room_number: UNASSIGNED_ROOM,
            diagnosis_code,
            diagnosis_name,
            severity_categories,
            due_date,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.room_number != UNASSIGNED_ROOM
    }

    /// 是否缺失诊断 (孤儿记录)
    pub fn has_diagnosis(&self) -> bool {
        self.diagnosis_code
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }
}

// ==========================================
// PatientTrajectory - 患者每日需求轨迹
// ==========================================
// 唯一: (day_date, patient_id, context), 只插入不存在的行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientTrajectory {
    pub patient_id: String,
    pub day_date: NaiveDate,
    pub need_level: u32,
    pub context: AllocationContext,
}

// ==========================================
// ScenarioEntry - 场景条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEntry {
    pub patient_id: String,
    #[serde(default)]
    pub diagnosis: Option<String>, // 诊断代码; 为空时将在孤儿清理中删除
}

// ==========================================
// AllocationRequest - 分配请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub scenario: Vec<ScenarioEntry>,
    pub ward_name: String,
    pub hospital_code: String,
    pub mode: OptimizationMode,
    pub context: AllocationContext,
    pub iteration_offset: i32, // 模拟运行的时间偏移 (天)
}

impl AllocationRequest {
    /// 实际分配请求
    pub fn live(
        scenario: Vec<ScenarioEntry>,
        ward_name: &str,
        hospital_code: &str,
        mode: OptimizationMode,
    ) -> Self {
        Self {
            scenario,
            ward_name: ward_name.to_string(),
            hospital_code: hospital_code.to_string(),
            mode,
            context: AllocationContext::Live,
            iteration_offset: 0,
        }
    }

    /// 模拟分配请求
    pub fn simulated(
        scenario: Vec<ScenarioEntry>,
        ward_name: &str,
        hospital_code: &str,
        mode: OptimizationMode,
        iteration_offset: i32,
    ) -> Self {
        Self {
            scenario,
            ward_name: ward_name.to_string(),
            hospital_code: hospital_code.to_string(),
            mode,
            context: AllocationContext::Simulated,
            iteration_offset,
        }
    }

    /// 上下文相关的时间偏移 (实际分配恒为 0)
    pub fn effective_offset(&self) -> i32 {
        match self.context {
            AllocationContext::Live => 0,
            AllocationContext::Simulated => self.iteration_offset,
        }
    }
}

// ==========================================
// DayAllocation - 单日分配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAllocation {
    pub day: usize,
    pub date: NaiveDate,
    pub status: DayStatus,
    pub rooms: BTreeMap<i32, Vec<String>>, // 房间号 → 患者
    pub changes: u32,                      // 跳过的日期恒为 0
}

impl DayAllocation {
    pub fn skipped(day: usize, date: NaiveDate, status: DayStatus) -> Self {
        Self {
            day,
            date,
            status,
            rooms: BTreeMap::new(),
            changes: 0,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.status == DayStatus::Solved && !self.rooms.is_empty()
    }
}

// ==========================================
// AllocationOutcome - 多日分配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub run_id: String,
    pub context: AllocationContext,
    pub days: Vec<DayAllocation>,
    pub total_changes: u32,
    pub final_rooms: BTreeMap<String, i32>, // 患者 → 最终房间号
}
