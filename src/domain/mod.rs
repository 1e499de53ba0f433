// ==========================================
// 病房床位分配系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod allocation;
pub mod patient;
pub mod room;
pub mod types;

// 重导出核心类型
pub use allocation::{
    AllocationOutcome, AllocationRequest, DayAllocation, PatientAllocation, PatientTrajectory,
    ScenarioEntry,
};
pub use patient::{Diagnosis, Patient, TreatmentStep};
pub use room::{Room, Ward};
pub use types::{
    AllocationContext, BedCategory, DayStatus, Gender, OptimizationMode, UNASSIGNED_ROOM,
};
