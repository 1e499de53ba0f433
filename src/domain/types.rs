// ==========================================
// 病房床位分配系统 - 领域类型定义
// ==========================================
// 职责: 分配上下文、优化模式、性别、床位类别等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 未分配房间哨兵值
pub const UNASSIGNED_ROOM: i32 = -1;

// ==========================================
// 分配上下文 (Allocation Context)
// ==========================================
// 实际分配与模拟分配使用互不相交的数据分区 (simulated 标志位)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationContext {
    Live,      // 实际分配
    Simulated, // 模拟分配 (可带时间偏移)
}

impl AllocationContext {
    /// 数据库 simulated 列取值
    pub fn is_simulated(&self) -> bool {
        matches!(self, AllocationContext::Simulated)
    }

    pub fn from_simulated(simulated: bool) -> Self {
        if simulated {
            AllocationContext::Simulated
        } else {
            AllocationContext::Live
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "LIVE" => Some(AllocationContext::Live),
            "SIMULATED" | "SIMULATE" => Some(AllocationContext::Simulated),
            _ => None,
        }
    }
}

impl fmt::Display for AllocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationContext::Live => write!(f, "LIVE"),
            AllocationContext::Simulated => write!(f, "SIMULATED"),
        }
    }
}

// ==========================================
// 优化模式 (Optimization Mode)
// ==========================================
// 决定外部求解器的目标函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    MinChanges,        // 最小化换房次数
    MinMaxOccupancy,   // 最小化单房最大占用
}

impl OptimizationMode {
    /// 解析请求中的模式字符串
    ///
    /// 兼容简写: "changes" / "occupancy"
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "min_changes" | "changes" => Some(OptimizationMode::MinChanges),
            "min_max_occupancy" | "occupancy" => Some(OptimizationMode::MinMaxOccupancy),
            _ => None,
        }
    }
}

impl fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationMode::MinChanges => write!(f, "min_changes"),
            OptimizationMode::MinMaxOccupancy => write!(f, "min_max_occupancy"),
        }
    }
}

// ==========================================
// 性别 (Gender)
// ==========================================
// 求解器按整数标志位接收: MALE=0, FEMALE=1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn solver_flag(&self) -> i32 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "MALE" | "M" => Some(Gender::Male),
            "FEMALE" | "F" | "W" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

// ==========================================
// 床位类别 (Bed Category)
// ==========================================
// 监护强度等级,越高越重
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BedCategory {
    Normal,       // 普通床位
    Intermediate, // 中级监护
    Intensive,    // 重症监护
}

impl BedCategory {
    /// 监护强度权重
    pub fn weight(&self) -> i32 {
        match self {
            BedCategory::Normal => 1,
            BedCategory::Intermediate => 2,
            BedCategory::Intensive => 3,
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "INTERMEDIATE" | "IMC" => BedCategory::Intermediate,
            "INTENSIVE" | "ICU" => BedCategory::Intensive,
            _ => BedCategory::Normal,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            BedCategory::Normal => "NORMAL",
            BedCategory::Intermediate => "INTERMEDIATE",
            BedCategory::Intensive => "INTENSIVE",
        }
    }
}

// ==========================================
// 单日求解状态 (Day Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayStatus {
    Solved, // 求解成功
    Unsat,  // 无可行解,跳过
    Empty,  // 当日无需求人群,跳过
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayStatus::Solved => write!(f, "SOLVED"),
            DayStatus::Unsat => write!(f, "UNSAT"),
            DayStatus::Empty => write!(f, "EMPTY"),
        }
    }
}
