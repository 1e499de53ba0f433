// ==========================================
// 病房床位分配系统 - 患者领域模型
// ==========================================
// 说明: 患者与诊断属于参考数据,排程引擎只读
// ==========================================

use crate::domain::types::Gender;
use serde::{Deserialize, Serialize};

// ==========================================
// Patient - 患者
// ==========================================
// 对齐: patient 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String, // 患者ID (不透明标识)
    pub gender: Gender,     // 性别 (同房性别隔离)
    pub age: i32,           // 年龄
    pub infectious: bool,   // 感染隔离标志
}

// ==========================================
// Diagnosis - 诊断
// ==========================================
// 对齐: diagnosis 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub code: String,                     // 诊断代码
    pub name: String,                     // 诊断名称
    pub severity_categories: Vec<String>, // 严重程度类别 (存储为 JSON 数组)
}

// ==========================================
// TreatmentStep - 治疗步骤
// ==========================================
// 需求模型输入的一部分: 诊断 → 按天展开的治疗任务及依赖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentStep {
    pub diagnosis_code: String,
    pub step_name: String,
    pub day_offset: i32,            // 相对入院日的天数
    pub need_hours: i32,            // 护理需求 (小时)
    pub depends_on: Option<String>, // 前置步骤
}
