// ==========================================
// 病房床位分配系统 - 病房/房间领域模型
// ==========================================
// 说明: 单次运行内不可变; 每次运行开始时重新读取
// ==========================================

use crate::domain::types::BedCategory;
use serde::{Deserialize, Serialize};

// ==========================================
// Ward - 病区
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ward {
    pub ward_name: String,
    pub hospital_code: String,
}

// ==========================================
// Room - 房间
// ==========================================
// 对齐: room 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_number: i32,              // 持久化房间号
    pub ward_name: String,             // 所属病区
    pub hospital_code: String,         // 所属医院
    pub capacity: i32,                 // 床位数
    pub category: BedCategory,         // 床位类别 (监护强度)
    pub overflow_penalty: Option<i32>, // 溢出房间惩罚权重 (仅溢出房间)
}

impl Room {
    /// 求解器使用的房间类别权重
    ///
    /// 溢出房间使用惩罚权重,其余房间使用监护强度权重
    pub fn category_weight(&self) -> i32 {
        self.overflow_penalty.unwrap_or_else(|| self.category.weight())
    }
}
