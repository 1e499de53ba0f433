// ==========================================
// 病房床位分配系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合分配引擎所需的所有 Repository
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    PatientAllocationRepository, PatientTrajectoryRepository, ReferenceRepository,
};

/// 分配引擎仓储集合
///
/// # 包含的仓储
/// - `reference_repo`: 参考数据（患者、病区、房间、诊断、治疗步骤）
/// - `allocation_repo`: 患者分配记录
/// - `trajectory_repo`: 患者需求轨迹
#[derive(Clone)]
pub struct AllocationRepositories {
    pub reference_repo: Arc<ReferenceRepository>,
    pub allocation_repo: Arc<PatientAllocationRepository>,
    pub trajectory_repo: Arc<PatientTrajectoryRepository>,
}

impl AllocationRepositories {
    pub fn new(
        reference_repo: Arc<ReferenceRepository>,
        allocation_repo: Arc<PatientAllocationRepository>,
        trajectory_repo: Arc<PatientTrajectoryRepository>,
    ) -> Self {
        Self {
            reference_repo,
            allocation_repo,
            trajectory_repo,
        }
    }

    /// 基于同一个共享连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            reference_repo: Arc::new(ReferenceRepository::from_connection(conn.clone())),
            allocation_repo: Arc::new(PatientAllocationRepository::from_connection(conn.clone())),
            trajectory_repo: Arc::new(PatientTrajectoryRepository::from_connection(conn)),
        }
    }
}
