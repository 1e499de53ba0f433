// ==========================================
// 病房床位分配系统 - 患者需求轨迹仓储
// ==========================================
// 职责: 管理 patient_trajectory 表
// 约束: (patient_id, day_date, simulated) 唯一, 只插入不存在的行
// ==========================================

use crate::domain::allocation::PatientTrajectory;
use crate::domain::types::AllocationContext;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// PatientTrajectoryRepository - 需求轨迹仓储
// ==========================================
pub struct PatientTrajectoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PatientTrajectoryRepository {
    /// 创建新的 PatientTrajectoryRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询上下文内全部轨迹（按日期、患者排序）
    pub fn find_by_context(
        &self,
        context: AllocationContext,
    ) -> RepositoryResult<Vec<PatientTrajectory>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT patient_id, day_date, need_level, simulated
            FROM patient_trajectory
            WHERE simulated = ?1
            ORDER BY day_date ASC, patient_id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![context.is_simulated()], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.into_iter().map(into_trajectory).collect()
    }

    /// 批量插入（已存在的键被忽略，单事务）
    ///
    /// # 返回
    /// 实际插入的行数
    pub fn insert_if_absent_all(&self, rows: &[PatientTrajectory]) -> RepositoryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                r#"INSERT OR IGNORE INTO patient_trajectory (
                        patient_id, day_date, need_level, simulated
                    ) VALUES (?, ?, ?, ?)"#,
            )?;

            for t in rows {
                inserted += stmt.execute(params![
                    &t.patient_id,
                    t.day_date.format("%Y-%m-%d").to_string(),
                    t.need_level,
                    t.context.is_simulated(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// 删除指定患者的全部轨迹（单事务）
    pub fn delete_by_patients(
        &self,
        patient_ids: &[String],
        context: AllocationContext,
    ) -> RepositoryResult<usize> {
        if patient_ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;

        {
            let mut stmt = tx.prepare(
                "DELETE FROM patient_trajectory WHERE patient_id = ?1 AND simulated = ?2",
            )?;
            for id in patient_ids {
                deleted += stmt.execute(params![id, context.is_simulated()])?;
            }
        }

        tx.commit()?;
        Ok(deleted)
    }

    /// 删除早于 cutoff 的轨迹
    pub fn delete_by_date_before(
        &self,
        cutoff: NaiveDate,
        context: AllocationContext,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM patient_trajectory WHERE simulated = ?1 AND day_date < ?2",
            params![context.is_simulated(), cutoff.format("%Y-%m-%d").to_string()],
        )?;
        Ok(deleted)
    }
}

// ==========================================
// 行映射
// ==========================================

fn map_row(row: &rusqlite::Row<'_>) -> SqliteResult<(String, String, u32, bool)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_trajectory(
    (patient_id, day_date, need_level, simulated): (String, String, u32, bool),
) -> RepositoryResult<PatientTrajectory> {
    let day_date = NaiveDate::parse_from_str(&day_date, "%Y-%m-%d").map_err(|e| {
        RepositoryError::FieldValueError {
            field: "patient_trajectory.day_date".to_string(),
            message: format!("{} (patient_id={})", e, patient_id),
        }
    })?;

    Ok(PatientTrajectory {
        patient_id,
        day_date,
        need_level,
        context: AllocationContext::from_simulated(simulated),
    })
}
