// ==========================================
// 病房床位分配系统 - 患者分配仓储
// ==========================================
// 职责: 管理 patient_allocation 表的 CRUD 与批量操作
// 红线: Repository 不含业务逻辑
// 分区: 所有查询均按 simulated 标志位过滤
// ==========================================

use crate::domain::allocation::PatientAllocation;
use crate::domain::types::AllocationContext;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::reference_repo::parse_categories;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT patient_id, simulated, iteration, room_number,
           diagnosis_code, diagnosis_name, severity_categories, due_date
    FROM patient_allocation
"#;

// ==========================================
// PatientAllocationRepository - 患者分配仓储
// ==========================================
pub struct PatientAllocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PatientAllocationRepository {
    /// 创建新的 PatientAllocationRepository 实例
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

    // ==========================================
    // 查询
    // ==========================================

    /// 按主键查询
    pub fn find(
        &self,
        patient_id: &str,
        context: AllocationContext,
    ) -> RepositoryResult<Option<PatientAllocation>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE patient_id = ?1 AND simulated = ?2", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![patient_id, context.is_simulated()], map_row)
            .optional()?;

        match row {
            Some(raw) => Ok(Some(raw.into_allocation()?)),
            None => Ok(None),
        }
    }

    /// 查询上下文内全部分配记录
    pub fn find_by_context(
        &self,
        context: AllocationContext,
    ) -> RepositoryResult<Vec<PatientAllocation>> {
        let sql = format!(
            "{} WHERE simulated = ?1 ORDER BY patient_id ASC",
            SELECT_COLUMNS
        );
        self.query_list(&sql, params![context.is_simulated()])
    }

    /// 查询预计出院日期早于 cutoff 的记录（过期清理）
    pub fn find_by_due_date_before(
        &self,
        cutoff: NaiveDate,
        context: AllocationContext,
    ) -> RepositoryResult<Vec<PatientAllocation>> {
        let sql = format!(
            "{} WHERE simulated = ?1 AND due_date < ?2 ORDER BY patient_id ASC",
            SELECT_COLUMNS
        );
        self.query_list(
            &sql,
            params![context.is_simulated(), cutoff.format("%Y-%m-%d").to_string()],
        )
    }

    /// 查询缺失诊断的记录（孤儿清理）
    pub fn find_without_diagnosis(
        &self,
        context: AllocationContext,
    ) -> RepositoryResult<Vec<PatientAllocation>> {
        let sql = format!(
            "{} WHERE simulated = ?1 AND (diagnosis_code IS NULL OR TRIM(diagnosis_code) = '') ORDER BY patient_id ASC",
            SELECT_COLUMNS
        );
        self.query_list(&sql, params![context.is_simulated()])
    }

    fn query_list<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> RepositoryResult<Vec<PatientAllocation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.into_iter().map(RawAllocationRow::into_allocation).collect()
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 新增单条记录
    pub fn save(&self, allocation: &PatientAllocation) -> RepositoryResult<()> {
        self.save_all(std::slice::from_ref(allocation)).map(|_| ())
    }

    /// 批量新增（单事务）
    pub fn save_all(&self, allocations: &[PatientAllocation]) -> RepositoryResult<usize> {
        if allocations.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO patient_allocation (
                        patient_id, simulated, iteration, room_number,
                        diagnosis_code, diagnosis_name, severity_categories, due_date
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;

            for a in allocations {
                stmt.execute(params![
                    &a.patient_id,
                    a.context.is_simulated(),
                    a.iteration,
                    a.room_number,
                    &a.diagnosis_code,
                    &a.diagnosis_name,
                    encode_categories(&a.severity_categories)?,
                    a.due_date.format("%Y-%m-%d").to_string(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(allocations.len())
    }

    /// 批量更新（单事务）
    ///
    /// # 返回
    /// 实际更新的行数（不存在的记录被忽略）
    pub fn update_all(&self, allocations: &[PatientAllocation]) -> RepositoryResult<usize> {
        if allocations.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut updated = 0;

        {
            let mut stmt = tx.prepare(
                r#"UPDATE patient_allocation SET
                        iteration = ?3,
                        room_number = ?4,
                        diagnosis_code = ?5,
                        diagnosis_name = ?6,
                        severity_categories = ?7,
                        due_date = ?8,
                        updated_at = datetime('now')
                    WHERE patient_id = ?1 AND simulated = ?2"#,
            )?;

            for a in allocations {
                updated += stmt.execute(params![
                    &a.patient_id,
                    a.context.is_simulated(),
                    a.iteration,
                    a.room_number,
                    &a.diagnosis_code,
                    &a.diagnosis_name,
                    encode_categories(&a.severity_categories)?,
                    a.due_date.format("%Y-%m-%d").to_string(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(updated)
    }

    /// 批量删除指定患者的记录（单事务）
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
                "DELETE FROM patient_allocation WHERE patient_id = ?1 AND simulated = ?2",
            )?;
            for id in patient_ids {
                deleted += stmt.execute(params![id, context.is_simulated()])?;
            }
        }

        tx.commit()?;
        Ok(deleted)
    }
}

// ==========================================
// 行映射
// ==========================================

struct RawAllocationRow {
    patient_id: String,
    simulated: bool,
    iteration: i32,
    room_number: i32,
    diagnosis_code: Option<String>,
    diagnosis_name: Option<String>,
    severity_categories: String,
    due_date: String,
}

impl RawAllocationRow {
    fn into_allocation(self) -> RepositoryResult<PatientAllocation> {
        let due_date = NaiveDate::parse_from_str(&self.due_date, "%Y-%m-%d").map_err(|e| {
            RepositoryError::FieldValueError {
                field: "patient_allocation.due_date".to_string(),
                message: format!("{} (patient_id={})", e, self.patient_id),
            }
        })?;

        Ok(PatientAllocation {
            patient_id: self.patient_id,
            context: AllocationContext::from_simulated(self.simulated),
            iteration: self.iteration,
            room_number: self.room_number,
            diagnosis_code: self.diagnosis_code,
            diagnosis_name: self.diagnosis_name,
            severity_categories: parse_categories(&self.severity_categories)?,
            due_date,
        })
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> SqliteResult<RawAllocationRow> {
    Ok(RawAllocationRow {
        patient_id: row.get(0)?,
        simulated: row.get(1)?,
        iteration: row.get(2)?,
        room_number: row.get(3)?,
        diagnosis_code: row.get(4)?,
        diagnosis_name: row.get(5)?,
        severity_categories: row.get(6)?,
        due_date: row.get(7)?,
    })
}

fn encode_categories(categories: &[String]) -> RepositoryResult<String> {
    serde_json::to_string(categories).map_err(|e| RepositoryError::FieldValueError {
        field: "severity_categories".to_string(),
        message: e.to_string(),
    })
}
