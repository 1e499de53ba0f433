// ==========================================
// 病房床位分配系统 - 参考数据仓储
// ==========================================
// 职责: 只读访问 patient / ward / room / diagnosis / treatment_step
// 红线: Repository 不含业务逻辑
// 说明: 参考数据的增删改不属于排程引擎
// ==========================================

use crate::domain::patient::{Diagnosis, Patient, TreatmentStep};
use crate::domain::room::{Room, Ward};
use crate::domain::types::{BedCategory, Gender};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// ReferenceRepository - 参考数据仓储
// ==========================================
pub struct ReferenceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReferenceRepository {
    /// 创建新的 ReferenceRepository 实例
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

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 患者
    // ==========================================

    /// 按ID查询患者
    ///
    /// # 返回
    /// - Ok(Some(Patient)): 找到患者
    /// - Ok(None): 未找到
    /// - Err: 数据库错误
    pub fn find_patient_by_id(&self, patient_id: &str) -> RepositoryResult<Option<Patient>> {
        let conn = self.get_conn()?;
        let patient = conn
            .query_row(
                "SELECT patient_id, gender, age, infectious FROM patient WHERE patient_id = ?1",
                params![patient_id],
                map_patient_row,
            )
            .optional()?;

        match patient {
            Some(p) => Ok(Some(p?)),
            None => Ok(None),
        }
    }

    /// 批量查询患者（不存在的ID被忽略）
    pub fn find_patients_by_ids(&self, patient_ids: &[String]) -> RepositoryResult<Vec<Patient>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT patient_id, gender, age, infectious FROM patient WHERE patient_id = ?1",
        )?;

        let mut patients = Vec::with_capacity(patient_ids.len());
        for id in patient_ids {
            if let Some(p) = stmt.query_row(params![id], map_patient_row).optional()? {
                patients.push(p?);
            }
        }
        Ok(patients)
    }

    // ==========================================
    // 病区与房间
    // ==========================================

    /// 按名称与医院查询病区
    pub fn get_ward_by_name_and_hospital(
        &self,
        ward_name: &str,
        hospital_code: &str,
    ) -> RepositoryResult<Option<Ward>> {
        let conn = self.get_conn()?;
        let ward = conn
            .query_row(
                "SELECT ward_name, hospital_code FROM ward WHERE ward_name = ?1 AND hospital_code = ?2",
                params![ward_name, hospital_code],
                |row| {
                    Ok(Ward {
                        ward_name: row.get(0)?,
                        hospital_code: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(ward)
    }

    /// 查询病区当前房间列表
    ///
    /// 返回顺序即房间序号 (ordinal) 顺序: list_position, room_number
    pub fn get_rooms_by_ward_hospital(
        &self,
        ward_name: &str,
        hospital_code: &str,
    ) -> RepositoryResult<Vec<Room>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT room_number, ward_name, hospital_code, capacity, category, overflow_penalty
            FROM room
            WHERE ward_name = ?1 AND hospital_code = ?2
            ORDER BY list_position ASC, room_number ASC
            "#,
        )?;

        let rooms = stmt
            .query_map(params![ward_name, hospital_code], |row| {
                Ok(Room {
                    room_number: row.get(0)?,
                    ward_name: row.get(1)?,
                    hospital_code: row.get(2)?,
                    capacity: row.get(3)?,
                    category: BedCategory::from_str(&row.get::<_, String>(4)?),
                    overflow_penalty: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rooms)
    }

    // ==========================================
    // 诊断与治疗步骤
    // ==========================================

    /// 按代码查询诊断
    pub fn find_diagnosis(&self, code: &str) -> RepositoryResult<Option<Diagnosis>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT code, name, severity_categories FROM diagnosis WHERE code = ?1",
                params![code],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((code, name, raw)) => Ok(Some(Diagnosis {
                code,
                name,
                severity_categories: parse_categories(&raw)?,
            })),
            None => Ok(None),
        }
    }

    /// 查询给定诊断的治疗步骤
    pub fn list_treatment_steps(
        &self,
        diagnosis_codes: &[String],
    ) -> RepositoryResult<Vec<TreatmentStep>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT diagnosis_code, step_name, day_offset, need_hours, depends_on
            FROM treatment_step
            WHERE diagnosis_code = ?1
            ORDER BY day_offset ASC, step_name ASC
            "#,
        )?;

        let mut steps = Vec::new();
        for code in diagnosis_codes {
            let rows = stmt
                .query_map(params![code], |row| {
                    Ok(TreatmentStep {
                        diagnosis_code: row.get(0)?,
                        step_name: row.get(1)?,
                        day_offset: row.get(2)?,
                        need_hours: row.get(3)?,
                        depends_on: row.get(4)?,
                    })
                })?
                .collect::<SqliteResult<Vec<_>>>()?;
            steps.extend(rows);
        }
        Ok(steps)
    }
}

// ==========================================
// 行映射辅助函数
// ==========================================

fn map_patient_row(row: &rusqlite::Row<'_>) -> SqliteResult<RepositoryResult<Patient>> {
    let patient_id: String = row.get(0)?;
    let gender_raw: String = row.get(1)?;
    let age: i32 = row.get(2)?;
    let infectious: i32 = row.get(3)?;

    Ok(match Gender::from_str(&gender_raw) {
        Some(gender) => Ok(Patient {
            patient_id,
            gender,
            age,
            infectious: infectious != 0,
        }),
        None => Err(RepositoryError::FieldValueError {
            field: "patient.gender".to_string(),
            message: format!("无法识别的性别: {} (patient_id={})", gender_raw, patient_id),
        }),
    })
}

/// 解析 JSON 数组形式的严重程度类别
pub(crate) fn parse_categories(raw: &str) -> RepositoryResult<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| RepositoryError::FieldValueError {
        field: "severity_categories".to_string(),
        message: e.to_string(),
    })
}
