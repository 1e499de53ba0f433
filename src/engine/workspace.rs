// ==========================================
// 病房床位分配系统 - 运行隔离工作区
// ==========================================
// 职责: 为需求模型构建自包含输入 (CSV 文件)
// 约束: 工作区归创建它的运行独占, 运行结束即删除 (TempDir Drop)
// 文件: ward.csv / rooms.csv / patients.csv / treatments.csv
// ==========================================

use crate::domain::patient::{Patient, TreatmentStep};
use crate::domain::room::{Room, Ward};
use serde::Serialize;
use std::path::Path;
use tempfile::TempDir;
use thiserror::Error;

pub const WARD_FILE: &str = "ward.csv";
pub const ROOMS_FILE: &str = "rooms.csv";
pub const PATIENTS_FILE: &str = "patients.csv";
pub const TREATMENTS_FILE: &str = "treatments.csv";

/// 工作区错误
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("工作区目录创建失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("工作区文件写入失败: {0}")]
    Csv(#[from] csv::Error),
}

// ==========================================
// CSV 记录
// ==========================================

#[derive(Debug, Serialize)]
struct RoomRecord<'a> {
    ordinal: usize,
    room_number: i32,
    capacity: i32,
    category: &'a str,
    category_weight: i32,
}

#[derive(Debug, Serialize)]
struct PatientRecord<'a> {
    patient_id: &'a str,
    gender: &'a str,
    age: i32,
    infectious: bool,
    diagnosis_code: Option<&'a str>,
}

/// 场景患者 (患者 + 本次场景诊断)
#[derive(Debug, Clone)]
pub struct ScenarioPatient {
    pub patient: Patient,
    pub diagnosis_code: Option<String>,
}

// ==========================================
// Workspace - 单次运行的工作区
// ==========================================
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    patient_count: usize,
    room_count: usize,
}

impl Workspace {
    /// 构建工作区并写入全部输入文件
    ///
    /// # 参数
    /// - run_id: 运行ID（作为目录前缀便于排查）
    /// - ward: 目标病区
    /// - rooms: 房间列表（按序号顺序）
    /// - patients: 场景患者
    /// - treatments: 场景诊断对应的治疗步骤
    pub fn build(
        run_id: &str,
        ward: &Ward,
        rooms: &[&Room],
        patients: &[ScenarioPatient],
        treatments: &[TreatmentStep],
    ) -> Result<Self, WorkspaceError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("bed-alloc-{}-", run_id))
            .tempdir()?;

        write_csv(&dir.path().join(WARD_FILE), std::iter::once(ward))?;

        write_csv(
            &dir.path().join(ROOMS_FILE),
            rooms.iter().enumerate().map(|(ordinal, room)| RoomRecord {
                ordinal,
                room_number: room.room_number,
                capacity: room.capacity,
                category: room.category.to_db_str(),
                category_weight: room.category_weight(),
            }),
        )?;

        write_csv(
            &dir.path().join(PATIENTS_FILE),
            patients.iter().map(|p| PatientRecord {
                patient_id: &p.patient.patient_id,
                gender: p.patient.gender.to_db_str(),
                age: p.patient.age,
                infectious: p.patient.infectious,
                diagnosis_code: p.diagnosis_code.as_deref(),
            }),
        )?;

        write_csv(&dir.path().join(TREATMENTS_FILE), treatments.iter())?;

        tracing::debug!(
            path = %dir.path().display(),
            rooms = rooms.len(),
            patients = patients.len(),
            treatments = treatments.len(),
            "工作区已构建"
        );

        Ok(Self {
            dir,
            patient_count: patients.len(),
            room_count: rooms.len(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn patient_count(&self) -> usize {
        self.patient_count
    }

    pub fn room_count(&self) -> usize {
        self.room_count
    }
}

fn write_csv<T, I>(path: &Path, records: I) -> Result<(), WorkspaceError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
