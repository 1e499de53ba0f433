// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、参考数据写入、协调器组装
// ==========================================

#![allow(dead_code)]

use bed_allocation::db::{ensure_schema, open_sqlite_connection};
use bed_allocation::engine::{AllocationCoordinator, AllocationRepositories, DaySolver, NeedsModel};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub const WARD: &str = "W";
pub const HOSPITAL: &str = "H";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（与被测仓储共用）
pub fn open_test_connection(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    let conn = open_sqlite_connection(db_path)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 写入病区及其房间
///
/// rooms: (房间号, 容量), 列表顺序即房间序号
pub fn seed_ward(conn: &Connection, ward: &str, hospital: &str, rooms: &[(i32, i32)]) {
    conn.execute(
        "INSERT OR IGNORE INTO hospital (hospital_code, hospital_name) VALUES (?1, ?1)",
        params![hospital],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO ward (ward_name, hospital_code) VALUES (?1, ?2)",
        params![ward, hospital],
    )
    .unwrap();
    for (position, (room_number, capacity)) in rooms.iter().enumerate() {
        conn.execute(
            r#"
            INSERT INTO room (room_number, ward_name, hospital_code, list_position, capacity, category)
            VALUES (?1, ?2, ?3, ?4, ?5, 'NORMAL')
            "#,
            params![room_number, ward, hospital, position as i64, capacity],
        )
        .unwrap();
    }
}

pub fn seed_patient(conn: &Connection, patient_id: &str, gender: &str, age: i32, infectious: bool) {
    conn.execute(
        "INSERT INTO patient (patient_id, gender, age, infectious) VALUES (?1, ?2, ?3, ?4)",
        params![patient_id, gender, age, infectious],
    )
    .unwrap();
}

pub fn seed_diagnosis(conn: &Connection, code: &str, name: &str) {
    conn.execute(
        "INSERT INTO diagnosis (code, name, severity_categories) VALUES (?1, ?2, '[\"NORMAL\"]')",
        params![code, name],
    )
    .unwrap();
    conn.execute(
        r#"
        INSERT INTO treatment_step (diagnosis_code, step_name, day_offset, need_hours, depends_on)
        VALUES (?1, 'ADMISSION', 0, 8, NULL)
        "#,
        params![code],
    )
    .unwrap();
}

/// 标准场景: 病区 W@H 两个房间 101(容量2) / 102(容量1), 患者 P1..P4, 诊断 D1
pub fn seed_two_room_ward(conn: &Connection) {
    seed_ward(conn, WARD, HOSPITAL, &[(101, 2), (102, 1)]);
    seed_patient(conn, "P1", "MALE", 64, false);
    seed_patient(conn, "P2", "MALE", 51, false);
    seed_patient(conn, "P3", "FEMALE", 47, false);
    seed_patient(conn, "P4", "FEMALE", 38, true);
    seed_diagnosis(conn, "D1", "Pneumonia");
}

/// 用共享连接组装协调器
pub fn build_coordinator(
    conn: Arc<Mutex<Connection>>,
    needs_model: Arc<dyn NeedsModel>,
    solver: Arc<dyn DaySolver>,
) -> AllocationCoordinator {
    AllocationCoordinator::new(
        AllocationRepositories::from_connection(conn),
        needs_model,
        solver,
        1,
    )
}

/// 统计上下文内的分配记录数
pub fn count_allocations(conn: &Arc<Mutex<Connection>>, simulated: bool) -> i64 {
    let conn = conn.lock().unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM patient_allocation WHERE simulated = ?1",
        params![simulated],
        |row| row.get(0),
    )
    .unwrap()
}

/// 统计上下文内某患者的轨迹行数
pub fn count_trajectories(conn: &Arc<Mutex<Connection>>, patient_id: &str, simulated: bool) -> i64 {
    let conn = conn.lock().unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM patient_trajectory WHERE patient_id = ?1 AND simulated = ?2",
        params![patient_id, simulated],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
