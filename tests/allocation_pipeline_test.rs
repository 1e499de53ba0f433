// ==========================================
// 分配流程集成测试
// ==========================================
// 范围: 过期清理 → 校验 → 占位 → 需求模型 → 轨迹合并 → 孤儿清理 → 逐日求解 → 写回
// 外部服务: ScriptedNeedsModel / ScriptedSolver
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

mod helpers;

use bed_allocation::domain::{
    AllocationContext, AllocationRequest, DayStatus, OptimizationMode, PatientAllocation,
    PatientTrajectory, ScenarioEntry,
};
use bed_allocation::engine::{AllocationError, DaySolution};
use bed_allocation::repository::{PatientAllocationRepository, PatientTrajectoryRepository};
use helpers::mock_services::{needs, solved, ScriptedNeedsModel, ScriptedSolver};
use std::sync::Arc;
use test_helpers::*;

fn entry(patient_id: &str, diagnosis: Option<&str>) -> ScenarioEntry {
    ScenarioEntry {
        patient_id: patient_id.to_string(),
        diagnosis: diagnosis.map(str::to_string),
    }
}

fn live_request(entries: Vec<ScenarioEntry>) -> AllocationRequest {
    AllocationRequest::live(entries, WARD, HOSPITAL, OptimizationMode::MinChanges)
}

fn existing_allocation(
    patient_id: &str,
    context: AllocationContext,
    room_number: i32,
    due_date: chrono::NaiveDate,
) -> PatientAllocation {
    let mut a = PatientAllocation::placeholder(
        patient_id,
        context,
        0,
        Some("D1".to_string()),
        Some("Pneumonia".to_string()),
        vec!["NORMAL".to_string()],
        due_date,
    );
    a.room_number = room_number;
    a
}

struct Fixture {
    _temp: tempfile::NamedTempFile,
    conn: Arc<std::sync::Mutex<rusqlite::Connection>>,
    allocation_repo: PatientAllocationRepository,
    trajectory_repo: PatientTrajectoryRepository,
}

fn fixture() -> Fixture {
    let (temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_two_room_ward(&conn.lock().unwrap());
    Fixture {
        _temp: temp,
        allocation_repo: PatientAllocationRepository::from_connection(conn.clone()),
        trajectory_repo: PatientTrajectoryRepository::from_connection(conn.clone()),
        conn,
    }
}

// ==========================================
// 示例场景: 2 房间 [2,1], P1/P2 诊断 D1
// ==========================================

#[tokio::test]
async fn test_two_room_worked_example() {
    let fx = fixture();
    let today = date(2026, 3, 1);

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[
        &[("P1", 8), ("P2", 4)],
        &[("P1", 4)],
    ])));
    let solver = Arc::new(ScriptedSolver::new(vec![
        solved(&[(0, &["P1", "P2"])], 0),
        solved(&[(0, &["P1"])], 0),
    ]));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model.clone(), solver.clone());

    let outcome = coordinator
        .run_allocation_at(
            &live_request(vec![entry("P1", Some("D1")), entry("P2", Some("D1"))]),
            today,
        )
        .await
        .unwrap();

    assert_eq!(outcome.total_changes, 0);
    assert_eq!(outcome.days.len(), 2);
    assert_eq!(outcome.days[0].rooms[&101], vec!["P1".to_string(), "P2".to_string()]);
    assert_eq!(outcome.days[1].rooms[&101], vec!["P1".to_string()]);
    assert_eq!(outcome.days[1].date, date(2026, 3, 2));
    assert_eq!(outcome.final_rooms["P1"], 101);
    assert_eq!(outcome.final_rooms["P2"], 101);

    // 持久化: 房间号 + 预计出院 (12/24 = 0 天)
    let p1 = fx.allocation_repo.find("P1", AllocationContext::Live).unwrap().unwrap();
    assert_eq!(p1.room_number, 101);
    assert_eq!(p1.due_date, today);
    assert_eq!(p1.diagnosis_name.as_deref(), Some("Pneumonia"));
    let p2 = fx.allocation_repo.find("P2", AllocationContext::Live).unwrap().unwrap();
    assert_eq!(p2.room_number, 101);

    assert_eq!(count_trajectories(&fx.conn, "P1", false), 2);
    assert_eq!(count_trajectories(&fx.conn, "P2", false), 1);
    assert_eq!(needs_model.calls(), 1);
    assert_eq!(solver.problems().len(), 2);
}

// ==========================================
// 变更数可加性
// ==========================================

#[tokio::test]
async fn test_change_count_additivity_with_skipped_days() {
    let fx = fixture();

    // 第1天无需求 (空人群, 不调用求解器), 第2天 unsat
    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[
        &[("P1", 8)],
        &[],
        &[("P1", 8), ("P2", 4)],
        &[("P1", 8)],
    ])));
    let solver = Arc::new(ScriptedSolver::new(vec![
        solved(&[(1, &["P1"])], 2),
        DaySolution::Unsat,
        solved(&[(0, &["P1"])], 3),
    ]));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model, solver.clone());

    let outcome = coordinator
        .run_allocation_at(
            &live_request(vec![entry("P1", Some("D1")), entry("P2", Some("D1"))]),
            date(2026, 3, 1),
        )
        .await
        .unwrap();

    let statuses: Vec<DayStatus> = outcome.days.iter().map(|d| d.status).collect();
    assert_eq!(
        statuses,
        vec![DayStatus::Solved, DayStatus::Empty, DayStatus::Unsat, DayStatus::Solved]
    );
    let per_day: u32 = outcome.days.iter().map(|d| d.changes).sum();
    assert_eq!(outcome.total_changes, 5);
    assert_eq!(per_day, outcome.total_changes);
    assert_eq!(outcome.days[1].changes, 0);
    assert_eq!(outcome.days[2].changes, 0);
    assert_eq!(solver.problems().len(), 3);

    // 最后一次分配决定最终房间
    assert_eq!(outcome.final_rooms["P1"], 101);
}

// ==========================================
// 连续性: 第1天的上一房间 = 第0天的结果
// ==========================================

#[tokio::test]
async fn test_sequential_continuity_uses_previous_day_room() {
    let fx = fixture();
    let today = date(2026, 3, 1);

    // P1 运行前持久化在 102 (序号 1)
    fx.allocation_repo
        .save(&existing_allocation("P1", AllocationContext::Live, 102, date(2026, 3, 10)))
        .unwrap();

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[
        &[("P1", 8)],
        &[("P1", 8)],
    ])));
    let solver = Arc::new(ScriptedSolver::new(vec![
        solved(&[(0, &["P1"])], 1),
        solved(&[(0, &["P1"])], 0),
    ]));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model, solver.clone());

    coordinator
        .run_allocation_at(&live_request(vec![entry("P1", Some("D1"))]), today)
        .await
        .unwrap();

    let problems = solver.problems();
    assert_eq!(problems.len(), 2);
    assert_eq!(problems[0].previous_ordinal_of("P1"), Some(1));
    assert_eq!(problems[1].previous_ordinal_of("P1"), Some(0));

    let p1 = fx.allocation_repo.find("P1", AllocationContext::Live).unwrap().unwrap();
    assert_eq!(p1.room_number, 101);
}

// ==========================================
// 全部日期无解 → 回滚新建记录
// ==========================================

#[tokio::test]
async fn test_total_failure_rolls_back_new_patients() {
    let fx = fixture();
    let today = date(2026, 3, 1);

    // P3 在运行前已存在, 不属于本次新建
    fx.allocation_repo
        .save(&existing_allocation("P3", AllocationContext::Live, 102, date(2026, 3, 10)))
        .unwrap();

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[
        &[("P1", 8), ("P2", 8), ("P3", 8)],
        &[("P1", 8)],
    ])));
    let solver = Arc::new(ScriptedSolver::always_unsat());
    let coordinator = build_coordinator(fx.conn.clone(), needs_model, solver);

    let err = coordinator
        .run_allocation_at(
            &live_request(vec![
                entry("P1", Some("D1")),
                entry("P2", Some("D1")),
                entry("P3", Some("D1")),
            ]),
            today,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::NoFeasibleAllocation { days: 2 }));

    for id in ["P1", "P2"] {
        assert!(fx.allocation_repo.find(id, AllocationContext::Live).unwrap().is_none());
        assert_eq!(count_trajectories(&fx.conn, id, false), 0);
    }
    let p3 = fx.allocation_repo.find("P3", AllocationContext::Live).unwrap().unwrap();
    assert_eq!(p3.room_number, 102);
}

#[tokio::test]
async fn test_needs_failure_keeps_placeholders() {
    let fx = fixture();

    let needs_model = Arc::new(ScriptedNeedsModel::failing());
    let solver = Arc::new(ScriptedSolver::new(Vec::new()));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model.clone(), solver.clone());

    let err = coordinator
        .run_allocation_at(&live_request(vec![entry("P1", Some("D1"))]), date(2026, 3, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, AllocationError::NeedsModel(_)));
    assert_eq!(needs_model.calls(), 1);
    assert!(solver.problems().is_empty());

    // 需求模型失败不回滚: 占位记录保留且未分配房间
    let p1 = fx.allocation_repo.find("P1", AllocationContext::Live).unwrap().unwrap();
    assert!(!p1.is_assigned());
    assert_eq!(count_trajectories(&fx.conn, "P1", false), 0);
}

#[tokio::test]
async fn test_solver_outage_fails_run_without_rollback() {
    let fx = fixture();

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[&[("P1", 8)]])));
    let solver = Arc::new(ScriptedSolver::unavailable(503));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model, solver);

    let err = coordinator
        .run_allocation_at(&live_request(vec![entry("P1", Some("D1"))]), date(2026, 3, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, AllocationError::Solver(_)));
    let p1 = fx.allocation_repo.find("P1", AllocationContext::Live).unwrap().unwrap();
    assert!(!p1.is_assigned());
    assert_eq!(count_trajectories(&fx.conn, "P1", false), 1);
}

// ==========================================
// 全量在院人群 / 越界房间序号
// ==========================================

fn seed_tracked_p3(fx: &Fixture, need_level: u32) {
    fx.allocation_repo
        .save(&existing_allocation("P3", AllocationContext::Live, 102, date(2026, 3, 10)))
        .unwrap();
    let rows: Vec<PatientTrajectory> = [date(2026, 3, 1), date(2026, 3, 2)]
        .into_iter()
        .map(|day_date| PatientTrajectory {
            patient_id: "P3".to_string(),
            day_date,
            need_level,
            context: AllocationContext::Live,
        })
        .collect();
    fx.trajectory_repo.insert_if_absent_all(&rows).unwrap();
}

#[tokio::test]
async fn test_tracked_patient_outside_scenario_joins_day_problem() {
    let fx = fixture();
    seed_tracked_p3(&fx, 6);

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[&[("P1", 8)]])));
    let solver = Arc::new(ScriptedSolver::new(vec![
        solved(&[(0, &["P1"]), (1, &["P3"])], 0),
        solved(&[(1, &["P3"])], 0),
    ]));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model, solver.clone());

    let outcome = coordinator
        .run_allocation_at(&live_request(vec![entry("P1", Some("D1"))]), date(2026, 3, 1))
        .await
        .unwrap();

    let problems = solver.problems();
    assert_eq!(problems.len(), 2);

    // P3 不在本次场景中, 仍以持久化轨迹与房间进入求解
    let day0 = &problems[0];
    let p3 = day0.patient_ids.iter().position(|id| id == "P3").unwrap();
    assert!(day0.patient_ids.contains(&"P1".to_string()));
    assert_eq!(day0.need_distances[p3], 6);
    assert_eq!(day0.previous_ordinal_of("P3"), Some(1));
    assert_eq!(problems[1].patient_ids, vec!["P3".to_string()]);

    assert_eq!(outcome.final_rooms.get("P3"), Some(&102));
    assert_eq!(outcome.final_rooms.get("P1"), Some(&101));
}

#[tokio::test]
async fn test_unknown_room_ordinal_keeps_previous_room() {
    let fx = fixture();
    seed_tracked_p3(&fx, 6);

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[
        &[("P1", 8)],
        &[("P1", 8)],
    ])));
    let solver = Arc::new(ScriptedSolver::new(vec![
        solved(&[(0, &["P1"]), (7, &["P3"])], 0),
        solved(&[(0, &["P1"])], 0),
    ]));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model, solver.clone());

    let outcome = coordinator
        .run_allocation_at(&live_request(vec![entry("P1", Some("D1"))]), date(2026, 3, 1))
        .await
        .unwrap();

    // 越界序号被忽略, 其余分配照常生效
    assert_eq!(outcome.days[0].status, DayStatus::Solved);
    assert_eq!(outcome.days[0].rooms.get(&101), Some(&vec!["P1".to_string()]));
    assert_eq!(outcome.days[0].rooms.len(), 1);

    // P3 在第 1 天的连续性输入仍为原房间
    let problems = solver.problems();
    assert_eq!(problems[1].previous_ordinal_of("P3"), Some(1));

    let p1 = fx.allocation_repo.find("P1", AllocationContext::Live).unwrap().unwrap();
    assert_eq!(p1.room_number, 101);
    let p3 = fx.allocation_repo.find("P3", AllocationContext::Live).unwrap().unwrap();
    assert_eq!(p3.room_number, 102);
}

// ==========================================
// 过期清理
// ==========================================

#[tokio::test]
async fn test_expiry_sweep_removes_past_due_allocations() {
    let fx = fixture();
    let today = date(2026, 3, 1);

    fx.allocation_repo
        .save(&existing_allocation("P3", AllocationContext::Live, 102, date(2026, 2, 20)))
        .unwrap();
    fx.trajectory_repo
        .insert_if_absent_all(&[
            PatientTrajectory {
                patient_id: "P3".to_string(),
                day_date: date(2026, 2, 19),
                need_level: 8,
                context: AllocationContext::Live,
            },
            PatientTrajectory {
                patient_id: "P3".to_string(),
                day_date: date(2026, 3, 5),
                need_level: 8,
                context: AllocationContext::Live,
            },
        ])
        .unwrap();

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[&[("P1", 8)]])));
    let solver = Arc::new(ScriptedSolver::new(vec![solved(&[(0, &["P1"])], 0)]));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model, solver.clone());

    coordinator
        .run_allocation_at(&live_request(vec![entry("P1", Some("D1"))]), today)
        .await
        .unwrap();

    assert!(fx.allocation_repo.find("P3", AllocationContext::Live).unwrap().is_none());
    assert_eq!(count_trajectories(&fx.conn, "P3", false), 0);
    assert!(solver.problems().iter().all(|p| !p.patient_ids.contains(&"P3".to_string())));
}

#[tokio::test]
async fn test_simulated_offset_sweeps_only_simulated_context() {
    let fx = fixture();
    let today = date(2026, 3, 1);

    // 两个上下文各有一条 3/5 到期的记录
    fx.allocation_repo
        .save(&existing_allocation("P3", AllocationContext::Live, 102, date(2026, 3, 5)))
        .unwrap();
    fx.allocation_repo
        .save(&existing_allocation("P3", AllocationContext::Simulated, 102, date(2026, 3, 5)))
        .unwrap();

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[&[("P1", 48)]])));
    let solver = Arc::new(ScriptedSolver::new(vec![solved(&[(1, &["P1"])], 0)]));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model, solver);

    // 偏移 10 天 → 截止 3/11
    let request = AllocationRequest::simulated(
        vec![entry("P1", Some("D1"))],
        WARD,
        HOSPITAL,
        OptimizationMode::MinMaxOccupancy,
        10,
    );
    let outcome = coordinator.run_allocation_at(&request, today).await.unwrap();

    assert_eq!(outcome.context, AllocationContext::Simulated);
    assert_eq!(outcome.days[0].date, date(2026, 3, 11));
    assert!(fx.allocation_repo.find("P3", AllocationContext::Simulated).unwrap().is_none());
    assert!(fx.allocation_repo.find("P3", AllocationContext::Live).unwrap().is_some());

    let p1 = fx.allocation_repo.find("P1", AllocationContext::Simulated).unwrap().unwrap();
    assert_eq!(p1.iteration, 10);
    assert_eq!(p1.room_number, 102);
    // 48/24 = 2 天
    assert_eq!(p1.due_date, date(2026, 3, 13));
    assert!(fx.allocation_repo.find("P1", AllocationContext::Live).unwrap().is_none());
}

// ==========================================
// 孤儿清理
// ==========================================

#[tokio::test]
async fn test_orphan_cleanup_drops_patients_without_diagnosis() {
    let fx = fixture();

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[&[("P1", 8), ("P2", 8)]])));
    let solver = Arc::new(ScriptedSolver::new(vec![solved(&[(0, &["P1"])], 0)]));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model, solver.clone());

    let outcome = coordinator
        .run_allocation_at(
            &live_request(vec![entry("P1", Some("D1")), entry("P2", Some("  "))]),
            date(2026, 3, 1),
        )
        .await
        .unwrap();

    assert_eq!(solver.problems()[0].patient_ids, vec!["P1".to_string()]);
    assert!(fx.allocation_repo.find("P2", AllocationContext::Live).unwrap().is_none());
    assert_eq!(count_trajectories(&fx.conn, "P2", false), 0);
    assert!(!outcome.final_rooms.contains_key("P2"));
}

// ==========================================
// 校验失败不修改任何状态
// ==========================================

#[tokio::test]
async fn test_validation_failures_mutate_nothing() {
    let fx = fixture();
    fx.allocation_repo
        .save(&existing_allocation("P3", AllocationContext::Live, 102, date(2026, 3, 10)))
        .unwrap();

    let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[&[("P1", 8)]])));
    let solver = Arc::new(ScriptedSolver::new(Vec::new()));
    let coordinator = build_coordinator(fx.conn.clone(), needs_model.clone(), solver.clone());
    let today = date(2026, 3, 1);

    let err = coordinator
        .run_allocation_at(
            &live_request(vec![entry("P1", Some("D1")), entry("NOPE", Some("D1"))]),
            today,
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(matches!(&err, AllocationError::UnknownPatients(ids) if ids == &vec!["NOPE".to_string()]));

    let unknown_ward = AllocationRequest::live(
        vec![entry("P1", Some("D1"))],
        "NO_WARD",
        HOSPITAL,
        OptimizationMode::MinChanges,
    );
    let err = coordinator.run_allocation_at(&unknown_ward, today).await.unwrap_err();
    assert!(matches!(err, AllocationError::UnknownWard { .. }));

    let err = coordinator
        .run_allocation_at(&live_request(Vec::new()), today)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::EmptyScenario));

    assert_eq!(needs_model.calls(), 0);
    assert!(solver.problems().is_empty());
    assert_eq!(count_allocations(&fx.conn, false), 1);
    assert!(fx.allocation_repo.find("P1", AllocationContext::Live).unwrap().is_none());
}

// ==========================================
// 重复运行: 已有轨迹不重复写入
// ==========================================

#[tokio::test]
async fn test_rerun_keeps_trajectories_unique() {
    let fx = fixture();
    let today = date(2026, 3, 1);
    let request = live_request(vec![entry("P1", Some("D1"))]);

    for _ in 0..2 {
        let needs_model = Arc::new(ScriptedNeedsModel::returning(needs(&[
            &[("P1", 8)],
            &[("P1", 8)],
        ])));
        let solver = Arc::new(ScriptedSolver::new(vec![
            solved(&[(0, &["P1"])], 0),
            solved(&[(0, &["P1"])], 0),
        ]));
        build_coordinator(fx.conn.clone(), needs_model, solver)
            .run_allocation_at(&request, today)
            .await
            .unwrap();
    }

    assert_eq!(count_trajectories(&fx.conn, "P1", false), 2);
    assert_eq!(count_allocations(&fx.conn, false), 1);
}
