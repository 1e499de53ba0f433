// ==========================================
// 病房床位分配系统 - 分配协调器
// ==========================================
// 主流程 (持有上下文锁全程执行):
//   过期清理 → 场景校验 → 房间序号映射 → 工作区 → 占位分配
//   → 需求模型 → 轨迹合并 → 孤儿清理 → 逐日求解 → 写回房间号
// 失败策略:
// - 校验失败: 不调用外部服务, 直接返回
// - 单日 unsat / 空人群: 跳过该日, 变更数记 0
// - 全部日期无解: 回滚本次新建的占位分配与轨迹
// - 需求模型失败 / 外部服务异常: 直接失败, 占位分配保留 (记录 warn)
// ==========================================

use crate::domain::allocation::{
    AllocationOutcome, AllocationRequest, DayAllocation, PatientAllocation,
};
use crate::domain::patient::{Patient, TreatmentStep};
use crate::domain::room::{Room, Ward};
use crate::domain::types::{AllocationContext, DayStatus};
use crate::engine::day_solver::{DayProblem, DaySolution, DaySolver, SolverError};
use crate::engine::locks::ContextLocks;
use crate::engine::needs_model::{NeedsModel, NeedsModelError};
use crate::engine::repositories::AllocationRepositories;
use crate::engine::room_index::RoomIndexMap;
use crate::engine::trajectory::{retain_tracked, DailyNeedMatrix, TrajectoryAggregator};
use crate::engine::workspace::{ScenarioPatient, Workspace, WorkspaceError};
use crate::repository::{RepositoryError, RepositoryResult};
use chrono::{Duration, Local, NaiveDate};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// ==========================================
// AllocationError - 分配流程错误
// ==========================================
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("分配场景为空")]
    EmptyScenario,

    #[error("未知患者: {0:?}")]
    UnknownPatients(Vec<String>),

    #[error("病区不存在: ward={ward_name}, hospital={hospital_code}")]
    UnknownWard {
        ward_name: String,
        hospital_code: String,
    },

    #[error("病区没有可用房间: ward={ward_name}, hospital={hospital_code}")]
    NoRooms {
        ward_name: String,
        hospital_code: String,
    },

    #[error(transparent)]
    NeedsModel(#[from] NeedsModelError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("所有日期均未得到可行分配 (days={days})")]
    NoFeasibleAllocation { days: usize },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl AllocationError {
    /// 是否为请求校验类错误（未触发任何外部调用）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AllocationError::EmptyScenario
                | AllocationError::UnknownPatients(_)
                | AllocationError::UnknownWard { .. }
                | AllocationError::NoRooms { .. }
        )
    }
}

pub type AllocationResult<T> = Result<T, AllocationError>;

// ==========================================
// 运行内部状态
// ==========================================

/// 已校验的场景
struct ResolvedScenario {
    ward: Ward,
    rooms: Vec<Room>,
    patients: Vec<ScenarioPatient>,
    treatments: Vec<TreatmentStep>,
    /// 诊断代码 → (名称, 严重程度类别)
    diagnoses: HashMap<String, (String, Vec<String>)>,
}

/// 逐日求解的折叠状态
#[derive(Debug, Default)]
struct DayFold {
    /// 患者 → 当前房间序号 (连续性输入)
    current: HashMap<String, usize>,
    days: Vec<DayAllocation>,
    total_changes: u32,
}

// ==========================================
// AllocationCoordinator - 分配协调器
// ==========================================
pub struct AllocationCoordinator {
    repos: AllocationRepositories,
    needs_model: Arc<dyn NeedsModel>,
    solver: Arc<dyn DaySolver>,
    locks: ContextLocks,
    placeholder_due_days: i64,
}

impl AllocationCoordinator {
    /// 创建协调器
    ///
    /// # 参数
    /// - repos: 仓储集合
    /// - needs_model: 需求模型
    /// - solver: 单日求解器
    /// - placeholder_due_days: 占位分配的预计出院天数
    pub fn new(
        repos: AllocationRepositories,
        needs_model: Arc<dyn NeedsModel>,
        solver: Arc<dyn DaySolver>,
        placeholder_due_days: i64,
    ) -> Self {
        Self {
            repos,
            needs_model,
            solver,
            locks: ContextLocks::new(),
            placeholder_due_days,
        }
    }

    pub fn locks(&self) -> &ContextLocks {
        &self.locks
    }

    /// 查询上下文内的分配记录
    pub fn list_allocations(
        &self,
        context: AllocationContext,
    ) -> RepositoryResult<Vec<PatientAllocation>> {
        self.repos.allocation_repo.find_by_context(context)
    }

    /// 以当天日期执行分配
    pub async fn run_allocation(
        &self,
        request: &AllocationRequest,
    ) -> AllocationResult<AllocationOutcome> {
        self.run_allocation_at(request, Local::now().date_naive()).await
    }

    /// 执行分配主流程
    ///
    /// # 参数
    /// - request: 分配请求
    /// - today: 当前日期（第 0 天 = today + 上下文偏移）
    pub async fn run_allocation_at(
        &self,
        request: &AllocationRequest,
        today: NaiveDate,
    ) -> AllocationResult<AllocationOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let context = request.context;
        let base_date = today + Duration::days(request.effective_offset() as i64);

        debug!(run_id = %run_id, context = %context, "等待上下文锁");
        let _guard = self.locks.acquire(context).await;

        info!(
            run_id = %run_id,
            context = %context,
            ward = %request.ward_name,
            hospital = %request.hospital_code,
            mode = %request.mode,
            scenario_size = request.scenario.len(),
            base_date = %base_date,
            "开始分配流程"
        );

        // ==========================================
        // 步骤1: 过期清理
        // ==========================================
        self.sweep_expired(&run_id, context, base_date)?;

        // ==========================================
        // 步骤2: 校验场景、病区、房间
        // ==========================================
        let scenario = self.resolve_scenario(request)?;

        // ==========================================
        // 步骤3: 房间序号映射 + 工作区
        // ==========================================
        let index = RoomIndexMap::build(&scenario.rooms);
        let ordered_rooms = index.ordered_rooms(&scenario.rooms);
        let workspace = Workspace::build(
            &run_id,
            &scenario.ward,
            &ordered_rooms,
            &scenario.patients,
            &scenario.treatments,
        )?;

        // ==========================================
        // 步骤4: 占位分配
        // ==========================================
        let created = self.create_placeholders(&scenario, request, base_date)?;
        info!(run_id = %run_id, created = created.len(), "占位分配已创建");

        // ==========================================
        // 步骤5..: 需求计算与逐日求解
        // ==========================================
        let result = self
            .solve_and_persist(&run_id, request, base_date, &index, &ordered_rooms, &workspace)
            .await;
        drop(workspace);

        match result {
            Ok(outcome) => {
                info!(
                    run_id = %run_id,
                    context = %context,
                    days = outcome.days.len(),
                    total_changes = outcome.total_changes,
                    "分配流程完成"
                );
                Ok(outcome)
            }
            // 只有全部日期无解时回滚本次新建的占位
            Err(e @ AllocationError::NoFeasibleAllocation { .. }) => {
                warn!(run_id = %run_id, context = %context, error = %e, "分配流程失败, 回滚占位分配");
                if let Err(rollback_err) = self.rollback(&created, context) {
                    error!(run_id = %run_id, error = %rollback_err, "回滚失败");
                }
                Err(e)
            }
            Err(e) => {
                warn!(
                    run_id = %run_id,
                    context = %context,
                    error = %e,
                    placeholders = ?created,
                    "分配流程失败, 占位分配未回滚, 可能残留不完整记录"
                );
                Err(e)
            }
        }
    }

    // ==========================================
    // 过期清理
    // ==========================================

    /// 删除预计出院早于 cutoff 的分配及其轨迹, 以及早于 cutoff 的轨迹
    fn sweep_expired(
        &self,
        run_id: &str,
        context: AllocationContext,
        cutoff: NaiveDate,
    ) -> RepositoryResult<()> {
        let expired: Vec<String> = self
            .repos
            .allocation_repo
            .find_by_due_date_before(cutoff, context)?
            .into_iter()
            .map(|a| a.patient_id)
            .collect();

        let trajectories = self.repos.trajectory_repo.delete_by_patients(&expired, context)?
            + self.repos.trajectory_repo.delete_by_date_before(cutoff, context)?;
        let allocations = self.repos.allocation_repo.delete_by_patients(&expired, context)?;

        info!(
            run_id = %run_id,
            cutoff = %cutoff,
            allocations,
            trajectories,
            "过期清理完成"
        );
        Ok(())
    }

    // ==========================================
    // 校验
    // ==========================================

    fn resolve_scenario(&self, request: &AllocationRequest) -> AllocationResult<ResolvedScenario> {
        if request.scenario.is_empty() {
            return Err(AllocationError::EmptyScenario);
        }

        // 同一患者重复出现时保留第一条
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for entry in &request.scenario {
            if seen.insert(entry.patient_id.clone()) {
                entries.push(entry);
            } else {
                warn!(patient_id = %entry.patient_id, "场景中患者重复, 已忽略");
            }
        }

        let ids: Vec<String> = entries.iter().map(|e| e.patient_id.clone()).collect();
        let known: HashMap<String, Patient> = self
            .repos
            .reference_repo
            .find_patients_by_ids(&ids)?
            .into_iter()
            .map(|p| (p.patient_id.clone(), p))
            .collect();

        let unknown: Vec<String> = ids.iter().filter(|id| !known.contains_key(*id)).cloned().collect();
        if !unknown.is_empty() {
            return Err(AllocationError::UnknownPatients(unknown));
        }

        let ward = self
            .repos
            .reference_repo
            .get_ward_by_name_and_hospital(&request.ward_name, &request.hospital_code)?
            .ok_or_else(|| AllocationError::UnknownWard {
                ward_name: request.ward_name.clone(),
                hospital_code: request.hospital_code.clone(),
            })?;

        let rooms = self
            .repos
            .reference_repo
            .get_rooms_by_ward_hospital(&request.ward_name, &request.hospital_code)?;
        if rooms.is_empty() {
            return Err(AllocationError::NoRooms {
                ward_name: request.ward_name.clone(),
                hospital_code: request.hospital_code.clone(),
            });
        }

        let mut diagnoses = HashMap::new();
        let mut patients = Vec::with_capacity(entries.len());
        for entry in entries {
            let code = entry
                .diagnosis
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);

            if let Some(code) = &code {
                if !diagnoses.contains_key(code) {
                    match self.repos.reference_repo.find_diagnosis(code)? {
                        Some(d) => {
                            diagnoses.insert(code.clone(), (d.name, d.severity_categories));
                        }
                        None => warn!(diagnosis = %code, "诊断不在参考数据中"),
                    }
                }
            }

            if let Some(patient) = known.get(&entry.patient_id) {
                patients.push(ScenarioPatient {
                    patient: patient.clone(),
                    diagnosis_code: code,
                });
            }
        }

        let codes: Vec<String> = diagnoses.keys().cloned().collect();
        let treatments = self.repos.reference_repo.list_treatment_steps(&codes)?;

        Ok(ResolvedScenario {
            ward,
            rooms,
            patients,
            treatments,
            diagnoses,
        })
    }

    // ==========================================
    // 占位分配
    // ==========================================

    /// 为尚无分配记录的患者创建占位分配, 返回新建的患者ID
    fn create_placeholders(
        &self,
        scenario: &ResolvedScenario,
        request: &AllocationRequest,
        base_date: NaiveDate,
    ) -> RepositoryResult<Vec<String>> {
        let due_date = base_date + Duration::days(self.placeholder_due_days);
        let mut placeholders = Vec::new();

        for sp in &scenario.patients {
            let patient_id = &sp.patient.patient_id;
            if self.repos.allocation_repo.find(patient_id, request.context)?.is_some() {
                continue;
            }

            let (name, categories) = sp
                .diagnosis_code
                .as_ref()
                .and_then(|code| scenario.diagnoses.get(code))
                .cloned()
                .map(|(name, categories)| (Some(name), categories))
                .unwrap_or((None, Vec::new()));

            placeholders.push(PatientAllocation::placeholder(
                patient_id,
                request.context,
                request.effective_offset(),
                sp.diagnosis_code.clone(),
                name,
                categories,
                due_date,
            ));
        }

        self.repos.allocation_repo.save_all(&placeholders)?;
        Ok(placeholders.into_iter().map(|a| a.patient_id).collect())
    }

    // ==========================================
    // 需求计算 → 轨迹合并 → 逐日求解 → 写回
    // ==========================================

    async fn solve_and_persist(
        &self,
        run_id: &str,
        request: &AllocationRequest,
        base_date: NaiveDate,
        index: &RoomIndexMap,
        ordered_rooms: &[&Room],
        workspace: &Workspace,
    ) -> AllocationResult<AllocationOutcome> {
        let context = request.context;

        debug!(run_id = %run_id, workspace = %workspace.path().display(), "调用需求模型");
        let needs = self.needs_model.compute_needs(workspace).await?;

        let aggregator = TrajectoryAggregator::new(
            self.repos.trajectory_repo.clone(),
            self.repos.allocation_repo.clone(),
        );
        let aggregated = aggregator.aggregate(&needs, context, base_date)?;
        debug!(
            run_id = %run_id,
            inserted_rows = aggregated.inserted_rows,
            patients = aggregated.totals.len(),
            latest_due = ?aggregated.due_dates.values().max(),
            "轨迹聚合结果"
        );
        let mut matrix = aggregated.matrix;

        self.cleanup_orphans(run_id, context)?;

        // 只保留当前仍有分配记录的患者
        let tracked: HashMap<String, PatientAllocation> = self
            .repos
            .allocation_repo
            .find_by_context(context)?
            .into_iter()
            .map(|a| (a.patient_id.clone(), a))
            .collect();
        let tracked_ids: HashSet<String> = tracked.keys().cloned().collect();
        retain_tracked(&mut matrix, &tracked_ids);

        let population_ids: Vec<String> = matrix.patient_ids().into_iter().collect();
        let patients: HashMap<String, Patient> = self
            .repos
            .reference_repo
            .find_patients_by_ids(&population_ids)?
            .into_iter()
            .map(|p| (p.patient_id.clone(), p))
            .collect();

        let initial = initial_ordinals(run_id, &tracked, index);
        let fold = self
            .solve_days(run_id, request, base_date, index, ordered_rooms, &matrix, &patients, initial)
            .await?;

        if !fold.days.iter().any(DayAllocation::is_solved) {
            return Err(AllocationError::NoFeasibleAllocation {
                days: fold.days.len(),
            });
        }

        let final_rooms = self.persist_final_rooms(run_id, &tracked, index, &fold.current)?;

        Ok(AllocationOutcome {
            run_id: run_id.to_string(),
            context,
            days: fold.days,
            total_changes: fold.total_changes,
            final_rooms,
        })
    }

    /// 删除缺失诊断的分配及其轨迹
    fn cleanup_orphans(&self, run_id: &str, context: AllocationContext) -> RepositoryResult<()> {
        let orphans: Vec<String> = self
            .repos
            .allocation_repo
            .find_without_diagnosis(context)?
            .into_iter()
            .map(|a| a.patient_id)
            .collect();
        if orphans.is_empty() {
            return Ok(());
        }

        for patient_id in &orphans {
            warn!(run_id = %run_id, patient_id = %patient_id, "删除缺失诊断的分配记录");
        }
        self.repos.trajectory_repo.delete_by_patients(&orphans, context)?;
        self.repos.allocation_repo.delete_by_patients(&orphans, context)?;
        Ok(())
    }

    /// 逐日求解; 每天的结果作为下一天的连续性输入
    #[allow(clippy::too_many_arguments)]
    async fn solve_days(
        &self,
        run_id: &str,
        request: &AllocationRequest,
        base_date: NaiveDate,
        index: &RoomIndexMap,
        ordered_rooms: &[&Room],
        matrix: &DailyNeedMatrix,
        patients: &HashMap<String, Patient>,
        initial: HashMap<String, usize>,
    ) -> AllocationResult<DayFold> {
        let mut fold = DayFold {
            current: initial,
            ..DayFold::default()
        };

        for day in 0..matrix.day_count() {
            let date = base_date + Duration::days(day as i64);
            let problem = DayProblem::build(
                ordered_rooms,
                matrix.day(day),
                patients,
                &fold.current,
                request.mode,
            );

            match self.solver.solve_day(&problem).await? {
                DaySolution::Solved { rooms, changes } => {
                    let mut by_room: BTreeMap<i32, Vec<String>> = BTreeMap::new();
                    for (ordinal, ids) in rooms {
                        // 序号不在当前房间列表: 这些患者保持前一天的房间
                        let Some(room_number) = index.to_room_number(ordinal) else {
                            warn!(
                                run_id = %run_id,
                                day,
                                ordinal,
                                patients = ?ids,
                                "求解结果中的房间序号不在当前房间列表, 保持原房间"
                            );
                            continue;
                        };
                        for id in &ids {
                            fold.current.insert(id.clone(), ordinal);
                        }
                        by_room.entry(room_number).or_default().extend(ids);
                    }

                    debug!(run_id = %run_id, day, changes, rooms = by_room.len(), "当日求解完成");
                    fold.total_changes += changes;
                    fold.days.push(DayAllocation {
                        day,
                        date,
                        status: DayStatus::Solved,
                        rooms: by_room,
                        changes,
                    });
                }
                DaySolution::Unsat => {
                    warn!(run_id = %run_id, day, "当日无可行解, 跳过");
                    fold.days.push(DayAllocation::skipped(day, date, DayStatus::Unsat));
                }
                DaySolution::Empty => {
                    warn!(run_id = %run_id, day, "当日无待分配患者, 跳过");
                    fold.days.push(DayAllocation::skipped(day, date, DayStatus::Empty));
                }
            }
        }

        Ok(fold)
    }

    /// 序号翻译回房间号并写回分配记录
    fn persist_final_rooms(
        &self,
        run_id: &str,
        tracked: &HashMap<String, PatientAllocation>,
        index: &RoomIndexMap,
        current: &HashMap<String, usize>,
    ) -> RepositoryResult<BTreeMap<String, i32>> {
        let mut final_rooms = BTreeMap::new();
        let mut changed = Vec::new();

        for (patient_id, ordinal) in current {
            let Some(allocation) = tracked.get(patient_id) else {
                continue;
            };
            let room_number = index.resolve_room_number(*ordinal, allocation.room_number);
            final_rooms.insert(patient_id.clone(), room_number);

            if room_number != allocation.room_number {
                let mut updated = allocation.clone();
                updated.room_number = room_number;
                changed.push(updated);
            }
        }

        let updated = self.repos.allocation_repo.update_all(&changed)?;
        info!(run_id = %run_id, updated, "最终房间号已写回");
        Ok(final_rooms)
    }

    /// 删除本次新建的占位分配及其轨迹
    fn rollback(&self, created: &[String], context: AllocationContext) -> RepositoryResult<()> {
        let trajectories = self.repos.trajectory_repo.delete_by_patients(created, context)?;
        let allocations = self.repos.allocation_repo.delete_by_patients(created, context)?;
        warn!(
            context = %context,
            allocations,
            trajectories,
            "已回滚本次新建的分配与轨迹"
        );
        Ok(())
    }
}

/// 已持久化房间号 → 初始序号; 不在当前房间列表中的房间号视为无连续性输入
fn initial_ordinals(
    run_id: &str,
    tracked: &HashMap<String, PatientAllocation>,
    index: &RoomIndexMap,
) -> HashMap<String, usize> {
    let mut initial = HashMap::new();
    for allocation in tracked.values().filter(|a| a.is_assigned()) {
        match index.to_ordinal(allocation.room_number) {
            Some(ordinal) => {
                initial.insert(allocation.patient_id.clone(), ordinal);
            }
            None => warn!(
                run_id = %run_id,
                patient_id = %allocation.patient_id,
                room_number = allocation.room_number,
                "房间号不在当前房间列表中"
            ),
        }
    }
    initial
}
