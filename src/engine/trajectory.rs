// ==========================================
// 病房床位分配系统 - 需求轨迹聚合
// ==========================================
// 职责:
// 1. 将需求模型的新结果与已有轨迹合并为完整的按天需求矩阵
// 2. 只插入 (天, 患者) 尚不存在的条目, 保证重复计算幂等
// 3. 按累计需求重算预计出院日期: base + floor(total / 24) 天
// 4. 新轨迹行单事务批量写入
// ==========================================

use crate::domain::allocation::{PatientAllocation, PatientTrajectory};
use crate::domain::types::AllocationContext;
use crate::engine::needs_model::DailyNeeds;
use crate::repository::{PatientAllocationRepository, PatientTrajectoryRepository, RepositoryResult};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// 需求等级 → 天 的换算单位 (需求以小时计)
pub const NEED_UNITS_PER_DAY: u32 = 24;

// ==========================================
// DailyNeedMatrix - 按天需求矩阵
// ==========================================
// 下标 = 相对 base_date 的天偏移
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyNeedMatrix {
    days: Vec<Vec<(String, u32)>>,
}

impl DailyNeedMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// 扩展到至少 len 天
    pub fn grow_to(&mut self, len: usize) {
        if self.days.len() < len {
            self.days.resize_with(len, Vec::new);
        }
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn day(&self, day: usize) -> &[(String, u32)] {
        self.days.get(day).map(|d| d.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, day: usize, patient_id: &str) -> bool {
        self.day(day).iter().any(|(p, _)| p == patient_id)
    }

    /// 插入 (天, 患者) 条目; 已存在时不覆盖
    ///
    /// # 返回
    /// 是否实际插入
    pub fn insert_if_absent(&mut self, day: usize, patient_id: &str, need: u32) -> bool {
        if need == 0 || self.contains(day, patient_id) {
            return false;
        }
        self.grow_to(day + 1);
        self.days[day].push((patient_id.to_string(), need));
        true
    }

    /// 矩阵中出现的全部患者
    pub fn patient_ids(&self) -> BTreeSet<String> {
        self.days
            .iter()
            .flat_map(|d| d.iter().map(|(p, _)| p.clone()))
            .collect()
    }

    /// 仅保留满足条件的患者
    pub fn retain_patients<F>(&mut self, keep: F)
    where
        F: Fn(&str) -> bool,
    {
        for day in &mut self.days {
            day.retain(|(p, _)| keep(p));
        }
    }

    /// 各患者累计需求
    pub fn totals(&self) -> BTreeMap<String, u32> {
        let mut totals = BTreeMap::new();
        for day in &self.days {
            for (p, need) in day {
                *totals.entry(p.clone()).or_insert(0) += *need;
            }
        }
        totals
    }
}

// ==========================================
// 合并 (纯函数)
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub matrix: DailyNeedMatrix,
    pub totals: BTreeMap<String, u32>,
    /// 需要新写入的轨迹行
    pub new_rows: Vec<PatientTrajectory>,
}

/// 合并新需求与已有轨迹
///
/// # 参数
/// - fresh: 需求模型输出（天偏移相对 base_date）
/// - existing: 同一上下文的已有轨迹
/// - context: 分配上下文
/// - base_date: 第 0 天对应的日期
///
/// # 规则
/// - 已有轨迹优先; 早于 base_date 的轨迹不进入矩阵
/// - 新需求只在 (天, 患者) 不存在时插入, 并生成新轨迹行
pub fn merge(
    fresh: &DailyNeeds,
    existing: &[PatientTrajectory],
    context: AllocationContext,
    base_date: NaiveDate,
) -> MergeOutcome {
    let existing_offsets: Vec<(usize, &PatientTrajectory)> = existing
        .iter()
        .filter(|t| t.context == context)
        .filter_map(|t| {
            let offset = (t.day_date - base_date).num_days();
            (offset >= 0).then_some((offset as usize, t))
        })
        .collect();

    let max_existing = existing_offsets.iter().map(|(d, _)| d + 1).max().unwrap_or(0);

    let mut matrix = DailyNeedMatrix::new();
    matrix.grow_to(fresh.len().max(max_existing));

    for (day, t) in &existing_offsets {
        matrix.insert_if_absent(*day, &t.patient_id, t.need_level);
    }

    let mut new_rows = Vec::new();
    for (day, entries) in fresh.iter().enumerate() {
        for (patient_id, need) in entries {
            if matrix.insert_if_absent(day, patient_id, *need) {
                new_rows.push(PatientTrajectory {
                    patient_id: patient_id.clone(),
                    day_date: base_date + Duration::days(day as i64),
                    need_level: *need,
                    context,
                });
            }
        }
    }

    let totals = matrix.totals();
    MergeOutcome {
        matrix,
        totals,
        new_rows,
    }
}

/// 预计出院日期: base + floor(total / 24) 天（日期粒度, 即零点）
pub fn due_date_for(base_date: NaiveDate, total_need: u32) -> NaiveDate {
    base_date + Duration::days((total_need / NEED_UNITS_PER_DAY) as i64)
}

// ==========================================
// TrajectoryAggregator - 带持久化的聚合器
// ==========================================

#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub matrix: DailyNeedMatrix,
    pub totals: BTreeMap<String, u32>,
    pub inserted_rows: usize,
    pub due_dates: BTreeMap<String, NaiveDate>,
}

pub struct TrajectoryAggregator {
    trajectory_repo: Arc<PatientTrajectoryRepository>,
    allocation_repo: Arc<PatientAllocationRepository>,
}

impl TrajectoryAggregator {
    pub fn new(
        trajectory_repo: Arc<PatientTrajectoryRepository>,
        allocation_repo: Arc<PatientAllocationRepository>,
    ) -> Self {
        Self {
            trajectory_repo,
            allocation_repo,
        }
    }

    /// 合并、写入新轨迹并更新预计出院日期
    pub fn aggregate(
        &self,
        fresh: &DailyNeeds,
        context: AllocationContext,
        base_date: NaiveDate,
    ) -> RepositoryResult<AggregateResult> {
        let existing = self.trajectory_repo.find_by_context(context)?;
        let outcome = merge(fresh, &existing, context, base_date);

        let inserted_rows = self.trajectory_repo.insert_if_absent_all(&outcome.new_rows)?;

        let due_dates: BTreeMap<String, NaiveDate> = outcome
            .totals
            .iter()
            .map(|(p, total)| (p.clone(), due_date_for(base_date, *total)))
            .collect();

        let changed: Vec<PatientAllocation> = self
            .allocation_repo
            .find_by_context(context)?
            .into_iter()
            .filter_map(|mut a| match due_dates.get(&a.patient_id) {
                Some(due) if *due != a.due_date => {
                    a.due_date = *due;
                    Some(a)
                }
                _ => None,
            })
            .collect();
        let updated = self.allocation_repo.update_all(&changed)?;

        tracing::info!(
            context = %context,
            days = outcome.matrix.day_count(),
            patients = outcome.totals.len(),
            inserted_rows,
            due_dates_updated = updated,
            "需求轨迹合并完成"
        );

        Ok(AggregateResult {
            matrix: outcome.matrix,
            totals: outcome.totals,
            inserted_rows,
            due_dates,
        })
    }
}

/// 便于调用方按集合裁剪矩阵
pub fn retain_tracked(matrix: &mut DailyNeedMatrix, tracked: &HashSet<String>) {
    matrix.retain_patients(|p| tracked.contains(p));
}
