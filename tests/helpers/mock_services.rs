// ==========================================
// Mock 外部服务 - 用于集成测试
// ==========================================
// ScriptedNeedsModel: 返回预设的按天需求或失败
// ScriptedSolver: 按提交顺序返回预设结果, 并记录收到的问题
// ==========================================

use async_trait::async_trait;
use bed_allocation::engine::{
    DailyNeeds, DayProblem, DaySolution, DaySolver, NeedsModel, NeedsModelError, SolverError,
    Workspace,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// 构造按天需求
pub fn needs(days: &[&[(&str, u32)]]) -> DailyNeeds {
    days.iter()
        .map(|day| day.iter().map(|(p, n)| (p.to_string(), *n)).collect())
        .collect()
}

/// 构造求解结果: (房间序号, 患者列表)
pub fn solved(rooms: &[(usize, &[&str])], changes: u32) -> DaySolution {
    let rooms: BTreeMap<usize, Vec<String>> = rooms
        .iter()
        .map(|(ordinal, ids)| (*ordinal, ids.iter().map(|s| s.to_string()).collect()))
        .collect();
    DaySolution::Solved { rooms, changes }
}

// ==========================================
// ScriptedNeedsModel
// ==========================================

pub struct ScriptedNeedsModel {
    result: Option<DailyNeeds>,
    calls: AtomicUsize,
    gate: Option<Notify>,
}

impl ScriptedNeedsModel {
    pub fn returning(needs: DailyNeeds) -> Self {
        Self {
            result: Some(needs),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// 第一次调用阻塞, 直到 release() 被调用
    pub fn gated(needs: DailyNeeds) -> Self {
        Self {
            result: Some(needs),
            calls: AtomicUsize::new(0),
            gate: Some(Notify::new()),
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NeedsModel for ScriptedNeedsModel {
    async fn compute_needs(&self, workspace: &Workspace) -> Result<DailyNeeds, NeedsModelError> {
        assert!(workspace.path().exists(), "工作区应在调用期间存在");
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let (Some(gate), 0) = (&self.gate, call) {
            gate.notified().await;
        }

        match &self.result {
            Some(needs) => Ok(needs.clone()),
            None => Err(NeedsModelError::NonZeroExit {
                status: Some(1),
                stderr: "scripted failure".to_string(),
            }),
        }
    }
}

// ==========================================
// ScriptedSolver
// ==========================================

pub struct ScriptedSolver {
    responses: Mutex<VecDeque<Result<DaySolution, u16>>>,
    fallback: DaySolution,
    problems: Mutex<Vec<DayProblem>>,
}

impl ScriptedSolver {
    /// 按顺序返回给定结果, 用尽后返回 Unsat
    pub fn new(responses: Vec<DaySolution>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            fallback: DaySolution::Unsat,
            problems: Mutex::new(Vec::new()),
        }
    }

    /// 所有日期均无可行解
    pub fn always_unsat() -> Self {
        Self::new(Vec::new())
    }

    /// 第一次提交返回 HTTP 错误状态
    pub fn unavailable(status: u16) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(vec![Err(status)])),
            fallback: DaySolution::Unsat,
            problems: Mutex::new(Vec::new()),
        }
    }

    /// 收到的全部（非空）问题
    pub fn problems(&self) -> Vec<DayProblem> {
        self.problems.lock().unwrap().clone()
    }
}

#[async_trait]
impl DaySolver for ScriptedSolver {
    async fn submit(&self, problem: &DayProblem) -> Result<DaySolution, SolverError> {
        self.problems.lock().unwrap().push(problem.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(solution)) => Ok(solution),
            Some(Err(status)) => Err(SolverError::Status {
                status,
                body: "scripted outage".to_string(),
            }),
            None => Ok(self.fallback.clone()),
        }
    }
}
