// ==========================================
// 病房床位分配系统 - 单日求解客户端
// ==========================================
// 职责: 组装单日房间分配问题, 提交外部求解服务, 解析 房间序号 → 患者
// 协议: HTTP + JSON; 响应体包含 "unsat" 视为无可行解
// 约定: 当日需求为 0 的患者不进入问题; 空人群不调用服务, 直接返回 Empty
// ==========================================

use crate::config::{AllocationConfigReader, ConfigResult};
use crate::domain::patient::Patient;
use crate::domain::room::Room;
use crate::domain::types::OptimizationMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;

/// 未分配房间在求解请求中的序号
pub const NO_PREVIOUS_ROOM: i64 = -1;

/// 求解器错误
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("求解服务请求失败: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("求解服务返回异常状态: status={status}, body={body}")]
    Status { status: u16, body: String },

    #[error("求解结果解析失败: {0}")]
    Decode(String),
}

// ==========================================
// DayProblem - 单日求解问题
// ==========================================
// 数组下标: 房间按序号, 患者按 patient_ids 顺序
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayProblem {
    pub room_count: usize,
    pub capacities: Vec<i32>,
    pub room_category_weights: Vec<i32>,
    pub patient_count: usize,
    pub genders: Vec<i32>,
    pub infectious_flags: Vec<bool>,
    pub need_distances: Vec<u32>,
    pub previous_room_ordinals: Vec<i64>,
    pub mode: OptimizationMode,

    #[serde(skip)]
    pub patient_ids: Vec<String>,
}

impl DayProblem {
    /// 组装单日问题
    ///
    /// # 参数
    /// - rooms: 按序号排列的房间
    /// - population: 当日 (患者ID, 需求等级)
    /// - patients: 参考数据中的患者
    /// - current_rooms: 各患者当前所在房间序号（连续性输入）
    /// - mode: 优化模式
    pub fn build(
        rooms: &[&Room],
        population: &[(String, u32)],
        patients: &HashMap<String, Patient>,
        current_rooms: &HashMap<String, usize>,
        mode: OptimizationMode,
    ) -> Self {
        let mut problem = Self {
            room_count: rooms.len(),
            capacities: rooms.iter().map(|r| r.capacity).collect(),
            room_category_weights: rooms.iter().map(|r| r.category_weight()).collect(),
            patient_count: 0,
            genders: Vec::new(),
            infectious_flags: Vec::new(),
            need_distances: Vec::new(),
            previous_room_ordinals: Vec::new(),
            mode,
            patient_ids: Vec::new(),
        };

        for (patient_id, need) in population {
            if *need == 0 {
                continue;
            }
            let Some(patient) = patients.get(patient_id) else {
                tracing::warn!(patient_id = %patient_id, "患者不在参考数据中，跳过当日求解");
                continue;
            };

            problem.patient_ids.push(patient_id.clone());
            problem.genders.push(patient.gender.solver_flag());
            problem.infectious_flags.push(patient.infectious);
            problem.need_distances.push(*need);
            problem.previous_room_ordinals.push(
                current_rooms
                    .get(patient_id)
                    .map(|o| *o as i64)
                    .unwrap_or(NO_PREVIOUS_ROOM),
            );
        }
        problem.patient_count = problem.patient_ids.len();
        problem
    }

    pub fn is_empty(&self) -> bool {
        self.patient_count == 0
    }

    /// 患者在问题中的连续性输入
    pub fn previous_ordinal_of(&self, patient_id: &str) -> Option<i64> {
        self.patient_ids
            .iter()
            .position(|id| id == patient_id)
            .map(|i| self.previous_room_ordinals[i])
    }
}

// ==========================================
// DaySolution - 单日求解结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum DaySolution {
    /// 房间序号 → 患者ID
    Solved {
        rooms: BTreeMap<usize, Vec<String>>,
        changes: u32,
    },
    /// 无可行解
    Unsat,
    /// 当日无人群 (warning 哨兵)
    Empty,
}

// ==========================================
// DaySolver Trait
// ==========================================
// 实现者: HttpDaySolver; 测试中可替换为 mock
#[async_trait]
pub trait DaySolver: Send + Sync {
    /// 提交非空问题
    async fn submit(&self, problem: &DayProblem) -> Result<DaySolution, SolverError>;

    /// 求解单日问题（空人群直接返回 Empty）
    async fn solve_day(&self, problem: &DayProblem) -> Result<DaySolution, SolverError> {
        if problem.is_empty() {
            return Ok(DaySolution::Empty);
        }
        self.submit(problem).await
    }
}

// ==========================================
// HttpDaySolver - HTTP 求解服务客户端
// ==========================================
pub struct HttpDaySolver {
    client: reqwest::Client,
    url: String,
}

impl HttpDaySolver {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SolverError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// 从配置构建
    pub async fn from_config<C>(config: &C) -> ConfigResult<Self>
    where
        C: AllocationConfigReader + ?Sized,
    {
        let url = config.get_solver_url().await?;
        let timeout = Duration::from_secs(config.get_solver_timeout_secs().await?);
        Ok(Self::new(&url, timeout)?)
    }
}

#[async_trait]
impl DaySolver for HttpDaySolver {
    async fn submit(&self, problem: &DayProblem) -> Result<DaySolution, SolverError> {
        let response = self.client.post(&self.url).json(problem).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if contains_unsat(&body) {
                return Ok(DaySolution::Unsat);
            }
            return Err(SolverError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_solver_response(&body, problem)
    }
}

// ==========================================
// 响应解析
// ==========================================

#[derive(Debug, Deserialize)]
struct SolverResponse {
    #[serde(default)]
    allocations: Vec<HashMap<String, RoomOccupancy>>,
    #[serde(default)]
    changes: i64,
}

#[derive(Debug, Deserialize)]
struct RoomOccupancy {
    #[serde(default)]
    patients: Vec<PatientRef>,
    #[allow(dead_code)]
    #[serde(default)]
    gender: Option<i32>,
}

/// 患者引用: 请求数组下标或患者ID
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatientRef {
    Index(usize),
    Id(String),
}

fn contains_unsat(body: &str) -> bool {
    body.contains("unsat")
}

/// 解析求解服务响应体
pub fn parse_solver_response(body: &str, problem: &DayProblem) -> Result<DaySolution, SolverError> {
    // 已解析出房间分配时不再检查 "unsat", 避免患者ID中的同名子串误判
    let response = match serde_json::from_str::<SolverResponse>(body) {
        Ok(response) if !response.allocations.is_empty() => response,
        _ if contains_unsat(body) => return Ok(DaySolution::Unsat),
        Ok(response) => response,
        Err(e) => return Err(SolverError::Decode(e.to_string())),
    };

    let mut rooms: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for entry in response.allocations {
        for (key, occupancy) in entry {
            let ordinal: usize = key
                .trim()
                .parse()
                .map_err(|_| SolverError::Decode(format!("无效的房间序号: {}", key)))?;

            for patient in occupancy.patients {
                let patient_id = match patient {
                    PatientRef::Index(i) => problem.patient_ids.get(i).cloned().ok_or_else(|| {
                        SolverError::Decode(format!("患者下标越界: {}", i))
                    })?,
                    PatientRef::Id(id) => {
                        if !problem.patient_ids.contains(&id) {
                            return Err(SolverError::Decode(format!("未知患者: {}", id)));
                        }
                        id
                    }
                };
                rooms.entry(ordinal).or_default().push(patient_id);
            }
        }
    }

    if rooms.is_empty() {
        return Ok(DaySolution::Empty);
    }

    Ok(DaySolution::Solved {
        rooms,
        changes: response.changes.max(0) as u32,
    })
}
