// ==========================================
// 病房床位分配系统 - 引擎层
// ==========================================
// 职责: 分配流程编排、外部需求模型与求解服务调用、轨迹合并
// 红线: Engine 不拼 SQL, 持久化全部经由 Repository
// ==========================================

pub mod coordinator;
pub mod day_solver;
pub mod locks;
pub mod needs_model;
pub mod repositories;
pub mod room_index;
pub mod trajectory;
pub mod workspace;

// 重导出核心引擎
pub use coordinator::{AllocationCoordinator, AllocationError, AllocationResult};
pub use day_solver::{DayProblem, DaySolution, DaySolver, HttpDaySolver, SolverError};
pub use locks::ContextLocks;
pub use needs_model::{DailyNeeds, NeedsModel, NeedsModelError, ProcessNeedsModel};
pub use repositories::AllocationRepositories;
pub use room_index::RoomIndexMap;
pub use trajectory::{DailyNeedMatrix, TrajectoryAggregator};
pub use workspace::{ScenarioPatient, Workspace, WorkspaceError};
