// ==========================================
// 病房床位分配系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，将 Repository / 引擎错误转换为用户可理解的错误
// ==========================================

use crate::engine::coordinator::AllocationError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求校验错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 分配流程错误
    // ==========================================
    #[error("需求模型执行失败: {0}")]
    NeedsModelFailure(String),

    #[error("求解服务调用失败: {0}")]
    SolverFailure(String),

    #[error("无可行分配: {0}")]
    NoFeasibleAllocation(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 错误代码（返回给调用方）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::NeedsModelFailure(_) => "NEEDS_MODEL_FAILURE",
            ApiError::SolverFailure(_) => "SOLVER_FAILURE",
            ApiError::NoFeasibleAllocation(_) => "NO_FEASIBLE_ALLOCATION",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 是否为调用方请求问题（bad request 类）
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidInput(_)
                | ApiError::NotFound(_)
                | ApiError::ValidationError(_)
                | ApiError::NoFeasibleAllocation(_)
        )
    }

    /// 是否为外部依赖（需求模型 / 求解服务）失败
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            ApiError::NeedsModelFailure(_) | ApiError::SolverFailure(_)
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 AllocationError 转换
// ==========================================
impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::EmptyScenario => ApiError::InvalidInput(err.to_string()),
            AllocationError::UnknownPatients(_)
            | AllocationError::UnknownWard { .. }
            | AllocationError::NoRooms { .. } => ApiError::ValidationError(err.to_string()),
            AllocationError::NeedsModel(e) => ApiError::NeedsModelFailure(e.to_string()),
            AllocationError::Solver(e) => ApiError::SolverFailure(e.to_string()),
            AllocationError::NoFeasibleAllocation { .. } => {
                ApiError::NoFeasibleAllocation(err.to_string())
            }
            AllocationError::Repository(e) => e.into(),
            AllocationError::Workspace(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
