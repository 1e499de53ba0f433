// ==========================================
// 病房床位分配系统 - 分配配置读取 Trait
// ==========================================
// 职责: 定义排程引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// AllocationConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait AllocationConfigReader: Send + Sync {
    // ===== 求解器 =====

    /// 获取单日求解服务地址
    ///
    /// # 默认值
    /// - http://127.0.0.1:8090/solve
    async fn get_solver_url(&self) -> ConfigResult<String>;

    /// 获取求解请求超时（秒）
    ///
    /// # 默认值
    /// - 300
    async fn get_solver_timeout_secs(&self) -> ConfigResult<u64>;

    // ===== 需求模型 =====

    /// 获取需求模型可执行文件
    ///
    /// # 默认值
    /// - needs-model
    async fn get_needs_command(&self) -> ConfigResult<String>;

    /// 获取需求模型附加参数（空白分隔）
    async fn get_needs_args(&self) -> ConfigResult<Vec<String>>;

    /// 获取需求模型超时（秒）
    ///
    /// # 默认值
    /// - 600
    async fn get_needs_timeout_secs(&self) -> ConfigResult<u64>;

    /// 获取需求模型输出的日分隔符
    ///
    /// # 默认值
    /// - #DAY#
    async fn get_needs_day_delimiter(&self) -> ConfigResult<String>;

    // ===== 分配 =====

    /// 获取占位记录的预计出院天数
    ///
    /// # 默认值
    /// - 1
    async fn get_placeholder_due_days(&self) -> ConfigResult<i64>;
}
