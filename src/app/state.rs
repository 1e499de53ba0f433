// ==========================================
// 病房床位分配系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::AllocationApi;
use crate::config::{AllocationConfigReader, ConfigManager};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::{
    AllocationCoordinator, AllocationRepositories, DaySolver, HttpDaySolver, NeedsModel,
    ProcessNeedsModel,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "BED_ALLOC_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源, 在 HTTP 路由中作为共享状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 分配API
    pub allocation_api: Arc<AllocationApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享数据库连接并初始化表结构
    /// 2. 从 config_kv 读取需求模型与求解服务配置
    /// 3. 组装分配协调器与API实例
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        match config_manager.get_config_snapshot() {
            Ok(snapshot) => tracing::info!(config = %snapshot, "当前配置"),
            Err(e) => tracing::warn!("配置快照读取失败: {}", e),
        }

        let needs_model: Arc<dyn NeedsModel> = Arc::new(
            ProcessNeedsModel::from_config(config_manager.as_ref())
                .await
                .map_err(|e| format!("无法创建需求模型: {}", e))?,
        );
        let solver: Arc<dyn DaySolver> = Arc::new(
            HttpDaySolver::from_config(config_manager.as_ref())
                .await
                .map_err(|e| format!("无法创建求解服务客户端: {}", e))?,
        );
        let placeholder_due_days = config_manager
            .get_placeholder_due_days()
            .await
            .map_err(|e| format!("配置读取失败: {}", e))?;

        Ok(Self::with_services(
            db_path,
            conn,
            config_manager,
            needs_model,
            solver,
            placeholder_due_days,
        ))
    }

    /// 使用给定的外部服务组装状态（测试中注入 mock）
    pub fn with_services(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        config_manager: Arc<ConfigManager>,
        needs_model: Arc<dyn NeedsModel>,
        solver: Arc<dyn DaySolver>,
        placeholder_due_days: i64,
    ) -> Self {
        let repos = AllocationRepositories::from_connection(conn);
        let coordinator = Arc::new(AllocationCoordinator::new(
            repos,
            needs_model,
            solver,
            placeholder_due_days,
        ));

        tracing::info!("AppState初始化完成");

        Self {
            db_path,
            allocation_api: Arc::new(AllocationApi::new(coordinator)),
            config_manager,
        }
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 BED_ALLOC_DB_PATH（非空时）
/// - 否则: 用户数据目录/bed-allocation/bed_allocation.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./bed_allocation.db");

    if let Some(data_dir) = dirs::data_dir() {
        path = data_dir.join("bed-allocation");

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("bed_allocation.db");
    }

    path.to_string_lossy().to_string()
}
