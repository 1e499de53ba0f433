// ==========================================
// 病房床位分配系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::allocation_config_trait::{AllocationConfigReader, ConfigResult};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 启动时记录生效配置
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    fn get_u64_or_default(&self, key: &str, default: u64) -> ConfigResult<u64> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        Ok(value.trim().parse::<u64>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %value, "配置值不是有效整数，使用默认值");
            default
        }))
    }
}

// ==========================================
// AllocationConfigReader Trait 实现
// ==========================================
#[async_trait]
impl AllocationConfigReader for ConfigManager {
    async fn get_solver_url(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::SOLVER_URL, defaults::SOLVER_URL)
    }

    async fn get_solver_timeout_secs(&self) -> ConfigResult<u64> {
        self.get_u64_or_default(config_keys::SOLVER_TIMEOUT_SECS, defaults::SOLVER_TIMEOUT_SECS)
    }

    async fn get_needs_command(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::NEEDS_COMMAND, defaults::NEEDS_COMMAND)
    }

    async fn get_needs_args(&self) -> ConfigResult<Vec<String>> {
        let value = self.get_config_or_default(config_keys::NEEDS_ARGS, "")?;
        Ok(value.split_whitespace().map(|s| s.to_string()).collect())
    }

    async fn get_needs_timeout_secs(&self) -> ConfigResult<u64> {
        self.get_u64_or_default(config_keys::NEEDS_TIMEOUT_SECS, defaults::NEEDS_TIMEOUT_SECS)
    }

    async fn get_needs_day_delimiter(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(config_keys::NEEDS_DAY_DELIMITER, defaults::NEEDS_DAY_DELIMITER)?;
        Ok(value.trim().to_string())
    }

    async fn get_placeholder_due_days(&self) -> ConfigResult<i64> {
        let value = self.get_u64_or_default(
            config_keys::PLACEHOLDER_DUE_DAYS,
            defaults::PLACEHOLDER_DUE_DAYS,
        )?;
        Ok(value as i64)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 求解器
    pub const SOLVER_URL: &str = "solver_url";
    pub const SOLVER_TIMEOUT_SECS: &str = "solver_timeout_secs";

    // 需求模型
    pub const NEEDS_COMMAND: &str = "needs_command";
    pub const NEEDS_ARGS: &str = "needs_args";
    pub const NEEDS_TIMEOUT_SECS: &str = "needs_timeout_secs";
    pub const NEEDS_DAY_DELIMITER: &str = "needs_day_delimiter";

    // 分配
    pub const PLACEHOLDER_DUE_DAYS: &str = "placeholder_due_days";
}

pub mod defaults {
    pub const SOLVER_URL: &str = "http://127.0.0.1:8090/solve";
    pub const SOLVER_TIMEOUT_SECS: u64 = 300;
    pub const NEEDS_COMMAND: &str = "needs-model";
    pub const NEEDS_TIMEOUT_SECS: u64 = 600;
    pub const NEEDS_DAY_DELIMITER: &str = "#DAY#";
    pub const PLACEHOLDER_DUE_DAYS: u64 = 1;
}
