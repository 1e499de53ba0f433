// ==========================================
// 病房床位分配系统 - HTTP 服务主入口
// ==========================================
// 环境变量:
// - BED_ALLOC_DB_PATH: 数据库路径
// - BED_ALLOC_LISTEN_ADDR: 监听地址（默认 127.0.0.1:8080）
// - RUST_LOG / BED_ALLOC_LOG_FORMAT: 日志
// ==========================================

use std::sync::Arc;

use bed_allocation::app::{get_default_db_path, router, AppState};
use bed_allocation::logging;

/// 监听地址环境变量
const LISTEN_ADDR_ENV: &str = "BED_ALLOC_LISTEN_ADDR";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", bed_allocation::APP_NAME);
    tracing::info!("系统版本: {}", bed_allocation::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path)
        .await
        .map_err(|e| anyhow::anyhow!("无法初始化AppState: {}", e))?;

    let addr = std::env::var(LISTEN_ADDR_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP 服务已启动: {}", addr);

    axum::serve(listener, router(Arc::new(app_state))).await?;
    Ok(())
}
