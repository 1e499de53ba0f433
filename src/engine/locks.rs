// ==========================================
// 病房床位分配系统 - 上下文互斥锁
// ==========================================
// 每个分配上下文一把锁, 持有时间覆盖整个分配流程
// (包括需求模型子进程与求解服务调用)
// 实际 / 模拟上下文数据分区不相交, 两把锁互不影响
// ==========================================

use crate::domain::types::AllocationContext;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct ContextLocks {
    live: Arc<Mutex<()>>,
    simulated: Arc<Mutex<()>>,
}

impl ContextLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_context(&self, context: AllocationContext) -> &Arc<Mutex<()>> {
        match context {
            AllocationContext::Live => &self.live,
            AllocationContext::Simulated => &self.simulated,
        }
    }

    /// 获取上下文锁; guard 释放即解锁 (含出错返回路径)
    pub async fn acquire(&self, context: AllocationContext) -> MutexGuard<'_, ()> {
        self.for_context(context).lock().await
    }

    /// 上下文当前是否有运行中的分配
    pub fn is_busy(&self, context: AllocationContext) -> bool {
        self.for_context(context).try_lock().is_err()
    }
}
