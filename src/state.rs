use std::sync::Arc;
use std::time::Instant;

use crate::storage::Storage;

/// 聚合的应用共享状态。
///
/// 显式注入给需要它的组件（路由处理器、健康检查），而不是挂在全局；
/// 测试可以用内存库句柄替换真实存储。
#[derive(Clone)]
pub struct AppState {
    /// 进程唯一存储句柄（只有生命周期协调器可关闭）
    pub storage: Arc<Storage>,
    /// 进程启动时刻，健康检查以此上报 uptime
    pub started_at: Instant,
}

impl AppState {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            started_at: Instant::now(),
        }
    }
}
