use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::{ConnectOptions, SqlitePool, sqlite::SqliteConnectOptions};

use crate::error::{ApiError, StorageFault};

/// 进程唯一的存储句柄。
///
/// 启动时获取一次，关闭时释放恰好一次；除生命周期协调器外任何组件
/// 都不得调用 [`Storage::close`]。并发请求共用句柄是安全的，连接的
/// 调度由 sqlx 连接池自行序列化。
pub struct Storage {
    pool: SqlitePool,
    closed: AtomicBool,
}

impl Storage {
    /// 建立数据库连接。失败属于启动致命错误，由调用方终止进程。
    pub async fn connect(url: &str) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| ApiError::Internal(format!("解析数据库连接串失败: {e}")))?
            .create_if_missing(true)
            .disable_statement_logging();

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| ApiError::Internal(format!("数据库连接失败: {e}")))?;

        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&pool)
            .await
            .ok();
        sqlx::query("PRAGMA foreign_keys=ON;")
            .execute(&pool)
            .await
            .ok();

        Ok(Self::from_pool(pool))
    }

    /// 从现成连接池构造句柄（测试注入内存库用）。
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            closed: AtomicBool::new(false),
        }
    }

    /// 活性探测：对数据库发起最小查询。
    pub async fn ping(&self) -> Result<(), StorageFault> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(StorageFault::from)
    }

    /// 关闭连接池，至多执行一次。返回本次调用是否实际执行了关闭。
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.pool.close().await;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
