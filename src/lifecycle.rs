//! 生命周期协调模块
//!
//! 唯一拥有启动/关停顺序的组件：连接存储 → 注册插件与路由 → 绑定监听，
//! 以及对应的逆过程。存储句柄只会在这里被关闭一次。

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::plugins;
use crate::routes;
use crate::shutdown::ShutdownManager;
use crate::state::AppState;
use crate::storage::Storage;

/// 进程生命周期状态。
///
/// 正向迁移是单向的：`Starting → Connecting → Listening → Draining → Stopped`；
/// 此外任一存活状态都可以在故障或信号下直接进入 `Draining`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Connecting,
    Listening,
    Draining,
    Stopped,
}

impl LifecycleState {
    /// 判定从当前状态迁移到 `next` 是否合法。
    pub fn can_transition(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        if next == Draining {
            return !matches!(self, Draining | Stopped);
        }
        matches!(
            (self, next),
            (Starting, Connecting) | (Connecting, Listening) | (Draining, Stopped)
        )
    }
}

/// 生命周期协调器。
#[derive(Clone)]
pub struct Lifecycle {
    state: Arc<Mutex<LifecycleState>>,
    shutdown: ShutdownManager,
}

impl Lifecycle {
    pub fn new(shutdown: ShutdownManager) -> Self {
        Self {
            state: Arc::new(Mutex::new(LifecycleState::Starting)),
            shutdown,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, next: LifecycleState) {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.can_transition(next) {
            tracing::info!("生命周期状态: {:?} -> {:?}", *guard, next);
            *guard = next;
        } else {
            tracing::warn!("忽略非法的状态迁移: {:?} -> {:?}", *guard, next);
        }
    }

    /// 运行完整生命周期，返回进程退出码。
    ///
    /// 启动序列中的任何失败（存储不可达、插件注册失败、端口占用）都是
    /// 致命的：进程不得带着配置到一半的管线开始监听。
    pub async fn run(&self, config: &AppConfig) -> i32 {
        // panic 也走统一的退出闸门，避免绕过资源释放
        self.shutdown.install_panic_hook();

        // 建立存储连接
        self.transition(LifecycleState::Connecting);
        let storage = match Storage::connect(&config.database.url).await {
            Ok(s) => Arc::new(s),
            Err(e) => {
                tracing::error!("数据库连接失败: {}", e);
                return 1;
            }
        };
        tracing::info!("数据库连接成功");

        // 注册路由（错误分类器作为管线故障汇即时生效），再按固定顺序注册插件
        let app_state = AppState::new(storage.clone());
        let router = routes::register_routes().with_state(app_state);
        let app = match plugins::register_plugins(router, config).await {
            Ok(app) => app,
            Err(e) => {
                tracing::error!("插件注册失败: {}", e);
                storage.close().await;
                return 1;
            }
        };
        // 请求上下文中间件置于最外层，保证错误响应拿得到路径与方法
        let app = app.layer(axum::middleware::from_fn(
            crate::request_context::request_context_middleware,
        ));

        // 绑定监听
        let addr = config.server_addr();
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("绑定地址失败 {}: {}", addr, e);
                storage.close().await;
                return 1;
            }
        };
        let local_addr = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or(addr);
        self.transition(LifecycleState::Listening);

        tracing::info!("Server: http://{}", local_addr);
        tracing::info!("Docs: http://{}/docs", local_addr);
        tracing::info!("Health: http://{}/health", local_addr);

        // 运行服务器直到收到退出信号；信号到达即停止接收新请求
        let coordinator = self.clone();
        let shutdown_signal = async move {
            let reason = coordinator.shutdown.wait_for_shutdown().await;
            tracing::info!("接收到退出信号: {:?}，停止接收新请求...", reason);
            coordinator.transition(LifecycleState::Draining);
        };

        let serve_result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await;

        // 存量请求已排空，释放存储句柄（至多一次）
        if storage.close().await {
            tracing::info!("数据库连接已关闭");
        } else {
            tracing::warn!("存储句柄已在此前关闭");
        }
        self.transition(LifecycleState::Stopped);

        match serve_result {
            Ok(()) => {
                tracing::info!("服务器已优雅关闭");
                0
            }
            Err(e) => {
                tracing::error!("服务器运行错误: {}", e);
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, JwtConfig, MIN_SECRET_LEN, SecurityConfig, ServerConfig};
    use crate::shutdown::ShutdownReason;

    #[test]
    fn forward_transitions_are_one_directional() {
        use LifecycleState::*;
        assert!(Starting.can_transition(Connecting));
        assert!(Connecting.can_transition(Listening));
        assert!(Draining.can_transition(Stopped));

        assert!(!Listening.can_transition(Connecting));
        assert!(!Stopped.can_transition(Listening));
        assert!(!Starting.can_transition(Listening));
    }

    #[test]
    fn any_live_state_may_enter_draining() {
        use LifecycleState::*;
        assert!(Starting.can_transition(Draining));
        assert!(Connecting.can_transition(Draining));
        assert!(Listening.can_transition(Draining));
        assert!(!Stopped.can_transition(Draining));
    }

    fn test_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                // 0 表示由内核分配空闲端口
                port: 0,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
            },
            jwt: JwtConfig {
                secret: "a".repeat(MIN_SECRET_LEN),
                refresh_secret: "b".repeat(MIN_SECRET_LEN),
                ..JwtConfig::default()
            },
            security: SecurityConfig {
                encryption_key: "c".repeat(MIN_SECRET_LEN),
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn run_exits_cleanly_after_repeated_shutdown_triggers() {
        let shutdown = ShutdownManager::new();
        let lifecycle = Lifecycle::new(shutdown.clone());
        let config = test_config();

        let runner = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.run(&config).await })
        };

        // 等待进入监听状态
        for _ in 0..100 {
            if lifecycle.state() == LifecycleState::Listening {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(lifecycle.state(), LifecycleState::Listening);

        // 快速连续触发两次：关停序列只允许执行一次
        shutdown.trigger_shutdown(ShutdownReason::Terminate);
        shutdown.trigger_shutdown(ShutdownReason::Interrupt);

        let code = runner.await.expect("join lifecycle task");
        assert_eq!(code, 0);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn run_exits_nonzero_when_storage_unreachable() {
        let shutdown = ShutdownManager::new();
        let lifecycle = Lifecycle::new(shutdown);
        let mut config = test_config();
        // 指向不存在的目录，连接必然失败
        config.database.url = "sqlite:///nonexistent-payroll-dir/payroll.db".to_string();

        let code = lifecycle.run(&config).await;
        assert_eq!(code, 1);
    }
}
