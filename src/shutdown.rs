//! 优雅退出管理模块
//!
//! 提供跨平台的信号处理与一次性退出闸门：终止信号、panic、应用内故障
//! 全部汇聚到同一个闸门，并发触发只会生效一次。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::{debug, error, info};

/// 优雅退出管理器（一次性闸门）
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug)]
struct ShutdownInner {
    /// 退出信号通知器
    notify: Notify,
    /// 首次触发的退出原因
    reason: std::sync::Mutex<Option<ShutdownReason>>,
    /// 是否已经开始优雅退出
    shutting_down: AtomicBool,
}

/// 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户中断信号 (Ctrl+C / SIGINT)
    Interrupt,
    /// 终止信号 (SIGTERM)
    Terminate,
    /// 逃逸出所有处理器的故障（panic 或未处理的异步失败）
    Fault,
    /// 应用请求退出
    Application,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownInner {
                notify: Notify::new(),
                reason: std::sync::Mutex::new(None),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// 等待退出信号，返回首次触发的原因。
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        debug!("等待退出信号...");
        let mut notified = std::pin::pin!(self.inner.notify.notified());
        // 先注册等待再复查标志，封死“检查与注册之间被触发”的窗口。
        notified.as_mut().enable();
        if !self.is_shutting_down() {
            notified.await;
        }
        self.first_reason()
    }

    fn first_reason(&self) -> ShutdownReason {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .unwrap_or(ShutdownReason::Application)
    }

    /// 触发优雅退出。并发或重复触发只有第一次生效。
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        let was_shutting_down = self
            .inner
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .unwrap_or(true);

        if was_shutting_down {
            debug!("重复的退出信号被忽略: {:?}", reason);
            return;
        }

        info!("触发优雅退出: {:?}", reason);
        if let Ok(mut guard) = self.inner.reason.lock() {
            *guard = Some(reason);
        }
        self.inner.notify.notify_waiters();
    }

    /// 检查是否正在关闭
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// 启动信号处理器
    ///
    /// 在 Linux/macOS 上监听 SIGINT 与 SIGTERM，在 Windows 上监听 Ctrl+C。
    pub async fn start_signal_handler(&self) -> Result<(), ShutdownError> {
        #[cfg(unix)]
        {
            self.start_unix_signal_handler()
        }

        #[cfg(windows)]
        {
            self.start_windows_signal_handler()
        }
    }

    #[cfg(unix)]
    fn start_unix_signal_handler(&self) -> Result<(), ShutdownError> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;

        let manager = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("接收到SIGINT信号 (Ctrl+C)");
                    manager.trigger_shutdown(ShutdownReason::Interrupt);
                }
                _ = sigterm.recv() => {
                    info!("接收到SIGTERM信号");
                    manager.trigger_shutdown(ShutdownReason::Terminate);
                }
            }
        });

        Ok(())
    }

    #[cfg(windows)]
    fn start_windows_signal_handler(&self) -> Result<(), ShutdownError> {
        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("监听Ctrl+C信号失败: {}", e);
                return;
            }
            info!("接收到Ctrl+C信号");
            manager.trigger_shutdown(ShutdownReason::Interrupt);
        });

        Ok(())
    }

    /// 安装进程级 panic 钩子：任何逃逸出处理器的 panic 都会触发退出闸门，
    /// 保证共享资源沿正常关停路径释放。
    pub fn install_panic_hook(&self) {
        let manager = self.clone();
        std::panic::set_hook(Box::new(move |info| {
            error!("未捕获的panic: {}", info);
            manager.trigger_shutdown(ShutdownReason::Fault);
        }));
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 优雅退出错误类型
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("信号设置失败: {0}")]
    SignalSetup(String),
}
