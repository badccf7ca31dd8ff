use tracing_subscriber::EnvFilter;

use payroll_backend::config::AppConfig;
use payroll_backend::lifecycle::Lifecycle;
use payroll_backend::shutdown::ShutdownManager;

#[tokio::main]
async fn main() {
    // 配置必须先于日志初始化：日志级别本身来自配置。
    // 校验失败时把全部违规项一次性打到 stderr 后退出。
    if let Err(e) = AppConfig::init_global() {
        eprintln!("环境配置无效: {e}");
        std::process::exit(1);
    }
    let config = AppConfig::global();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "payroll_backend={},tower_http=info",
            config.logging.level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("启动薪酬系统后端 ({:?})", config.environment);

    let shutdown = ShutdownManager::new();
    if let Err(e) = shutdown.start_signal_handler().await {
        tracing::error!("信号处理器安装失败: {}", e);
        std::process::exit(1);
    }

    let code = Lifecycle::new(shutdown).run(config).await;
    std::process::exit(code);
}
