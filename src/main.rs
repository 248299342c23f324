use catalog_dl::{config::LogConfig, logging, AppConfig, AppState};
use tracing::info;

const CONFIG_PATH: &str = "config/app.toml";

/// 日志要先于其他组件初始化，这里只读取配置文件中的 `[log]` 段
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = load_log_config().await;

    // 保持 guard 存活到进程结束，确保日志写盘
    let _log_guard = logging::init_logging(&log_config);

    info!("Catalog Download v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(CONFIG_PATH).await;
    config.validate()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    info!(
        "下载目录: {:?}, 最大同时下载数: {}",
        config.download.download_dir, config.download.max_concurrent_tasks
    );
    info!("目录地址: {}", config.catalog.url);

    let app_state = AppState::new(config).await?;
    info!("应用状态初始化完成");

    let app = catalog_dl::build_router(app_state.clone());

    info!("服务器启动在: http://{}", addr);
    info!("WebSocket: ws://{}/ws", addr);
    info!("API 基础路径: http://{}/api/v1", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始优雅关闭...");
        }
    }

    info!("正在写出剩余任务记录...");
    app_state.shutdown().await;
    info!("应用已安全退出");

    Ok(())
}
