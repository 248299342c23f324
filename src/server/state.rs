// 应用状态

use crate::catalog::CatalogClient;
use crate::config::AppConfig;
use crate::downloader::{DownloadManager, JobRegistry};
use crate::persistence::{CouchJobStore, JobStore, PersistenceWriter};
use crate::server::websocket::WebSocketManager;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 关闭时等待持久化写出的上限
pub const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Arc<AppConfig>,
    /// 任务注册表
    pub registry: Arc<JobRegistry>,
    /// 下载管理器
    pub download_manager: Arc<DownloadManager>,
    /// 目录客户端
    pub catalog: Arc<CatalogClient>,
    /// WebSocket 管理器
    pub ws_manager: Arc<WebSocketManager>,
    /// 持久化写入器（未启用时为 None）
    pub persistence: Option<PersistenceWriter>,
}

impl AppState {
    /// 创建新的应用状态
    ///
    /// 启用持久化时会确保数据库存在；数据库不可达只记警告，写入照常尝试
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let persistence = if config.persistence.enabled {
            let store = CouchJobStore::new(&config.persistence)
                .context("初始化 CouchDB 客户端失败")?;
            if let Err(e) = store.ensure_database().await {
                warn!("CouchDB 数据库检查失败，任务记录可能无法写入: {}", e);
            }
            info!(
                "✓ 任务持久化已启用: {}/{}",
                config.persistence.server, config.persistence.database
            );
            Some(PersistenceWriter::spawn(Arc::new(store)))
        } else {
            info!("任务持久化未启用");
            None
        };

        Self::with_persistence(config, persistence)
    }

    /// 使用外部提供的写入器构建（可为 None）
    pub fn with_persistence(
        config: AppConfig,
        persistence: Option<PersistenceWriter>,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(JobRegistry::new());
        let download_manager = DownloadManager::new(
            &config.download,
            Arc::clone(&registry),
            persistence.clone(),
        )
        .context("创建下载管理器失败")?;
        let catalog = CatalogClient::new(&config.catalog).context("创建目录客户端失败")?;

        Ok(Self {
            config: Arc::new(config),
            registry,
            download_manager: Arc::new(download_manager),
            catalog: Arc::new(catalog),
            ws_manager: Arc::new(WebSocketManager::new()),
            persistence,
        })
    }

    /// 以指定存储启动写入器并构建状态
    pub fn with_store(config: AppConfig, store: Arc<dyn JobStore>) -> anyhow::Result<Self> {
        Self::with_persistence(config, Some(PersistenceWriter::spawn(store)))
    }

    /// 关闭前写出已提交的任务记录，最多等待 `SHUTDOWN_FLUSH_TIMEOUT`
    pub async fn shutdown(&self) {
        if let Some(writer) = &self.persistence {
            if writer.shutdown(SHUTDOWN_FLUSH_TIMEOUT).await {
                info!("任务记录已全部写出");
            }
        }
    }
}
