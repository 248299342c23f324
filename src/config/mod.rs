// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 默认的标识请求头（目录服务端按 UA 识别客户端）
pub const DEFAULT_USER_AGENT: &str = "Tinfoil";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 下载配置
    #[serde(default)]
    pub download: DownloadConfig,
    /// 远程目录配置
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// 持久化配置
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// 🔥 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 20MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    20 * 1024 * 1024
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 前端静态资源目录
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// 下载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// 下载根目录（所有文件平铺在此目录下）
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// 最大同时下载文件数（准入上限）
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// 下载请求使用的 User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 单个下载请求的总超时（秒），0 表示不限制
    #[serde(default)]
    pub request_timeout_secs: u64,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            user_agent: default_user_agent(),
            request_timeout_secs: 0,
        }
    }
}

/// 远程目录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// 目录 JSON 文档地址，格式 `{"files": [{"url", "size"}]}`
    #[serde(default = "default_catalog_url")]
    pub url: String,
    /// 获取目录时使用的 User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 获取目录的超时（秒）
    #[serde(default = "default_catalog_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_catalog_url() -> String {
    "http://127.0.0.1:8080/catalog.json".to_string()
}

fn default_catalog_timeout_secs() -> u64 {
    30
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_catalog_timeout_secs(),
        }
    }
}

/// 持久化配置（CouchDB 文档存储）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// 是否启用任务记录写入
    #[serde(default)]
    pub enabled: bool,
    /// CouchDB 服务地址
    #[serde(default = "default_couch_server")]
    pub server: String,
    /// 数据库名
    #[serde(default = "default_couch_database")]
    pub database: String,
    /// 用户名
    #[serde(default)]
    pub username: Option<String>,
    /// 密码
    #[serde(default)]
    pub password: Option<String>,
}

fn default_couch_server() -> String {
    "http://127.0.0.1:5984".to_string()
}

fn default_couch_database() -> String {
    "game_downloads".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: default_couch_server(),
            database: default_couch_database(),
            username: None,
            password: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            download: DownloadConfig::default(),
            catalog: CatalogConfig::default(),
            persistence: PersistenceConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_tasks == 0 {
            anyhow::bail!("download.max_concurrent_tasks 必须大于 0");
        }
        if self.catalog.url.trim().is_empty() {
            anyhow::bail!("catalog.url 不能为空");
        }
        Ok(())
    }

    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("配置文件校验失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                let default_config = Self::default();

                // 只有文件不存在时才写回默认配置，避免覆盖用户写错的文件
                if !std::path::Path::new(path).exists() {
                    if let Err(e) = default_config.save_to_file(path).await {
                        tracing::error!("保存默认配置失败: {}", e);
                    }
                }

                default_config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.download.max_concurrent_tasks, 3);
        assert_eq!(config.download.user_agent, "Tinfoil");
        assert!(!config.persistence.enabled);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config/app.toml");
        let path = path.to_str().unwrap();

        let mut config = AppConfig::default();
        config.download.max_concurrent_tasks = 5;
        config.catalog.url = "http://catalog.local/index".to_string();
        config.save_to_file(path).await.unwrap();

        let loaded = AppConfig::load_from_file(path).await.unwrap();
        assert_eq!(loaded.download.max_concurrent_tasks, 5);
        assert_eq!(loaded.catalog.url, "http://catalog.local/index");
        assert_eq!(loaded.server.port, config.server.port);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [download]
            max_concurrent_tasks = 2

            [persistence]
            enabled = true
            username = "admin"
            "#,
        )
        .unwrap();

        assert_eq!(config.download.max_concurrent_tasks, 2);
        assert_eq!(config.download.download_dir, PathBuf::from("downloads"));
        assert!(config.persistence.enabled);
        assert_eq!(config.persistence.username.as_deref(), Some("admin"));
        assert_eq!(config.persistence.database, "game_downloads");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = AppConfig::default();
        config.download.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_or_default_writes_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.toml");
        let path_str = path.to_str().unwrap();

        let config = AppConfig::load_or_default(path_str).await;
        assert_eq!(config.download.max_concurrent_tasks, 3);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/app.toml");
        let shipped = AppConfig::load_from_file(path).await.unwrap();
        let defaults = AppConfig::default();

        assert_eq!(shipped.log.max_file_size, defaults.log.max_file_size);
        assert_eq!(shipped.log.max_file_size, 20 * 1024 * 1024);
        assert_eq!(shipped.log.retention_days, defaults.log.retention_days);
        assert_eq!(shipped.log.log_dir, defaults.log.log_dir);
        assert_eq!(shipped.server.port, defaults.server.port);
        assert_eq!(shipped.download.download_dir, defaults.download.download_dir);
        assert_eq!(
            shipped.download.max_concurrent_tasks,
            defaults.download.max_concurrent_tasks
        );
        assert_eq!(shipped.catalog.url, defaults.catalog.url);
        assert_eq!(shipped.persistence.database, defaults.persistence.database);
    }
}
