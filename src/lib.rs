// Catalog Download Service
// 目录搜索 + 并发受限的下载编排服务核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 远程目录模块
pub mod catalog;

// 下载引擎模块
pub mod downloader;

// 任务记录持久化模块
pub mod persistence;

// Web服务器模块
pub mod server;

// 导出常用类型
pub use catalog::{CatalogClient, CatalogEntry};
pub use config::AppConfig;
pub use downloader::{DownloadManager, Job, JobRegistry, JobStatus, TransferEngine};
pub use server::{build_router, AppState};
