//! WebSocket 消息类型定义

use crate::catalog::CatalogEntry;
use serde::{Deserialize, Serialize};

/// 客户端命令
///
/// `{"command": "search", "data": {"search": "zelda"}}`
/// `{"command": "download", "data": {"download": "<id>"}}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", content = "data", rename_all = "snake_case")]
pub enum WsClientMessage {
    /// 搜索目录
    Search {
        #[serde(default)]
        search: String,
    },
    /// 按搜索结果中的 id 下载
    Download { download: String },
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// 搜索结果
    SearchResults { results: Vec<CatalogEntry> },
    /// 目录获取失败
    SearchError { error: String },
    /// 下载已排队
    Queued { msg: String },
    /// 下载进度（百分比）
    Progress { progress: u8, filename: String },
    /// 下载完成
    DownloadComplete { file: String },
    /// 下载失败
    DownloadError {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        file: Option<String>,
        error: String,
    },
    /// 无法识别的命令
    Error { error: String },
}

impl WsServerMessage {
    pub fn queued(filename: &str) -> Self {
        Self::Queued {
            msg: format!("Download queued: {}", filename),
        }
    }

    pub fn download_error(file: Option<String>, error: impl Into<String>) -> Self {
        Self::DownloadError {
            file,
            error: error.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }
}
