//! 会话适配器
//!
//! 每个 WebSocket 连接一个 `DownloadSession`，持有该连接最近一次搜索的结果。
//! 下载命令只能引用最近一次搜索里的条目；任务事件只推送给发起下载的连接。

use crate::catalog::CatalogEntry;
use crate::downloader::{JobEvent, ProgressSink};
use crate::server::websocket::manager::WebSocketManager;
use crate::server::websocket::message::{WsClientMessage, WsServerMessage};
use crate::server::AppState;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 绑定到单个连接的进度接收端
///
/// 连接断开后消息被丢弃，传输照常进行
#[derive(Debug, Clone)]
pub struct ConnectionSink {
    connection_id: String,
    ws_manager: Arc<WebSocketManager>,
}

impl ConnectionSink {
    pub fn new(connection_id: impl Into<String>, ws_manager: Arc<WebSocketManager>) -> Self {
        Self {
            connection_id: connection_id.into(),
            ws_manager,
        }
    }
}

impl ProgressSink for ConnectionSink {
    fn emit(&self, event: JobEvent) {
        let message = match event {
            JobEvent::Progress(p) => WsServerMessage::Progress {
                progress: p.percent,
                filename: p.filename,
            },
            JobEvent::Completed { filename, .. } => {
                WsServerMessage::DownloadComplete { file: filename }
            }
            JobEvent::Failed { filename, error, .. } => {
                let file = Some(filename).filter(|f| !f.is_empty());
                WsServerMessage::download_error(file, error)
            }
        };
        self.ws_manager.send_to(&self.connection_id, message);
    }
}

/// 单连接会话
pub struct DownloadSession {
    connection_id: String,
    state: AppState,
    search_index: Vec<CatalogEntry>,
}

impl DownloadSession {
    pub fn new(connection_id: impl Into<String>, state: AppState) -> Self {
        Self {
            connection_id: connection_id.into(),
            state,
            search_index: Vec::new(),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// 当前搜索结果
    pub fn search_index(&self) -> &[CatalogEntry] {
        &self.search_index
    }

    /// 处理一条文本命令
    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<WsClientMessage>(text) {
            Ok(WsClientMessage::Search { search }) => self.search(&search).await,
            Ok(WsClientMessage::Download { download }) => self.download(&download),
            Err(e) => {
                warn!("解析客户端消息失败: {} - {}", self.connection_id, e);
                self.reply(WsServerMessage::error(format!("无法识别的命令: {}", e)));
            }
        }
    }

    async fn search(&mut self, term: &str) {
        debug!("收到搜索请求: {} - {:?}", self.connection_id, term);

        match self.state.catalog.search(term).await {
            Ok(results) => {
                self.search_index = results.clone();
                self.reply(WsServerMessage::SearchResults { results });
            }
            Err(e) => {
                // 保留上一次的搜索结果
                warn!("目录获取失败: {} - {}", self.connection_id, e);
                self.reply(WsServerMessage::SearchError {
                    error: e.to_string(),
                });
            }
        }
    }

    fn download(&self, id: &str) {
        let entry = match self.search_index.iter().find(|e| e.id == id) {
            Some(entry) => entry,
            None => {
                debug!("下载 ID 不在当前搜索结果中: {} - {}", self.connection_id, id);
                self.reply(WsServerMessage::download_error(
                    None,
                    format!("Game id not found in latest search: {}", id),
                ));
                return;
            }
        };

        let manager = &self.state.download_manager;
        let job = manager.create_job(&entry.url);
        info!(
            "连接 {} 提交下载: {} ({})",
            self.connection_id, job.id, entry.url
        );
        self.reply(WsServerMessage::queued(&job.filename));

        let sink = ConnectionSink::new(
            self.connection_id.clone(),
            Arc::clone(&self.state.ws_manager),
        );
        manager.submit(job, Arc::new(sink));
    }

    fn reply(&self, message: WsServerMessage) {
        self.state.ws_manager.send_to(&self.connection_id, message);
    }
}
