//! WebSocket 连接管理器
//!
//! 每个连接一条无界 mpsc 通道，后台任务和会话都通过连接 ID 投递消息；
//! 同一通道内消息保持提交顺序。

use crate::server::websocket::message::WsServerMessage;
use dashmap::DashMap;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// WebSocket 连接信息
#[derive(Debug)]
pub struct WsConnection {
    /// 连接 ID
    pub id: String,
    /// 消息发送通道
    pub sender: mpsc::UnboundedSender<WsServerMessage>,
    /// 连接时间
    pub connected_at: Instant,
}

/// WebSocket 管理器
#[derive(Debug, Default)]
pub struct WebSocketManager {
    connections: DashMap<String, WsConnection>,
}

impl WebSocketManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新连接
    ///
    /// 返回用于接收服务端消息的接收器
    pub fn register(&self, connection_id: String) -> mpsc::UnboundedReceiver<WsServerMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = WsConnection {
            id: connection_id.clone(),
            sender,
            connected_at: Instant::now(),
        };

        self.connections.insert(connection_id.clone(), connection);
        info!("WebSocket 连接已注册: {}", connection_id);

        receiver
    }

    /// 移除连接
    pub fn unregister(&self, connection_id: &str) {
        if let Some((_, conn)) = self.connections.remove(connection_id) {
            info!(
                "WebSocket 连接已移除: {}, 存活 {:?}",
                connection_id,
                conn.connected_at.elapsed()
            );
        }
    }

    /// 获取连接数量
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// 向指定连接发送消息
    ///
    /// 连接不存在或已关闭时返回 false，不影响调用方
    pub fn send_to(&self, connection_id: &str, message: WsServerMessage) -> bool {
        let conn = match self.connections.get(connection_id) {
            Some(c) => c,
            None => {
                debug!("连接不存在，丢弃消息: {}", connection_id);
                return false;
            }
        };

        match conn.sender.send(message) {
            Ok(_) => true,
            Err(e) => {
                warn!("发送消息失败（可能连接已关闭）: {} - {}", connection_id, e);
                false
            }
        }
    }
}
