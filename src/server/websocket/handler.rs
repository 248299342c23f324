//! WebSocket 路由处理器

use crate::server::websocket::session::DownloadSession;
use crate::server::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// WebSocket 路由处理器
///
/// 升级 HTTP 连接为 WebSocket，处理消息收发
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// 处理 WebSocket 连接
///
/// 发送任务消费连接通道；接收任务逐条处理命令，命令之间不会并发
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!("新的 WebSocket 连接: {}", connection_id);

    // 注册连接
    let mut message_receiver = state.ws_manager.register(connection_id.clone());
    let (mut sender, mut receiver) = socket.split();

    let ws_manager = Arc::clone(&state.ws_manager);

    // 启动发送任务
    let send_task = tokio::spawn(async move {
        while let Some(message) = message_receiver.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("序列化消息失败: {}", e);
                }
            }
        }
    });

    let mut session = DownloadSession::new(connection_id.clone(), state.clone());

    // 启动接收任务
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    session.handle_text(&text).await;
                }
                Message::Binary(data) => match String::from_utf8(data) {
                    Ok(text) => session.handle_text(&text).await,
                    Err(_) => debug!("忽略非 UTF-8 二进制消息: {}", session.connection_id()),
                },
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => {
                    info!("收到关闭消息: {}", session.connection_id());
                    break;
                }
            }
        }
    });

    // 等待任一任务结束，另一个随之中止
    match race_tasks(send_task, recv_task).await {
        Finished::First => debug!("发送任务结束: {}", connection_id),
        Finished::Second => debug!("接收任务结束: {}", connection_id),
    }

    // 清理连接；已提交的下载继续运行
    ws_manager.unregister(&connection_id);
    info!("WebSocket 连接已关闭: {}", connection_id);
}

#[derive(Debug, PartialEq, Eq)]
enum Finished {
    First,
    Second,
}

/// 等待两个任务中先结束的一个，并中止另一个
async fn race_tasks(mut first: JoinHandle<()>, mut second: JoinHandle<()>) -> Finished {
    tokio::select! {
        _ = &mut first => {
            second.abort();
            Finished::First
        }
        _ = &mut second => {
            first.abort();
            Finished::Second
        }
    }
}
