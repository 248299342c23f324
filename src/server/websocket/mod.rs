//! WebSocket 模块
//!
//! 下载会话通道：搜索命令、下载命令和任务事件推送

mod handler;
mod manager;
mod message;
mod session;

pub use handler::handle_websocket;
pub use manager::WebSocketManager;
pub use message::{WsClientMessage, WsServerMessage};
pub use session::{ConnectionSink, DownloadSession};
