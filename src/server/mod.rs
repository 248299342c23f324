// Web服务器模块

pub mod handlers;
pub mod state;
pub mod websocket;

pub use state::AppState;
pub use websocket::WebSocketManager;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// 构建完整路由
///
/// - `/ws` 下载会话
/// - `/health` 健康检查
/// - `/api/v1/*` 任务查询
/// - 其余路径回落到静态目录
pub fn build_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http()) // HTTP 请求日志
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let api_routes = Router::new()
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/:id", get(handlers::get_job))
        .route("/admission", get(handlers::admission_status));

    let static_service = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/ws", get(websocket::handle_websocket))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes)
        .fallback_service(static_service)
        .with_state(state)
        .layer(middleware)
}
