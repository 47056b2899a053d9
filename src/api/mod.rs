pub mod handlers;

pub use handlers::*;

use crate::config::AppConfig;
use crate::service::BillService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// 构建路由
pub fn router(service: Arc<BillService>, config: &AppConfig) -> Router {
    let mut bill_routes = Router::new()
        .route("/api/bills/upload/", post(upload_bill))
        .route("/api/bills/:id/", get(get_bill));

    // media.url 是站内路径时才由本服务提供图片
    if config.media.serve && config.media.url.starts_with('/') {
        let prefix = config.media.url.trim_end_matches('/');
        bill_routes = bill_routes.route(&format!("{}/*path", prefix), get(serve_media));
    }

    Router::new()
        .route("/health", get(health_check))
        .merge(bill_routes.with_state(service))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
}
