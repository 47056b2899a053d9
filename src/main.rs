use std::sync::Arc;
use taptogether_bills::{
    api, create_pool, run_migrations, AppConfig, BillService, GeminiClient, MediaStorage,
    PgBillStore,
};
use tower::ServiceBuilder;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);
    if config.gemini.api_key.is_none() {
        warn!("GEMINI_API_KEY 未配置, 上传的票据将无法识别");
    }

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;
    info!("Database pool created");
    if config.database.run_migrations {
        run_migrations(&pool).await?;
        info!("Database migrations applied");
    }

    // 组装服务: 存储 + 识别客户端 + 图片目录
    let storage = MediaStorage::new(&config.media.root);
    info!("Media root: {}", storage.root().display());
    let service = Arc::new(BillService::new(
        Arc::new(PgBillStore::new(pool)),
        Arc::new(GeminiClient::new(&config.gemini)?),
        storage,
        config.media.url.clone(),
    ));

    // 构建路由
    let app = api::router(service, &config).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/bills/upload/  - 上传票据图片并识别");
    info!("  GET  /api/bills/:id/     - 查询票据及明细");
    if config.media.serve {
        info!("  GET  {}*             - 已上传图片", config.media.url);
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
