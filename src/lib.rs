pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod service;
pub mod storage;

pub use config::AppConfig;
pub use db::{create_pool, run_migrations, PgBillStore};
pub use error::AppError;
pub use extract::GeminiClient;
pub use service::BillService;
pub use storage::MediaStorage;
