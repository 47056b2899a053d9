use serde::{Deserialize, Serialize};
use std::fmt;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 上传请求体大小上限 (字节)
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

/// 图片存储位置及对外访问前缀
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub root: String,
    pub url: String,
    pub serve: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

// api_key 不能出现在日志里
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                max_upload_bytes: 20 * 1024 * 1024,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/taptogether".to_string(),
                max_connections: 20,
                run_migrations: true,
            },
            media: MediaConfig {
                root: "media".to_string(),
                url: "/media/".to_string(),
                serve: true,
            },
            gemini: GeminiConfig {
                api_key: None,
                model: "gemini-1.5-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                timeout_secs: 60,
            },
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 -> bills.toml (可选) -> 环境变量
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let env = |key: &str| std::env::var(key).ok();

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .add_source(config::File::with_name("bills").required(false))
            .set_override_option("server.host", env("SERVER_HOST"))?
            .set_override_option("server.port", env("SERVER_PORT"))?
            .set_override_option("server.max_upload_bytes", env("MAX_UPLOAD_BYTES"))?
            .set_override_option("database.url", env("DATABASE_URL"))?
            .set_override_option("media.root", env("MEDIA_ROOT"))?
            .set_override_option("media.url", env("MEDIA_URL"))?
            .set_override_option("media.serve", env("SERVE_MEDIA"))?
            .set_override_option("gemini.api_key", env("GEMINI_API_KEY"))?
            .set_override_option("gemini.model", env("GEMINI_MODEL"))?
            .set_override_option("gemini.base_url", env("GEMINI_BASE_URL"))?
            .build()?;

        settings.try_deserialize()
    }
}
