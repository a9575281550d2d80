use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    pub elasticsearch_url: String,
    pub elasticsearch_index: String,
    /// Event publishing is disabled when no brokers are configured.
    pub kafka_brokers: Option<String>,
    pub kafka_posts_topic: String,
    pub media_root: String,
    pub page_size: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PORT: {}", e))?;
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let elasticsearch_url = std::env::var("ELASTICSEARCH_URL")
            .unwrap_or_else(|_| "http://localhost:9200".into());
        let elasticsearch_index =
            std::env::var("ELASTICSEARCH_INDEX").unwrap_or_else(|_| "posts".into());
        let kafka_brokers = std::env::var("KAFKA_BROKERS")
            .ok()
            .filter(|brokers| !brokers.trim().is_empty());
        let kafka_posts_topic =
            std::env::var("KAFKA_POSTS_TOPIC").unwrap_or_else(|_| "posts".into());
        let media_root = std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".into());
        let page_size = std::env::var("PAGE_SIZE")
            .unwrap_or_else(|_| "25".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PAGE_SIZE: {}", e))?;

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            cors_origins,
            elasticsearch_url,
            elasticsearch_index,
            kafka_brokers,
            kafka_posts_topic,
            media_root,
            page_size,
        })
    }
}
