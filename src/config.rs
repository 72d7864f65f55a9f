use std::env;

use crate::constants::DEFAULT_CHANGE_FEED_CAPACITY;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_path: String,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    /// Written into backups and checked on restore
    pub app_name: String,
    pub change_feed_capacity: usize,
    /// Enables `/admin/stats` when set
    pub admin_secret_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| "Invalid SERVER_PORT")?;

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/recordbook.db".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "Recordbook".to_string());

        let change_feed_capacity = match env::var("CHANGE_FEED_CAPACITY") {
            Ok(raw) => match raw.parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => return Err("Invalid CHANGE_FEED_CAPACITY".to_string()),
            },
            Err(_) => DEFAULT_CHANGE_FEED_CAPACITY,
        };

        let admin_secret_key = env::var("ADMIN_SECRET_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        Ok(Config {
            server_host,
            server_port,
            database_path,
            allowed_origins,
            environment,
            app_name,
            change_feed_capacity,
            admin_secret_key,
        })
    }

    /// Settings for an on-disk test database
    pub fn for_database(database_path: impl Into<String>) -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            database_path: database_path.into(),
            allowed_origins: vec!["http://localhost:5173".to_string()],
            environment: "test".to_string(),
            app_name: "Recordbook".to_string(),
            change_feed_capacity: DEFAULT_CHANGE_FEED_CAPACITY,
            admin_secret_key: None,
        }
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
