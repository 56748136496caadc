use std::env;

use crate::constants::DEFAULT_MAX_UPLOAD_BYTES;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    pub stream_token_secret: String,
    pub public_api_url: String,
    pub storage: StorageConfig,
    pub max_upload_bytes: usize,
}

/// S3-compatible object storage settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    /// Custom endpoint (MinIO, R2, ...). Forces path-style addressing when set.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| "Invalid SERVER_PORT")?;

        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set for the metadata store")?;

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // No fallback secret: a server that cannot sign tokens must not start
        let stream_token_secret = env::var("STREAM_TOKEN_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or("STREAM_TOKEN_SECRET must be set for stream token signing")?;

        let public_api_url = env::var("PUBLIC_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let storage = StorageConfig {
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "videos".to_string()),
            endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key: env::var("S3_ACCESS_KEY").ok().filter(|s| !s.is_empty()),
            secret_key: env::var("S3_SECRET_KEY").ok().filter(|s| !s.is_empty()),
        };

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(v) => v.parse().map_err(|_| "Invalid MAX_UPLOAD_BYTES")?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Config {
            server_host,
            server_port,
            database_url,
            allowed_origins,
            environment,
            stream_token_secret,
            public_api_url,
            storage,
            max_upload_bytes,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Public URL a client uses to stream a video with the given token
    pub fn stream_url(&self, video_id: &str, token: &str) -> String {
        format!(
            "{}/videos/{}/stream?token={}",
            self.public_api_url, video_id, token
        )
    }
}
