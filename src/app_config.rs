use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // --- Backend ---
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub health_check_interval: Duration,

    // --- Caller identity ---
    pub user_id: String,

    // --- Local storage ---
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // dotenv belongs HERE, nowhere else
        dotenvy::dotenv().ok();

        let timeout_secs: u64 = env::var("CHAT_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .context("CHAT_REQUEST_TIMEOUT_SECS must be a number of seconds")?;

        let health_secs: u64 = env::var("CHAT_HEALTH_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .context("CHAT_HEALTH_INTERVAL_SECS must be a number of seconds")?;

        Ok(Self {
            api_base_url: env::var("CHAT_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000/api".into()),
            request_timeout: Duration::from_secs(timeout_secs),
            health_check_interval: Duration::from_secs(health_secs),

            user_id: env::var("CHAT_USER_ID").unwrap_or_else(|_| "user_001".into()),

            data_dir: env::var("CHAT_DATA_DIR")
                .unwrap_or_else(|_| "./data".into())
                .into(),
        })
    }
}
