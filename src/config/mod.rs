use std::env;
use std::time::Duration;

/// Default wall-clock limit for a single preview fetch (status + full body).
pub const DEFAULT_PREVIEW_TIMEOUT_MS: u64 = 10_000;

/// Origins the Vite dev server uses; implied in non-production mode.
const DEV_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:4173"];

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub is_production: bool,
    /// CORS allow-list. Loaded once at startup, never mutated at runtime.
    pub allowed_origins: Vec<String>,
    pub preview_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenvy::dotenv().ok();

        let is_production = env::var("APP_ENV").as_deref() == Ok("production");

        // FRONTEND_URL is a comma-separated origin list; dev mode also
        // admits the local Vite origins.
        let mut allowed_origins: Vec<String> = env::var("FRONTEND_URL")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if !is_production {
            allowed_origins.extend(DEV_ORIGINS.iter().map(|o| o.to_string()));
        }

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .unwrap_or(3001),
            is_production,
            allowed_origins,
            preview_timeout: Duration::from_millis(
                env::var("PREVIEW_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_PREVIEW_TIMEOUT_MS),
            ),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
