//! Process configuration loaded from the environment (and `.env` when present).

use std::{env, path::PathBuf};

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub upload_dir: PathBuf,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Used directly by tests.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = var("APP_PORT")
            .or_else(|| var("PORT"))
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let jwt_secret = var("JWT_SECRET").filter(|s| !s.is_empty()).unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let token_ttl_hours = var("TOKEN_TTL_HOURS")
            .unwrap_or_else(|| "24".to_string())
            .parse::<i64>()
            .context("TOKEN_TTL_HOURS must be a whole number of hours")?;
        if token_ttl_hours <= 0 {
            bail!("TOKEN_TTL_HOURS must be positive");
        }

        let store_backend = match var("STORE_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres,
            other => bail!("STORE_BACKEND must be 'memory' or 'postgres', got '{other}'"),
        };

        let database_url = var("DATABASE_URL").filter(|s| !s.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }

        let db_max_connections = var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid u32")?;

        let upload_dir = PathBuf::from(var("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()));

        let bootstrap_admin = match (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => bail!("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            host,
            port,
            jwt_secret,
            token_ttl_hours,
            store_backend,
            database_url,
            db_max_connections,
            upload_dir,
            bootstrap_admin,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
