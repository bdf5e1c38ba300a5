use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use murmur_core::CoreConfig;

/// Log filter used when `RUST_LOG` is unset. `murmur` covers every
/// `murmur_*` crate by prefix.
pub const DEFAULT_LOG_FILTER: &str = "murmur=debug,tower_http=debug";

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub reader_pool: usize,
    pub core: CoreConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("MURMUR_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MURMUR_JWT_SECRET is unset or still a placeholder");
        }

        let host = lookup("MURMUR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("MURMUR_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("MURMUR_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path = lookup("MURMUR_DB_PATH").unwrap_or_else(|| "murmur.db".into()).into();

        let typing_window_ms: i64 = lookup("MURMUR_TYPING_WINDOW_MS")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("MURMUR_TYPING_WINDOW_MS must be a number of milliseconds")?;
        if typing_window_ms <= 0 {
            bail!("MURMUR_TYPING_WINDOW_MS must be positive");
        }

        let presence_window_secs: i64 = lookup("MURMUR_PRESENCE_WINDOW_SECS")
            .unwrap_or_else(|| "300".into())
            .parse()
            .context("MURMUR_PRESENCE_WINDOW_SECS must be a number of seconds")?;
        if presence_window_secs <= 0 {
            bail!("MURMUR_PRESENCE_WINDOW_SECS must be positive");
        }

        let reader_pool: usize = match lookup("MURMUR_READER_POOL") {
            Some(raw) => raw.parse().context("MURMUR_READER_POOL must be a count")?,
            None => murmur_db::DEFAULT_READER_POOL,
        };

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            reader_pool,
            core: CoreConfig {
                typing_window: chrono::Duration::milliseconds(typing_window_ms),
                presence_window: chrono::Duration::seconds(presence_window_secs),
                ..CoreConfig::default()
            },
        })
    }
}
