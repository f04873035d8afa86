use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Server configuration, read once at startup and immutable thereafter.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// The one display name that resolves to the administrator role.
    pub admin_username: String,
    /// Shared secret for elevated access. Absent means the elevation path
    /// is permanently closed.
    pub admin_access_key: Option<String>,
    /// Upstream comment API key. Absent means the comments endpoint is
    /// unavailable.
    pub comment_api_key: Option<String>,
    pub tick_secs: u64,
    pub grant_ttl_secs: u64,
    pub reset_hour_utc: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("VIGIL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("VIGIL_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("VIGIL_PORT must be a port number")?;
        let db_path: PathBuf = std::env::var("VIGIL_DB_PATH")
            .unwrap_or_else(|_| "vigil.db".into())
            .into();

        let Ok(admin_username) = std::env::var("VIGIL_ADMIN_USERNAME") else {
            bail!("VIGIL_ADMIN_USERNAME is not set; the admin role would be unreachable");
        };
        if admin_username.trim().is_empty() {
            bail!("VIGIL_ADMIN_USERNAME must not be empty");
        }

        let admin_access_key = optional("VIGIL_ADMIN_ACCESS_KEY");
        let comment_api_key = optional("VIGIL_COMMENT_API_KEY");

        let tick_secs: u64 = std::env::var("VIGIL_TICK_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .context("VIGIL_TICK_SECS must be a number of seconds")?;
        if tick_secs == 0 {
            bail!("VIGIL_TICK_SECS must be positive");
        }

        let grant_ttl_secs: u64 = std::env::var("VIGIL_GRANT_TTL_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .context("VIGIL_GRANT_TTL_SECS must be a number of seconds")?;
        if grant_ttl_secs == 0 {
            bail!("VIGIL_GRANT_TTL_SECS must be positive");
        }

        let reset_hour_utc: u32 = std::env::var("VIGIL_RESET_HOUR_UTC")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .context("VIGIL_RESET_HOUR_UTC must be an hour of day")?;
        if reset_hour_utc >= 24 {
            bail!("VIGIL_RESET_HOUR_UTC must be in 0..24, got {}", reset_hour_utc);
        }

        Ok(Self {
            host,
            port,
            db_path,
            admin_username,
            admin_access_key,
            comment_api_key,
            tick_secs,
            grant_ttl_secs,
            reset_hour_utc,
        })
    }
}

/// Unset and empty both read as absent.
fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
