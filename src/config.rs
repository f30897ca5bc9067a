//! Process settings read from the environment at start-up.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes long")]
    WeakSecret,
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub media_root: PathBuf,
    pub feed_cache_ttl: Duration,
    pub session_ttl: chrono::Duration,
    pub enable_hsts: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds settings from any variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let jwt_secret = get("JWT_SECRET").filter(|s| !s.is_empty()).ok_or(SettingsError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(SettingsError::WeakSecret);
        }
        let bind_addr = parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;
        let feed_cache_ttl = Duration::from_secs(parse_or(&get, "FEED_CACHE_TTL_SECS", 20u64)?);
        let session_hours: i64 = parse_or(&get, "SESSION_TTL_HOURS", 24)?;
        if session_hours <= 0 {
            return Err(SettingsError::Invalid { var: "SESSION_TTL_HOURS", value: session_hours.to_string() });
        }
        Ok(Self {
            jwt_secret,
            bind_addr,
            database_url: get("DATABASE_URL").filter(|s| !s.is_empty()),
            data_dir: get("YATUBE_DATA_DIR").filter(|s| !s.is_empty()).map(PathBuf::from),
            media_root: get("MEDIA_ROOT").filter(|s| !s.is_empty()).map(PathBuf::from).unwrap_or_else(|| "media".into()),
            feed_cache_ttl,
            session_ttl: chrono::Duration::hours(session_hours),
            enable_hsts: get("ENABLE_HSTS").map(|v| is_truthy(&v)).unwrap_or(false),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, SettingsError> {
    match get(var) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| SettingsError::Invalid { var, value: raw })
        }
        _ => Ok(default),
    }
}

fn is_truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}
