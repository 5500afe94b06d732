//! Server configuration loaded from environment variables.

use std::env::VarError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use orglink_core::repository::UniquenessPolicy;
use orglink_db::DbConfig;
use orglink_relations::RelationConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    /// JSON array of organizations. When unset every id is accepted.
    pub directory_file: Option<PathBuf>,
    /// Interval of the expiry sweeper; `None` disables it.
    pub sweep_interval: Option<Duration>,
    pub relations: RelationConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let bind_addr: SocketAddr = reader("ORGLINK_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::InvalidValue("ORGLINK_BIND_ADDR".into(), e.to_string())
            })?;

        let memory = parse_bool(&reader, "ORGLINK_DB_MEMORY", false)?;
        let defaults = if memory {
            DbConfig::in_memory()
        } else {
            DbConfig::default()
        };
        let db = DbConfig {
            url: if memory {
                defaults.url
            } else {
                reader("ORGLINK_DB_URL").unwrap_or(defaults.url)
            },
            namespace: reader("ORGLINK_DB_NS").unwrap_or(defaults.namespace),
            database: reader("ORGLINK_DB_DB").unwrap_or(defaults.database),
            username: reader("ORGLINK_DB_USER").unwrap_or(defaults.username),
            password: reader("ORGLINK_DB_PASS").unwrap_or(defaults.password),
        };

        let directory_file = reader("ORGLINK_DIRECTORY_FILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let sweep_secs: u64 = parse(&reader, "ORGLINK_SWEEP_INTERVAL_SECS", 300)?;
        let sweep_interval = (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs));

        let uniqueness = match reader("ORGLINK_UNIQUE_RELATIONS")
            .unwrap_or_else(|_| "none".to_string())
            .as_str()
        {
            "none" => UniquenessPolicy::AllowDuplicates,
            "per_type" => UniquenessPolicy::PerRelationType,
            other => {
                return Err(ConfigError::InvalidValue(
                    "ORGLINK_UNIQUE_RELATIONS".into(),
                    format!("expected `none` or `per_type`, got `{other}`"),
                ));
            }
        };

        let defaults = RelationConfig::default();
        let relations = RelationConfig {
            probe_stage_timeout: Duration::from_millis(parse(
                &reader,
                "ORGLINK_PROBE_STAGE_TIMEOUT_MS",
                defaults.probe_stage_timeout.as_millis() as u64,
            )?),
            latency_threshold: Duration::from_millis(parse(
                &reader,
                "ORGLINK_PROBE_LATENCY_THRESHOLD_MS",
                defaults.latency_threshold.as_millis() as u64,
            )?),
            bulk_concurrency: parse(&reader, "ORGLINK_BULK_CONCURRENCY", defaults.bulk_concurrency)?,
            max_bulk_size: parse(&reader, "ORGLINK_MAX_BULK_SIZE", defaults.max_bulk_size)?,
            conflict_retries: parse(&reader, "ORGLINK_CONFLICT_RETRIES", defaults.conflict_retries)?,
            max_window_days: parse(&reader, "ORGLINK_MAX_WINDOW_DAYS", defaults.max_window_days)?,
            confirmation_secret: reader("ORGLINK_CONFIRMATION_SECRET")
                .unwrap_or(defaults.confirmation_secret),
            uniqueness,
            ..defaults
        };

        if relations.bulk_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "ORGLINK_BULK_CONCURRENCY".into(),
                "must be at least 1".into(),
            ));
        }
        if relations.max_window_days == 0 {
            return Err(ConfigError::InvalidValue(
                "ORGLINK_MAX_WINDOW_DAYS".into(),
                "must be at least 1".into(),
            ));
        }

        Ok(Self {
            bind_addr,
            db,
            directory_file,
            sweep_interval,
            relations,
        })
    }
}

fn parse<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match reader(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.into(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_bool<F>(reader: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match reader(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidValue(
                key.into(),
                format!("expected a boolean, got `{other}`"),
            )),
        },
        Err(_) => Ok(default),
    }
}
