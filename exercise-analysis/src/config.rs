use crate::error::ConfigError;

/// Typed configuration surface, loaded once from the environment at startup.
/// A malformed or missing required value aborts startup; nothing here is
/// re-read once the pipelines are running.
#[derive(Debug, Clone)]
pub struct Config {
    /// One pipeline is spawned per entry.
    pub camera_ids: Vec<String>,
    pub redis_url: String,
    pub database_url: String,
    pub exercises_yaml: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub read_batch: usize,
    pub block_ms: usize,
    pub set_idle_timeout_s: f64,
    pub log_format: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let camera_ids = required_csv("CAMERA_IDS")?;

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;
        let exercises_yaml = std::env::var("EXERCISES_YAML")
            .unwrap_or_else(|_| "exercises.yaml".to_string());
        let consumer_group = std::env::var("CONSUMER_GROUP")
            .unwrap_or_else(|_| "exercise-workers".to_string());
        let consumer_name =
            std::env::var("CONSUMER_NAME").unwrap_or_else(|_| "exercise-0".to_string());

        let read_batch = parsed_or_default("READ_BATCH", 10usize)?;
        let block_ms = parsed_or_default("BLOCK_MS", 500usize)?;
        let set_idle_timeout_s = parsed_or_default("SET_IDLE_TIMEOUT_S", 60.0f64)?;

        let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "console".to_string());
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            camera_ids,
            redis_url,
            database_url,
            exercises_yaml,
            consumer_group,
            consumer_name,
            read_batch,
            block_ms,
            set_idle_timeout_s,
            log_format,
            log_level,
        })
    }
}

fn required_csv(name: &'static str) -> Result<Vec<String>, ConfigError> {
    let raw = std::env::var(name).map_err(|_| ConfigError::MissingVar(name))?;
    let values: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        return Err(ConfigError::InvalidValue { name, value: raw });
    }
    Ok(values)
}

fn parsed_or_default<T: std::str::FromStr>(
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}
