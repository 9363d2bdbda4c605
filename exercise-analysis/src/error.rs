use thiserror::Error;

/// Fatal errors raised during startup: configuration, registry loading, and
/// initial bus/store connection. Propagated with `?` out of `main`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("failed to read exercise definitions file {path}: {source}")]
    ExercisesFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse exercise definitions YAML: {0}")]
    ExercisesYamlInvalid(#[from] serde_yaml::Error),

    #[error("exercise definition {key:?} is missing required field {field}")]
    ExercisesDefinitionIncomplete { key: String, field: &'static str },

    #[error("could not connect to stream bus at {url}: {source}")]
    BusUnreachable {
        url: String,
        #[source]
        source: redis::RedisError,
    },

    #[error("could not connect to durable store: {0}")]
    StoreUnreachable(#[from] sqlx::Error),
}

/// Per-event errors recovered inline by the pipeline loop. Every variant is
/// logged and the triggering message is acknowledged regardless of which
/// variant fired — only [`ConfigError`] is fatal.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed perception payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unknown exercise key {0:?}")]
    UnknownExercise(String),

    #[error("stream bus error: {0}")]
    Bus(#[from] redis::RedisError),

    #[error("durable store error: {0}")]
    Store(#[from] sqlx::Error),
}
