use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("invalid event name '{0}': must be non-empty and contain no whitespace")]
    InvalidEventName(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
