use thiserror::Error;

/// The main error type for Parathread operations
#[derive(Debug, Error)]
pub enum ParathreadError {
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Unknown node key '{0}'")]
    UnknownKey(String),

    #[error("Cannot add node '{0}': graph is frozen")]
    GraphFrozen(String),

    #[error("Completion signal already fired")]
    SignalAlreadyFired,
}

/// Result type alias for Parathread operations
pub type ParathreadResult<T> = Result<T, ParathreadError>;
