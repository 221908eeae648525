use thiserror::Error;

// === StoreError ===

/// Errors raised by a durable key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database rejected the operation.
    #[error("Store database error: {0}")]
    Database(String),
    /// A stored value could not be encoded or decoded.
    #[error("Store serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

// === CookieError ===

/// Errors raised by the cookie jar of the shared partition.
#[derive(Debug, Error)]
pub enum CookieError {
    /// The jar refused or failed the operation.
    #[error("Cookie jar error: {0}")]
    Jar(String),
    /// The removal URL could not be interpreted.
    #[error("Invalid cookie url: {0}")]
    InvalidUrl(String),
}

// === ProbeError ===

/// Errors raised while measuring resource usage.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The OS or process query failed or returned nothing.
    #[error("Resource probe unavailable: {0}")]
    Unavailable(String),
}

// === ConfigError ===

/// Errors related to the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading or writing the config file.
    #[error("Config I/O error: {0}")]
    Io(String),
    /// Failed to serialize or deserialize the config.
    #[error("Config serialization error: {0}")]
    Serialization(String),
    /// The provided config key is invalid.
    #[error("Invalid config key: {0}")]
    InvalidKey(String),
    /// The provided config value is invalid.
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

// === ShellError ===

/// Errors raised while wiring the shell together at startup.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Failed to open database: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Failed to prepare data directory: {0}")]
    DataDir(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
