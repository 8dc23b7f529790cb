//! Error types for SetuBACnet

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// SetuBACnet error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration write error
    #[error("Config serialization error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Address parse error
    #[error("Invalid address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    /// Connection string with the wrong byte length
    #[error("Invalid connection string length: {0} (expected 6)")]
    InvalidConnectionString(usize),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
