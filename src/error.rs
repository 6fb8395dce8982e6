use thiserror::Error;

#[derive(Error, Debug)]
pub enum LagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("HTTP server error: {0}")]
    Http(String),

    #[error("Request error: {0}")]
    Request(#[from] crate::backend::request::RequestError),
}

pub type Result<T> = std::result::Result<T, LagError>;
