use std::path::PathBuf;

use crate::completion::CompletionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("error reading text file {}: {source}", path.display())]
    Utf8 {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },

    #[error("error processing PDF file {}: {message}", path.display())]
    Pdf { path: PathBuf, message: String },

    #[error("unsupported file type: {}", path.display())]
    Unsupported { path: PathBuf },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error(transparent)]
    Completion(#[from] CompletionError),
}
