use thiserror::Error;

/// All the ways things can go wrong in buildlight
///
/// None of these are fatal to a running monitor: fetch and indicator errors
/// get logged and the loops carry on. Config errors stop us before we start.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to fetch build status for {repository}: {message}")]
    FetchError { repository: String, message: String },

    #[error("Failed to set indicator: {0}")]
    IndicatorError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    pub fn fetch(repository: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::FetchError {
            repository: repository.into(),
            message: message.to_string(),
        }
    }
}
