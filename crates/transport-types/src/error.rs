use std::panic::Location;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Configuration error: {message} [{location}]")]
    Config {
        message: String,
        location: &'static Location<'static>,
    },

    #[error("Geometry error: {message} [{location}]")]
    Geometry {
        message: String,
        location: &'static Location<'static>,
    },

    #[error("Numeric error: {message} [{location}]")]
    Numeric {
        message: String,
        location: &'static Location<'static>,
    },

    #[error("Linear algebra error: {message} [{location}]")]
    LinAlg {
        message: String,
        location: &'static Location<'static>,
    },

    #[error("Output error: {message} [{location}]")]
    Output {
        message: String,
        location: &'static Location<'static>,
    },

    #[error("Not converged after {iterations} iterations: {message}")]
    NotConverged { iterations: usize, message: String },

    #[error("IO error on '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        TransportError::Config {
            message: message.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn geometry(message: impl Into<String>) -> Self {
        TransportError::Geometry {
            message: message.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn numeric(message: impl Into<String>) -> Self {
        TransportError::Numeric {
            message: message.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn linalg(message: impl Into<String>) -> Self {
        TransportError::LinAlg {
            message: message.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn output(message: impl Into<String>) -> Self {
        TransportError::Output {
            message: message.into(),
            location: Location::caller(),
        }
    }

    pub fn file(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        TransportError::File {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Source location the error was raised at, when it carries one.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            TransportError::Config { location, .. }
            | TransportError::Geometry { location, .. }
            | TransportError::Numeric { location, .. }
            | TransportError::LinAlg { location, .. }
            | TransportError::Output { location, .. } => Some(location),
            _ => None,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
