use std::sync::PoisonError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 调用方可见的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    Io,
    Validation,
    Other,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("QR encoding error: {0}")]
    Qr(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task error: {0}")]
    Task(String),

    #[error("{message}")]
    Other {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl Error {
    pub fn new(message: &str) -> Self {
        Error::Other {
            message: message.to_string(),
            source: None,
        }
    }

    pub fn with_source(message: &str, source: BoxError) -> Self {
        Error::Other {
            message: message.to_string(),
            source: Some(source),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Error::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_with_source(message: impl Into<String>, source: BoxError) -> Self {
        Error::Connection {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// 二维码编码与图片写入失败都归入 IO 类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Io(_) | Error::Qr(_) | Error::Image(_) => ErrorKind::Io,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Serialization(_) => ErrorKind::Config,
            Error::Task(_) | Error::Other { .. } => ErrorKind::Other,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<log::SetLoggerError> for Error {
    fn from(err: log::SetLoggerError) -> Self {
        Error::with_source("Failed to install logger", Box::new(err))
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::new(&format!("Lock poisoned: {}", err))
    }
}
