pub mod app_config;
pub mod error;
pub mod logger;

pub use error::{Error, ErrorKind, Result};
