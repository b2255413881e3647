//! Errors raised while loading configuration and parsing parameters
//!
//! Media load failures never show up here; the gallery handles those as
//! data inside the per-item state machine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Reading the config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parameters parsed but rejected by `GalleryParams::validate`
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// An explicitly requested config file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unparseable value on the command line (e.g. capacity mode)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
