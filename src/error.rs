//! Errors raised at the edges of the crate: configuration and input files.
//!
//! Beat tracking itself does not fail with an error; it returns an empty beat list when no
//! hypothesis survives.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Reading a configuration or input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration could not be deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// A line of an onset list could not be parsed.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
