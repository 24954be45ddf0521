use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix for every diagnostic line printed in place of a status line.
pub const PREFIX: &str = "ECW";

#[derive(Error, Debug)]
pub enum Error {
    #[error("no data on stdin")]
    NoData,

    #[error("session json: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file: {0}")]
    State(#[source] serde_json::Error),

    #[error("probe: {0}")]
    Probe(String),

    #[error("panic: {0}")]
    Panic(String),
}

impl Error {
    /// Stable name used in the `Error - <Kind>` diagnostic.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NoData => "NoData",
            Error::Parse(_) => "ParseError",
            Error::Io(_) => "IoError",
            Error::Config { .. } => "ConfigError",
            Error::State(_) => "StateError",
            Error::Probe(_) => "ProbeError",
            Error::Panic(_) => "Panic",
        }
    }

    /// The single line printed to stdout when this error reaches the top level.
    pub fn diagnostic(&self) -> String {
        match self {
            Error::NoData => format!("{}: No data", PREFIX),
            Error::Parse(_) => format!("{}: Parse error", PREFIX),
            other => format!("{}: Error - {}", PREFIX, other.kind()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
