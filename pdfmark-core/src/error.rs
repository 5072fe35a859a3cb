use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("selection spans multiple pages")]
    CrossPageSelection,

    #[error("page {0} is not known to the viewer or document")]
    UnknownPage(usize),

    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("failed to read config {path:?}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
