use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} declares no keywords", path.display())]
    EmptyDictionary { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
