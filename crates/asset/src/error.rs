//! Load errors shared by importers, texture decoding and model upload.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Couldn't open file: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Importer diagnostic text, passed through verbatim.
    #[error("Import failed: {0}")]
    Import(String),
    #[error("Couldn't load texture {}: {source}", path.display())]
    TextureLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type LoadResult<T> = Result<T, LoadError>;
