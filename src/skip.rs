use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a path was left out of an analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[error("file not found")]
    NotFound,

    #[error("file could not be read")]
    Unreadable,

    #[error("image could not be decoded")]
    DecodeError,
}

impl From<&io::Error> for SkipReason {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SkipReason::NotFound,
            _ => SkipReason::Unreadable,
        }
    }
}

impl From<io::Error> for SkipReason {
    fn from(err: io::Error) -> Self {
        SkipReason::from(&err)
    }
}

impl From<image::ImageError> for SkipReason {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => SkipReason::from(&io),
            _ => SkipReason::DecodeError,
        }
    }
}

/// A path excluded from a pass, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}

impl Skipped {
    pub fn new(path: impl Into<PathBuf>, reason: SkipReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}
