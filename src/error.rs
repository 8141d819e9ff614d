//! Fatal errors raised while loading or comparing render outputs.
//!
//! Threshold breaches are not errors: they come back as reports with
//! `passed == false`. Everything in here means the oracle's inputs are broken.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("reference cycle through {collection}[{index}]")]
    ReferenceCycle { collection: String, index: usize },

    #[error("shape mismatch: candidate is {candidate}, reference is {reference}")]
    ShapeMismatch {
        candidate: Shape,
        reference: Shape,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path} as JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to decode TIFF {path}: {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("invalid raster: {0}")]
    Raster(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification used in reports, where the error itself can't be
/// cloned or serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedDocument,
    ShapeMismatch,
    Io,
    Decode,
    Config,
}

impl OracleError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        OracleError::MalformedDocument(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OracleError::MalformedDocument(_) | OracleError::ReferenceCycle { .. } => {
                ErrorKind::MalformedDocument
            }
            OracleError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            OracleError::Io { .. } => ErrorKind::Io,
            OracleError::Json { .. }
            | OracleError::Image { .. }
            | OracleError::Tiff { .. }
            | OracleError::Raster(_) => ErrorKind::Decode,
            OracleError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Width, height and channel count of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shape {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
