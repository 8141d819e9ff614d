//! Equivalence oracle for renderer outputs.
//!
//! Judges whether images and glTF scene exports produced by an alternate
//! render path match those of a trusted renderer, within per-channel pixel
//! tolerances and after structural normalization of the documents.

pub mod config;
pub mod document;
pub mod error;
pub mod image_compare;
pub mod normalize;
pub mod orchestrator;
pub mod raster;
pub mod resolver;
pub mod rounding;
pub mod structural;

pub use config::{ImageTolerances, LabelRemap, OracleConfig, SchemaConfig};
pub use document::{DocNode, Document, Scalar};
pub use error::{ErrorKind, OracleError, Shape};
pub use image_compare::{Channel, ImageComparator, PixelReport};
pub use normalize::{NormalizedDocument, Normalizer};
pub use orchestrator::{
    CaseDetail, CaseKind, CaseOutcome, CaseReport, ChannelPaths, ComparisonReport, FramePair,
    ImageSet, Mode, Orchestrator, RenderOutputSet,
};
pub use raster::{ColorImage, DepthImage, LabelImage, Raster};
pub use structural::{
    NodeMismatch, SectionMismatch, StructuralComparator, StructuralFailure, StructuralReport,
};
