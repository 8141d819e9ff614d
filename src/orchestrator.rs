//! Runs image and document comparisons over matched frames and aggregates
//! the verdicts.
//!
//! Every (frame, kind, channel) triple is an independent case: a broken input
//! only fails its own case, and cases run in parallel since none of them
//! shares state. Nothing is retried.

use crate::config::OracleConfig;
use crate::document::Document;
use crate::error::{ErrorKind, OracleError, Result};
use crate::image_compare::{Channel, ImageComparator, PixelReport};
use crate::raster::{ColorImage, DepthImage, LabelImage};
use crate::structural::{StructuralComparator, StructuralReport};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// One path per render channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPaths {
    pub color: PathBuf,
    pub depth: PathBuf,
    pub label: PathBuf,
}

impl ChannelPaths {
    pub fn get(&self, channel: Channel) -> &Path {
        match channel {
            Channel::Color => &self.color,
            Channel::Depth => &self.depth,
            Channel::Label => &self.label,
        }
    }
}

/// Everything one delivery path produced for a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutputSet {
    pub images: ChannelPaths,
    /// Exported scene documents, when the path writes them.
    pub documents: Option<ChannelPaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePair<T> {
    pub frame: usize,
    pub candidate: T,
    pub reference: T,
}

/// Already-decoded images of one frame.
#[derive(Debug, Clone)]
pub struct ImageSet {
    pub color: ColorImage,
    pub depth: DepthImage,
    pub label: LabelImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Images,
    Documents,
    All,
}

impl Mode {
    fn kinds(self) -> &'static [CaseKind] {
        match self {
            Mode::Images => &[CaseKind::Image],
            Mode::Documents => &[CaseKind::Document],
            Mode::All => &[CaseKind::Image, CaseKind::Document],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    Image,
    Document,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed,
    /// The candidate differs from the reference beyond tolerance.
    ThresholdExceeded,
    /// The inputs could not be compared at all.
    Fatal { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaseDetail {
    Pixels(PixelReport),
    Structure(StructuralReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub frame: usize,
    pub kind: CaseKind,
    pub channel: Channel,
    pub outcome: CaseOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<CaseDetail>,
}

impl CaseReport {
    pub fn from_pixels(frame: usize, channel: Channel, result: Result<PixelReport>) -> Self {
        match result {
            Ok(report) => Self {
                frame,
                kind: CaseKind::Image,
                channel,
                outcome: if report.passed {
                    CaseOutcome::Passed
                } else {
                    CaseOutcome::ThresholdExceeded
                },
                detail: Some(CaseDetail::Pixels(report)),
            },
            Err(e) => Self::fatal(frame, CaseKind::Image, channel, &e),
        }
    }

    pub fn from_structure(
        frame: usize,
        channel: Channel,
        result: Result<StructuralReport>,
    ) -> Self {
        match result {
            Ok(report) => Self {
                frame,
                kind: CaseKind::Document,
                channel,
                outcome: if report.is_match() {
                    CaseOutcome::Passed
                } else {
                    CaseOutcome::ThresholdExceeded
                },
                detail: Some(CaseDetail::Structure(report)),
            },
            Err(e) => Self::fatal(frame, CaseKind::Document, channel, &e),
        }
    }

    fn fatal(frame: usize, kind: CaseKind, channel: Channel, error: &OracleError) -> Self {
        Self {
            frame,
            kind,
            channel,
            outcome: CaseOutcome::Fatal {
                kind: error.kind(),
                message: error.to_string(),
            },
            detail: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == CaseOutcome::Passed
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Fatal { .. })
    }
}

impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CaseKind::Image => "image",
            CaseKind::Document => "gltf",
        };
        write!(f, "frame {} {} {}: ", self.frame, self.channel, kind)?;
        match (&self.outcome, &self.detail) {
            (CaseOutcome::Fatal { kind, message }, _) => write!(f, "FATAL ({kind:?}) {message}"),
            (outcome, Some(CaseDetail::Pixels(p))) => write!(
                f,
                "{} invalid {}/{} = {:.4} (limit {}, tolerance {}, max diff {})",
                if *outcome == CaseOutcome::Passed { "ok" } else { "FAILED" },
                p.invalid_pixels,
                p.total_pixels,
                p.invalid_fraction,
                p.threshold,
                p.tolerance,
                p.max_difference
            ),
            (CaseOutcome::Passed, _) => write!(f, "ok"),
            (_, Some(CaseDetail::Structure(s))) => {
                write!(f, "FAILED")?;
                for m in &s.section_mismatches {
                    write!(f, "\n  section '{}': {} != {}", m.section, m.actual, m.expected)?;
                }
                if let Some(nodes) = &s.node_mismatch {
                    for n in &nodes.missing {
                        write!(f, "\n  missing node: {n}")?;
                    }
                    for n in &nodes.unexpected {
                        write!(f, "\n  unexpected node: {n}")?;
                    }
                }
                Ok(())
            }
            (_, None) => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub cases: Vec<CaseReport>,
}

impl ComparisonReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }

    pub fn has_fatal(&self) -> bool {
        self.cases.iter().any(CaseReport::is_fatal)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|c| !c.passed())
    }

    pub fn case(&self, frame: usize, kind: CaseKind, channel: Channel) -> Option<&CaseReport> {
        self.cases
            .iter()
            .find(|c| c.frame == frame && c.kind == kind && c.channel == channel)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for case in &self.cases {
            writeln!(f, "{case}")?;
        }
        let failed = self.failures().count();
        write!(
            f,
            "{} cases, {} passed, {} failed",
            self.cases.len(),
            self.cases.len() - failed,
            failed
        )
    }
}

pub struct Orchestrator {
    images: ImageComparator,
    structure: StructuralComparator,
}

impl Orchestrator {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            images: ImageComparator::new(config.image),
            structure: StructuralComparator::new(config.schema),
        }
    }

    pub fn compare_images(&self, pairs: &[FramePair<RenderOutputSet>]) -> ComparisonReport {
        self.run(pairs, Mode::Images)
    }

    /// Frames whose outputs carry no documents are skipped.
    pub fn compare_documents(&self, pairs: &[FramePair<RenderOutputSet>]) -> ComparisonReport {
        self.run(pairs, Mode::Documents)
    }

    pub fn run(&self, pairs: &[FramePair<RenderOutputSet>], mode: Mode) -> ComparisonReport {
        let jobs: Vec<(&FramePair<RenderOutputSet>, CaseKind, Channel)> = pairs
            .iter()
            .flat_map(|pair| {
                mode.kinds()
                    .iter()
                    .flat_map(move |&kind| Channel::ALL.into_iter().map(move |ch| (pair, kind, ch)))
            })
            .collect();

        let mut cases: Vec<CaseReport> = jobs
            .par_iter()
            .filter_map(|&(pair, kind, channel)| self.run_case(pair, kind, channel))
            .collect();
        cases.sort_by_key(|c| (c.frame, c.kind, c.channel));

        for case in &cases {
            if case.passed() {
                info!("{case}");
            } else {
                warn!("{case}");
            }
        }
        ComparisonReport { cases }
    }

    fn run_case(
        &self,
        pair: &FramePair<RenderOutputSet>,
        kind: CaseKind,
        channel: Channel,
    ) -> Option<CaseReport> {
        match kind {
            CaseKind::Image => Some(CaseReport::from_pixels(
                pair.frame,
                channel,
                self.compare_image_files(
                    channel,
                    pair.candidate.images.get(channel),
                    pair.reference.images.get(channel),
                ),
            )),
            CaseKind::Document => {
                let candidate = pair.candidate.documents.as_ref()?;
                let reference = pair.reference.documents.as_ref()?;
                let result = Document::load(candidate.get(channel)).and_then(|actual| {
                    let expected = Document::load(reference.get(channel))?;
                    self.structure.compare(&actual, &expected)
                });
                Some(CaseReport::from_structure(pair.frame, channel, result))
            }
        }
    }

    /// Loads both files with the decoder for `channel` and compares them.
    pub fn compare_image_files(
        &self,
        channel: Channel,
        candidate: &Path,
        reference: &Path,
    ) -> Result<PixelReport> {
        match channel {
            Channel::Color => self
                .images
                .compare_color(&ColorImage::load(candidate)?, &ColorImage::load(reference)?),
            Channel::Depth => self
                .images
                .compare_depth(&DepthImage::load(candidate)?, &DepthImage::load(reference)?),
            Channel::Label => self
                .images
                .compare_label(&LabelImage::load(candidate)?, &LabelImage::load(reference)?),
        }
    }

    pub fn compare_image_set(
        &self,
        frame: usize,
        candidate: &ImageSet,
        reference: &ImageSet,
    ) -> Vec<CaseReport> {
        vec![
            CaseReport::from_pixels(
                frame,
                Channel::Color,
                self.images.compare_color(&candidate.color, &reference.color),
            ),
            CaseReport::from_pixels(
                frame,
                Channel::Depth,
                self.images.compare_depth(&candidate.depth, &reference.depth),
            ),
            CaseReport::from_pixels(
                frame,
                Channel::Label,
                self.images.compare_label(&candidate.label, &reference.label),
            ),
        ]
    }

    pub fn compare_document_pair(
        &self,
        frame: usize,
        channel: Channel,
        actual: &Document,
        expected: &Document,
    ) -> CaseReport {
        CaseReport::from_structure(frame, channel, self.structure.compare(actual, expected))
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OracleConfig::default())
    }
}
