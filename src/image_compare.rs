//! Statistical comparison of rendered images.
//!
//! A pixel is invalid when its difference exceeds the channel tolerance. Two
//! images match when the fraction of invalid pixels stays strictly below the
//! configured threshold, so isolated antialiasing or shading differences are
//! tolerated while systemic divergence is not.

use crate::config::ImageTolerances;
use crate::error::{OracleError, Result, Shape};
use crate::raster::{ColorImage, DepthImage, LabelImage};
use serde::Serialize;

/// Invalid pixel coordinates kept in a report for diagnostics.
const MAX_SAMPLED_PIXELS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Color,
    Depth,
    Label,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Color, Channel::Depth, Channel::Label];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Color => "color",
            Channel::Depth => "depth",
            Channel::Label => "label",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelReport {
    pub channel: Channel,
    pub shape: Shape,
    pub total_pixels: usize,
    pub invalid_pixels: usize,
    pub invalid_fraction: f64,
    pub tolerance: f64,
    pub threshold: f64,
    /// Largest per-pixel difference seen, after channel pre-processing.
    pub max_difference: f64,
    /// First few invalid pixels as `(x, y)`.
    pub sample_invalid: Vec<(u32, u32)>,
    pub passed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImageComparator {
    tolerances: ImageTolerances,
}

impl ImageComparator {
    pub fn new(tolerances: ImageTolerances) -> Self {
        Self { tolerances }
    }

    pub fn tolerances(&self) -> &ImageTolerances {
        &self.tolerances
    }

    pub fn compare_color(
        &self,
        candidate: &ColorImage,
        reference: &ColorImage,
    ) -> Result<PixelReport> {
        check_shapes(candidate.shape(), reference.shape())?;
        Ok(self.tally(Channel::Color, candidate.shape(), self.tolerances.color, |i| {
            candidate
                .pixel(i)
                .iter()
                .zip(reference.pixel(i))
                .map(|(&a, &b)| (a as i16 - b as i16).abs())
                .max()
                .unwrap_or(0) as f64
        }))
    }

    /// Non-finite depth means "no surface hit"; both sides treat it as zero.
    pub fn compare_depth(
        &self,
        candidate: &DepthImage,
        reference: &DepthImage,
    ) -> Result<PixelReport> {
        check_shapes(candidate.shape(), reference.shape())?;
        let a = candidate.samples();
        let b = reference.samples();
        Ok(self.tally(Channel::Depth, candidate.shape(), self.tolerances.depth, |i| {
            (finite_or_zero(a[i]) - finite_or_zero(b[i])).abs()
        }))
    }

    /// The reference image comes from the trusted renderer; its background
    /// code is rewritten to the candidate's convention before differencing.
    pub fn compare_label(
        &self,
        candidate: &LabelImage,
        reference: &LabelImage,
    ) -> Result<PixelReport> {
        check_shapes(candidate.shape(), reference.shape())?;
        let a = candidate.samples();
        let b = reference.samples();
        let remap = self.tolerances.label_remap;
        Ok(self.tally(Channel::Label, candidate.shape(), self.tolerances.label, |i| {
            let expected = match remap {
                Some(r) if b[i] == r.from => r.to,
                _ => b[i],
            };
            (a[i] as i64 - expected as i64).abs() as f64
        }))
    }

    fn tally(
        &self,
        channel: Channel,
        shape: Shape,
        tolerance: f64,
        difference: impl Fn(usize) -> f64,
    ) -> PixelReport {
        let total_pixels = shape.width as usize * shape.height as usize;
        let mut invalid_pixels = 0;
        let mut max_difference: f64 = 0.0;
        let mut sample_invalid = Vec::new();

        for i in 0..total_pixels {
            let d = difference(i);
            max_difference = max_difference.max(d);
            if d > tolerance {
                invalid_pixels += 1;
                if sample_invalid.len() < MAX_SAMPLED_PIXELS {
                    let x = (i % shape.width as usize) as u32;
                    let y = (i / shape.width as usize) as u32;
                    sample_invalid.push((x, y));
                }
            }
        }

        let invalid_fraction = if total_pixels == 0 {
            0.0
        } else {
            invalid_pixels as f64 / total_pixels as f64
        };
        let threshold = self.tolerances.invalid_fraction;

        PixelReport {
            channel,
            shape,
            total_pixels,
            invalid_pixels,
            invalid_fraction,
            tolerance,
            threshold,
            max_difference,
            sample_invalid,
            passed: invalid_fraction < threshold,
        }
    }
}

fn check_shapes(candidate: Shape, reference: Shape) -> Result<()> {
    if candidate != reference {
        return Err(OracleError::ShapeMismatch {
            candidate,
            reference,
        });
    }
    Ok(())
}

#[inline]
fn finite_or_zero(v: f32) -> f64 {
    if v.is_finite() {
        v as f64
    } else {
        0.0
    }
}
