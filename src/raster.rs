//! Interleaved pixel buffers for the three render channels.

use crate::error::{OracleError, Result, Shape};
use image::{DynamicImage, ImageError};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::TiffError;

#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<T>,
}

/// 8-bit RGB or RGBA.
pub type ColorImage = Raster<u8>;
/// Distance to the nearest surface; non-finite where nothing was hit.
pub type DepthImage = Raster<f32>;
/// Per-pixel render label codes.
pub type LabelImage = Raster<i32>;

impl<T: Copy> Raster<T> {
    pub fn new(width: u32, height: u32, channels: u8, samples: Vec<T>) -> Result<Self> {
        if channels == 0 {
            return Err(OracleError::Raster("raster needs at least one channel".into()));
        }
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() != expected {
            return Err(OracleError::Raster(format!(
                "{width}x{height}x{channels} raster needs {expected} samples, got {}",
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    pub fn filled(width: u32, height: u32, channels: u8, value: T) -> Self {
        let len = width as usize * height as usize * channels.max(1) as usize;
        Self {
            width,
            height,
            channels: channels.max(1),
            samples: vec![value; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn shape(&self) -> Shape {
        Shape {
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    /// Samples of the pixel with linear index `index` (row-major).
    pub fn pixel(&self, index: usize) -> &[T] {
        let c = self.channels as usize;
        &self.samples[index * c..(index + 1) * c]
    }

    pub fn pixel_at_mut(&mut self, x: u32, y: u32) -> &mut [T] {
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        &mut self.samples[start..start + c]
    }
}

fn open(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| match e {
        ImageError::IoError(source) => OracleError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => OracleError::Image {
            path: path.to_path_buf(),
            source,
        },
    })
}

impl Raster<u8> {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_dynamic(open(path.as_ref())?)
    }

    /// Keeps alpha when the source has it, so RGB and RGBA outputs of the two
    /// paths register as a shape mismatch instead of comparing silently.
    pub fn from_dynamic(img: DynamicImage) -> Result<Self> {
        let (w, h) = (img.width(), img.height());
        if img.color().has_alpha() {
            Self::new(w, h, 4, img.to_rgba8().into_raw())
        } else {
            Self::new(w, h, 3, img.to_rgb8().into_raw())
        }
    }
}

impl Raster<f32> {
    /// TIFF files go through the `tiff` decoder, which handles the
    /// single-channel float layout renderers write depth in. Anything else
    /// falls back to `image`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if is_tiff(path) {
            Self::load_tiff(path)
        } else {
            Self::from_dynamic(open(path)?)
        }
    }

    fn load_tiff(path: &Path) -> Result<Self> {
        let tiff_err = |e: TiffError| match e {
            TiffError::IoError(source) => OracleError::Io {
                path: path.to_path_buf(),
                source,
            },
            source => OracleError::Tiff {
                path: path.to_path_buf(),
                source,
            },
        };
        let file = File::open(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(tiff_err)?;
        let (w, h) = decoder.dimensions().map_err(tiff_err)?;
        let samples: Vec<f32> = match decoder.read_image().map_err(tiff_err)? {
            DecodingResult::F32(buf) => buf,
            DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
            _ => {
                return Err(OracleError::Raster(format!(
                    "{} holds integer samples, depth needs 32-bit float",
                    path.display()
                )))
            }
        };

        let pixels = w as usize * h as usize;
        if pixels == 0 || samples.len() % pixels != 0 {
            return Err(OracleError::Raster(format!(
                "{}: {} samples do not tile a {w}x{h} image",
                path.display(),
                samples.len()
            )));
        }
        let stride = samples.len() / pixels;
        if stride == 1 {
            return Self::new(w, h, 1, samples);
        }
        // depth lives in channel 0
        Self::new(w, h, 1, samples.into_iter().step_by(stride).collect())
    }

    pub fn from_dynamic(img: DynamicImage) -> Result<Self> {
        let (w, h) = (img.width(), img.height());
        let samples: Vec<f32> = match img {
            DynamicImage::ImageRgb32F(buf) => buf.pixels().map(|p| p.0[0]).collect(),
            DynamicImage::ImageRgba32F(buf) => buf.pixels().map(|p| p.0[0]).collect(),
            other => other.to_luma32f().into_raw(),
        };
        Self::new(w, h, 1, samples)
    }
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"))
}

impl Raster<i32> {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_dynamic(open(path.as_ref())?)
    }

    /// Label codes are read as stored. Only single-channel 8 and 16-bit
    /// images are accepted; scaling or blending would corrupt the codes.
    pub fn from_dynamic(img: DynamicImage) -> Result<Self> {
        let (w, h) = (img.width(), img.height());
        let samples: Vec<i32> = match img {
            DynamicImage::ImageLuma16(buf) => buf.into_raw().into_iter().map(i32::from).collect(),
            DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(i32::from).collect(),
            other => {
                return Err(OracleError::Raster(format!(
                    "label image must be 8 or 16-bit grayscale, got {:?}",
                    other.color()
                )))
            }
        };
        Self::new(w, h, 1, samples)
    }
}
