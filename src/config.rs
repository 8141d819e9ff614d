//! Tolerances and schema tables for the oracle.
//!
//! Defaults reproduce the constants the render pipeline tests were tuned
//! against. A TOML file can override any subset of them.

use crate::error::{OracleError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::read_to_string;
use std::path::Path;

pub const DEFAULT_PRECISION: u32 = 12;
pub const COLOR_PIXEL_THRESHOLD: f64 = 20.0;
pub const DEPTH_PIXEL_THRESHOLD: f64 = 0.001;
pub const LABEL_PIXEL_THRESHOLD: f64 = 0.0;
pub const INVALID_PIXEL_FRACTION: f64 = 0.2;

/// `RenderLabel::kEmpty` as written by the direct renderer.
pub const LABEL_EMPTY: i32 = 32766;
/// `RenderLabel::kDontCare`, what the glTF client path writes for background.
pub const LABEL_DONT_CARE: i32 = 32764;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub schema: SchemaConfig,
    pub image: ImageTolerances,
}

impl OracleConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = read_to_string(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let config: OracleConfig =
            toml::from_str(data).map_err(|e| OracleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;
        self.image.validate()
    }
}

/// Which fields of a scene document carry meaning and how they link together.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Field name -> top-level collection the field's integer value indexes.
    pub reference_fields: BTreeMap<String, String>,
    /// Fields dropped wherever they appear.
    pub identity_fields: BTreeSet<String>,
    /// Top-level collection holding raw payload bytes; removed before comparing.
    pub payload_collection: String,
    /// Top-level sections compared for exact equality.
    pub scalar_sections: Vec<String>,
    /// Decimal places kept in numeric arrays.
    pub precision: u32,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let reference_fields = [
            ("bufferView", "bufferViews"),
            ("camera", "cameras"),
            ("index", "textures"),
            ("indices", "accessors"),
            ("material", "materials"),
            ("mesh", "meshes"),
            ("sampler", "samplers"),
            ("source", "images"),
            ("POSITION", "accessors"),
            ("TEXCOORD_0", "accessors"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            reference_fields,
            identity_fields: ["buffer", "name"].iter().map(|s| s.to_string()).collect(),
            payload_collection: "buffers".to_string(),
            scalar_sections: vec!["scene".into(), "scenes".into(), "asset".into()],
            precision: DEFAULT_PRECISION,
        }
    }
}

impl SchemaConfig {
    pub fn validate(&self) -> Result<()> {
        // f64 carries roughly 15-16 significant decimal digits
        if self.precision > 15 {
            return Err(OracleError::Config(format!(
                "precision {} exceeds 15 decimal places",
                self.precision
            )));
        }
        if let Some(field) = self
            .reference_fields
            .keys()
            .find(|k| self.identity_fields.contains(*k))
        {
            return Err(OracleError::Config(format!(
                "field '{field}' is both a reference and an identity field"
            )));
        }
        Ok(())
    }
}

/// Remaps one label code in the reference image before differencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LabelRemap {
    pub from: i32,
    pub to: i32,
}

impl Default for LabelRemap {
    fn default() -> Self {
        Self {
            from: LABEL_EMPTY,
            to: LABEL_DONT_CARE,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ImageTolerances {
    pub color: f64,
    pub depth: f64,
    pub label: f64,
    /// A comparison passes only while the invalid fraction is strictly below this.
    pub invalid_fraction: f64,
    pub label_remap: Option<LabelRemap>,
}

impl Default for ImageTolerances {
    fn default() -> Self {
        Self {
            color: COLOR_PIXEL_THRESHOLD,
            depth: DEPTH_PIXEL_THRESHOLD,
            label: LABEL_PIXEL_THRESHOLD,
            invalid_fraction: INVALID_PIXEL_FRACTION,
            label_remap: Some(LabelRemap::default()),
        }
    }
}

impl ImageTolerances {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("color", self.color),
            ("depth", self.depth),
            ("label", self.label),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(OracleError::Config(format!(
                    "{name} tolerance must be non-negative, got {value}"
                )));
            }
        }
        let fraction = self.invalid_fraction;
        if fraction.is_nan() || fraction <= 0.0 || fraction > 1.0 {
            return Err(OracleError::Config(format!(
                "invalid_fraction must be in (0, 1], got {fraction}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = OracleConfig::default();
        assert_eq!(config.schema.precision, 12);
        assert_eq!(config.schema.reference_fields["TEXCOORD_0"], "accessors");
        assert_eq!(config.schema.reference_fields["source"], "images");
        assert!(config.schema.identity_fields.contains("name"));
        assert_eq!(config.image.color, 20.0);
        assert_eq!(config.image.invalid_fraction, 0.2);
        assert_eq!(config.image.label_remap, Some(LabelRemap { from: 32766, to: 32764 }));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let toml = r#"
            [image]
            color = 5.0

            [schema]
            identity_fields = ["name", "buffer", "extras"]
        "#;
        let config = OracleConfig::from_toml_str(toml).expect("parse");
        assert_eq!(config.image.color, 5.0);
        assert_eq!(config.image.depth, 0.001);
        assert!(config.schema.identity_fields.contains("extras"));
        assert_eq!(config.schema.payload_collection, "buffers");
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = OracleConfig::from_toml_str("[image]\ninvalid_fraction = 1.5\n").unwrap_err();
        assert!(matches!(err, OracleError::Config(_)));
    }

    #[test]
    fn rejects_overlapping_field_tables() {
        let toml = r#"
            [schema]
            identity_fields = ["camera"]
        "#;
        assert!(OracleConfig::from_toml_str(toml).is_err());
    }
}
