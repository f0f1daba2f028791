//! Run configuration with TOML preset support.
//!
//! Manifest dialect, structure source, surface parameters and engine limits
//! are consolidated here. Options serialize to/from TOML so a batch setup
//! can be kept next to its manifest.

mod engine;
mod source;
mod surface;

use std::path::Path;

pub use engine::EngineOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use source::{SourceOptions, ASSEMBLY_PLACEHOLDER, ENTRY_PLACEHOLDER};
pub use surface::{Granularity, QualityLevel, SurfaceOptions, SurfaceOverrides};

use crate::error::OptionsError;
use crate::manifest::ManifestDialect;

#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[schemars(title = "Manifest", inline)]
#[serde(default)]
/// Manifest reading options.
pub struct ManifestOptions {
    /// Row grammar.
    #[schemars(title = "Dialect")]
    pub dialect: ManifestDialect,
}

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[surface]`) work correctly.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Manifest reading.
    pub manifest: ManifestOptions,
    /// Structure file location.
    pub source: SourceOptions,
    /// Molecular-surface parameters.
    pub surface: SurfaceOptions,
    /// Native engine limits.
    pub engine: EngineOptions,
}

impl Options {
    /// Generate JSON Schema describing the options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path).map_err(OptionsError::Io)?;
        let options: Self = toml::from_str(&content)
            .map_err(|e| OptionsError::Parse(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to a TOML file (pretty-printed).
    pub fn save(&self, path: &Path) -> Result<(), OptionsError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(OptionsError::Io)?;
        }
        std::fs::write(path, content).map_err(OptionsError::Io)
    }

    /// Pretty TOML rendering.
    pub fn to_toml(&self) -> Result<String, OptionsError> {
        toml::to_string_pretty(self)
            .map_err(|e| OptionsError::Parse(e.to_string()))
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> Result<(), OptionsError> {
        self.surface.validate().map_err(OptionsError::Invalid)?;
        self.source.validate().map_err(OptionsError::Invalid)?;
        if self.engine.timeout_secs == 0 {
            return Err(OptionsError::Invalid(
                "engine.timeout_secs must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = Options::default();
        let toml_str = opts.to_toml().unwrap();
        let parsed: Options = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[surface]
quality = "low"
granularity = "chain"
"#;
        let opts: Options = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.surface.quality, QualityLevel::Low);
        assert_eq!(opts.surface.granularity, Granularity::Chain);
        // Everything else should be default
        assert_eq!(opts.surface.probe_radius, 1.4);
        assert_eq!(opts.manifest.dialect, ManifestDialect::Assembly);
        assert_eq!(opts.source, SourceOptions::default());
    }

    #[test]
    fn flat_dialect_from_toml() {
        let opts: Options =
            toml::from_str("[manifest]\ndialect = \"flat\"\n").unwrap();
        assert_eq!(opts.manifest.dialect, ManifestDialect::Flat);
    }

    #[test]
    fn load_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[surface]\nprobe_radius = -2.0\n").unwrap();
        assert!(matches!(
            Options::load(&path),
            Err(OptionsError::Invalid(_))
        ));

        std::fs::write(&path, "[source]\nurl_template = \"https://x/1.cif\"\n")
            .unwrap();
        assert!(matches!(
            Options::load(&path),
            Err(OptionsError::Invalid(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets").join("run.toml");
        let mut opts = Options::default();
        opts.surface.probe_radius = 2.0;
        opts.source.assembly_url_template = Some(
            "https://files.rcsb.org/download/{entry}-assembly{assembly}.cif"
                .to_owned(),
        );
        opts.save(&path).unwrap();
        assert_eq!(Options::load(&path).unwrap(), opts);
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value =
            serde_json::to_value(Options::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();
        for section in ["manifest", "source", "surface", "engine"] {
            assert!(props.contains_key(section), "missing {section}");
        }
        let surface = &props["surface"]["properties"];
        assert!(surface.get("probe_radius").is_some());
        assert!(surface.get("granularity").is_some());
    }
}
