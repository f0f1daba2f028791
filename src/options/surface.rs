use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Mesh resolution preset. Mirrors the engine's quality levels without a
/// "custom" entry.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    /// Chosen from the number of atoms being surfaced.
    Auto,
    /// 0.3 Å grid.
    Highest,
    /// 0.5 Å grid.
    Higher,
    /// 0.7 Å grid.
    #[default]
    High,
    /// 1.0 Å grid.
    Medium,
    /// 1.5 Å grid.
    Low,
    /// 2.0 Å grid.
    Lower,
    /// 3.0 Å grid.
    Lowest,
}

impl QualityLevel {
    /// Every selectable level, in decreasing detail after `Auto`.
    pub const ALL: [Self; 8] = [
        Self::Auto,
        Self::Highest,
        Self::Higher,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Lower,
        Self::Lowest,
    ];

    /// Lower-case name as used in config files and on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Highest => "highest",
            Self::Higher => "higher",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Lower => "lower",
            Self::Lowest => "lowest",
        }
    }

    /// Concrete level for a given atom count. Non-`Auto` levels are
    /// returned unchanged.
    #[must_use]
    pub fn resolve(self, atom_count: usize) -> Self {
        if self != Self::Auto {
            return self;
        }
        match atom_count {
            0..=2_000 => Self::Highest,
            2_001..=20_000 => Self::Higher,
            20_001..=100_000 => Self::High,
            100_001..=500_000 => Self::Medium,
            500_001..=1_000_000 => Self::Low,
            1_000_001..=5_000_000 => Self::Lower,
            _ => Self::Lowest,
        }
    }

    /// Grid spacing in angstroms used by the surface mesher.
    #[must_use]
    pub fn grid_resolution(self, atom_count: usize) -> f32 {
        match self.resolve(atom_count) {
            Self::Highest => 0.3,
            Self::Higher => 0.5,
            Self::High | Self::Auto => 0.7,
            Self::Medium => 1.0,
            Self::Low => 1.5,
            Self::Lower => 2.0,
            Self::Lowest => 3.0,
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QualityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.name() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> =
                    Self::ALL.iter().map(|l| l.name()).collect();
                format!(
                    "unknown quality '{s}' (expected one of: {})",
                    names.join(", ")
                )
            })
    }
}

/// Whether one mesh covers the whole structure or each chain gets its own.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// A single mesh for the whole selection.
    #[default]
    Structure,
    /// One mesh per chain (per unit, in assemblies).
    Chain,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structure => f.write_str("structure"),
            Self::Chain => f.write_str("chain"),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structure" => Ok(Self::Structure),
            "chain" => Ok(Self::Chain),
            _ => Err(format!(
                "unknown granularity '{s}' (expected 'structure' or 'chain')"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Surface", inline)]
#[serde(default)]
/// Molecular-surface parameters.
pub struct SurfaceOptions {
    /// Solvent probe radius in angstroms.
    #[schemars(title = "Probe Radius")]
    pub probe_radius: f32,
    /// Mesh resolution preset.
    #[schemars(title = "Quality")]
    pub quality: QualityLevel,
    /// One mesh per structure or per chain.
    #[schemars(title = "Granularity")]
    pub granularity: Granularity,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            probe_radius: 1.4,
            quality: QualityLevel::High,
            granularity: Granularity::Structure,
        }
    }
}

impl SurfaceOptions {
    /// Apply the fields that are set in `overrides`, keeping the rest.
    #[must_use]
    pub fn merged(mut self, overrides: &SurfaceOverrides) -> Self {
        if let Some(probe_radius) = overrides.probe_radius {
            self.probe_radius = probe_radius;
        }
        if let Some(quality) = overrides.quality {
            self.quality = quality;
        }
        if let Some(granularity) = overrides.granularity {
            self.granularity = granularity;
        }
        self
    }

    /// Probe radius must be a finite, positive length.
    pub fn validate(&self) -> Result<(), String> {
        if self.probe_radius.is_finite() && self.probe_radius > 0.0 {
            Ok(())
        } else {
            Err(format!(
                "probe_radius must be a positive length, got {}",
                self.probe_radius
            ))
        }
    }
}

/// Partial [`SurfaceOptions`]. Unset fields leave the base value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceOverrides {
    /// Replacement probe radius.
    pub probe_radius: Option<f32>,
    /// Replacement quality.
    pub quality: Option<QualityLevel>,
    /// Replacement granularity.
    pub granularity: Option<Granularity>,
}
