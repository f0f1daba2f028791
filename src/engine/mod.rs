//! Capability interface of a molecular-graphics engine.
//!
//! The batch core drives an engine through a fixed sequence of stages, each
//! returning an owned handle that feeds the next:
//!
//! ```text
//! download -> parse_cif -> trajectory_from_mmcif -> model_from_trajectory
//!   -> structure_from_model -> structure_component -> representation_3d
//!   -> export_geometry
//! ```
//!
//! Every call blocks until its output is complete, so a stage only ever sees
//! the finished output of the previous one. [`native::NativeEngine`] is the
//! in-process implementation.

#[cfg(test)]
pub(crate) mod mock;
pub mod native;

use std::collections::BTreeSet;
use std::fmt;

use crate::cif::CifError;
use crate::options::{Granularity, QualityLevel};
use crate::selection::{Expression, SelectionError};
use crate::structure::StructureError;
pub use crate::structure::StructureKind;

/// Errors raised by engine stages.
#[derive(Debug)]
pub enum EngineError {
    /// Engine could not be constructed.
    Init(String),
    /// HTTP transfer failed or returned a non-success status.
    Http(String),
    /// Local file I/O failed.
    Io(std::io::Error),
    /// Structure data could not be parsed.
    Cif(CifError),
    /// Trajectory, model or structure could not be built.
    Structure(StructureError),
    /// Selection expression could not be compiled.
    Selection(SelectionError),
    /// Surface or geometry export failed.
    Geometry(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "engine init error: {msg}"),
            Self::Http(msg) => write!(f, "HTTP error: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Cif(e) => write!(f, "{e}"),
            Self::Structure(e) => write!(f, "{e}"),
            Self::Selection(e) => write!(f, "selection error: {e}"),
            Self::Geometry(msg) => write!(f, "geometry error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Cif(e) => Some(e),
            Self::Structure(e) => Some(e),
            Self::Selection(e) => Some(e),
            Self::Init(_) | Self::Http(_) | Self::Geometry(_) => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<CifError> for EngineError {
    fn from(e: CifError) -> Self {
        Self::Cif(e)
    }
}

impl From<StructureError> for EngineError {
    fn from(e: StructureError) -> Self {
        Self::Structure(e)
    }
}

impl From<SelectionError> for EngineError {
    fn from(e: SelectionError) -> Self {
        Self::Selection(e)
    }
}

/// Input of the download stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadParams {
    /// `http(s)://` or `file://` URL, or a local path.
    pub url: String,
    /// Whether the payload is BinaryCIF.
    pub is_binary: bool,
}

/// Whether `url` names BinaryCIF data (a `.bcif` suffix, any case).
#[must_use]
pub fn is_binary_url(url: &str) -> bool {
    url.to_lowercase().ends_with(".bcif")
}

/// Mesh visuals of the molecular-surface representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceVisual {
    /// One mesh over the whole component.
    StructureMolecularSurfaceMesh,
    /// One mesh per unit (chain under one operator).
    MolecularSurfaceMesh,
}

impl SurfaceVisual {
    /// Visual name as used in representation parameters.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::StructureMolecularSurfaceMesh => {
                "structure-molecular-surface-mesh"
            }
            Self::MolecularSurfaceMesh => "molecular-surface-mesh",
        }
    }

    /// The visual that realizes `granularity`.
    #[must_use]
    pub fn for_granularity(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Structure => Self::StructureMolecularSurfaceMesh,
            Granularity::Chain => Self::MolecularSurfaceMesh,
        }
    }
}

impl fmt::Display for SurfaceVisual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of the `molecular-surface` representation.
#[derive(Debug, Clone, PartialEq)]
pub struct MolecularSurfaceParams {
    /// Tessellation quality.
    pub quality: QualityLevel,
    /// Solvent probe radius in Å.
    pub probe_radius: f32,
    /// Multiplier on atomic radii.
    pub size_factor: f32,
    /// Mesh visuals to build.
    pub visuals: Vec<SurfaceVisual>,
}

/// Geometry export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryFormat {
    /// Wavefront OBJ.
    #[default]
    Obj,
}

/// A molecular-graphics engine.
///
/// Handles are owned by the caller; dropping a handle releases whatever the
/// engine allocated for it.
pub trait Engine {
    /// Downloaded bytes.
    type Data;
    /// Parsed CIF data.
    type Cif;
    /// All models of an entry.
    type Trajectory;
    /// One model.
    type Model;
    /// A model arranged into units.
    type Structure;
    /// A selected part of a structure.
    type Component;
    /// A built 3D representation.
    type Representation;

    /// Fetch structure bytes.
    fn download(
        &mut self,
        params: &DownloadParams,
    ) -> Result<Self::Data, EngineError>;

    /// Parse text or binary CIF.
    fn parse_cif(&mut self, data: Self::Data) -> Result<Self::Cif, EngineError>;

    /// Extract the trajectory from parsed mmCIF.
    fn trajectory_from_mmcif(
        &mut self,
        cif: &Self::Cif,
    ) -> Result<Self::Trajectory, EngineError>;

    /// Select one model.
    fn model_from_trajectory(
        &mut self,
        trajectory: &Self::Trajectory,
        index: usize,
    ) -> Result<Self::Model, EngineError>;

    /// Build a structure. `Ok(None)` means the stage produced no data.
    fn structure_from_model(
        &mut self,
        model: &Self::Model,
        kind: &StructureKind,
    ) -> Result<Option<Self::Structure>, EngineError>;

    /// Label chain ids of polymer chains, optionally narrowed to one author
    /// chain.
    fn resolve_polymer_label_asym_ids(
        &self,
        structure: &Self::Structure,
        auth_chain_id: Option<&str>,
    ) -> BTreeSet<String>;

    /// Select the atoms matching `expression`. `Ok(None)` means the stage
    /// produced no data.
    fn structure_component(
        &mut self,
        structure: &Self::Structure,
        expression: &Expression,
    ) -> Result<Option<Self::Component>, EngineError>;

    /// Whether a component holds no atoms.
    fn component_is_empty(&self, component: &Self::Component) -> bool;

    /// Build a molecular-surface representation of a component.
    fn representation_3d(
        &mut self,
        component: &Self::Component,
        params: &MolecularSurfaceParams,
    ) -> Result<Self::Representation, EngineError>;

    /// Serialize a representation's geometry.
    fn export_geometry(
        &mut self,
        representation: &Self::Representation,
        format: GeometryFormat,
    ) -> Result<Vec<u8>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_detection_ignores_case() {
        for url in ["x.bcif", "https://h/1abc.BCIF", "file.bCiF"] {
            assert!(is_binary_url(url), "{url}");
        }
        for url in ["x.cif", "x.cif.gz", "x.bcifx", "bcif"] {
            assert!(!is_binary_url(url), "{url}");
        }
    }

    #[test]
    fn visuals_follow_granularity() {
        assert_eq!(
            SurfaceVisual::for_granularity(Granularity::Structure).name(),
            "structure-molecular-surface-mesh"
        );
        assert_eq!(
            SurfaceVisual::for_granularity(Granularity::Chain).to_string(),
            "molecular-surface-mesh"
        );
    }
}
