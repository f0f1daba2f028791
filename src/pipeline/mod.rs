//! Per-reference pipeline: fetch one structure, select its chains and build
//! the molecular-surface representation.

use std::fmt;

use crate::engine::{
    is_binary_url, DownloadParams, Engine, EngineError, MolecularSurfaceParams,
    StructureKind, SurfaceVisual,
};
use crate::manifest::ReferenceError;
use crate::options::SurfaceOptions;
use crate::selection::label_asym_id_in;

/// A manifest row resolved to a fetchable location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureRef {
    /// Structure file URL (or local path).
    pub url: String,
    /// Author chain to keep; `None` keeps all polymer chains.
    pub auth_chain_id: Option<String>,
    /// Assembly the engine should expand; `None` uses the deposited model.
    pub assembly_id: Option<String>,
}

impl StructureRef {
    /// Deposited model at `url`, all chains.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_chain_id: None,
            assembly_id: None,
        }
    }

    /// Keep only one author chain.
    #[must_use]
    pub fn with_chain(mut self, auth_chain_id: impl Into<String>) -> Self {
        self.auth_chain_id = Some(auth_chain_id.into());
        self
    }

    /// Expand an assembly in the engine.
    #[must_use]
    pub fn with_assembly(mut self, assembly_id: impl Into<String>) -> Self {
        self.assembly_id = Some(assembly_id.into());
        self
    }

    fn structure_kind(&self) -> StructureKind {
        self.assembly_id.as_ref().map_or(StructureKind::Model, |id| {
            StructureKind::Assembly(Some(id.clone()))
        })
    }

    fn chain_label(&self) -> &str {
        self.auth_chain_id.as_deref().unwrap_or("all chains")
    }
}

/// Output of a successful run.
#[derive(Debug)]
pub struct Computed<R> {
    /// Representation ready for export; `None` when the engine produced no
    /// component, which exports as an empty mesh.
    pub representation: Option<R>,
    /// The chain selection matched no atoms.
    pub empty_selection: bool,
}

/// A stage of [`run_one`] failed.
#[derive(Debug)]
pub enum PipelineError {
    /// The manifest row cannot name an output file.
    Reference(ReferenceError),
    /// Download failed.
    Fetch(EngineError),
    /// Bytes were not valid (Binary)CIF.
    Parse(EngineError),
    /// No usable trajectory or first model.
    Model(EngineError),
    /// Structure could not be built.
    Structure(EngineError),
    /// Structure stage produced no data.
    MissingStructure {
        /// URL of the structure.
        url: String,
    },
    /// Chain selection could not be applied.
    Selection(EngineError),
    /// Surface could not be built.
    Representation(EngineError),
    /// Geometry could not be exported or written.
    Export(EngineError),
}

impl PipelineError {
    /// Name of the failed stage.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Reference(_) => "reference",
            Self::Fetch(_) => "fetch",
            Self::Parse(_) => "parse",
            Self::Model(_) => "model",
            Self::Structure(_) | Self::MissingStructure { .. } => "structure",
            Self::Selection(_) => "selection",
            Self::Representation(_) => "representation",
            Self::Export(_) => "export",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(e) => write!(f, "{e}"),
            Self::MissingStructure { url } => {
                write!(f, "no structure data in {url}")
            }
            Self::Fetch(e)
            | Self::Parse(e)
            | Self::Model(e)
            | Self::Structure(e)
            | Self::Selection(e)
            | Self::Representation(e)
            | Self::Export(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Reference(e) => Some(e),
            Self::MissingStructure { .. } => None,
            Self::Fetch(e)
            | Self::Parse(e)
            | Self::Model(e)
            | Self::Structure(e)
            | Self::Selection(e)
            | Self::Representation(e)
            | Self::Export(e) => Some(e),
        }
    }
}

/// Parameters for the representation stage.
#[must_use]
pub fn surface_params(options: &SurfaceOptions) -> MolecularSurfaceParams {
    MolecularSurfaceParams {
        quality: options.quality,
        probe_radius: options.probe_radius,
        size_factor: 1.0,
        visuals: vec![SurfaceVisual::for_granularity(options.granularity)],
    }
}

/// Run every stage for one structure.
///
/// Each engine call returns only once its output is complete. All
/// intermediate handles are dropped on return; the representation is handed
/// to the caller for export.
pub fn run_one<E: Engine>(
    engine: &mut E,
    structure_ref: &StructureRef,
    options: &SurfaceOptions,
) -> Result<Computed<E::Representation>, PipelineError> {
    let url = &structure_ref.url;
    let data = engine
        .download(&DownloadParams {
            url: url.clone(),
            is_binary: is_binary_url(url),
        })
        .map_err(PipelineError::Fetch)?;
    let cif = engine.parse_cif(data).map_err(PipelineError::Parse)?;
    let trajectory = engine
        .trajectory_from_mmcif(&cif)
        .map_err(PipelineError::Model)?;
    let model = engine
        .model_from_trajectory(&trajectory, 0)
        .map_err(PipelineError::Model)?;
    let structure = engine
        .structure_from_model(&model, &structure_ref.structure_kind())
        .map_err(PipelineError::Structure)?
        .ok_or_else(|| PipelineError::MissingStructure { url: url.clone() })?;

    let ids = engine.resolve_polymer_label_asym_ids(
        &structure,
        structure_ref.auth_chain_id.as_deref(),
    );
    let expression = label_asym_id_in(&ids);
    log::debug!("{url}: selecting {expression}");
    let component = engine
        .structure_component(&structure, &expression)
        .map_err(PipelineError::Selection)?;

    let empty_selection = component
        .as_ref()
        .is_none_or(|c| engine.component_is_empty(c));
    if empty_selection {
        log::warn!(
            "Structure is empty (URL: {url}, chain: {})",
            structure_ref.chain_label()
        );
    }

    let params = surface_params(options);
    let representation = component
        .map(|component| engine.representation_3d(&component, &params))
        .transpose()
        .map_err(PipelineError::Representation)?;

    Ok(Computed {
        representation,
        empty_selection,
    })
}
