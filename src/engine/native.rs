//! In-process engine: `ureq` transfers, the crate's own CIF readers, and
//! the grid-based surface mesher.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{
    DownloadParams, Engine, EngineError, GeometryFormat, MolecularSurfaceParams,
    StructureKind, SurfaceVisual,
};
use crate::cif::{parse_binary, parse_text, CifFile};
use crate::export::write_obj;
use crate::options::EngineOptions;
use crate::selection::{compile, Expression};
use crate::structure::{self, Model, Structure, Trajectory, Unit};
use crate::surface::{
    element_of, molecular_surface, vdw_radius, SurfaceAtom, SurfaceMesh,
    SurfaceParams,
};

const MEGABYTE: u64 = 1024 * 1024;

/// Raw structure bytes and how to read them.
#[derive(Debug, Clone)]
pub struct Downloaded {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Whether `bytes` is BinaryCIF.
    pub is_binary: bool,
    /// URL or path the bytes came from.
    pub source: String,
}

/// Built surface meshes.
#[derive(Debug, Clone, Default)]
pub struct SurfaceRepresentation {
    /// One mesh per requested visual and unit.
    pub meshes: Vec<SurfaceMesh>,
    /// Atoms behind each mesh, parallel to `meshes`.
    pub mesh_atoms: Vec<usize>,
}

impl SurfaceRepresentation {
    fn push(&mut self, mesh: SurfaceMesh, atoms: usize) {
        if mesh.is_empty() {
            return;
        }
        self.meshes.push(mesh);
        self.mesh_atoms.push(atoms);
    }
}

/// Engine implemented in Rust within this process.
#[derive(Debug)]
pub struct NativeEngine {
    agent: ureq::Agent,
    max_download_bytes: u64,
}

impl NativeEngine {
    /// Create the engine and its HTTP agent.
    pub fn new(options: &EngineOptions) -> Result<Self, EngineError> {
        if options.timeout_secs == 0 {
            return Err(EngineError::Init(
                "download timeout must be at least one second".into(),
            ));
        }
        if options.max_download_mb == 0 {
            return Err(EngineError::Init(
                "download size limit must be at least one megabyte".into(),
            ));
        }
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(options.timeout_secs)))
            .build()
            .into();
        log::debug!(
            "native engine ready (timeout {} s, limit {} MB)",
            options.timeout_secs,
            options.max_download_mb
        );
        Ok(Self {
            agent,
            max_download_bytes: options
                .max_download_mb
                .saturating_mul(MEGABYTE),
        })
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>, EngineError> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| EngineError::Http(format!("{url}: {e}")))?;
        response
            .body_mut()
            .with_config()
            .limit(self.max_download_bytes)
            .read_to_vec()
            .map_err(|e| EngineError::Http(format!("{url}: {e}")))
    }

    fn fetch_file(path: &Path) -> Result<Vec<u8>, EngineError> {
        std::fs::read(path).map_err(|e| {
            EngineError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {e}", path.display()),
            ))
        })
    }
}

fn is_http(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn surface_atoms<'s>(
    structure: &'s Structure,
    units: impl Iterator<Item = &'s Unit>,
    size_factor: f32,
) -> Vec<SurfaceAtom> {
    units
        .flat_map(|unit| structure.unit_atoms(unit))
        .map(|(atom, position)| {
            let element = element_of(&atom.type_symbol, &atom.label_atom_id);
            SurfaceAtom {
                position,
                radius: vdw_radius(&element) * size_factor,
            }
        })
        .collect()
}

impl Engine for NativeEngine {
    type Data = Downloaded;
    type Cif = CifFile;
    type Trajectory = Trajectory;
    type Model = Arc<Model>;
    type Structure = Structure;
    type Component = Structure;
    type Representation = SurfaceRepresentation;

    fn download(
        &mut self,
        params: &DownloadParams,
    ) -> Result<Downloaded, EngineError> {
        let url = &params.url;
        let bytes = if is_http(url) {
            self.fetch_http(url)?
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            Self::fetch_file(Path::new(path))?
        };
        log::debug!("downloaded {} bytes from {}", bytes.len(), params.url);
        Ok(Downloaded {
            bytes,
            is_binary: params.is_binary,
            source: params.url.clone(),
        })
    }

    fn parse_cif(&mut self, data: Downloaded) -> Result<CifFile, EngineError> {
        let parsed = if data.is_binary {
            parse_binary(&data.bytes)
        } else {
            parse_text(&data.bytes)
        };
        Ok(parsed?)
    }

    fn trajectory_from_mmcif(
        &mut self,
        cif: &CifFile,
    ) -> Result<Trajectory, EngineError> {
        Ok(Trajectory::from_cif(cif)?)
    }

    fn model_from_trajectory(
        &mut self,
        trajectory: &Trajectory,
        index: usize,
    ) -> Result<Arc<Model>, EngineError> {
        Ok(trajectory.model(index)?)
    }

    fn structure_from_model(
        &mut self,
        model: &Arc<Model>,
        kind: &StructureKind,
    ) -> Result<Option<Structure>, EngineError> {
        let structure = Structure::build(Arc::clone(model), kind)?;
        log::debug!(
            "{kind} of {}: {} units, {} atoms",
            model.entry.name,
            structure.units.len(),
            structure.atom_count()
        );
        Ok(Some(structure))
    }

    fn resolve_polymer_label_asym_ids(
        &self,
        structure: &Structure,
        auth_chain_id: Option<&str>,
    ) -> BTreeSet<String> {
        structure::resolve_polymer_label_asym_ids(structure, auth_chain_id)
    }

    fn structure_component(
        &mut self,
        structure: &Structure,
        expression: &Expression,
    ) -> Result<Option<Structure>, EngineError> {
        let selection = compile(expression)?;
        if selection.is_trivially_empty() {
            return Ok(Some(Structure {
                model: Arc::clone(&structure.model),
                units: Vec::new(),
            }));
        }
        Ok(Some(structure.filter(&selection)))
    }

    fn component_is_empty(&self, component: &Structure) -> bool {
        component.is_empty()
    }

    fn representation_3d(
        &mut self,
        component: &Structure,
        params: &MolecularSurfaceParams,
    ) -> Result<SurfaceRepresentation, EngineError> {
        if !(params.probe_radius.is_finite() && params.probe_radius >= 0.0) {
            return Err(EngineError::Geometry(format!(
                "invalid probe radius {}",
                params.probe_radius
            )));
        }
        let surface = SurfaceParams {
            probe_radius: params.probe_radius,
            resolution: params.quality.grid_resolution(component.atom_count()),
        };

        let mut repr = SurfaceRepresentation::default();
        for visual in &params.visuals {
            match visual {
                SurfaceVisual::StructureMolecularSurfaceMesh => {
                    let atoms = surface_atoms(
                        component,
                        component.units.iter(),
                        params.size_factor,
                    );
                    let mesh =
                        molecular_surface(visual.name(), &atoms, surface);
                    repr.push(mesh, atoms.len());
                }
                SurfaceVisual::MolecularSurfaceMesh => {
                    for unit in &component.units {
                        let atoms = surface_atoms(
                            component,
                            std::iter::once(unit),
                            params.size_factor,
                        );
                        let name =
                            format!("{}_{}", unit.label_asym_id, unit.operator);
                        let mesh = molecular_surface(name, &atoms, surface);
                        repr.push(mesh, atoms.len());
                    }
                }
            }
        }
        Ok(repr)
    }

    fn export_geometry(
        &mut self,
        representation: &SurfaceRepresentation,
        format: GeometryFormat,
    ) -> Result<Vec<u8>, EngineError> {
        match format {
            GeometryFormat::Obj => {
                let mut out = Vec::new();
                write_obj(&mut out, &representation.meshes)?;
                Ok(out)
            }
        }
    }
}
