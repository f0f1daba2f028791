//! Scripted engine for driver and batch tests.
//!
//! Every entry has polymer chains `A` and `B` (author ids equal to label
//! ids). URLs containing `404` fail to download and URLs containing
//! `no-structure` build no structure. Calls and representation parameters
//! are recorded; exports name the structure kind and the chains.

use std::collections::BTreeSet;

use super::{
    DownloadParams, Engine, EngineError, GeometryFormat, MolecularSurfaceParams,
    StructureKind,
};
use crate::selection::{compile, AtomProperties, AtomProperty, Expression};

const CHAINS: [&str; 2] = ["A", "B"];

struct ChainAtom<'a>(&'a str);

impl AtomProperties for ChainAtom<'_> {
    fn property(&self, property: AtomProperty) -> &str {
        match property {
            AtomProperty::LabelAsymId => self.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockStructure {
    pub(crate) kind: StructureKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockComponent {
    pub(crate) kind: StructureKind,
    pub(crate) chains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockRepresentation {
    pub(crate) kind: StructureKind,
    pub(crate) chains: Vec<String>,
    pub(crate) params: MolecularSurfaceParams,
}

#[derive(Debug, Default)]
pub(crate) struct MockEngine {
    pub(crate) downloads: Vec<DownloadParams>,
    pub(crate) kinds: Vec<StructureKind>,
    pub(crate) representations: Vec<MockRepresentation>,
}

impl Engine for MockEngine {
    type Data = String;
    type Cif = String;
    type Trajectory = String;
    type Model = String;
    type Structure = MockStructure;
    type Component = MockComponent;
    type Representation = MockRepresentation;

    fn download(
        &mut self,
        params: &DownloadParams,
    ) -> Result<String, EngineError> {
        self.downloads.push(params.clone());
        if params.url.contains("404") {
            let message = format!("{}: status code 404", params.url);
            return Err(EngineError::Http(message));
        }
        Ok(params.url.clone())
    }

    fn parse_cif(&mut self, data: String) -> Result<String, EngineError> {
        Ok(data)
    }

    fn trajectory_from_mmcif(
        &mut self,
        cif: &String,
    ) -> Result<String, EngineError> {
        Ok(cif.clone())
    }

    fn model_from_trajectory(
        &mut self,
        trajectory: &String,
        _index: usize,
    ) -> Result<String, EngineError> {
        Ok(trajectory.clone())
    }

    fn structure_from_model(
        &mut self,
        model: &String,
        kind: &StructureKind,
    ) -> Result<Option<MockStructure>, EngineError> {
        self.kinds.push(kind.clone());
        Ok((!model.contains("no-structure")).then(|| MockStructure {
            kind: kind.clone(),
        }))
    }

    fn resolve_polymer_label_asym_ids(
        &self,
        _structure: &MockStructure,
        auth_chain_id: Option<&str>,
    ) -> BTreeSet<String> {
        CHAINS
            .iter()
            .filter(|c| auth_chain_id.is_none_or(|id| id == **c))
            .map(|c| (*c).to_owned())
            .collect()
    }

    fn structure_component(
        &mut self,
        structure: &MockStructure,
        expression: &Expression,
    ) -> Result<Option<MockComponent>, EngineError> {
        let selection = compile(expression)?;
        Ok(Some(MockComponent {
            kind: structure.kind.clone(),
            chains: CHAINS
                .iter()
                .filter(|c| selection.matches(&ChainAtom(c)))
                .map(|c| (*c).to_owned())
                .collect(),
        }))
    }

    fn component_is_empty(&self, component: &MockComponent) -> bool {
        component.chains.is_empty()
    }

    fn representation_3d(
        &mut self,
        component: &MockComponent,
        params: &MolecularSurfaceParams,
    ) -> Result<MockRepresentation, EngineError> {
        let repr = MockRepresentation {
            kind: component.kind.clone(),
            chains: component.chains.clone(),
            params: params.clone(),
        };
        self.representations.push(repr.clone());
        Ok(repr)
    }

    fn export_geometry(
        &mut self,
        representation: &MockRepresentation,
        _format: GeometryFormat,
    ) -> Result<Vec<u8>, EngineError> {
        Ok(format!(
            "# mock {}\no {}\n",
            representation.kind,
            representation.chains.join(",")
        )
        .into_bytes())
    }
}
