//! Atomic structure model built from parsed CIF data.
//!
//! A [`Trajectory`] holds every model of an entry; a [`Model`] holds atoms in
//! file order plus the entity and assembly metadata shared by all models; a
//! [`Structure`] is a model arranged into [`Unit`]s, each the atoms of one
//! label chain placed by one symmetry operator.

mod assembly;
mod chains;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use rustc_hash::FxHashMap;

pub use assembly::{parse_oper_expression, AssemblyGen, Assembly, Operator};
pub use chains::resolve_polymer_label_asym_ids;

use crate::cif::{CifBlock, CifCategory, CifError, CifField, CifFile};
use crate::selection::{AtomProperties, AtomProperty, CompiledSelection};

/// Name of the operator that leaves coordinates unchanged.
pub const IDENTITY_OPERATOR: &str = "1_555";

/// Errors produced while building structures from CIF data.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureError {
    /// The file has no data block.
    Cif(CifError),
    /// A required category is absent.
    MissingCategory(&'static str),
    /// A required field is absent from its category.
    MissingField {
        /// Category name.
        category: &'static str,
        /// Field name.
        field: &'static str,
    },
    /// A row lacks a required value.
    BadRow {
        /// Category name.
        category: &'static str,
        /// 0-based row index.
        row: usize,
        /// What was wrong.
        message: String,
    },
    /// Requested model index does not exist.
    ModelIndex {
        /// Requested index.
        index: usize,
        /// Number of models available.
        count: usize,
    },
    /// Requested assembly is not defined.
    UnknownAssembly(String),
    /// An operator expression names an undefined operator.
    UnknownOperator(String),
    /// An operator expression is malformed.
    BadOperatorExpression(String),
}

impl fmt::Display for StructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cif(e) => write!(f, "{e}"),
            Self::MissingCategory(c) => write!(f, "missing category '_{c}'"),
            Self::MissingField { category, field } => {
                write!(f, "missing field '_{category}.{field}'")
            }
            Self::BadRow {
                category,
                row,
                message,
            } => write!(f, "'_{category}' row {row}: {message}"),
            Self::ModelIndex { index, count } => write!(
                f,
                "model index {index} out of range ({count} models available)"
            ),
            Self::UnknownAssembly(id) => write!(f, "assembly '{id}' not found"),
            Self::UnknownOperator(id) => write!(f, "operator '{id}' not found"),
            Self::BadOperatorExpression(expr) => {
                write!(f, "malformed operator expression '{expr}'")
            }
        }
    }
}

impl std::error::Error for StructureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cif(e) => Some(e),
            _ => None,
        }
    }
}

/// One `_atom_site` row.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Label chain id.
    pub label_asym_id: String,
    /// Author chain id (falls back to the label chain id).
    pub auth_asym_id: String,
    /// Entity id.
    pub label_entity_id: String,
    /// Residue name.
    pub label_comp_id: String,
    /// Atom name.
    pub label_atom_id: String,
    /// Element symbol.
    pub type_symbol: String,
    /// Polymer sequence index; `None` for non-polymer atoms.
    pub label_seq_id: Option<i64>,
    /// Cartesian position in Å.
    pub position: Vec3,
}

impl AtomProperties for Atom {
    fn property(&self, property: AtomProperty) -> &str {
        match property {
            AtomProperty::LabelAsymId => &self.label_asym_id,
        }
    }
}

/// Entry-level metadata shared by every model of a trajectory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryData {
    /// Data block header, usually the entry id.
    pub name: String,
    /// `_entity.id` → `_entity.type`. Empty when the file has no `_entity`.
    pub entity_types: FxHashMap<String, String>,
    /// `_pdbx_struct_assembly_gen`, grouped by assembly.
    pub assemblies: Vec<Assembly>,
    /// `_pdbx_struct_oper_list`, by id.
    pub operators: FxHashMap<String, Operator>,
}

impl EntryData {
    /// Assembly by id.
    #[must_use]
    pub fn assembly(&self, id: &str) -> Option<&Assembly> {
        self.assemblies.iter().find(|a| a.id == id)
    }
}

/// One model: atoms in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// `pdbx_PDB_model_num`.
    pub model_num: i64,
    /// Atoms in file order.
    pub atoms: Vec<Atom>,
    /// Entry metadata.
    pub entry: Arc<EntryData>,
}

impl Model {
    /// Whether `atom` belongs to a polymer.
    ///
    /// Uses `_entity.type` when the file has entity records, otherwise the
    /// presence of a sequence index.
    #[must_use]
    pub fn is_polymer(&self, atom: &Atom) -> bool {
        if self.entry.entity_types.is_empty() {
            return atom.label_seq_id.is_some();
        }
        self.entry
            .entity_types
            .get(&atom.label_entity_id)
            .is_some_and(|t| t.eq_ignore_ascii_case("polymer"))
    }

    /// Contiguous runs of atoms sharing a label chain id, in file order.
    #[must_use]
    pub fn chain_runs(&self) -> Vec<(String, Vec<usize>)> {
        let mut runs: Vec<(String, Vec<usize>)> = Vec::new();
        for (i, atom) in self.atoms.iter().enumerate() {
            if let Some((id, indices)) = runs.last_mut() {
                if *id == atom.label_asym_id {
                    indices.push(i);
                    continue;
                }
            }
            runs.push((atom.label_asym_id.clone(), vec![i]));
        }
        runs
    }
}

/// All models of an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Models in order of first appearance.
    pub models: Vec<Arc<Model>>,
}

impl Trajectory {
    /// Build from the first data block of a parsed file.
    pub fn from_cif(file: &CifFile) -> Result<Self, StructureError> {
        let block = file
            .first_block()
            .ok_or(StructureError::Cif(CifError::NoDataBlock))?;
        let entry = Arc::new(read_entry_data(block)?);
        let atom_site = block
            .category("atom_site")
            .ok_or(StructureError::MissingCategory("atom_site"))?;

        let mut models: Vec<Model> = Vec::new();
        let mut index_of: FxHashMap<i64, usize> = FxHashMap::default();
        let columns = AtomSiteColumns::new(atom_site)?;
        for row in 0..atom_site.row_count {
            let (model_num, atom) = columns.atom(row)?;
            let slot = *index_of.entry(model_num).or_insert_with(|| {
                models.push(Model {
                    model_num,
                    atoms: Vec::new(),
                    entry: Arc::clone(&entry),
                });
                models.len() - 1
            });
            models[slot].atoms.push(atom);
        }

        log::debug!(
            "trajectory '{}': {} models, {} atoms",
            entry.name,
            models.len(),
            atom_site.row_count
        );
        Ok(Self {
            models: models.into_iter().map(Arc::new).collect(),
        })
    }

    /// Model at `index`.
    pub fn model(&self, index: usize) -> Result<Arc<Model>, StructureError> {
        self.models
            .get(index)
            .cloned()
            .ok_or(StructureError::ModelIndex {
                index,
                count: self.models.len(),
            })
    }
}

struct AtomSiteColumns<'a> {
    label_asym_id: &'a CifField,
    auth_asym_id: Option<&'a CifField>,
    label_entity_id: Option<&'a CifField>,
    label_comp_id: Option<&'a CifField>,
    label_atom_id: Option<&'a CifField>,
    type_symbol: Option<&'a CifField>,
    label_seq_id: Option<&'a CifField>,
    model_num: Option<&'a CifField>,
    xyz: [&'a CifField; 3],
}

impl<'a> AtomSiteColumns<'a> {
    fn new(category: &'a CifCategory) -> Result<Self, StructureError> {
        let required = |field: &'static str| {
            category.field(field).ok_or(StructureError::MissingField {
                category: "atom_site",
                field,
            })
        };
        Ok(Self {
            label_asym_id: required("label_asym_id")?,
            auth_asym_id: category.field("auth_asym_id"),
            label_entity_id: category.field("label_entity_id"),
            label_comp_id: category.field("label_comp_id"),
            label_atom_id: category.field("label_atom_id"),
            type_symbol: category.field("type_symbol"),
            label_seq_id: category.field("label_seq_id"),
            model_num: category.field("pdbx_PDB_model_num"),
            xyz: [
                required("Cartn_x")?,
                required("Cartn_y")?,
                required("Cartn_z")?,
            ],
        })
    }

    fn atom(&self, row: usize) -> Result<(i64, Atom), StructureError> {
        let text = |field: Option<&CifField>| {
            field
                .and_then(|f| f.str(row))
                .map(Cow::into_owned)
                .unwrap_or_default()
        };
        let mut coords = [0f32; 3];
        for (axis, field) in self.xyz.iter().enumerate() {
            coords[axis] = field.float(row).ok_or_else(|| StructureError::BadRow {
                category: "atom_site",
                row,
                message: format!("missing or non-numeric '{}'", field.name),
            })? as f32;
        }
        let label_asym_id = text(Some(self.label_asym_id));
        let auth_asym_id = self
            .auth_asym_id
            .and_then(|f| f.str(row))
            .map_or_else(|| label_asym_id.clone(), Cow::into_owned);
        let model_num = self.model_num.and_then(|f| f.int(row)).unwrap_or(1);
        Ok((
            model_num,
            Atom {
                label_asym_id,
                auth_asym_id,
                label_entity_id: text(self.label_entity_id),
                label_comp_id: text(self.label_comp_id),
                label_atom_id: text(self.label_atom_id),
                type_symbol: text(self.type_symbol),
                label_seq_id: self.label_seq_id.and_then(|f| f.int(row)),
                position: Vec3::from_array(coords),
            },
        ))
    }
}

fn read_entry_data(block: &CifBlock) -> Result<EntryData, StructureError> {
    let mut entity_types = FxHashMap::default();
    if let Some(entity) = block.category("entity") {
        if let (Some(ids), Some(types)) = (entity.field("id"), entity.field("type")) {
            for row in 0..entity.row_count {
                if let (Some(id), Some(kind)) = (ids.str(row), types.str(row)) {
                    let _ = entity_types.insert(id.into_owned(), kind.into_owned());
                }
            }
        }
    }
    Ok(EntryData {
        name: block.header.clone(),
        entity_types,
        assemblies: assembly::read_assemblies(block)?,
        operators: assembly::read_operators(block)?,
    })
}

/// The atoms of one label chain placed by one operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Label chain id shared by every atom of the unit.
    pub label_asym_id: String,
    /// Operator name, [`IDENTITY_OPERATOR`] for the deposited coordinates.
    pub operator: String,
    /// Indices into [`Model::atoms`].
    pub atom_indices: Vec<usize>,
    /// Transformed positions, parallel to `atom_indices`.
    pub positions: Vec<Vec3>,
}

impl Unit {
    fn identity(model: &Model, label_asym_id: String, atom_indices: Vec<usize>) -> Self {
        let positions = atom_indices.iter().map(|&i| model.atoms[i].position).collect();
        Self {
            label_asym_id,
            operator: IDENTITY_OPERATOR.to_owned(),
            atom_indices,
            positions,
        }
    }

    /// Number of atoms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.atom_indices.len()
    }

    /// Whether the unit holds no atoms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atom_indices.is_empty()
    }
}

/// How to arrange a model into a structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureKind {
    /// Deposited coordinates.
    Model,
    /// Expand a biological assembly. `None` picks the first one defined.
    Assembly(Option<String>),
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("model"),
            Self::Assembly(Some(id)) => write!(f, "assembly {id}"),
            Self::Assembly(None) => f.write_str("assembly"),
        }
    }
}

/// A model arranged into units.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Source model.
    pub model: Arc<Model>,
    /// Units in build order.
    pub units: Vec<Unit>,
}

impl Structure {
    /// Deposited coordinates: one unit per contiguous label chain run.
    #[must_use]
    pub fn from_model(model: Arc<Model>) -> Self {
        let units = model
            .chain_runs()
            .into_iter()
            .map(|(id, indices)| Unit::identity(&model, id, indices))
            .collect();
        Self { model, units }
    }

    /// Build according to `kind`.
    pub fn build(model: Arc<Model>, kind: &StructureKind) -> Result<Self, StructureError> {
        match kind {
            StructureKind::Model => Ok(Self::from_model(model)),
            StructureKind::Assembly(id) => assembly::expand(model, id.as_deref()),
        }
    }

    /// Total atom count over all units.
    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.units.iter().map(Unit::len).sum()
    }

    /// Whether the structure holds no atoms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.iter().all(Unit::is_empty)
    }

    /// The atoms of every unit passing `selection`. Units left without atoms
    /// are dropped.
    #[must_use]
    pub fn filter(&self, selection: &CompiledSelection) -> Self {
        let units = self
            .units
            .iter()
            .filter_map(|unit| {
                let (atom_indices, positions): (Vec<usize>, Vec<Vec3>) = unit
                    .atom_indices
                    .iter()
                    .zip(&unit.positions)
                    .filter(|(&i, _)| selection.matches(&self.model.atoms[i]))
                    .map(|(&i, &p)| (i, p))
                    .unzip();
                (!atom_indices.is_empty()).then(|| Unit {
                    label_asym_id: unit.label_asym_id.clone(),
                    operator: unit.operator.clone(),
                    atom_indices,
                    positions,
                })
            })
            .collect();
        Self {
            model: Arc::clone(&self.model),
            units,
        }
    }

    /// Atoms of `unit` with their placed positions.
    pub fn unit_atoms<'s>(
        &'s self,
        unit: &'s Unit,
    ) -> impl Iterator<Item = (&'s Atom, Vec3)> + 's {
        unit.atom_indices
            .iter()
            .zip(&unit.positions)
            .map(move |(&i, &p)| (&self.model.atoms[i], p))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! A small mmCIF entry shared by tests across the crate.

    /// Two protein chains (author ids `A` and `B`), a ligand and waters,
    /// two models, and a two-operator assembly over the protein chains.
    pub(crate) const TWO_CHAINS: &str = "\
data_TEST
_entry.id TEST
loop_
_entity.id
_entity.type
1 polymer
2 non-polymer
3 water
loop_
_pdbx_struct_assembly_gen.assembly_id
_pdbx_struct_assembly_gen.oper_expression
_pdbx_struct_assembly_gen.asym_id_list
1 '(1,2)' A,B
2 1 C
loop_
_pdbx_struct_oper_list.id
_pdbx_struct_oper_list.type
_pdbx_struct_oper_list.matrix[1][1]
_pdbx_struct_oper_list.matrix[1][2]
_pdbx_struct_oper_list.matrix[1][3]
_pdbx_struct_oper_list.vector[1]
_pdbx_struct_oper_list.matrix[2][1]
_pdbx_struct_oper_list.matrix[2][2]
_pdbx_struct_oper_list.matrix[2][3]
_pdbx_struct_oper_list.vector[2]
_pdbx_struct_oper_list.matrix[3][1]
_pdbx_struct_oper_list.matrix[3][2]
_pdbx_struct_oper_list.matrix[3][3]
_pdbx_struct_oper_list.vector[3]
1 'identity operation' 1 0 0 0 0 1 0 0 0 0 1 0
2 'crystal symmetry operation' 1 0 0 50 0 1 0 0 0 0 1 0
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.label_entity_id
_atom_site.label_seq_id
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
_atom_site.auth_asym_id
_atom_site.pdbx_PDB_model_num
ATOM   1  N N   GLY A 1 1 0.000 0.000 0.000 A 1
ATOM   2  C CA  GLY A 1 1 1.450 0.000 0.000 A 1
ATOM   3  C C   GLY A 1 1 2.000 1.400 0.000 A 1
ATOM   4  O O   GLY A 1 1 3.200 1.600 0.000 A 1
ATOM   5  N N   ALA B 1 1 10.000 0.000 0.000 B 1
ATOM   6  C CA  ALA B 1 1 11.450 0.000 0.000 B 1
ATOM   7  C CB  ALA B 1 1 11.900 -1.400 0.300 B 1
HETATM 8  C C1  LIG C 2 . 5.000 5.000 5.000 A 1
HETATM 9  O O   HOH D 3 . 7.000 7.000 7.000 A 1
HETATM 10 O O   HOH D 3 . -4.000 2.000 1.000 A 1
ATOM   11 N N   GLY A 1 1 0.100 0.000 0.000 A 2
ATOM   12 C CA  GLY A 1 1 1.550 0.000 0.000 A 2
";

    pub(crate) fn two_chains() -> crate::cif::CifFile {
        crate::cif::parse_text(TWO_CHAINS.as_bytes()).unwrap()
    }
}
