use std::collections::BTreeSet;

use super::Structure;

/// Label chain ids of the polymer chains in `structure`.
///
/// With `auth_asym_id` set, only chains whose author id equals it are
/// returned; the result may be empty. Non-polymer chains (ligands, water)
/// are never returned.
#[must_use]
pub fn resolve_polymer_label_asym_ids(
    structure: &Structure,
    auth_asym_id: Option<&str>,
) -> BTreeSet<String> {
    let model = &structure.model;
    structure
        .units
        .iter()
        .filter_map(|unit| {
            let &first = unit.atom_indices.first()?;
            let atom = &model.atoms[first];
            let wanted = auth_asym_id.is_none_or(|id| atom.auth_asym_id == id);
            (wanted && model.is_polymer(atom)).then(|| unit.label_asym_id.clone())
        })
        .collect()
}
