//! Mapping manifest rows to structure locations.

use crate::manifest::ChainRef;
use crate::options::{SourceOptions, ASSEMBLY_PLACEHOLDER, ENTRY_PLACEHOLDER};
use crate::pipeline::StructureRef;

/// Turns a manifest row into a fetchable [`StructureRef`].
pub trait UrlResolver {
    /// Location and selection for `chain_ref`.
    fn resolve(&self, chain_ref: &ChainRef) -> StructureRef;
}

impl<F> UrlResolver for F
where
    F: Fn(&ChainRef) -> StructureRef,
{
    fn resolve(&self, chain_ref: &ChainRef) -> StructureRef {
        self(chain_ref)
    }
}

/// Template-based resolution. Rows naming an assembly use the assembly
/// template when one is configured (the host serves the built assembly);
/// otherwise the deposited file is fetched and the engine expands the
/// assembly.
impl UrlResolver for SourceOptions {
    fn resolve(&self, chain_ref: &ChainRef) -> StructureRef {
        let entry = &chain_ref.entry_id;
        let (url, assembly_id) =
            match (&chain_ref.assembly_id, &self.assembly_url_template) {
                (Some(assembly), Some(template)) => (
                    template
                        .replace(ENTRY_PLACEHOLDER, entry)
                        .replace(ASSEMBLY_PLACEHOLDER, assembly),
                    None,
                ),
                (assembly, _) => (
                    self.url_template.replace(ENTRY_PLACEHOLDER, entry),
                    assembly.clone(),
                ),
            };
        StructureRef {
            url,
            auth_chain_id: chain_ref.chain_id.clone(),
            assembly_id,
        }
    }
}
