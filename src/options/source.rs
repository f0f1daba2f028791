use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the entry id.
pub const ENTRY_PLACEHOLDER: &str = "{entry}";
/// Placeholder replaced by the assembly id.
pub const ASSEMBLY_PLACEHOLDER: &str = "{assembly}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Source", inline)]
#[serde(default)]
/// Where structure files are fetched from.
pub struct SourceOptions {
    /// URL of the deposited structure file. `{entry}` is replaced by the
    /// entry id. A `.bcif` suffix selects BinaryCIF ingestion.
    #[schemars(title = "URL Template")]
    pub url_template: String,
    /// URL of a pre-built assembly file (`{entry}`, `{assembly}`). When
    /// unset, assemblies are expanded locally from the deposited file.
    #[schemars(title = "Assembly URL Template")]
    pub assembly_url_template: Option<String>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            url_template: "https://files.rcsb.org/download/{entry}.cif"
                .to_owned(),
            assembly_url_template: None,
        }
    }
}

impl SourceOptions {
    /// Both templates must name the entry; the assembly template must also
    /// name the assembly.
    pub fn validate(&self) -> Result<(), String> {
        if !self.url_template.contains(ENTRY_PLACEHOLDER) {
            return Err(format!(
                "url_template '{}' has no {ENTRY_PLACEHOLDER} placeholder",
                self.url_template
            ));
        }
        if let Some(template) = &self.assembly_url_template {
            if !template.contains(ENTRY_PLACEHOLDER)
                || !template.contains(ASSEMBLY_PLACEHOLDER)
            {
                return Err(format!(
                    "assembly_url_template '{template}' needs both \
                     {ENTRY_PLACEHOLDER} and {ASSEMBLY_PLACEHOLDER}"
                ));
            }
        }
        Ok(())
    }
}
