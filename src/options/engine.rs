use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Engine", inline)]
#[serde(default)]
/// Native engine settings.
pub struct EngineOptions {
    /// Overall timeout for one download, in seconds.
    #[schemars(title = "Download Timeout (s)")]
    pub timeout_secs: u64,
    /// Upper bound on a downloaded file, in megabytes.
    #[schemars(title = "Max Download (MB)")]
    pub max_download_mb: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_download_mb: 512,
        }
    }
}
