//! JSON record of a completed deployment.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::params::DeployParams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub contract_id: String,
    pub network: String,
    pub params: DeployParams,
}

impl DeploymentManifest {
    pub fn new(contract_id: impl Into<String>, network: impl Into<String>, params: DeployParams) -> Self {
        Self {
            contract_id: contract_id.into(),
            network: network.into(),
            params,
        }
    }

    /// Write the manifest as pretty-printed JSON, replacing any existing file.
    pub fn write(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)?;
        tracing::info!(
            contract_id = %self.contract_id,
            network = %self.network,
            path = %path.display(),
            "wrote deployment manifest"
        );
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&raw)?;
        manifest.params.validate()?;
        Ok(manifest)
    }
}
