//! Deploy-time configuration for the Lovepass Gold ledger.
//!
//! Resolves the `init` arguments from environment variables or a JSON file,
//! validates them, and records the result of a deployment as a JSON manifest.

pub mod error;
pub mod manifest;
pub mod params;

pub use error::{ConfigError, ConfigResult};
pub use manifest::DeploymentManifest;
pub use params::{DeployParams, DEFAULT_GRACE_SECONDS, DEFAULT_PRICE_PER_30D};
