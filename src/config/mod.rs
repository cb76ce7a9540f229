mod duration;
pub mod snapshot;
pub mod sync;
mod types;

pub use duration::Duration;
pub use snapshot::{ConfStore, ConfigSnapshot};
pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

impl GuardianConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: GuardianConfig = serde_yaml::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let StoreConfig::Valkey(valkey) = &self.store {
            if valkey.endpoint.is_empty() {
                anyhow::bail!("store.valkey.endpoint must not be empty");
            }
        }

        self.authorize_address
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("invalid authorizeAddress: {}", self.authorize_address))?;

        self.admin_address
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("invalid adminAddress: {}", self.admin_address))?;

        if let Some(metrics) = &self.metrics {
            metrics
                .address
                .parse::<std::net::SocketAddr>()
                .with_context(|| format!("invalid metrics.address: {}", metrics.address))?;
        }

        for entry in &self.defaults.route_limits {
            if entry.path.is_empty() {
                anyhow::bail!("route limit entries must have a non-empty path");
            }
        }

        Ok(())
    }
}
