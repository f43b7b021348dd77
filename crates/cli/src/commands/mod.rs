//! CLI Commands

pub mod resource;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use gcompute_provider::sim::SimulatedCompute;
use gcompute_provider::{Provider, ProviderConfig, ProviderContext};
use tracing::debug;

/// Provider wired to the local simulated backend. The backend's entities
/// are loaded from and saved back to the sim store so that successive
/// invocations see the same remote world.
pub struct Session {
    pub provider: Provider,
    sim: Arc<SimulatedCompute>,
    sim_store: PathBuf,
}

impl Session {
    pub fn open(config_path: &Path, sim_store: &Path) -> Result<Self> {
        let config = ProviderConfig::load(config_path)
            .with_context(|| format!("loading provider config {}", config_path.display()))?;
        let sim = Arc::new(
            SimulatedCompute::load(sim_store, config.project.clone())
                .with_context(|| format!("loading sim store {}", sim_store.display()))?,
        );
        debug!(project = %config.project, entities = sim.entity_count(), "Session opened");

        let ctx = ProviderContext::new(sim.clone(), config);
        Ok(Self {
            provider: Provider::new(ctx),
            sim,
            sim_store: sim_store.to_path_buf(),
        })
    }

    /// Persist the simulated backend
    pub fn close(self) -> Result<()> {
        self.sim
            .save(&self.sim_store)
            .with_context(|| format!("saving sim store {}", self.sim_store.display()))
    }
}
