//! Command implementations and the shared wiring they run against.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::debug;

use vmgrid_core::GridConfig;
use vmgrid_core::config::parse_duration;
use vmgrid_provider::Providers;
use vmgrid_scaleset::{RequestOptions, ScaleSetOrchestrator};
use vmgrid_state::StateStore;

pub mod scaleset;

/// Store file used when the config names none.
pub const DEFAULT_STORE_PATH: &str = "vmgrid.redb";

/// Orchestrator wired to local providers over one store.
pub struct Context {
    pub orchestrator: ScaleSetOrchestrator,
    pub options: RequestOptions,
}

impl Context {
    pub fn open(config_path: Option<&Path>, timeout: Option<&str>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => GridConfig::from_file(path)?,
            None => GridConfig::default(),
        };
        let store_path = store_path(&config);
        let store = StateStore::open(&store_path)
            .with_context(|| format!("opening store {}", store_path.display()))?;
        debug!(path = %store_path.display(), "store opened");
        Self::with_store(&store, &config, timeout)
    }

    pub fn with_store(
        store: &StateStore,
        config: &GridConfig,
        timeout: Option<&str>,
    ) -> anyhow::Result<Self> {
        let default_timeout = config.provider_timeout()?;
        let options = match timeout {
            Some(t) => RequestOptions::with_timeout(parse_duration(t)?),
            None => RequestOptions::default(),
        };
        let orchestrator = ScaleSetOrchestrator::new(Providers::local(store)?, store)?
            .with_default_timeout(default_timeout);
        Ok(Self {
            orchestrator,
            options,
        })
    }
}

/// The configured store file, or [`DEFAULT_STORE_PATH`] in the working
/// directory so state survives between invocations.
pub fn store_path(config: &GridConfig) -> PathBuf {
    config
        .store
        .path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
}
