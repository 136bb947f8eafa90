//! Policy snapshot providers
//!
//! The engine reads one `Arc<Policy>` per tick. Reloading swaps the
//! snapshot atomically; ticks already holding the old one finish with it.

use crate::{ConfigResult, Policy, load_config};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Source of the current policy snapshot
pub trait ConfigStore: Send + Sync {
    fn current(&self) -> Arc<Policy>;
}

/// Policy loaded from a TOML file, reloadable on demand
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    force_dry_run: bool,
    current: RwLock<Arc<Policy>>,
}

impl FileConfigStore {
    /// Load the file once. `force_dry_run` overrides the file's `dry_run`
    /// for this and every later reload.
    pub fn open(path: impl Into<PathBuf>, force_dry_run: bool) -> ConfigResult<Self> {
        let path = path.into();
        let policy = load_with_overrides(&path, force_dry_run)?;

        info!(
            path = %path.display(),
            monitoring = policy.monitoring_enabled(),
            dry_run = policy.dry_run,
            "Configuration loaded"
        );

        Ok(Self {
            path,
            force_dry_run,
            current: RwLock::new(Arc::new(policy)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file. On failure the previous snapshot stays in place.
    pub fn reload(&self) -> ConfigResult<Arc<Policy>> {
        match load_with_overrides(&self.path, self.force_dry_run) {
            Ok(policy) => {
                let policy = Arc::new(policy);
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = policy.clone();
                info!(path = %self.path.display(), "Configuration reloaded");
                Ok(policy)
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Configuration reload failed, keeping previous policy"
                );
                Err(e)
            }
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn current(&self) -> Arc<Policy> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// In-memory policy, replaced explicitly. Used by tests and embedders.
#[derive(Debug, Default)]
pub struct StaticConfigStore {
    current: RwLock<Arc<Policy>>,
}

impl StaticConfigStore {
    pub fn new(policy: Policy) -> Self {
        Self {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    pub fn replace(&self, policy: Policy) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(policy);
    }
}

impl ConfigStore for StaticConfigStore {
    fn current(&self) -> Arc<Policy> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn load_with_overrides(path: &Path, force_dry_run: bool) -> ConfigResult<Policy> {
    let mut policy = load_config(path)?;
    if force_dry_run {
        policy.dry_run = true;
    }
    Ok(policy)
}
