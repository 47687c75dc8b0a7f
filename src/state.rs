// Shared application state, wired once at startup and injected everywhere.
use crate::config::Config;
use crate::reconcile::Reconciler;
use crate::runtime::AgentRuntime;
use crate::storage::{build_storage, StorageBackend};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn StorageBackend>,
    pub reconciler: Reconciler,
}

impl AppState {
    /// The runtime handle is passed in rather than constructed here so the
    /// process has exactly one, and tests can substitute a double.
    pub fn new(config: Config, runtime: Arc<dyn AgentRuntime>) -> Result<Self> {
        let storage = build_storage(&config.storage)?;
        seed_users(storage.as_ref(), &config.auth.seed_users)?;
        let reconciler = Reconciler::new(
            storage.clone(),
            runtime,
            &config.runtime.app_name,
            Duration::from_secs(config.runtime.invoke_timeout_s),
        );
        Ok(Self {
            config,
            storage,
            reconciler,
        })
    }
}

fn seed_users(storage: &dyn StorageBackend, seed_users: &[String]) -> Result<()> {
    for username in seed_users {
        let username = username.trim();
        if username.is_empty() {
            continue;
        }
        if storage.insert_user(username)? {
            info!("seeded user {username}");
        }
    }
    Ok(())
}
