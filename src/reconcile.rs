// Session reconciliation between the persisted event log and the agent
// runtime's live state.
//
// The persisted session row and the runtime session are two views of the
// same conversation. On every exchange the reconciler aligns them: prior
// history is restored into the runtime when the runtime has forgotten the
// session, and after the exchange the runtime's full log becomes the new
// persisted truth.
use crate::events::{self, Content, Event};
use crate::runtime::{AgentRuntime, SessionKey};
use crate::storage::StorageBackend;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("record store failure")]
    Storage(#[source] anyhow::Error),
    #[error("agent runtime failure")]
    Runtime(#[source] anyhow::Error),
    #[error("agent runtime did not complete within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub user_id: String,
    pub session_id: String,
    /// Raw events produced by this invocation, before sanitization. The
    /// persisted log is the sanitized full session instead.
    pub events: Vec<Event>,
}

#[derive(Clone)]
pub struct Reconciler {
    storage: Arc<dyn StorageBackend>,
    runtime: Arc<dyn AgentRuntime>,
    app_name: String,
    invoke_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        runtime: Arc<dyn AgentRuntime>,
        app_name: &str,
        invoke_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            runtime,
            app_name: app_name.to_string(),
            invoke_timeout,
        }
    }

    /// Runs one message exchange for an authenticated user. Steps: adopt or
    /// allocate the session id, restore persisted history into the runtime
    /// if it has no live session, invoke and drain, re-fetch the
    /// authoritative log, sanitize, persist.
    pub async fn exchange(
        &self,
        user_id: &str,
        message: Content,
    ) -> Result<ExchangeOutcome, ReconcileError> {
        let (session_id, prior_events) = self.load_prior_state(user_id)?;
        let key = SessionKey {
            app_name: self.app_name.clone(),
            user_id: user_id.to_string(),
            session_id: session_id.clone(),
        };

        let live = self
            .runtime
            .get_session(&key)
            .await
            .map_err(ReconcileError::Runtime)?;
        if live.is_none() {
            // The runtime lost this conversation (eviction or restart).
            // Recreate it and restore the persisted history wholesale so
            // memory survives across processes.
            self.runtime
                .create_session(&key)
                .await
                .map_err(ReconcileError::Runtime)?;
            if !prior_events.is_empty() {
                debug!(
                    user_id,
                    session_id = %key.session_id,
                    count = prior_events.len(),
                    "restoring persisted events into fresh runtime session"
                );
                self.runtime
                    .replace_events(&key, &prior_events)
                    .await
                    .map_err(ReconcileError::Runtime)?;
            }
        }

        let produced = self.drain_invocation(&key, message).await?;

        // The runtime session, not the drained slice, is the authoritative
        // post-exchange state.
        let full_log = self
            .runtime
            .session_events(&key)
            .await
            .map_err(ReconcileError::Runtime)?;
        if let Some(full_log) = full_log {
            let cleaned = events::sanitize(full_log);
            self.storage
                .upsert_session_events(&key.session_id, user_id, &events::encode_events(&cleaned))
                .map_err(ReconcileError::Storage)?;
        }

        Ok(ExchangeOutcome {
            user_id: user_id.to_string(),
            session_id,
            events: produced,
        })
    }

    fn load_prior_state(&self, user_id: &str) -> Result<(String, Vec<Event>), ReconcileError> {
        let row = self
            .storage
            .find_session_by_user(user_id)
            .map_err(ReconcileError::Storage)?;
        match row {
            Some(session) => {
                let prior = events::decode_events(&session.events);
                Ok((session.session_id, prior))
            }
            None => Ok((Uuid::new_v4().to_string(), Vec::new())),
        }
    }

    async fn drain_invocation(
        &self,
        key: &SessionKey,
        message: Content,
    ) -> Result<Vec<Event>, ReconcileError> {
        let drain = async {
            let mut stream = self.runtime.run(key, message).await?;
            let mut produced = Vec::new();
            while let Some(event) = stream.next().await {
                produced.push(event?);
            }
            Ok::<_, anyhow::Error>(produced)
        };
        match timeout(self.invoke_timeout, drain).await {
            Ok(result) => result.map_err(ReconcileError::Runtime),
            Err(_) => Err(ReconcileError::Timeout(self.invoke_timeout)),
        }
    }
}
