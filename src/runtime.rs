// Agent runtime contract and the HTTP client against its REST surface.
//
// The runtime owns the live conversational state; this process only talks
// to it through the operations below. The trait keeps the handle
// injectable so tests can substitute a scripted double.
use crate::events::{Content, Event};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// A runtime session is addressed by application name, user, and session
/// id together; no component alone is unique.
#[derive(Debug, Clone)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSession {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Ordered, finite sequence of events produced by one invocation. The
/// caller must drain it completely before reading the session back.
pub type EventStream = BoxStream<'static, Result<Event>>;

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<RuntimeSession>>;
    async fn create_session(&self, key: &SessionKey) -> Result<RuntimeSession>;
    /// Replaces the runtime session's event log wholesale. Used to restore
    /// persisted history into a freshly created session; never an append.
    async fn replace_events(&self, key: &SessionKey, events: &[Event]) -> Result<()>;
    async fn run(&self, key: &SessionKey, message: Content) -> Result<EventStream>;
    /// The full post-exchange event log, or `None` when the runtime no
    /// longer knows the session.
    async fn session_events(&self, key: &SessionKey) -> Result<Option<Vec<Event>>>;
}

pub struct HttpAgentRuntime {
    http: Client,
    base_url: String,
}

impl HttpAgentRuntime {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("build agent runtime http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn session_url(&self, key: &SessionKey) -> String {
        format!(
            "{}/apps/{}/users/{}/sessions/{}",
            self.base_url, key.app_name, key.user_id, key.session_id
        )
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<RuntimeSession>> {
        let response = self
            .http
            .get(self.session_url(key))
            .send()
            .await
            .context("agent runtime session lookup")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let session = response
            .json::<RuntimeSession>()
            .await
            .context("decode agent runtime session")?;
        Ok(Some(session))
    }

    async fn create_session(&self, key: &SessionKey) -> Result<RuntimeSession> {
        let response = self
            .http
            .post(self.session_url(key))
            .json(&json!({}))
            .send()
            .await
            .context("agent runtime session create")?;
        let response = check_status(response).await?;
        response
            .json::<RuntimeSession>()
            .await
            .context("decode agent runtime session")
    }

    async fn replace_events(&self, key: &SessionKey, events: &[Event]) -> Result<()> {
        let response = self
            .http
            .put(format!("{}/events", self.session_url(key)))
            .json(&json!({ "events": events }))
            .send()
            .await
            .context("agent runtime event restore")?;
        check_status(response).await?;
        Ok(())
    }

    async fn run(&self, key: &SessionKey, message: Content) -> Result<EventStream> {
        let payload = json!({
            "appName": key.app_name,
            "userId": key.user_id,
            "sessionId": key.session_id,
            "newMessage": message,
        });
        let response = self
            .http
            .post(format!("{}/run", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("agent runtime invoke")?;
        let response = check_status(response).await?;
        let events = response
            .json::<Vec<Event>>()
            .await
            .context("decode agent runtime events")?;
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }

    async fn session_events(&self, key: &SessionKey) -> Result<Option<Vec<Event>>> {
        Ok(self.get_session(key).await?.map(|session| session.events))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("agent runtime request failed with {status}: {body}"))
}
