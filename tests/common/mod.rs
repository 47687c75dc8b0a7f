// Scripted agent-runtime double for the HTTP integration tests. Replies
// echo the user's text and carry the bookkeeping fields plus a trailing
// empty-parts marker, so the sanitizer path is exercised end to end.
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use parley_server::events::{Content, Event, Part};
use parley_server::runtime::{AgentRuntime, EventStream, RuntimeSession, SessionKey};
use serde_json::json;
use std::collections::HashMap;

#[derive(Default)]
pub struct EchoRuntime {
    sessions: Mutex<HashMap<String, Vec<Event>>>,
}

fn text_of(message: &Content) -> String {
    message
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
}

fn model_event(text: &str) -> Event {
    Event {
        author: Some("model".to_string()),
        content: Some(Content {
            role: Some("model".to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
                ..Part::default()
            }],
        }),
        usage_metadata: Some(json!({ "totalTokenCount": 11 })),
        actions: Some(json!({ "stateDelta": {} })),
        ..Event::default()
    }
}

fn marker_event() -> Event {
    Event {
        author: Some("model".to_string()),
        content: Some(Content {
            role: Some("model".to_string()),
            parts: Vec::new(),
        }),
        ..Event::default()
    }
}

#[async_trait]
impl AgentRuntime for EchoRuntime {
    async fn get_session(&self, key: &SessionKey) -> anyhow::Result<Option<RuntimeSession>> {
        Ok(self
            .sessions
            .lock()
            .get(&key.session_id)
            .map(|events| RuntimeSession {
                id: key.session_id.clone(),
                events: events.clone(),
            }))
    }

    async fn create_session(&self, key: &SessionKey) -> anyhow::Result<RuntimeSession> {
        self.sessions
            .lock()
            .insert(key.session_id.clone(), Vec::new());
        Ok(RuntimeSession {
            id: key.session_id.clone(),
            events: Vec::new(),
        })
    }

    async fn replace_events(&self, key: &SessionKey, events: &[Event]) -> anyhow::Result<()> {
        self.sessions
            .lock()
            .insert(key.session_id.clone(), events.to_vec());
        Ok(())
    }

    async fn run(&self, key: &SessionKey, message: Content) -> anyhow::Result<EventStream> {
        let produced = vec![model_event(&format!("echo: {}", text_of(&message))), marker_event()];

        let mut sessions = self.sessions.lock();
        let log = sessions.entry(key.session_id.clone()).or_default();
        log.push(Event {
            author: Some("user".to_string()),
            content: Some(message),
            ..Event::default()
        });
        log.extend(produced.clone());

        Ok(stream::iter(produced.into_iter().map(Ok)).boxed())
    }

    async fn session_events(&self, key: &SessionKey) -> anyhow::Result<Option<Vec<Event>>> {
        Ok(self.sessions.lock().get(&key.session_id).cloned())
    }
}
