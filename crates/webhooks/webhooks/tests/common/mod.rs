//! Shared helpers for webhook integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vault_webhooks::*;

/// One request seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// In-process transport that replays a fixed list of outcomes.
///
/// Once the script runs out, every request gets the fallback outcome.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    fallback: Result<TransportResponse, TransportError>,
    latency: Option<Duration>,
    panic_for: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn always(outcome: Result<TransportResponse, TransportError>) -> Self {
        Self::sequence(Vec::new(), outcome)
    }

    pub fn sequence(
        outcomes: Vec<Result<TransportResponse, TransportError>>,
        fallback: Result<TransportResponse, TransportError>,
    ) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            fallback,
            latency: None,
            panic_for: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps before answering each request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Panics instead of answering requests whose URL contains `pattern`.
    pub fn with_panic_for(mut self, pattern: impl Into<String>) -> Self {
        self.panic_for = Some(pattern.into());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: String,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });

        if let Some(pattern) = &self.panic_for {
            if url.contains(pattern.as_str()) {
                panic!("endpoint handler crashed for {}", url);
            }
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn status(code: u16) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status: code,
        body: String::new(),
    })
}

pub fn refused() -> Result<TransportResponse, TransportError> {
    Err(TransportError::Connect("connection refused".to_string()))
}

/// Builds a system over a scripted transport with the default schedule.
pub fn system_with(transport: Arc<ScriptedTransport>) -> WebhookSystem {
    system_with_config(transport, WebhookConfig::default())
}

pub fn system_with_config(transport: Arc<ScriptedTransport>, config: WebhookConfig) -> WebhookSystem {
    WebhookSystem::builder()
        .config(config)
        .transport(transport)
        .build()
        .expect("valid config")
}

/// Config with millisecond backoff for tests that hit real sockets.
pub fn fast_config() -> WebhookConfig {
    WebhookConfig::new().retry_delays([Duration::from_millis(10), Duration::from_millis(20)])
}

pub fn subscribe(url: &str, events: &[&str]) -> NewSubscription {
    NewSubscription::new(url, events.iter().copied())
}
