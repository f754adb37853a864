mod realtime;
mod rest;
pub mod sse;

use std::sync::Arc;

use async_trait::async_trait;
use focusboard_core::config::{BackendKind, ConfigFile};
use focusboard_protocol::{NewTask, RawTask, TaskPatch};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use realtime::RealtimeStore;
pub use rest::RestStore;

use crate::providers;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("api error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("decode response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("subscription ended: {0}")]
    Stream(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type SnapshotResult = Result<Vec<RawTask>, FetchError>;

/// Live feed of full-collection snapshots. Dropping it unsubscribes.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SnapshotResult>,
    join: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<SnapshotResult>, join: JoinHandle<()>) -> Self {
        Self { rx, join }
    }

    pub async fn recv(&mut self) -> Option<SnapshotResult> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// The remote side of the board. Implementations hold no task state.
#[async_trait]
pub trait TaskStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn list(&self) -> Result<Vec<RawTask>, FetchError>;

    /// `Ok(None)` means the store accepted the create without echoing the
    /// record back.
    async fn create(&self, payload: &NewTask) -> Result<Option<RawTask>, FetchError>;

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Option<RawTask>, FetchError>;

    async fn delete(&self, id: &str) -> Result<(), FetchError>;

    /// `Ok(None)` for stores without push support.
    async fn subscribe(&self) -> Result<Option<Subscription>, FetchError> {
        Ok(None)
    }

    fn set_credential(&self, credential: Option<String>);
}

pub fn build_store(
    config: &ConfigFile,
    backend: BackendKind,
    credential: Option<String>,
) -> anyhow::Result<Arc<dyn TaskStore>> {
    match backend {
        BackendKind::Rest => {
            let store = RestStore::new(
                &providers::rest_base_url(config),
                &providers::rest_endpoint(config),
                credential,
            )?;
            Ok(Arc::new(store))
        }
        BackendKind::Realtime => {
            let Some(url) = providers::realtime_database_url(config) else {
                return Err(anyhow::anyhow!(
                    "realtime database url not set (set FOCUSBOARD_REALTIME_URL or [realtime].database-url)"
                ));
            };
            let store = RealtimeStore::new(&url, &providers::realtime_path(config), credential)?;
            Ok(Arc::new(store))
        }
    }
}

/// Non-2xx becomes `FetchError::Status`; 204 and empty bodies are `None`.
pub(crate) async fn read_json(
    resp: reqwest::Response,
) -> Result<Option<serde_json::Value>, FetchError> {
    let status = resp.status();
    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(None);
    }
    let text = resp.text().await.map_err(FetchError::Transport)?;
    if !status.is_success() {
        let body = if text.trim().is_empty() {
            status.canonical_reason().unwrap_or_default().to_owned()
        } else {
            text
        };
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| FetchError::Decode(e.to_string()))
}

pub(crate) fn build_client() -> anyhow::Result<reqwest::Client> {
    use anyhow::Context as _;
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("application/json"),
    );
    reqwest::Client::builder()
        .user_agent(format!("focusboard/{}", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .build()
        .context("build reqwest client")
}

pub(crate) fn read_credential(
    lock: &std::sync::RwLock<Option<String>>,
) -> Option<String> {
    lock.read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

pub(crate) fn write_credential(lock: &std::sync::RwLock<Option<String>>, value: Option<String>) {
    let value = value.and_then(|s| {
        let trimmed = s.trim().to_owned();
        (!trimmed.is_empty()).then_some(trimmed)
    });
    *lock.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
}
