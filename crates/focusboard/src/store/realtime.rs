use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use focusboard_core::config::BackendKind;
use focusboard_protocol::{
    records_from_snapshot, NewTask, PushKey, RawTask, StreamChange, TaskPatch, STREAM_AUTH_REVOKED,
    STREAM_CANCEL, STREAM_KEEP_ALIVE, STREAM_PATCH, STREAM_PUT,
};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use url::Url;

use super::sse::SseDecoder;
use super::{
    build_client, read_credential, read_json, write_credential, FetchError, SnapshotResult,
    Subscription, TaskStore,
};

/// Hosted realtime JSON tree. Records live under `{database}/{path}` keyed
/// by generated push ids, and changes arrive over an event stream.
#[derive(Debug, Clone)]
pub struct RealtimeStore {
    client: reqwest::Client,
    database_url: Url,
    path: Vec<String>,
    credential: Arc<RwLock<Option<String>>>,
}

impl RealtimeStore {
    pub fn new(database_url: &str, path: &str, credential: Option<String>) -> anyhow::Result<Self> {
        let database_url = Url::parse(database_url.trim())
            .with_context(|| format!("invalid realtime database url: {database_url}"))?;
        if database_url.cannot_be_a_base() {
            return Err(anyhow!("invalid realtime database url: {database_url}"));
        }
        let path: Vec<String> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        if path.is_empty() {
            return Err(anyhow!("realtime path is empty"));
        }

        let store = Self {
            client: build_client()?,
            database_url,
            path,
            credential: Arc::new(RwLock::new(None)),
        };
        store.set_credential(credential);
        Ok(store)
    }

    /// `{database}/{path}[/{child}].json[?auth=...]`
    pub fn node_url(&self, child: Option<&str>) -> Result<Url, FetchError> {
        let mut segments: Vec<&str> = self.path.iter().map(String::as_str).collect();
        if let Some(child) = child {
            segments.push(child);
        }
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| FetchError::InvalidRequest("empty node path".to_owned()))?;

        let mut url = self.database_url.clone();
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| FetchError::InvalidRequest("database url cannot be a base".to_owned()))?;
            segs.pop_if_empty();
            segs.extend(parents.iter().copied());
            segs.push(&format!("{last}.json"));
        }
        if let Some(token) = read_credential(&self.credential) {
            url.query_pairs_mut().append_pair("auth", &token);
        }
        Ok(url)
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<Option<serde_json::Value>, FetchError> {
        let resp = req.send().await.map_err(FetchError::Transport)?;
        read_json(resp).await
    }
}

#[async_trait]
impl TaskStore for RealtimeStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Realtime
    }

    async fn list(&self) -> Result<Vec<RawTask>, FetchError> {
        let body = self.send(self.client.get(self.node_url(None)?)).await?;
        Ok(body.map(records_from_snapshot).unwrap_or_default())
    }

    async fn create(&self, payload: &NewTask) -> Result<Option<RawTask>, FetchError> {
        let mut payload = payload.clone();
        if payload.created_at.is_none() {
            payload.created_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        }

        let body = self
            .send(self.client.post(self.node_url(None)?).json(&payload))
            .await?
            .ok_or_else(|| FetchError::Decode("missing push key".to_owned()))?;
        let key: PushKey =
            serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(Some(payload.to_raw().with_id(&key.name)))
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Option<RawTask>, FetchError> {
        let url = self.node_url(Some(id))?;
        self.send(self.client.patch(url).json(patch)).await?;
        Ok(None)
    }

    async fn delete(&self, id: &str) -> Result<(), FetchError> {
        let url = self.node_url(Some(id))?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<Option<Subscription>, FetchError> {
        let url = self.node_url(None)?;
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(FetchError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let store = self.clone();
        let join = tokio::spawn(async move {
            pump_stream(store, resp, tx).await;
        });
        Ok(Some(Subscription::new(rx, join)))
    }

    fn set_credential(&self, credential: Option<String>) {
        write_credential(&self.credential, credential);
    }
}

async fn pump_stream(
    store: RealtimeStore,
    mut resp: reqwest::Response,
    tx: mpsc::UnboundedSender<SnapshotResult>,
) {
    let mut decoder = SseDecoder::new();
    loop {
        let chunk = match resp.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                let _ = tx.send(Err(FetchError::Stream("closed by server".to_owned())));
                return;
            }
            Err(err) => {
                let _ = tx.send(Err(FetchError::Transport(err)));
                return;
            }
        };

        for ev in decoder.push(&chunk) {
            let snapshot = match ev.event.as_str() {
                STREAM_PUT | STREAM_PATCH => {
                    let change: StreamChange = serde_json::from_str(&ev.data).unwrap_or_default();
                    if change.path == "/" && ev.event == STREAM_PUT {
                        Ok(records_from_snapshot(change.data))
                    } else {
                        store.list().await
                    }
                }
                STREAM_KEEP_ALIVE => continue,
                STREAM_CANCEL | STREAM_AUTH_REVOKED => {
                    tracing::warn!(event = %ev.event, "realtime subscription ended by server");
                    let _ = tx.send(Err(FetchError::Stream(ev.event.clone())));
                    return;
                }
                other => {
                    tracing::debug!(event = %other, "ignoring stream event");
                    continue;
                }
            };
            if tx.send(snapshot).is_err() {
                return;
            }
        }
    }
}
