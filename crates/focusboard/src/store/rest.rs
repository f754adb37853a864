use std::sync::RwLock;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use focusboard_core::config::BackendKind;
use focusboard_protocol::{
    record_from_item_body, records_from_list_body, NewTask, RawTask, TaskPatch,
};
use url::Url;

use super::{build_client, read_credential, read_json, write_credential, FetchError, TaskStore};

/// Request/response CRUD API: `GET|POST {endpoint}`, `PUT|DELETE
/// {endpoint}/{id}`, JSON wrapped in `{"data": ...}`.
#[derive(Debug)]
pub struct RestStore {
    client: reqwest::Client,
    collection_url: Url,
    credential: RwLock<Option<String>>,
}

impl RestStore {
    pub fn new(base_url: &str, endpoint: &str, credential: Option<String>) -> anyhow::Result<Self> {
        let base = Url::parse(base_url.trim())
            .with_context(|| format!("invalid rest base url: {base_url}"))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("invalid rest base url: {base_url}"));
        }
        let collection_url = base
            .join(endpoint.trim())
            .with_context(|| format!("invalid rest endpoint: {endpoint}"))?;

        let store = Self {
            client: build_client()?,
            collection_url,
            credential: RwLock::new(None),
        };
        store.set_credential(credential);
        Ok(store)
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    fn item_url(&self, id: &str) -> Result<Url, FetchError> {
        let mut url = self.collection_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidRequest(format!("cannot address item {id}")))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<Option<serde_json::Value>, FetchError> {
        let req = match read_credential(&self.credential) {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        let resp = req.send().await.map_err(FetchError::Transport)?;
        read_json(resp).await
    }
}

#[async_trait]
impl TaskStore for RestStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Rest
    }

    async fn list(&self) -> Result<Vec<RawTask>, FetchError> {
        let body = self
            .send(self.client.get(self.collection_url.clone()))
            .await?;
        Ok(body.map(records_from_list_body).unwrap_or_default())
    }

    async fn create(&self, payload: &NewTask) -> Result<Option<RawTask>, FetchError> {
        let body = self
            .send(self.client.post(self.collection_url.clone()).json(payload))
            .await?;
        Ok(body.and_then(record_from_item_body))
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Option<RawTask>, FetchError> {
        let url = self.item_url(id)?;
        let body = self.send(self.client.put(url).json(patch)).await?;
        Ok(body.and_then(record_from_item_body))
    }

    async fn delete(&self, id: &str) -> Result<(), FetchError> {
        let url = self.item_url(id)?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    fn set_credential(&self, credential: Option<String>) {
        write_credential(&self.credential, credential);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_urls_escape_ids() {
        let store = RestStore::new("http://localhost:5000", "/api/todos", None).unwrap();
        assert_eq!(
            store.collection_url().as_str(),
            "http://localhost:5000/api/todos"
        );
        assert_eq!(
            store.item_url("abc").unwrap().as_str(),
            "http://localhost:5000/api/todos/abc"
        );
        assert_eq!(
            store.item_url("a b/c").unwrap().as_str(),
            "http://localhost:5000/api/todos/a%20b%2Fc"
        );
    }

    #[test]
    fn trailing_slash_endpoint_does_not_double_up() {
        let store = RestStore::new("http://localhost:5000/", "/api/todos/", None).unwrap();
        assert_eq!(
            store.item_url("x").unwrap().as_str(),
            "http://localhost:5000/api/todos/x"
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(RestStore::new("not a url", "/api/todos", None).is_err());
    }
}
