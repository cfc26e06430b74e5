mod subscription;
mod wire;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use url::Url;

use parlor_types::Document;

use crate::cursor::Cursor;
use crate::{ChangeStream, Direction, DocumentStore, Page, StoreError};

use wire::{InsertResponse, QueryResponse};

/// Connection settings for the hosted document service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Service root, e.g. `http://127.0.0.1:4000`.
    pub server_url: String,
}

/// HTTP + WebSocket client for the hosted document service.
///
/// Documents travel over plain JSON endpoints; live changes arrive on the
/// `/gateway` socket via [`subscribe`](DocumentStore::subscribe). Cursors
/// are minted by the service and passed through untouched.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    http: reqwest::Client,
    base_url: String,
    gateway_url: String,
}

impl RemoteStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, StoreError> {
        let parsed = Url::parse(&config.server_url).map_err(StoreError::transport)?;
        let base_url = parsed.as_str().trim_end_matches('/').to_string();
        let gateway_url = format!(
            "{}/gateway",
            base_url.replace("http://", "ws://").replace("https://", "wss://")
        );
        Ok(Self { http: reqwest::Client::new(), base_url, gateway_url })
    }

    fn documents_url(&self, collection: &str) -> String {
        format!("{}/collections/{}/documents", self.base_url, collection)
    }

    async fn insert_inner(
        &self,
        collection: &str,
        unique_field: Option<&str>,
        fields: Value,
    ) -> Result<String, StoreError> {
        let mut request = self.http.post(self.documents_url(collection)).json(&fields);
        if let Some(field) = unique_field {
            request = request.query(&[("unique", field)]);
        }

        let response = request.send().await.map_err(StoreError::transport)?;
        if let Some(field) = unique_field {
            if response.status() == StatusCode::CONFLICT {
                return Err(StoreError::Conflict { field: field.to_string() });
            }
        }
        let response = response.error_for_status().map_err(StoreError::transport)?;

        let body: InsertResponse = response.json().await.map_err(StoreError::decode)?;
        debug!("inserted into '{}': {}", collection, body.id);
        Ok(body.id)
    }
}

#[async_trait]
impl DocumentStore for RemoteStore {
    async fn insert(&self, collection: &str, fields: Value) -> Result<String, StoreError> {
        self.insert_inner(collection, None, fields).await
    }

    async fn insert_unique(
        &self,
        collection: &str,
        unique_field: &str,
        fields: Value,
    ) -> Result<String, StoreError> {
        self.insert_inner(collection, Some(unique_field), fields).await
    }

    async fn query_ordered(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
        limit: usize,
        after: Option<&Cursor>,
    ) -> Result<Page, StoreError> {
        let dir = match direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        let mut request = self
            .http
            .get(self.documents_url(collection))
            .query(&[("order", order_field), ("dir", dir)])
            .query(&[("limit", limit)]);
        if let Some(cursor) = after {
            request = request.query(&[("after", cursor.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(StoreError::transport)?
            .error_for_status()
            .map_err(StoreError::transport)?;
        let body: QueryResponse = response.json().await.map_err(StoreError::decode)?;
        debug!("'{}' page: {} documents", collection, body.documents.len());

        Ok(Page {
            documents: body.documents,
            next_cursor: body.next_cursor.map(Cursor::from_token),
        })
    }

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let equals = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let response = self
            .http
            .get(self.documents_url(collection))
            .query(&[("field", field), ("equals", equals.as_str())])
            .send()
            .await
            .map_err(StoreError::transport)?
            .error_for_status()
            .map_err(StoreError::transport)?;
        let body: QueryResponse = response.json().await.map_err(StoreError::decode)?;
        Ok(body.documents)
    }

    /// The socket is opened lazily by the returned stream, so this cannot
    /// fail up front; connect errors surface as retries inside the feed.
    async fn subscribe(&self, collection: &str) -> Result<ChangeStream, StoreError> {
        Ok(subscription::change_stream(self.gateway_url.clone(), collection.to_string()))
    }
}
