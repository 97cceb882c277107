//! Access to the record store's REST surface.
//!
//! [`Remote`] is the seam between the sync client and the network: the
//! client only ever talks to a `Remote`, and [`HttpRemote`] is the reqwest
//! implementation used outside of tests.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use tinshine_shared::{Collection, Fields, Record, SyncPayload, VersionInfo};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("server unreachable: {0}")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("not found on server")]
    NotFound,

    #[error("server answered {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("{0} has no REST route")]
    NoRoute(Collection),
}

/// Operations the sync client needs from the record store.
pub trait Remote: Send + Sync + 'static {
    fn list(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Record>, RemoteError>> + Send;

    fn create(
        &self,
        collection: Collection,
        fields: &Fields,
    ) -> impl Future<Output = Result<Record, RemoteError>> + Send;

    fn update(
        &self,
        collection: Collection,
        id: i64,
        patch: &Fields,
    ) -> impl Future<Output = Result<Record, RemoteError>> + Send;

    fn delete(
        &self,
        collection: Collection,
        id: i64,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn version(&self) -> impl Future<Output = Result<VersionInfo, RemoteError>> + Send;

    fn sync_all(&self) -> impl Future<Output = Result<SyncPayload, RemoteError>> + Send;
}

/// [`Remote`] over HTTP with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    http: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn record_url(&self, collection: Collection, id: Option<i64>) -> Result<String, RemoteError> {
        let path = collection
            .endpoint()
            .ok_or(RemoteError::NoRoute(collection))?;
        Ok(match id {
            Some(id) => self.url(&format!("{path}/{id}")),
            None => self.url(path),
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "Remote call");

        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

fn classify(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else if e.is_decode() {
        RemoteError::Decode(e.to_string())
    } else {
        RemoteError::Unavailable(e.to_string())
    }
}

impl Remote for HttpRemote {
    async fn list(&self, collection: Collection) -> Result<Vec<Record>, RemoteError> {
        let url = self.record_url(collection, None)?;
        self.send_json(self.http.get(url)).await
    }

    async fn create(&self, collection: Collection, fields: &Fields) -> Result<Record, RemoteError> {
        let url = self.record_url(collection, None)?;
        self.send_json(self.http.post(url).json(fields)).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: i64,
        patch: &Fields,
    ) -> Result<Record, RemoteError> {
        let url = self.record_url(collection, Some(id))?;
        self.send_json(self.http.put(url).json(patch)).await
    }

    async fn delete(&self, collection: Collection, id: i64) -> Result<(), RemoteError> {
        let url = self.record_url(collection, Some(id))?;
        self.send(self.http.delete(url)).await.map(|_| ())
    }

    async fn version(&self) -> Result<VersionInfo, RemoteError> {
        self.send_json(self.http.get(self.url("/version"))).await
    }

    async fn sync_all(&self) -> Result<SyncPayload, RemoteError> {
        self.send_json(self.http.get(self.url("/sync/all"))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_follow_collection_routes() {
        let remote = HttpRemote::new("http://localhost:3001/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(remote.base_url(), "http://localhost:3001/api");
        assert_eq!(
            remote.record_url(Collection::BlogPosts, Some(4)).unwrap(),
            "http://localhost:3001/api/blogs/4"
        );
        assert_eq!(
            remote.record_url(Collection::Products, None).unwrap(),
            "http://localhost:3001/api/products"
        );
        assert!(matches!(
            remote.record_url(Collection::Categories, None),
            Err(RemoteError::NoRoute(Collection::Categories))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Port 9 (discard) on loopback is closed in test environments.
        let remote = HttpRemote::new("http://127.0.0.1:9/api", Duration::from_secs(2)).unwrap();
        let err = remote.version().await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_) | RemoteError::Timeout));
    }
}
