//! Object storage for packaged artifacts.
//!
//! A thin HTTP client over any bucket endpoint that accepts `PUT` and
//! serves the blob back publicly at the same URL. Uploads are write-once;
//! nothing in this pipeline updates or deletes a stored object.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::StorageError;
use crate::traits::{ObjectStore, StoredObject};

/// HTTP-backed object store.
#[derive(Debug)]
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    /// Create a store uploading under `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Network`] if the HTTP client cannot be
    /// constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, StorageError> {
        let client = Client::builder().build().map_err(|e| StorageError::Network {
            message: format!("failed to create HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        key: &str,
        content: &str,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let url = self.object_url(key);

        let response = self
            .client
            .put(&url)
            .header("content-type", content_type)
            .header("x-amz-acl", "public-read")
            .header("cache-control", "public, max-age=31536000, immutable")
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| StorageError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(key, %status, "artifact upload rejected");
            return Err(StorageError::UploadFailed {
                key: key.to_string(),
                message: format!("status {status}"),
            });
        }

        tracing::info!(key, bytes = content.len(), "artifact uploaded");
        Ok(StoredObject { url })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_put_success_returns_public_url() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/visualizations/abc123defg.html"))
            .and(header("content-type", "text/html"))
            .and(header("x-amz-acl", "public-read"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(server.uri()).unwrap();
        let stored = store
            .put("visualizations/abc123defg.html", "<html></html>", "text/html")
            .await
            .unwrap();

        assert_eq!(
            stored.url,
            format!("{}/visualizations/abc123defg.html", server.uri())
        );
    }

    #[tokio::test]
    async fn test_put_sends_body() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(server.uri()).unwrap();
        store.put("k.html", "<html>payload</html>", "text/html").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        assert_eq!(body, "<html>payload</html>");
    }

    #[tokio::test]
    async fn test_put_failure_is_upload_failed() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(server.uri()).unwrap();
        let err = store.put("k.html", "x", "text/html").await.unwrap_err();

        assert!(matches!(
            err,
            StorageError::UploadFailed { key, .. } if key == "k.html"
        ));
    }

    #[tokio::test]
    async fn test_trailing_slash_in_base_url() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/k.html"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = HttpObjectStore::new(format!("{}/", server.uri())).unwrap();
        let stored = store.put("k.html", "x", "text/html").await.unwrap();
        assert!(!stored.url.contains("//k.html"));
    }
}
