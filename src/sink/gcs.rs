use crate::sink::ObjectStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const WRITE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

/// Where the bearer token for an upload comes from
pub enum Credentials {
    /// A fixed OAuth access token, used as is
    Token(String),
    /// A service-account key; tokens are minted when an upload happens and
    /// refreshed once they expire
    ServiceAccount(CustomServiceAccount),
}

impl Credentials {
    pub fn service_account(key_file: &Path) -> Result<Self> {
        let account = CustomServiceAccount::from_file(key_file).with_context(|| {
            format!("Failed to load service account key {}", key_file.display())
        })?;
        Ok(Self::ServiceAccount(account))
    }

    async fn bearer(&self) -> Result<String> {
        match self {
            Self::Token(token) => Ok(token.clone()),
            Self::ServiceAccount(account) => {
                let token = account
                    .token(&[WRITE_SCOPE])
                    .await
                    .context("Failed to obtain Cloud Storage access token")?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

/// Object metadata returned by a successful media upload
#[derive(Debug, Deserialize)]
struct UploadedObject {
    name: String,
    #[serde(default)]
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Google Cloud Storage bucket, written through the JSON API media upload
pub struct GcsStore {
    client: Client,
    bucket: String,
    credentials: Credentials,
    endpoint: String,
}

impl GcsStore {
    pub fn new(bucket: impl Into<String>, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            bucket: bucket.into(),
            credentials,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Point at a different API host, e.g. a local emulator
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.endpoint.trim_end_matches('/'),
            self.bucket
        )
    }
}

/// Pull the human-readable message out of a GCS error response
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<()> {
        debug!(bucket = %self.bucket, key, bytes = content.len(), "Uploading to GCS");
        let token = self.credentials.bearer().await?;

        let response = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, "text/csv; charset=utf-8")
            .body(content)
            .send()
            .await
            .context("Failed to reach Cloud Storage")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Cloud Storage returned {}: {}", status, error_message(&body));
        }

        let object: UploadedObject = response
            .json()
            .await
            .context("Unexpected upload response")?;
        debug!(name = %object.name, size = ?object.size, "Upload acknowledged");

        Ok(())
    }

    fn location(&self) -> String {
        format!("gs://{}", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn token(value: &str) -> Credentials {
        Credentials::Token(value.to_string())
    }

    /// Answer a single HTTP request with `status` and `body`, handing back
    /// the raw request that was received.
    async fn respond_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if let Some(end) = request.windows(4).position(|w| w == &b"\r\n\r\n"[..]) {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (endpoint, handle)
    }

    #[test]
    fn upload_url_targets_bucket_objects() {
        let store = GcsStore::new("listings", token("token"))
            .unwrap()
            .with_endpoint("http://localhost:4443/");
        assert_eq!(
            store.upload_url(),
            "http://localhost:4443/upload/storage/v1/b/listings/o"
        );
        assert_eq!(store.location(), "gs://listings");
    }

    #[test]
    fn error_message_prefers_api_message() {
        let body = r#"{"error":{"code":403,"message":"Access denied.","errors":[]}}"#;
        assert_eq!(error_message(body), "Access denied.");
        assert_eq!(error_message("  bad gateway \n"), "bad gateway");
    }

    #[tokio::test]
    async fn put_sends_media_upload_with_bearer_token() {
        let (endpoint, server) = respond_once(
            "200 OK",
            r#"{"name":"scraped_data/properties_07_03_2024_09_05.csv","size":"12"}"#,
        )
        .await;
        let store = GcsStore::new("listings", token("ya29.token"))
            .unwrap()
            .with_endpoint(endpoint);

        let content = b"\xEF\xBB\xBFurl\r\nx\r\n".to_vec();
        store
            .put("scraped_data/properties_07_03_2024_09_05.csv", content)
            .await
            .unwrap();

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("POST /upload/storage/v1/b/listings/o?"));
        assert!(request_line.contains("uploadType=media"));
        assert!(request_line.contains("name=scraped_data%2Fproperties_07_03_2024_09_05.csv"));

        let lower = request.to_lowercase();
        assert!(lower.contains("authorization: bearer ya29.token"));
        assert!(lower.contains("content-type: text/csv; charset=utf-8"));
        assert!(request.ends_with("url\r\nx\r\n"));
    }

    #[tokio::test]
    async fn put_fails_on_error_status_with_api_message() {
        let (endpoint, server) = respond_once(
            "403 Forbidden",
            r#"{"error":{"code":403,"message":"does not have storage.objects.create access"}}"#,
        )
        .await;
        let store = GcsStore::new("listings", token("expired"))
            .unwrap()
            .with_endpoint(endpoint);

        let err = store.put("properties.csv", b"url\r\n".to_vec()).await.unwrap_err();
        server.await.unwrap();

        let message = format!("{:#}", err);
        assert!(message.contains("403"));
        assert!(message.contains("storage.objects.create"));
    }

    #[test]
    fn missing_service_account_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::service_account(&dir.path().join("key.json"))
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("key.json"));
    }
}
