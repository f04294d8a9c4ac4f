pub mod gcs;
pub mod table;

pub use gcs::{Credentials, GcsStore};

use crate::error::{Result, ScrapeError};
use crate::models::PropertyRecord;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// External object storage the dataset is copied to after the local write
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, content: Vec<u8>) -> anyhow::Result<()>;

    /// Human-readable location, used in logs
    fn location(&self) -> String;
}

/// Outcome of forwarding the dataset to external storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// No storage configured
    Skipped,
    Uploaded { key: String },
    Failed { key: String, message: String },
}

#[derive(Debug, Clone)]
pub struct SinkReport {
    pub local_path: PathBuf,
    pub upload: UploadStatus,
}

/// `properties_<DD>_<MM>_<YYYY>_<HH>_<MM>.csv` for the given local time
pub fn file_name(at: &DateTime<Local>) -> String {
    at.format("properties_%d_%m_%Y_%H_%M.csv").to_string()
}

/// Writes the dataset to disk and, optionally, to object storage
pub struct ResultSink {
    output_dir: PathBuf,
    store: Option<Arc<dyn ObjectStore>>,
    key_prefix: String,
}

impl ResultSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            store: None,
            key_prefix: String::new(),
        }
    }

    /// Also upload every dataset to `store`, under `key_prefix/`
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>, key_prefix: impl Into<String>) -> Self {
        self.store = Some(store);
        self.key_prefix = key_prefix.into();
        self
    }

    pub async fn persist(&self, records: &[PropertyRecord]) -> Result<SinkReport> {
        self.persist_at(records, Local::now()).await
    }

    /// Write `records` named after `at`.
    ///
    /// The local file is written first; an upload failure is logged and
    /// reported in the returned status rather than as an error.
    pub async fn persist_at(&self, records: &[PropertyRecord], at: DateTime<Local>) -> Result<SinkReport> {
        let name = file_name(&at);
        let content = table::to_csv(records)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let local_path = self.output_dir.join(&name);
        tokio::fs::write(&local_path, &content).await?;
        info!(
            path = %local_path.display(),
            records = records.len(),
            "💾 Saved dataset"
        );

        let upload = match &self.store {
            None => UploadStatus::Skipped,
            Some(store) => self.upload(store.as_ref(), &name, content).await,
        };

        Ok(SinkReport { local_path, upload })
    }

    async fn upload(&self, store: &dyn ObjectStore, name: &str, content: Vec<u8>) -> UploadStatus {
        let prefix = self.key_prefix.trim_end_matches('/');
        let key = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        };

        match store.put(&key, content).await {
            Ok(()) => {
                info!(location = %store.location(), key = %key, "☁️ Uploaded dataset");
                UploadStatus::Uploaded { key }
            }
            Err(e) => {
                let err = ScrapeError::Sink {
                    key: key.clone(),
                    message: format!("{:#}", e),
                };
                error!(error = %err, "Upload failed, local copy kept");
                UploadStatus::Failed {
                    key,
                    message: format!("{:#}", e),
                }
            }
        }
    }
}
