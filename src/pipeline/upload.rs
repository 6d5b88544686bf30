//! Upload jobs and the upload service seam.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use crate::domain::StreamData;
use crate::{Error, Result};

/// Destination settings carried by an upload job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    pub remote_path: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A unit of upload work.
///
/// `id` is 0 until the upload service assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: i64,
    pub created_at_millis: i64,
    pub items: Vec<StreamData>,
    pub config: UploadConfig,
}

impl UploadJob {
    /// Synthesize an unpersisted job for the given files.
    pub fn new(items: Vec<StreamData>, config: UploadConfig) -> Self {
        Self {
            id: 0,
            created_at_millis: Utc::now().timestamp_millis(),
            items,
            config,
        }
    }
}

/// Consumer of upload jobs. Must be safe for concurrent submission from all
/// workers; `submit` returns only once the job finished or failed.
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn submit(&self, job: UploadJob) -> Result<()>;
}

/// Upload service backed by the rclone binary.
pub struct RcloneUploadService {
    binary: String,
    config_path: Option<String>,
    max_retries: u32,
}

impl RcloneUploadService {
    pub fn new(binary: impl Into<String>, config_path: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            config_path,
            max_retries: 3,
        }
    }

    async fn upload_one(&self, item: &StreamData, config: &UploadConfig) -> Result<()> {
        let source = item.path.to_string_lossy().to_string();
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                warn!(
                    source = %source,
                    attempt = attempt + 1,
                    "retrying rclone copy"
                );
                tokio::time::sleep(std::time::Duration::from_secs(2u64.pow(attempt))).await;
            }

            let mut cmd = Command::new(&self.binary);
            if let Some(ref cfg) = self.config_path {
                cmd.arg("--config").arg(cfg);
            }
            cmd.arg("copy").arg(&source).arg(&config.remote_path);
            cmd.args(&config.args);
            cmd.kill_on_drop(true);

            match cmd.status().await {
                Ok(status) if status.success() => {
                    info!(source = %source, remote = %config.remote_path, "rclone copy finished");
                    return Ok(());
                }
                Ok(status) => {
                    last_error = Some(format!(
                        "rclone exited with code {}",
                        status.code().unwrap_or(-1)
                    ));
                }
                Err(e) => {
                    last_error = Some(format!("failed to run {}: {}", self.binary, e));
                }
            }
        }

        Err(Error::upload(format!(
            "giving up on {} after {} attempts: {}",
            source,
            self.max_retries,
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

#[async_trait]
impl UploadService for RcloneUploadService {
    async fn submit(&self, job: UploadJob) -> Result<()> {
        for item in &job.items {
            self.upload_one(item, &job.config).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(path: &str) -> StreamData {
        StreamData::new(path, 7, Utc::now(), Utc::now(), "s1")
    }

    #[test]
    fn test_upload_job_is_unpersisted() {
        let job = UploadJob::new(
            vec![item("/tmp/a.flv")],
            UploadConfig {
                remote_path: "remote:rec".to_string(),
                args: vec![],
            },
        );
        assert_eq!(job.id, 0);
        assert!(job.created_at_millis > 0);
        assert_eq!(job.items.len(), 1);
    }

    #[tokio::test]
    async fn test_rclone_failure_propagates() {
        let service = RcloneUploadService {
            binary: "/nonexistent/rclone".to_string(),
            config_path: None,
            max_retries: 1,
        };
        let job = UploadJob::new(
            vec![item("/tmp/a.flv")],
            UploadConfig {
                remote_path: "remote:rec".to_string(),
                args: vec![],
            },
        );
        assert!(matches!(service.submit(job).await, Err(Error::Upload(_))));
    }
}
