use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use log::{info, warn};
use thiserror::Error;
use tokio::fs::{create_dir_all, File};
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, timeout};

use crate::ideogram::client::{ApiClient, ApiError};
use crate::ideogram::config::AppConfig;

#[derive(Error, Debug)]
pub(crate) enum DownloadError {
    #[error("download timed out for image {0}")]
    Timeout(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to download image {id} after {attempts} attempts: {last_error}")]
    Exhausted {
        id: String,
        attempts: u32,
        last_error: String,
    },
}

/// Knobs for one download attempt cycle. Defaults match the production
/// values (5 s timeout, 1 s constant backoff, 2 retries); tests shrink them.
#[derive(Debug, Clone)]
pub(crate) struct DownloadSettings {
    pub timeout: Duration,
    pub backoff: Duration,
    pub max_retries: u32,
    pub download_dir: PathBuf,
}

impl DownloadSettings {
    pub(crate) fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.rate.download_timeout_secs),
            backoff: Duration::from_millis(config.rate.retry_backoff_ms),
            max_retries: config.rate.max_retries,
            download_dir: config.download_directory(),
        }
    }

    pub(crate) fn local_path(&self, response_id: &str) -> PathBuf {
        self.download_dir.join(file_name(response_id))
    }
}

/// Deterministic filename for a response id.
pub(crate) fn file_name(response_id: &str) -> String {
    format!("downloaded_image_{response_id}.png")
}

/// Downloads a binary resource to the download directory, retrying a bounded
/// number of times with a constant backoff. Each retry re-downloads from
/// scratch; there is no partial-byte resume.
pub(crate) async fn download_with_retry(
    client: &ApiClient,
    settings: &DownloadSettings,
    url: &str,
    response_id: &str,
) -> Result<PathBuf, DownloadError> {
    let mut attempt: u32 = 0;
    loop {
        let outcome = match timeout(settings.timeout, fetch_to_disk(client, settings, url, response_id)).await {
            Ok(result) => result,
            Err(_) => Err(DownloadError::Timeout(response_id.to_string())),
        };

        match outcome {
            Ok(path) => {
                info!("Downloaded image: {}", response_id);
                return Ok(path);
            }
            Err(error) => {
                attempt += 1;
                if attempt > settings.max_retries {
                    return Err(DownloadError::Exhausted {
                        id: response_id.to_string(),
                        attempts: attempt,
                        last_error: error.to_string(),
                    });
                }
                warn!(
                    "Retrying download for image {} (attempt {}/{}): {}",
                    response_id,
                    attempt + 1,
                    settings.max_retries + 1,
                    error
                );
                sleep(settings.backoff).await;
            }
        }
    }
}

async fn fetch_to_disk(
    client: &ApiClient,
    settings: &DownloadSettings,
    url: &str,
    response_id: &str,
) -> Result<PathBuf, DownloadError> {
    let response = client.binary_get(url).await?;

    create_dir_all(&settings.download_dir).await?;
    let path = settings.local_path(response_id);
    let mut file = File::create(&path).await?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Transport)?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(path)
}
