use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, warn};
use serde_json::json;
use thiserror::Error;
use tokio::time::sleep;

use crate::ideogram::client::{session_marker, ApiClient, ApiError};
use crate::ideogram::config::AppConfig;
use crate::ideogram::eagle::{EagleClient, EagleError, EagleItem};

const DEFAULT_ANNOTATION: &str = "No description available";

#[derive(Error, Debug)]
pub(crate) enum DescribeError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Eagle(#[from] EagleError),
}

/// Result of asking the API for a caption. Keeps "the API answered without a
/// caption" distinct from "every attempt failed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CaptionOutcome {
    Caption(String),
    NoCaption,
    Exhausted,
}

#[derive(Debug, Clone)]
pub(crate) struct DescribeSettings {
    pub max_retries: u32,
    pub backoff: Duration,
    pub file_delay: Duration,
}

impl DescribeSettings {
    pub(crate) fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.rate.max_retries,
            backoff: Duration::from_millis(config.rate.retry_backoff_ms),
            file_delay: Duration::from_secs(1),
        }
    }
}

/// Requests a caption with bounded retries and constant backoff. Never
/// fails the caller; the outcome tag says how the attempts ended.
pub(crate) async fn request_description(
    client: &ApiClient,
    image_id: &str,
    settings: &DescribeSettings,
) -> CaptionOutcome {
    let mut last = CaptionOutcome::Exhausted;

    for attempt in 0..=settings.max_retries {
        match client.describe(image_id).await {
            Ok(reply) => match reply.data.first() {
                Some(caption) if !caption.caption.is_empty() => {
                    return CaptionOutcome::Caption(caption.caption.clone());
                }
                _ => {
                    last = CaptionOutcome::NoCaption;
                    info!("No caption received for image {}.", image_id);
                }
            },
            Err(e) => {
                last = CaptionOutcome::Exhausted;
                warn!("Error requesting description for image {}: {}", image_id, e);
            }
        }

        if attempt < settings.max_retries {
            info!(
                "Retry {} for image {}. Waiting {:?}...",
                attempt + 1,
                image_id,
                settings.backoff
            );
            sleep(settings.backoff).await;
        }
    }

    last
}

/// Uploads one image, captions it and imports it into Eagle.
async fn describe_one(
    client: &ApiClient,
    eagle: &EagleClient,
    settings: &DescribeSettings,
    path: &Path,
    folder_id: &str,
) -> Result<(), DescribeError> {
    let image_id = client.upload_image(path).await?;

    client
        .submit_event(
            "UPLOAD_DESCRIBE_CLICK",
            json!({
                "path": "/t/my-images",
                "sessionId": session_marker(),
            }),
        )
        .await?;

    let annotation = match request_description(client, &image_id, settings).await {
        CaptionOutcome::Caption(caption) => {
            info!("Image description for {}: {}", path.display(), caption);
            caption
        }
        CaptionOutcome::NoCaption => {
            warn!(
                "The API returned no caption for {}; using the default annotation.",
                path.display()
            );
            DEFAULT_ANNOTATION.to_string()
        }
        CaptionOutcome::Exhausted => {
            warn!(
                "All caption attempts failed for {}; using the default annotation.",
                path.display()
            );
            DEFAULT_ANNOTATION.to_string()
        }
    };

    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let item = EagleItem {
        path: absolute.to_string_lossy().into_owned(),
        name: "ideogram_described".to_string(),
        website: String::new(),
        tags: Vec::new(),
        annotation,
    };
    eagle.submit(&item, Some(folder_id)).await?;
    Ok(())
}

/// Runs the describe-and-submit flow over a set of files, isolating
/// failures per file. Returns how many files made it into Eagle.
pub(crate) async fn describe_and_submit(
    client: &ApiClient,
    eagle: &EagleClient,
    settings: &DescribeSettings,
    files: &[PathBuf],
    folder_id: &str,
) -> usize {
    let mut submitted = 0;

    for (index, file) in files.iter().enumerate() {
        if index > 0 {
            sleep(settings.file_delay).await;
        }

        match describe_one(client, eagle, settings, file, folder_id).await {
            Ok(()) => submitted += 1,
            Err(e) => error!("Error processing image {}: {}", file.display(), e),
        }
    }

    submitted
}

/// Collects image files directly inside a directory, sorted by name.
pub(crate) fn image_files_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
