use std::time::Duration;

use log::info;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum EagleError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Eagle import failed with status {status}: {message}")]
    Status { status: u16, message: String },
}

/// One item handed to the Eagle import endpoint.
#[derive(Debug, Clone)]
pub(crate) struct EagleItem {
    pub path: String,
    pub name: String,
    pub website: String,
    pub tags: Vec<String>,
    pub annotation: String,
}

/// Client for the local Eagle asset manager. Fire-and-forget: one submit
/// call per item, no retry. The harvest pipeline treats a failure here as a
/// skipped item, leaving the URL unrecorded so the next run retries it.
pub(crate) struct EagleClient {
    http: Client,
    server_url: String,
    folder_id: String,
}

impl EagleClient {
    pub(crate) fn new(
        server_url: impl Into<String>,
        folder_id: impl Into<String>,
    ) -> Result<Self, EagleError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let mut server_url = server_url.into();
        while server_url.ends_with('/') {
            server_url.pop();
        }

        Ok(Self {
            http,
            server_url,
            folder_id: folder_id.into(),
        })
    }

    /// Submits a local file plus metadata. `folder_id` overrides the default
    /// folder when given (the describe flow uses a separate folder).
    pub(crate) async fn submit(
        &self,
        item: &EagleItem,
        folder_id: Option<&str>,
    ) -> Result<(), EagleError> {
        let url = format!("{}/api/item/addFromPaths", self.server_url);
        let payload = json!({
            "items": [{
                "path": item.path,
                "name": item.name,
                "website": item.website,
                "tags": item.tags,
                "annotation": item.annotation,
            }],
            "folderId": folder_id.unwrap_or(&self.folder_id),
        });

        let response = self.http.post(url.as_str()).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EagleError::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            });
        }

        info!("Image \"{}\" added to Eagle successfully.", item.name);
        Ok(())
    }
}
