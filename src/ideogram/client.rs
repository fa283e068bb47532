use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, ORIGIN, REFERER};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::ideogram::auth::Credential;
use crate::ideogram::entries::{DescribeReply, GenerationEntry, SearchPage, UploadReply};

/// The public site; used for the fixed Referer/Origin headers and provenance links.
pub(crate) const SITE_URL: &str = "https://ideogram.ai";

pub(crate) const USER_AGENT: &str = concat!("ideogram_harvester/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub(crate) enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{context} failed with status {status} ({url})")]
    Status {
        context: &'static str,
        status: u16,
        url: String,
    },

    #[error("malformed {context} payload: {source}")]
    Data {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bearer token contains characters that cannot be sent in a header")]
    InvalidToken,
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Which listing the paged `/api/g/u` endpoint should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GalleryFilter {
    Generations,
    Uploads,
}

impl GalleryFilter {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            GalleryFilter::Generations => "generations",
            GalleryFilter::Uploads => "upload",
        }
    }
}

/// Authenticated client for the Ideogram private API.
///
/// Attaches `Authorization: Bearer <token>` (when a token is set) plus the
/// fixed Referer/Origin headers to every request. This layer never retries;
/// retry policy belongs to the callers.
pub(crate) struct ApiClient {
    http: Client,
    base_url: String,
    credential: Arc<RwLock<Credential>>,
}

impl ApiClient {
    pub(crate) fn new(
        base_url: impl Into<String>,
        credential: Arc<RwLock<Credential>>,
    ) -> ApiResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            http,
            base_url,
            credential,
        })
    }

    pub(crate) fn user_id(&self) -> String {
        self.credential.read().user_id().to_string()
    }

    fn headers(&self, referer: &str) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_str(referer).unwrap_or(HeaderValue::from_static(SITE_URL)));
        headers.insert(ORIGIN, HeaderValue::from_static(SITE_URL));

        let token = self.credential.read().token().to_string();
        if !token.is_empty() {
            let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ApiError::InvalidToken)?;
            headers.insert(AUTHORIZATION, bearer);
        }

        Ok(headers)
    }

    async fn read_json(context: &'static str, response: Response) -> ApiResult<Value> {
        let status = response.status();
        let url = response.url().to_string();
        if !status.is_success() {
            return Err(ApiError::Status {
                context,
                status: status.as_u16(),
                url,
            });
        }

        // Some endpoints answer with plain text; fall back to the raw body.
        let text = response.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    pub(crate) async fn get(&self, context: &'static str, url: &str) -> ApiResult<Value> {
        let referer = format!("{SITE_URL}/t/explore");
        let response = self
            .http
            .get(url)
            .headers(self.headers(&referer)?)
            .send()
            .await?;
        Self::read_json(context, response).await
    }

    pub(crate) async fn post(
        &self,
        context: &'static str,
        url: &str,
        body: &Value,
    ) -> ApiResult<Value> {
        let referer = format!("{SITE_URL}/t/explore");
        let response = self
            .http
            .post(url)
            .headers(self.headers(&referer)?)
            .json(body)
            .send()
            .await?;
        Self::read_json(context, response).await
    }

    pub(crate) async fn delete(
        &self,
        context: &'static str,
        url: &str,
        body: &Value,
    ) -> ApiResult<Value> {
        let referer = format!("{SITE_URL}/t/explore");
        let response = self
            .http
            .delete(url)
            .headers(self.headers(&referer)?)
            .json(body)
            .send()
            .await?;
        Self::read_json(context, response).await
    }

    /// Issues a status-checked binary GET and hands the response back for
    /// streaming. The caller owns timeout and retry policy.
    pub(crate) async fn binary_get(&self, url: &str) -> ApiResult<Response> {
        let referer = format!("{SITE_URL}/");
        let response = self
            .http
            .get(url)
            .headers(self.headers(&referer)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                context: "image download",
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }

    /// Canonical download URL for a response id.
    pub(crate) fn download_url(&self, response_id: &str) -> String {
        format!(
            "{}/api/download/response/{response_id}/image?quality=PNG",
            self.base_url
        )
    }

    /// Public page a harvested image came from.
    pub(crate) fn provenance_url(request_id: &str, index: Option<usize>) -> String {
        match index {
            Some(index) => format!("{SITE_URL}/g/{request_id}/{index}"),
            None => format!("{SITE_URL}/g/{request_id}"),
        }
    }

    /// Fetches one page of the user's gallery or uploads listing.
    pub(crate) async fn gallery_page(
        &self,
        user_id: &str,
        filter: GalleryFilter,
        page: usize,
    ) -> ApiResult<Vec<GenerationEntry>> {
        let url = format!(
            "{}/api/g/u?user_id={user_id}&all_privacy=true&filters={}&page={page}",
            self.base_url,
            filter.as_str()
        );
        let value = self.get("gallery listing", url.as_str()).await?;
        serde_json::from_value(value).map_err(|source| ApiError::Data {
            context: "gallery listing",
            source,
        })
    }

    /// Fetches one page of the global "top" search, optionally filtered by a
    /// timeline name. `None` means the ALL timeline and omits the field.
    pub(crate) async fn global_search(
        &self,
        timeline: Option<&str>,
        offset: usize,
    ) -> ApiResult<SearchPage> {
        let url = format!("{}/api/gallery/global-search", self.base_url);
        let mut payload = json!({
            "offset": offset,
            "context": "TOP",
            "filters": {},
        });
        if let (Some(timeline), Some(map)) = (timeline, payload.as_object_mut()) {
            map.insert("timeline".to_string(), Value::String(timeline.to_string()));
        }

        let value = self.post("global search", url.as_str(), &payload).await?;
        serde_json::from_value(value).map_err(|source| ApiError::Data {
            context: "global search",
            source,
        })
    }

    /// Submits a telemetry event. The site expects the metadata as a JSON
    /// string nested inside the payload.
    pub(crate) async fn submit_event(&self, event_key: &str, extras: Value) -> ApiResult<()> {
        let url = format!("{}/api/e/submit", self.base_url);
        let metadata = self.event_metadata(extras);
        let payload = json!({
            "event_key": event_key,
            "metadata": metadata.to_string(),
        });
        self.post("event submission", url.as_str(), &payload)
            .await?;
        Ok(())
    }

    fn event_metadata(&self, extras: Value) -> Value {
        let (user_id, user_handle) = {
            let credential = self.credential.read();
            (
                credential.user_id().to_string(),
                credential.user_handle().to_string(),
            )
        };

        let mut metadata = json!({
            "path": "/t/explore",
            "triggeredUtcTime": Utc::now().timestamp_millis(),
            "userAgent": USER_AGENT,
            "isMobileLayout": false,
            "userHandle": user_handle,
            "userId": user_id,
            "location": Local::now().offset().to_string(),
            "generationInProgress": false,
        });

        if let (Some(base), Some(extras)) = (metadata.as_object_mut(), extras.as_object()) {
            for (key, value) in extras {
                base.insert(key.clone(), value.clone());
            }
        }
        metadata
    }

    /// Fires a generation request. The result is not awaited beyond the
    /// immediate acknowledgement.
    pub(crate) async fn generate_sample(&self, payload: Value) -> ApiResult<Value> {
        let url = format!("{}/api/images/sample", self.base_url);
        self.post("image generation", url.as_str(), &payload).await
    }

    /// Deletes the given uploads in one batched call.
    pub(crate) async fn delete_uploads(&self, image_ids: &[String]) -> ApiResult<Value> {
        let url = format!("{}/api/uploads/delete", self.base_url);
        let payload = json!({ "image_ids": image_ids });
        self.delete("uploads delete", url.as_str(), &payload).await
    }

    /// Uploads an image file and returns the id the API assigned to it.
    pub(crate) async fn upload_image(&self, path: &Path) -> ApiResult<String> {
        let url = format!("{}/api/uploads/upload", self.base_url);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.png".to_string());

        let bytes = tokio::fs::read(path).await?;
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let referer = format!("{SITE_URL}/t/my-images");
        let response = self
            .http
            .post(url.as_str())
            .headers(self.headers(&referer)?)
            .multipart(form)
            .send()
            .await?;

        let value = Self::read_json("image upload", response).await?;
        let reply: UploadReply = serde_json::from_value(value).map_err(|source| ApiError::Data {
            context: "image upload",
            source,
        })?;

        match (reply.success, reply.id) {
            (true, Some(id)) => Ok(id),
            _ => Err(ApiError::Data {
                context: "image upload",
                source: serde_json::Error::io(std::io::Error::other(
                    reply
                        .error_message
                        .unwrap_or_else(|| "upload rejected without an error message".to_string()),
                )),
            }),
        }
    }

    /// Asks the API to caption an uploaded image. One attempt; the describe
    /// flow wraps this with its retry policy.
    pub(crate) async fn describe(&self, image_id: &str) -> ApiResult<DescribeReply> {
        let url = format!("{}/api/describe", self.base_url);
        let payload = json!({ "image_id": image_id });
        let value = self.post("describe", url.as_str(), &payload).await?;
        serde_json::from_value(value).map_err(|source| ApiError::Data {
            context: "describe",
            source,
        })
    }
}

/// Session marker attached to telemetry events that the site correlates
/// across a browsing session.
pub(crate) fn session_marker() -> String {
    format!("{}_{}", Uuid::new_v4(), Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_client() -> ApiClient {
        let mut credential = Credential::default();
        credential.set("tok".into(), "user-1".into(), "tester".into());
        ApiClient::new(SITE_URL, Arc::new(RwLock::new(credential))).unwrap()
    }

    #[test]
    fn download_url_uses_png_quality() {
        let client = test_client();
        assert_eq!(
            client.download_url("abc123"),
            "https://ideogram.ai/api/download/response/abc123/image?quality=PNG"
        );
    }

    #[test]
    fn provenance_url_with_and_without_index() {
        assert_eq!(
            ApiClient::provenance_url("req", Some(2)),
            "https://ideogram.ai/g/req/2"
        );
        assert_eq!(ApiClient::provenance_url("req", None), "https://ideogram.ai/g/req");
    }

    #[test]
    fn event_metadata_merges_extras_over_base_fields() {
        let client = test_client();
        let metadata = client.event_metadata(serde_json::json!({
            "buttonName": "Week",
            "path": "/t/my-images",
        }));

        assert_eq!(metadata["buttonName"], "Week");
        assert_eq!(metadata["path"], "/t/my-images");
        assert_eq!(metadata["userId"], "user-1");
        assert_eq!(metadata["userHandle"], "tester");
        assert_eq!(metadata["isMobileLayout"], false);
    }

    #[test]
    fn gallery_filter_names_match_the_api() {
        assert_eq!(GalleryFilter::Generations.as_str(), "generations");
        assert_eq!(GalleryFilter::Uploads.as_str(), "upload");
    }

    #[test]
    fn session_markers_are_unique() {
        assert_ne!(session_marker(), session_marker());
    }
}
