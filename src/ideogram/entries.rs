//! Typed views of the API responses. Only the fields the harvester consumes
//! are modeled; everything else in the payloads is ignored.

use serde::Deserialize;

/// One generation (or upload) record from the paged `/api/g/u` listing.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct GenerationEntry {
    #[serde(default)]
    pub request_id: String,
    /// Only present on upload records; used by bulk delete.
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub responses: Vec<ResponseEntry>,
}

/// One image variant inside a generation record.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct ResponseEntry {
    pub response_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub style_expert: Option<String>,
    #[serde(default)]
    pub num_likes: u64,
}

/// A page of results from `/api/gallery/global-search`.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct SearchPage {
    #[serde(default)]
    pub results: Vec<SearchEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct SearchEntry {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub responses: Vec<ResponseEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct UserRef {
    #[serde(default)]
    pub display_handle: Option<String>,
}

/// Reply from the image upload endpoint.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct UploadReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Reply from the describe endpoint.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct DescribeReply {
    #[serde(default)]
    pub data: Vec<DescribeCaption>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct DescribeCaption {
    #[serde(default)]
    pub caption: String,
}
