use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, trace};
use thiserror::Error;
use tokio::time::sleep;

use crate::ideogram::client::{ApiClient, ApiError, GalleryFilter};
use crate::ideogram::download::{download_with_retry, DownloadError, DownloadSettings};
use crate::ideogram::eagle::{EagleClient, EagleError, EagleItem};
use crate::ideogram::entries::{GenerationEntry, SearchEntry};
use crate::ideogram::seen_index::SeenIndex;

/// Recency filter for the global "top" harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Timeline {
    All,
    Hour,
    Day,
    Week,
    Month,
}

impl Timeline {
    pub(crate) fn variants() -> &'static [Timeline] {
        &[
            Timeline::All,
            Timeline::Hour,
            Timeline::Day,
            Timeline::Week,
            Timeline::Month,
        ]
    }

    /// Wire name used by the search payload and as an item tag.
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Timeline::All => "ALL",
            Timeline::Hour => "HOUR",
            Timeline::Day => "DAY",
            Timeline::Week => "WEEK",
            Timeline::Month => "MONTH",
        }
    }

    /// Capitalized form the explore dropdown shows, used in telemetry.
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Timeline::All => "All",
            Timeline::Hour => "Hour",
            Timeline::Day => "Day",
            Timeline::Week => "Week",
            Timeline::Month => "Month",
        }
    }

    /// The search payload omits the timeline field for ALL.
    pub(crate) fn payload_value(&self) -> Option<&'static str> {
        match self {
            Timeline::All => None,
            other => Some(other.as_str()),
        }
    }
}

/// One downloadable image flattened out of a listing record, carrying
/// everything the per-item cycle needs.
#[derive(Debug, Clone)]
pub(crate) struct HarvestItem {
    pub response_id: String,
    pub download_url: String,
    pub website_url: String,
    pub annotation: String,
    pub tags: Vec<String>,
    pub title: String,
}

/// One fetched page. `records` counts the raw listing records; pagination
/// ends on a page with zero records, even if every record flattened to
/// nothing (e.g. generations without variants).
#[derive(Debug, Clone, Default)]
pub(crate) struct SourcePage {
    pub records: usize,
    pub items: Vec<HarvestItem>,
}

/// A paged listing that can be harvested. Implementations differ only in
/// how a page is fetched and flattened; the pipeline is shared.
pub(crate) trait PageSource: Send + Sync {
    fn label(&self) -> String;

    /// Fetches page `page` (0-based). A page with zero records ends the run.
    fn fetch_page(&self, page: usize) -> BoxFuture<'_, Result<SourcePage, ApiError>>;
}

/// Pages through the user's own gallery: `page=0,1,2,…` until empty.
pub(crate) struct UserGallerySource<'a> {
    client: &'a ApiClient,
    user_id: String,
}

impl<'a> UserGallerySource<'a> {
    pub(crate) fn new(client: &'a ApiClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }
}

impl PageSource for UserGallerySource<'_> {
    fn label(&self) -> String {
        "user gallery".to_string()
    }

    fn fetch_page(&self, page: usize) -> BoxFuture<'_, Result<SourcePage, ApiError>> {
        async move {
            let entries = self
                .client
                .gallery_page(&self.user_id, GalleryFilter::Generations, page)
                .await?;
            Ok(SourcePage {
                records: entries.len(),
                items: entries
                    .iter()
                    .flat_map(|entry| flatten_gallery_entry(self.client, entry))
                    .collect(),
            })
        }
        .boxed()
    }
}

/// Pages through the global "top" search: `offset=0,60,120,…` until a page
/// comes back with zero results.
pub(crate) struct TimelineSource<'a> {
    client: &'a ApiClient,
    timeline: Timeline,
    page_size: usize,
}

impl<'a> TimelineSource<'a> {
    pub(crate) fn new(client: &'a ApiClient, timeline: Timeline, page_size: usize) -> Self {
        Self {
            client,
            timeline,
            page_size,
        }
    }
}

impl PageSource for TimelineSource<'_> {
    fn label(&self) -> String {
        format!("global timeline ({})", self.timeline.as_str())
    }

    fn fetch_page(&self, page: usize) -> BoxFuture<'_, Result<SourcePage, ApiError>> {
        async move {
            let offset = page * self.page_size;
            let search_page = self
                .client
                .global_search(self.timeline.payload_value(), offset)
                .await?;
            Ok(SourcePage {
                records: search_page.results.len(),
                items: search_page
                    .results
                    .iter()
                    .flat_map(|entry| flatten_search_entry(self.client, self.timeline, entry))
                    .collect(),
            })
        }
        .boxed()
    }
}

/// Flattens one gallery record into harvest items, one per image variant.
/// The provenance URL carries the variant index.
fn flatten_gallery_entry(client: &ApiClient, entry: &GenerationEntry) -> Vec<HarvestItem> {
    entry
        .responses
        .iter()
        .enumerate()
        .map(|(index, response)| HarvestItem {
            response_id: response.response_id.clone(),
            download_url: client.download_url(&response.response_id),
            website_url: ApiClient::provenance_url(&entry.request_id, Some(index)),
            annotation: response.prompt.clone(),
            tags: vec![response
                .style_expert
                .clone()
                .unwrap_or_else(|| "DEFAULT".to_string())],
            title: "ideogram_image".to_string(),
        })
        .collect()
}

/// Flattens one search record. Timeline items carry a richer tag set:
/// the timeline itself, the style expert (unless DEFAULT), the model
/// version, and the author handle.
fn flatten_search_entry(
    client: &ApiClient,
    timeline: Timeline,
    entry: &SearchEntry,
) -> Vec<HarvestItem> {
    let user_handle = entry
        .user
        .as_ref()
        .and_then(|user| user.display_handle.clone())
        .unwrap_or_else(|| "unknown_user".to_string());
    let model_version = entry
        .model_version
        .clone()
        .unwrap_or_else(|| "unknown_model".to_string());

    entry
        .responses
        .iter()
        .map(|response| {
            let style_expert = response
                .style_expert
                .clone()
                .unwrap_or_else(|| "DEFAULT".to_string());

            let mut tags = vec![timeline.as_str().to_string()];
            if style_expert != "DEFAULT" {
                tags.push(style_expert);
            }
            tags.push(format!("model_version:{model_version}"));
            tags.push(format!("user:{user_handle}"));

            HarvestItem {
                response_id: response.response_id.clone(),
                download_url: client.download_url(&response.response_id),
                website_url: ApiClient::provenance_url(&entry.request_id, None),
                annotation: response.prompt.clone(),
                tags,
                title: format!("ideogram_image_{}_likes", response.num_likes),
            }
        })
        .collect()
}

#[derive(Error, Debug)]
enum ItemError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Eagle(#[from] EagleError),
}

/// Everything a harvest run needs, built once per invocation. No globals;
/// the session hands this to the pipeline explicitly.
pub(crate) struct HarvestContext<'a> {
    pub client: &'a ApiClient,
    pub eagle: &'a EagleClient,
    pub seen: &'a SeenIndex,
    pub settings: DownloadSettings,
    pub item_delay: Duration,
}

/// Counters for one harvest run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct HarvestReport {
    pub pages: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Runs one full harvest: page loop until an empty page, per-item
/// dedup/download/submit/record cycle, strictly serial. A failed item is
/// logged and skipped; a failed page fetch aborts the whole run.
pub(crate) async fn run_harvest<S: PageSource>(
    ctx: &HarvestContext<'_>,
    source: &S,
) -> Result<HarvestReport, ApiError> {
    let mut report = HarvestReport::default();
    let progress = harvest_spinner(&source.label());

    let mut page = 0;
    loop {
        progress.set_message(format!("fetching page {page}"));
        let source_page = match source.fetch_page(page).await {
            Ok(source_page) => source_page,
            Err(e) => {
                progress.finish_and_clear();
                error!("Error fetching page {} from {}: {}", page, source.label(), e);
                return Err(e);
            }
        };
        report.pages += 1;

        if source_page.records == 0 {
            info!("No more pages to process.");
            break;
        }
        debug!(
            "Fetched {} items from page {}.",
            source_page.items.len(),
            page
        );

        for item in &source_page.items {
            if ctx.seen.exists(&item.download_url) {
                trace!("Skipping already downloaded URL");
                report.skipped += 1;
                continue;
            }

            progress.set_message(format!("image {}", item.response_id));
            match process_item(ctx, item).await {
                Ok(()) => {
                    report.downloaded += 1;
                    sleep(ctx.item_delay).await;
                }
                Err(e) => {
                    error!("Error processing image {}: {}", item.response_id, e);
                    report.failed += 1;
                }
            }
        }

        page += 1;
    }

    progress.finish_and_clear();
    info!(
        "Harvest of {} finished: {} pages, {} downloaded, {} skipped, {} failed.",
        source.label(),
        report.pages,
        report.downloaded,
        report.skipped,
        report.failed
    );
    Ok(report)
}

/// One item's cycle: download, submit to Eagle, then record the URL. The
/// seen record is written last so a partial failure leaves the URL eligible
/// for the next run.
async fn process_item(ctx: &HarvestContext<'_>, item: &HarvestItem) -> Result<(), ItemError> {
    let local_path = download_with_retry(
        ctx.client,
        &ctx.settings,
        &item.download_url,
        &item.response_id,
    )
    .await?;

    let eagle_item = EagleItem {
        path: local_path.to_string_lossy().into_owned(),
        name: item.title.clone(),
        website: item.website_url.clone(),
        tags: item.tags.clone(),
        annotation: item.annotation.clone(),
    };
    ctx.eagle.submit(&eagle_item, None).await?;

    ctx.seen.add(&item.download_url);
    Ok(())
}

fn harvest_spinner(label: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {prefix}: {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix(label.to_string());
    spinner.enable_steady_tick(Duration::from_millis(200));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ideogram::auth::Credential;
    use crate::ideogram::entries::{ResponseEntry, UserRef};
    use parking_lot::RwLock;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn test_client() -> ApiClient {
        ApiClient::new(
            "https://ideogram.ai",
            Arc::new(RwLock::new(Credential::default())),
        )
        .unwrap()
    }

    fn response(id: &str, style: Option<&str>, likes: u64) -> ResponseEntry {
        ResponseEntry {
            response_id: id.to_string(),
            prompt: format!("prompt for {id}"),
            style_expert: style.map(String::from),
            num_likes: likes,
        }
    }

    #[test]
    fn timeline_wire_names_and_labels() {
        assert_eq!(Timeline::variants().len(), 5);
        assert_eq!(Timeline::Week.as_str(), "WEEK");
        assert_eq!(Timeline::Week.label(), "Week");
        assert_eq!(Timeline::All.payload_value(), None);
        assert_eq!(Timeline::Month.payload_value(), Some("MONTH"));
    }

    #[test]
    fn gallery_entries_flatten_one_item_per_variant() {
        let client = test_client();
        let entry = GenerationEntry {
            request_id: "req1".to_string(),
            image_id: None,
            responses: vec![
                response("a", Some("ILLUSTRATION"), 0),
                response("b", None, 0),
            ],
        };

        let items = flatten_gallery_entry(&client, &entry);
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].download_url,
            "https://ideogram.ai/api/download/response/a/image?quality=PNG"
        );
        assert_eq!(items[0].website_url, "https://ideogram.ai/g/req1/0");
        assert_eq!(items[1].website_url, "https://ideogram.ai/g/req1/1");
        assert_eq!(items[0].tags, vec!["ILLUSTRATION".to_string()]);
        assert_eq!(items[1].tags, vec!["DEFAULT".to_string()]);
        assert_eq!(items[0].title, "ideogram_image");
    }

    #[test]
    fn search_entries_carry_timeline_model_and_author_tags() {
        let client = test_client();
        let entry = SearchEntry {
            request_id: "req2".to_string(),
            model_version: Some("V_2".to_string()),
            user: Some(UserRef {
                display_handle: Some("artist".to_string()),
            }),
            responses: vec![response("c", Some("PHOTO"), 12)],
        };

        let items = flatten_search_entry(&client, Timeline::Week, &entry);
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].tags,
            vec![
                "WEEK".to_string(),
                "PHOTO".to_string(),
                "model_version:V_2".to_string(),
                "user:artist".to_string(),
            ]
        );
        assert_eq!(items[0].title, "ideogram_image_12_likes");
        assert_eq!(items[0].website_url, "https://ideogram.ai/g/req2");
    }

    #[test]
    fn default_style_is_not_tagged_on_timeline_items() {
        let client = test_client();
        let entry = SearchEntry {
            request_id: "req3".to_string(),
            model_version: None,
            user: None,
            responses: vec![response("d", None, 0)],
        };

        let items = flatten_search_entry(&client, Timeline::All, &entry);
        assert_eq!(
            items[0].tags,
            vec![
                "ALL".to_string(),
                "model_version:unknown_model".to_string(),
                "user:unknown_user".to_string(),
            ]
        );
    }
}
