use log::{debug, info};
use serde_json::json;

use crate::ideogram::client::{session_marker, ApiClient, ApiResult, GalleryFilter};

/// Pages through the user's uploads listing collecting every image id, then
/// issues one batched delete. All-or-nothing: the delete endpoint's result
/// is not decomposed per id. Returns how many ids were deleted.
pub(crate) async fn delete_all_uploads(client: &ApiClient, user_id: &str) -> ApiResult<usize> {
    let mut image_ids: Vec<String> = Vec::new();
    let mut page = 0;

    loop {
        let entries = client
            .gallery_page(user_id, GalleryFilter::Uploads, page)
            .await?;
        if entries.is_empty() {
            info!("No more uploads to process.");
            break;
        }

        for entry in entries {
            if let Some(image_id) = entry.image_id {
                debug!("Added Image ID: {} to delete", image_id);
                image_ids.push(image_id);
            }
        }
        page += 1;
    }

    if image_ids.is_empty() {
        info!("No uploads found to delete.");
        return Ok(0);
    }

    client
        .submit_event(
            "BULK_DELETE",
            json!({
                "path": "/t/my-images",
                "sessionId": session_marker(),
                "selectedCount": image_ids.len(),
            }),
        )
        .await?;

    let response = client.delete_uploads(&image_ids).await?;
    info!("Uploads deleted successfully: {}", response);
    Ok(image_ids.len())
}
