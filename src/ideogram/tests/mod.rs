//! Integration tests driving the harvester against a mock HTTP server.

mod download_retry;
mod generation_flow;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::ideogram::auth::Credential;
use crate::ideogram::client::ApiClient;

/// Builds an API client with test credentials pointed at a mock server.
fn client_for(server_uri: &str) -> ApiClient {
    let mut credential = Credential::default();
    credential.set("test-token".into(), "user-1".into(), "tester".into());
    ApiClient::new(server_uri, Arc::new(RwLock::new(credential))).unwrap()
}
