use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::client_for;
use crate::ideogram::generation::{generate_once, GenerationSettings, PromptList};

fn settings() -> GenerationSettings {
    GenerationSettings {
        interval: Duration::from_secs(125),
        progress_log: Duration::from_secs(10),
        model_version: "V_1_5".to_string(),
        style_expert: "ILLUSTRATION".to_string(),
        prepend: "masterpiece,".to_string(),
        append: String::new(),
    }
}

#[tokio::test]
async fn a_generation_fires_the_event_then_the_sample_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/e/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/images/sample"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accepted": true })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let prompts = PromptList::from_lines("a red fox\n");
    generate_once(&client, &settings(), &prompts).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url.path(), "/api/e/submit");
    assert_eq!(requests[1].url.path(), "/api/images/sample");

    let sample: serde_json::Value = requests[1].body_json().unwrap();
    assert_eq!(sample["prompt"], "masterpiece, a red fox");
    assert_eq!(sample["model_version"], "V_1_5");
    assert_eq!(sample["style_expert"], "ILLUSTRATION");
    assert_eq!(sample["use_autoprompt_option"], "AUTO");
    assert_eq!(sample["user_id"], "user-1");
    assert_eq!(sample["resolution"]["width"], 1024);
}

#[tokio::test]
async fn an_empty_prompt_list_sends_nothing() {
    let server = MockServer::start().await;

    let client = client_for(&server.uri());
    let prompts = PromptList::default();
    generate_once(&client, &settings(), &prompts).await.unwrap();

    assert!(server.received_requests().await.unwrap().is_empty());
}
