use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use parking_lot::RwLock;
use rand::seq::IndexedRandom;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::ideogram::client::{ApiClient, ApiResult};
use crate::ideogram::config::AppConfig;

/// Ordered prompt list loaded from a plain text file, one prompt per line.
/// Replaced wholesale on each load.
#[derive(Debug, Clone, Default)]
pub(crate) struct PromptList {
    prompts: Vec<String>,
}

impl PromptList {
    pub(crate) fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::from_lines(&std::fs::read_to_string(path)?))
    }

    /// Blank lines are discarded; surrounding whitespace is stripped.
    pub(crate) fn from_lines(content: &str) -> Self {
        Self {
            prompts: content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Uniform draw. An empty list warns and yields nothing instead of
    /// failing the caller.
    pub(crate) fn random_prompt(&self) -> Option<String> {
        if self.prompts.is_empty() {
            warn!("No prompts loaded. Please load a prompt file first.");
            return None;
        }
        self.prompts.choose(&mut rand::rng()).cloned()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationSettings {
    pub interval: Duration,
    pub progress_log: Duration,
    pub model_version: String,
    pub style_expert: String,
    pub prepend: String,
    pub append: String,
}

impl GenerationSettings {
    pub(crate) fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.generation.interval_secs),
            progress_log: Duration::from_secs(config.generation.progress_log_secs),
            model_version: config.generation.model_version.clone(),
            style_expert: config.api.style_expert.clone(),
            prepend: config.generation.prepend.clone(),
            append: config.generation.append.clone(),
        }
    }
}

/// Wraps a prompt with the configured prepend/append strings.
pub(crate) fn decorate_prompt(settings: &GenerationSettings, prompt: &str) -> String {
    format!("{} {} {}", settings.prepend, prompt, settings.append)
        .trim()
        .to_string()
}

/// Draws one prompt and fires a generation request. Fire-and-forget: the
/// generated result is neither awaited nor validated beyond the immediate
/// acknowledgement, which is only logged.
pub(crate) async fn generate_once(
    client: &ApiClient,
    settings: &GenerationSettings,
    prompts: &PromptList,
) -> ApiResult<()> {
    let Some(prompt) = prompts.random_prompt() else {
        return Ok(());
    };
    let prompt = decorate_prompt(settings, &prompt);

    client
        .submit_event("V2_GENERATION", json!({ "prompt": prompt }))
        .await?;

    let payload = json!({
        "prompt": prompt,
        "model_version": settings.model_version,
        "private": true,
        "resolution": { "width": 1024, "height": 1024 },
        "sampling_speed": -2,
        "style_expert": settings.style_expert,
        "use_autoprompt_option": "AUTO",
        "user_id": client.user_id(),
    });
    let response = client.generate_sample(payload).await?;
    info!("Image sample generation success: {}", response);
    Ok(())
}

/// Fixed-period auto-generation: one `generate_once` per interval, plus a
/// lower-frequency ticker that logs progress toward the next request. The
/// running flag is the only shared state; there is no true parallelism to
/// guard against.
pub(crate) struct AutoGenerator {
    running: Arc<AtomicBool>,
    generate_handle: Option<JoinHandle<()>>,
    ticker_handle: Option<JoinHandle<()>>,
}

impl AutoGenerator {
    pub(crate) fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            generate_handle: None,
            ticker_handle: None,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starting while already running is a no-op with a warning.
    pub(crate) fn start(
        &mut self,
        client: Arc<ApiClient>,
        prompts: Arc<RwLock<PromptList>>,
        settings: GenerationSettings,
    ) {
        if self.is_running() {
            warn!("Auto generation is already running.");
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let elapsed_ms = Arc::new(AtomicU64::new(0));
        let interval = settings.interval;
        let progress_log = settings.progress_log;

        let generation_elapsed = elapsed_ms.clone();
        self.generate_handle = Some(tokio::spawn(async move {
            // The first request fires after one full interval, not immediately.
            let mut ticker = interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                let snapshot = prompts.read().clone();
                if let Err(e) = generate_once(&client, &settings, &snapshot).await {
                    error!("Error in image generation: {}", e);
                }
                generation_elapsed.store(0, Ordering::SeqCst);
            }
        }));

        let interval_ms = interval.as_millis() as u64;
        let step_ms = progress_log.as_millis() as u64;
        self.ticker_handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + progress_log, progress_log);
            loop {
                ticker.tick().await;
                let total = elapsed_ms.fetch_add(step_ms, Ordering::SeqCst) + step_ms;
                let percentage = (total as f64 / interval_ms as f64 * 100.0).min(100.0);
                info!("Progress: {:.2}% until next request", percentage);
            }
        }));

        info!(
            "Auto generation started (one request every {} seconds).",
            interval.as_secs()
        );
    }

    /// Stopping while not running is a no-op with a warning.
    pub(crate) fn stop(&mut self) {
        if !self.is_running() {
            warn!("Auto generation is not running.");
            return;
        }

        if let Some(handle) = self.generate_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.ticker_handle.take() {
            handle.abort();
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Auto generation stopped.");
    }
}

impl Drop for AutoGenerator {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_lines_are_discarded() {
        let list = PromptList::from_lines("a cat\n\n  \na dog\r\nan owl\n");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn empty_list_yields_none() {
        let list = PromptList::from_lines("\n\n");
        assert_eq!(list.random_prompt(), None);
    }

    #[test]
    fn random_prompt_draws_from_the_list() {
        let list = PromptList::from_lines("only prompt\n");
        assert_eq!(list.random_prompt().as_deref(), Some("only prompt"));
    }

    #[test]
    fn decoration_trims_when_affixes_are_empty() {
        let mut settings = GenerationSettings {
            interval: Duration::from_secs(125),
            progress_log: Duration::from_secs(10),
            model_version: "V_1_5".to_string(),
            style_expert: "ILLUSTRATION".to_string(),
            prepend: String::new(),
            append: String::new(),
        };
        assert_eq!(decorate_prompt(&settings, "a cat"), "a cat");

        settings.prepend = "masterpiece,".to_string();
        settings.append = "8k".to_string();
        assert_eq!(decorate_prompt(&settings, "a cat"), "masterpiece, a cat 8k");
    }
}
