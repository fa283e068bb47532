//! Interactive menu over the harvester's fixed action set.
//! Uses dialoguer for all operator interaction.

use std::time::Duration;

use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use log::{error, info, warn};
use serde_json::json;
use thiserror::Error;

use crate::ideogram::auth::AUTH_NAME;
use crate::ideogram::describe::{self, DescribeSettings};
use crate::ideogram::download::DownloadSettings;
use crate::ideogram::generation::{self, GenerationSettings, PromptList};
use crate::ideogram::harvest::{
    run_harvest, HarvestContext, HarvestReport, PageSource, Timeline, TimelineSource,
    UserGallerySource,
};
use crate::ideogram::uploads;
use crate::program::Session;

#[derive(Error, Debug)]
pub(crate) enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UI interaction error: {0}")]
    Dialoguer(#[from] dialoguer::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

/// Main menu actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MainMenuOption {
    SetCredentials,
    LoadPromptFile,
    GenerateOnce,
    StartAutoGeneration,
    StopAutoGeneration,
    HarvestUserGallery,
    HarvestTimeline,
    DescribeAndSubmit,
    DeleteAllUploads,
    Exit,
}

impl MainMenuOption {
    pub(crate) fn variants() -> &'static [MainMenuOption] {
        &[
            MainMenuOption::SetCredentials,
            MainMenuOption::LoadPromptFile,
            MainMenuOption::GenerateOnce,
            MainMenuOption::StartAutoGeneration,
            MainMenuOption::StopAutoGeneration,
            MainMenuOption::HarvestUserGallery,
            MainMenuOption::HarvestTimeline,
            MainMenuOption::DescribeAndSubmit,
            MainMenuOption::DeleteAllUploads,
            MainMenuOption::Exit,
        ]
    }

    pub(crate) fn display_name(&self) -> &'static str {
        match self {
            MainMenuOption::SetCredentials => "Set credentials",
            MainMenuOption::LoadPromptFile => "Load prompt file",
            MainMenuOption::GenerateOnce => "Generate one image",
            MainMenuOption::StartAutoGeneration => "Start auto generation",
            MainMenuOption::StopAutoGeneration => "Stop auto generation",
            MainMenuOption::HarvestUserGallery => "Harvest my gallery into Eagle",
            MainMenuOption::HarvestTimeline => "Harvest top timeline into Eagle",
            MainMenuOption::DescribeAndSubmit => "Describe images and submit to Eagle",
            MainMenuOption::DeleteAllUploads => "Delete ALL uploads",
            MainMenuOption::Exit => "Exit",
        }
    }
}

/// Runs the menu loop until the operator exits.
pub(crate) async fn run_menu(session: &mut Session) -> CliResult<()> {
    let theme = ColorfulTheme::default();

    loop {
        let names: Vec<&str> = MainMenuOption::variants()
            .iter()
            .map(MainMenuOption::display_name)
            .collect();
        let selection = Select::with_theme(&theme)
            .with_prompt("Select an action")
            .items(&names)
            .default(0)
            .interact()?;

        match MainMenuOption::variants()[selection] {
            MainMenuOption::SetCredentials => set_credentials(session, &theme)?,
            MainMenuOption::LoadPromptFile => load_prompt_file(session, &theme)?,
            MainMenuOption::GenerateOnce => generate_once(session).await,
            MainMenuOption::StartAutoGeneration => start_auto_generation(session, &theme)?,
            MainMenuOption::StopAutoGeneration => session.auto.stop(),
            MainMenuOption::HarvestUserGallery => harvest_user_gallery(session).await,
            MainMenuOption::HarvestTimeline => harvest_timeline(session, &theme).await?,
            MainMenuOption::DescribeAndSubmit => describe_and_submit(session, &theme).await?,
            MainMenuOption::DeleteAllUploads => delete_all_uploads(session, &theme).await?,
            MainMenuOption::Exit => {
                if session.auto.is_running() {
                    session.auto.stop();
                }
                break;
            }
        }
    }

    Ok(())
}

fn set_credentials(session: &Session, theme: &ColorfulTheme) -> CliResult<()> {
    let current = session.credential.read().clone();

    let token: String = Input::with_theme(theme)
        .with_prompt("Bearer token")
        .default(current.token().to_string())
        .allow_empty(true)
        .interact_text()?;
    let user_id: String = Input::with_theme(theme)
        .with_prompt("User ID")
        .default(current.user_id().to_string())
        .allow_empty(true)
        .interact_text()?;
    let user_handle: String = Input::with_theme(theme)
        .with_prompt("User handle")
        .default(current.user_handle().to_string())
        .allow_empty(true)
        .interact_text()?;

    {
        let mut credential = session.credential.write();
        credential.set(
            token.trim().to_string(),
            user_id.trim().to_string(),
            user_handle.trim().to_string(),
        );
        if let Err(e) = credential.save(AUTH_NAME) {
            error!("Unable to save credentials: {}", e);
        }
    }

    let credential = session.credential.read();
    info!("Authentication details set successfully.");
    info!("Bearer Token: {}", "*".repeat(credential.token().len()));
    info!("User ID: {}", credential.user_id());
    info!("User Handle: {}", credential.user_handle());
    Ok(())
}

fn load_prompt_file(session: &Session, theme: &ColorfulTheme) -> CliResult<()> {
    let path: String = Input::with_theme(theme)
        .with_prompt("Path to prompt file (one prompt per line)")
        .interact_text()?;

    match PromptList::load(path.trim()) {
        Ok(list) => {
            info!("Loaded {} prompts.", list.len());
            *session.prompts.write() = list;
        }
        Err(e) => error!("Unable to load prompt file {}: {}", path, e),
    }
    Ok(())
}

async fn generate_once(session: &Session) {
    let settings = GenerationSettings::from_config(&session.config);
    let snapshot = session.prompts.read().clone();
    if let Err(e) = generation::generate_once(&session.client, &settings, &snapshot).await {
        error!("Error in image generation: {}", e);
    }
}

fn start_auto_generation(session: &mut Session, theme: &ColorfulTheme) -> CliResult<()> {
    if session.auto.is_running() {
        warn!("Auto generation is already running.");
        return Ok(());
    }

    let mut settings = GenerationSettings::from_config(&session.config);
    settings.prepend = Input::with_theme(theme)
        .with_prompt("Text to prepend to each prompt (leave blank for none)")
        .default(settings.prepend)
        .allow_empty(true)
        .interact_text()?;
    settings.append = Input::with_theme(theme)
        .with_prompt("Text to append to each prompt (leave blank for none)")
        .default(settings.append)
        .allow_empty(true)
        .interact_text()?;

    session
        .auto
        .start(session.client.clone(), session.prompts.clone(), settings);
    Ok(())
}

fn harvest_context<'a>(session: &'a Session) -> HarvestContext<'a> {
    HarvestContext {
        client: &session.client,
        eagle: &session.eagle,
        seen: &session.seen,
        settings: DownloadSettings::from_config(&session.config),
        item_delay: Duration::from_millis(session.config.rate.item_delay_ms),
    }
}

fn print_report(report: &HarvestReport) {
    println!(
        "{}",
        style(format!(
            "Harvest finished: {} pages, {} downloaded, {} skipped, {} failed.",
            report.pages, report.downloaded, report.skipped, report.failed
        ))
        .green()
    );
}

async fn run_and_report<S: PageSource>(session: &Session, source: &S) {
    let ctx = harvest_context(session);
    match run_harvest(&ctx, source).await {
        Ok(report) => print_report(&report),
        Err(e) => error!("Harvest run aborted: {}", e),
    }
}

async fn harvest_user_gallery(session: &Session) {
    let credential = session.credential.read().clone();
    if !credential.has_token() {
        error!("Bearer token is not set. Use \"Set credentials\" first.");
        return;
    }
    if credential.user_id().is_empty() {
        error!("User ID is not set. Use \"Set credentials\" first.");
        return;
    }

    let source = UserGallerySource::new(&session.client, credential.user_id());
    run_and_report(session, &source).await;
}

async fn harvest_timeline(session: &Session, theme: &ColorfulTheme) -> CliResult<()> {
    if !session.credential.read().has_token() {
        error!("Bearer token is not set. Use \"Set credentials\" first.");
        return Ok(());
    }

    let labels: Vec<&str> = Timeline::variants().iter().map(Timeline::label).collect();
    let selection = Select::with_theme(theme)
        .with_prompt("Timeline")
        .items(&labels)
        .default(0)
        .interact()?;
    let timeline = Timeline::variants()[selection];

    // The site expects the explore-filter event before the search is paged.
    if let Err(e) = session
        .client
        .submit_event(
            "HOME_V2_EXPLORE_FILTER_DROPDOWN_SELECT",
            json!({ "buttonName": timeline.label() }),
        )
        .await
    {
        error!("Error submitting explore filter event: {}", e);
        return Ok(());
    }

    let source = TimelineSource::new(&session.client, timeline, session.config.rate.page_size);
    run_and_report(session, &source).await;
    Ok(())
}

async fn describe_and_submit(session: &Session, theme: &ColorfulTheme) -> CliResult<()> {
    if !session.credential.read().has_token() {
        error!("Bearer token is not set. Use \"Set credentials\" first.");
        return Ok(());
    }

    let dir: String = Input::with_theme(theme)
        .with_prompt("Directory containing the images to describe")
        .interact_text()?;
    let files = match describe::image_files_in(std::path::Path::new(dir.trim())) {
        Ok(files) => files,
        Err(e) => {
            error!("Unable to read directory {}: {}", dir, e);
            return Ok(());
        }
    };
    if files.is_empty() {
        warn!("No image files found in {}.", dir);
        return Ok(());
    }

    let folder_id: String = Input::with_theme(theme)
        .with_prompt("Eagle folder ID to import into")
        .default(session.config.eagle.folder_id.clone())
        .interact_text()?;

    let settings = DescribeSettings::from_config(&session.config);
    let submitted = describe::describe_and_submit(
        &session.client,
        &session.eagle,
        &settings,
        &files,
        folder_id.trim(),
    )
    .await;
    info!("Submitted {}/{} images to Eagle.", submitted, files.len());
    Ok(())
}

async fn delete_all_uploads(session: &Session, theme: &ColorfulTheme) -> CliResult<()> {
    let credential = session.credential.read().clone();
    if credential.is_empty() {
        error!("Bearer token and user ID must be set before deleting uploads.");
        return Ok(());
    }

    let confirmed = Confirm::with_theme(theme)
        .with_prompt("Are you sure you want to delete ALL uploads? This cannot be undone.")
        .default(false)
        .interact()?;
    if !confirmed {
        info!("Bulk delete cancelled.");
        return Ok(());
    }

    match uploads::delete_all_uploads(&session.client, credential.user_id()).await {
        Ok(count) => println!(
            "{}",
            style(format!("Deleted {count} uploads.")).green()
        ),
        Err(e) => error!("Error deleting uploads: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_variant_has_a_display_name() {
        let names: Vec<&str> = MainMenuOption::variants()
            .iter()
            .map(MainMenuOption::display_name)
            .collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names.first(), Some(&"Set credentials"));
        assert_eq!(names.last(), Some(&"Exit"));
    }
}
