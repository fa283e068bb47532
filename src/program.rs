use std::env::current_dir;
use std::sync::Arc;

use anyhow::Error;
use console::Term;
use log::{error, info, trace};
use parking_lot::RwLock;

use crate::ideogram::auth::AUTH_NAME;
use crate::ideogram::cli;
use crate::ideogram::config::CONFIG_NAME;
use crate::ideogram::{
    ApiClient, AppConfig, AutoGenerator, Credential, EagleClient, PromptList, SeenIndex,
};

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a menu action may need, built once at startup and passed down
/// explicitly. Shared mutable state is limited to the credential, the prompt
/// list and the auto-generation handle.
pub(crate) struct Session {
    pub config: AppConfig,
    pub credential: Arc<RwLock<Credential>>,
    pub client: Arc<ApiClient>,
    pub eagle: EagleClient,
    pub seen: SeenIndex,
    pub prompts: Arc<RwLock<PromptList>>,
    pub auto: AutoGenerator,
}

/// Handles the flow of the harvester user experience and steps of execution.
pub(crate) struct Program;

impl Program {
    /// Creates a new instance of the program.
    pub(crate) fn new() -> Self {
        Self
    }

    /// Runs the harvester program.
    pub(crate) async fn run(&self) -> Result<(), Error> {
        Term::stdout().set_title("ideogram harvester");
        trace!("Starting ideogram harvester...");
        trace!("Program Name: {}", NAME);
        trace!("Program Version: {}", VERSION);
        if let Ok(dir) = current_dir() {
            trace!("Program Working Directory: {}", dir.display());
        }

        trace!("Checking if config file exists...");
        let config = AppConfig::load_or_create(CONFIG_NAME)?;

        trace!("Loading credentials...");
        let credential = Credential::load_or_create(AUTH_NAME)?;
        if credential.is_empty() {
            info!("No credentials stored yet; harvesting actions will be unavailable until they are set.");
        } else {
            trace!("Credential Token: {}", "*".repeat(credential.token().len()));
            trace!("Credential User ID: {}", credential.user_id());
        }
        let credential = Arc::new(RwLock::new(credential));

        let client = Arc::new(ApiClient::new(
            config.api.base_url.clone(),
            credential.clone(),
        )?);
        let eagle = EagleClient::new(
            config.eagle.server_url.clone(),
            config.eagle.folder_id.clone(),
        )?;
        let seen = match SeenIndex::open(config.database_file()) {
            Ok(seen) => seen,
            Err(e) => {
                error!("Unable to open the seen-URL index: {}", e);
                return Err(e.into());
            }
        };

        let mut session = Session {
            config,
            credential,
            client,
            eagle,
            seen,
            prompts: Arc::new(RwLock::new(PromptList::default())),
            auto: AutoGenerator::new(),
        };

        cli::run_menu(&mut session).await?;
        info!("Exiting at user request...");
        Ok(())
    }
}
