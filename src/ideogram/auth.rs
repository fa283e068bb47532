use std::fs::{read_to_string, write};
use std::path::Path;

use anyhow::Error;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{from_str, to_string_pretty};

/// Name of the credential file.
pub(crate) const AUTH_NAME: &str = "auth.json";

/// `Credential` holds the bearer token and user identity used for all API calls.
///
/// The token is supplied once by the operator, held in memory for the session
/// and persisted so the next startup can reload it. There is no expiry logic;
/// an invalid token only surfaces as HTTP failures.
#[derive(Serialize, Deserialize, Clone, Default)]
pub(crate) struct Credential {
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "UserId")]
    user_id: String,
    #[serde(rename = "UserHandle")]
    user_handle: String,
}

impl Credential {
    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn user_id(&self) -> &str {
        &self.user_id
    }

    pub(crate) fn user_handle(&self) -> &str {
        &self.user_handle
    }

    pub(crate) fn set(&mut self, token: String, user_id: String, user_handle: String) {
        self.token = token;
        self.user_id = user_id;
        self.user_handle = user_handle;
    }

    /// Checks whether the credential is missing the parts harvesting needs.
    pub(crate) fn is_empty(&self) -> bool {
        self.token.is_empty() || self.user_id.is_empty()
    }

    pub(crate) fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// Loads the credential file or creates an empty one if it doesn't exist.
    pub(crate) fn load_or_create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if path.exists() {
            let credential: Credential = from_str(&read_to_string(path)?)?;
            return Ok(credential);
        }

        let credential = Credential::default();
        credential.save(path)?;
        info!("The credential file was created.");
        info!("Use \"Set credentials\" in the menu to store your bearer token, user id and handle.");
        warn!("Treat your bearer token like a password; do not share the credential file.");
        Ok(credential)
    }

    pub(crate) fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        write(path, to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");

        let mut credential = Credential::load_or_create(&path).unwrap();
        assert!(credential.is_empty());

        credential.set("tok".into(), "u1".into(), "handle".into());
        credential.save(&path).unwrap();

        let reloaded = Credential::load_or_create(&path).unwrap();
        assert_eq!(reloaded.token(), "tok");
        assert_eq!(reloaded.user_id(), "u1");
        assert_eq!(reloaded.user_handle(), "handle");
        assert!(!reloaded.is_empty());
    }

    #[test]
    fn missing_user_id_counts_as_empty() {
        let mut credential = Credential::default();
        credential.set("tok".into(), String::new(), String::new());
        assert!(credential.is_empty());
        assert!(credential.has_token());
    }
}
