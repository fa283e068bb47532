//! Ideogram harvester core.
//!
//! Everything the menu actions drive lives here: the authenticated API
//! client, the bounded-retry downloader, the seen-URL index, the Eagle
//! import client, and the paged harvest pipeline built on top of them.

pub(crate) mod auth;
pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod config;
pub(crate) mod describe;
pub(crate) mod download;
pub(crate) mod eagle;
pub(crate) mod entries;
pub(crate) mod generation;
pub(crate) mod harvest;
pub(crate) mod seen_index;
pub(crate) mod uploads;

#[cfg(test)]
mod tests;

pub(crate) use auth::Credential;
pub(crate) use client::ApiClient;
pub(crate) use config::AppConfig;
pub(crate) use eagle::EagleClient;
pub(crate) use generation::{AutoGenerator, PromptList};
pub(crate) use seen_index::SeenIndex;
