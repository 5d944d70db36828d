// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Settings document controlling a synchronization run.
//!
//! Every field is optional in YAML and falls back to the documented service
//! defaults, so an empty document is a valid configuration. Command-line flags
//! override the loaded values before [`SyncSettings::validate`] runs.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    board::{DEFAULT_API_BASE, RequestQuota},
    error::{self, Error},
    metadata::{CatalogPaging, MetadataEndpoints},
    orchestrator::{SyncOptions, default_board_name},
    retry::RetryPolicy,
};

/// Largest page the metadata service accepts for album listings.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Root settings document.
///
/// # Examples
///
/// ```
/// use discoboard::parse_settings;
///
/// let yaml = r#"
/// subject: Joni Mitchell
/// retry:
///   max_attempts: 3
/// "#;
/// let settings = parse_settings(yaml,).expect("valid settings",);
/// assert_eq!(settings.board_name(), "Joni Mitchell's discography");
/// assert_eq!(settings.retry_policy().max_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize,)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings
{
    /// Name of the subject whose catalog is mirrored.
    pub subject:           String,
    /// Optional board title override.
    #[serde(alias = "board-name", alias = "boardName")]
    pub board_name:        Option<String,>,
    /// Wait for cover attachments before exiting.
    #[serde(alias = "await-attachments", alias = "awaitAttachments")]
    pub await_attachments: bool,
    /// Retry behavior of remote calls.
    pub retry:             RetrySettings,
    /// Board service request quota.
    pub quota:             QuotaSettings,
    /// Catalog listing pagination.
    pub catalog:           CatalogSettings,
    /// Remote service base URLs.
    pub endpoints:         EndpointSettings,
}

impl Default for SyncSettings
{
    fn default() -> Self
    {
        Self {
            subject:           "Bob Dylan".to_owned(),
            board_name:        None,
            await_attachments: false,
            retry:             RetrySettings::default(),
            quota:             QuotaSettings::default(),
            catalog:           CatalogSettings::default(),
            endpoints:         EndpointSettings::default(),
        }
    }
}

/// Retry section of the settings document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize,)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings
{
    /// Attempts per remote call, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    pub delay_ms:     u64,
}

impl Default for RetrySettings
{
    fn default() -> Self
    {
        Self {
            max_attempts: 5, delay_ms: 10_000,
        }
    }
}

/// Quota section of the settings document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize,)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaSettings
{
    /// Board requests allowed per window.
    pub requests:  u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for QuotaSettings
{
    fn default() -> Self
    {
        Self {
            requests: 100, window_ms: 10_000,
        }
    }
}

/// Catalog section of the settings document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize,)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSettings
{
    /// Items per listing page.
    pub page_size: u32,
    /// Upper bound on listing pages.
    pub max_pages: u32,
}

impl Default for CatalogSettings
{
    fn default() -> Self
    {
        let paging = CatalogPaging::default();
        Self {
            page_size: paging.page_size, max_pages: paging.max_pages,
        }
    }
}

/// Endpoint section of the settings document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize,)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointSettings
{
    /// Metadata service token endpoint.
    pub token_url:    String,
    /// Metadata service API base.
    pub metadata_api: String,
    /// Board service API base.
    pub board_api:    String,
}

impl Default for EndpointSettings
{
    fn default() -> Self
    {
        let metadata = MetadataEndpoints::default();
        Self {
            token_url:    metadata.token_url,
            metadata_api: metadata.api_base,
            board_api:    DEFAULT_API_BASE.to_owned(),
        }
    }
}

impl SyncSettings
{
    /// Checks the settings against the limits of the remote services.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first offending field.
    pub fn validate(&self,) -> Result<(), Error,>
    {
        if self.subject.trim().is_empty() {
            return Err(Error::validation("subject must not be empty",),);
        }
        if self.board_name.as_deref().is_some_and(|name| name.trim().is_empty(),) {
            return Err(Error::validation("board_name must not be empty when set",),);
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::validation("retry.max_attempts must be at least 1",),);
        }
        if self.quota.requests == 0 || self.quota.window_ms == 0 {
            return Err(Error::validation("quota must allow at least one request per non-empty window",),);
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.catalog.page_size,) {
            return Err(Error::validation(format!(
                "catalog.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.catalog.page_size
            ),),);
        }
        if self.catalog.max_pages == 0 {
            return Err(Error::validation("catalog.max_pages must be at least 1",),);
        }
        for (field, url,) in [
            ("endpoints.token_url", &self.endpoints.token_url,),
            ("endpoints.metadata_api", &self.endpoints.metadata_api,),
            ("endpoints.board_api", &self.endpoints.board_api,),
        ] {
            if !url.starts_with("http://",) && !url.starts_with("https://",) {
                return Err(Error::validation(format!("{field} must be an http(s) URL, got '{url}'"),),);
            }
        }

        Ok((),)
    }

    /// Board title, derived from the subject unless overridden.
    pub fn board_name(&self,) -> String
    {
        self.board_name.clone().unwrap_or_else(|| default_board_name(&self.subject,),)
    }

    /// Retry policy for every remote call.
    pub fn retry_policy(&self,) -> RetryPolicy
    {
        RetryPolicy::new(self.retry.max_attempts, self.retry.delay_ms,)
    }

    /// Request quota of the board service.
    pub fn request_quota(&self,) -> RequestQuota
    {
        RequestQuota {
            requests: self.quota.requests,
            window:   Duration::from_millis(self.quota.window_ms,),
        }
    }

    /// Pagination of the catalog listing.
    pub fn paging(&self,) -> CatalogPaging
    {
        CatalogPaging {
            page_size: self.catalog.page_size, max_pages: self.catalog.max_pages,
        }
    }

    /// Metadata service endpoints.
    pub fn metadata_endpoints(&self,) -> MetadataEndpoints
    {
        MetadataEndpoints {
            token_url: self.endpoints.token_url.clone(),
            api_base:  self.endpoints.metadata_api.trim_end_matches('/',).to_owned(),
        }
    }

    /// Orchestrator options for the configured subject and board.
    pub fn sync_options(&self,) -> SyncOptions
    {
        SyncOptions {
            board_name:        self.board_name(),
            subject:           self.subject.clone(),
            retry:             self.retry_policy(),
            await_attachments: self.await_attachments,
        }
    }
}

/// Loads settings from a YAML file.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and the errors of
/// [`parse_settings`] otherwise.
pub fn load_settings(path: &Path,) -> Result<SyncSettings, Error,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    parse_settings(&contents,)
}

/// Parses and validates a YAML settings document.
///
/// An empty document yields the defaults.
///
/// # Errors
///
/// Propagates [`Error::Settings`] when the YAML cannot be decoded and
/// [`Error::Validation`] when a value is out of range.
pub fn parse_settings(contents: &str,) -> Result<SyncSettings, Error,>
{
    let settings = if contents.trim().is_empty() {
        SyncSettings::default()
    } else {
        serde_yaml::from_str::<SyncSettings,>(contents,)?
    };
    settings.validate()?;
    Ok(settings,)
}
