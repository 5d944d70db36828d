// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Response handling shared by the metadata and board clients.
use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::error::Error;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30,);

/// Builds the HTTP client used by both remote services.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the TLS backend cannot be initialised.
pub fn build_client() -> Result<Client, Error,>
{
    Client::builder()
        .user_agent(USER_AGENT,)
        .timeout(REQUEST_TIMEOUT,)
        .build()
        .map_err(|e| Error::validation(format!("failed to build HTTP client: {e}"),),)
}

/// Turns a sent request into a decoded JSON body.
///
/// Transport errors, non-success statuses and undecodable bodies all map to
/// [`Error::RemoteCall`] so the retry executor can absorb them.
pub(crate) async fn read_json<T: DeserializeOwned,>(
    operation: &str,
    sent: Result<Response, reqwest::Error,>,
) -> Result<T, Error,>
{
    let response = sent.map_err(|e| Error::remote(operation, e.to_string(),),)?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::remote(operation, format!("{status}: {}", body.trim()),),);
    }

    response.json::<T,>().await.map_err(|e| Error::remote(operation, format!("invalid body: {e}"),),)
}
