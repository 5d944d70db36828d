// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Project board service (Trello REST API).
///
/// Boards contain lists, lists contain cards, and a card may carry one cover
/// attachment. Every request is authenticated with a static API key and user
/// token passed as query parameters, and waits for a permit from a
/// token-bucket limiter sized to the service's request quota.
use std::{fmt, num::NonZeroU32, time::Duration};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{error::Error, http::read_json};

pub(crate) const DEFAULT_API_BASE: &str = "https://api.trello.com/1";

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash,)]
        pub struct $name(pub String,);

        impl fmt::Display for $name
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
            {
                f.write_str(&self.0,)
            }
        }
    };
}

remote_id!(
    /// Identifier of a created board.
    BoardId
);
remote_id!(
    /// Identifier of a created list.
    ListId
);
remote_id!(
    /// Identifier of a created card.
    CardId
);

/// Operations of the board service used by the orchestrator.
///
/// Each method performs a single attempt; retrying is the caller's concern.
#[async_trait]
pub trait BoardService: Send + Sync
{
    /// Creates an empty board.
    async fn create_board(&self, name: &str,) -> Result<BoardId, Error,>;

    /// Creates a list on `board` at the given 1-based position.
    async fn create_list(&self, board: &BoardId, name: &str, position: usize,) -> Result<ListId, Error,>;

    /// Creates a card on `list` at the given 1-based position.
    async fn create_card(&self, list: &ListId, name: &str, position: usize,) -> Result<CardId, Error,>;

    /// Attaches the image at `url` to `card` and makes it the cover.
    async fn attach_cover(&self, card: &CardId, url: &str,) -> Result<(), Error,>;
}

/// Request quota of the board service: `requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct RequestQuota
{
    /// Requests allowed per window.
    pub requests: u32,
    /// Length of the window.
    pub window:   Duration,
}

impl Default for RequestQuota
{
    fn default() -> Self
    {
        Self {
            requests: 100, window: Duration::from_secs(10,),
        }
    }
}

impl RequestQuota
{
    /// Evenly spaced permits: one every `window / requests`, no burst, so any
    /// window of length `window` grants at most `requests` permits.
    fn to_governor(self,) -> Result<Quota, Error,>
    {
        if self.requests == 0 {
            return Err(Error::validation("quota must allow at least one request",),);
        }
        if self.window.is_zero() {
            return Err(Error::validation("quota window must be longer than zero",),);
        }

        let period = self.window / self.requests;
        Quota::with_period(period,).map(|quota| quota.allow_burst(NonZeroU32::MIN,),).ok_or_else(|| {
            Error::validation(format!(
                "quota of {} requests per {:?} leaves no time between requests",
                self.requests, self.window
            ),)
        },)
    }
}

/// Static credentials of the board service.
#[derive(Clone,)]
pub struct BoardCredentials
{
    /// Application API key.
    pub api_key:    String,
    /// User token authorising writes.
    pub user_token: String,
}

impl fmt::Debug for BoardCredentials
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.debug_struct("BoardCredentials",)
            .field("api_key", &"<redacted>",)
            .field("user_token", &"<redacted>",)
            .finish()
    }
}

#[derive(Debug, Deserialize,)]
struct Created
{
    id: String,
}

/// HTTP implementation of [`BoardService`].
pub struct BoardClient
{
    http:         Client,
    api_base:     String,
    credentials:  BoardCredentials,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock,>,
}

impl fmt::Debug for BoardClient
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.debug_struct("BoardClient",).field("api_base", &self.api_base,).finish_non_exhaustive()
    }
}

impl BoardClient
{
    /// Creates a client against the public API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the quota is empty.
    pub fn new(http: Client, credentials: BoardCredentials, quota: RequestQuota,) -> Result<Self, Error,>
    {
        Self::with_base(http, DEFAULT_API_BASE, credentials, quota,)
    }

    /// Creates a client against a custom API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the quota is empty.
    pub fn with_base(
        http: Client,
        api_base: impl Into<String,>,
        credentials: BoardCredentials,
        quota: RequestQuota,
    ) -> Result<Self, Error,>
    {
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/',).to_owned(),
            credentials,
            rate_limiter: RateLimiter::direct(quota.to_governor()?,),
        },)
    }

    async fn post<T: serde::de::DeserializeOwned,>(
        &self,
        operation: &str,
        resource: &str,
        params: &[(&str, String,)],
    ) -> Result<T, Error,>
    {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.api_base, resource);
        debug!(url = %url, "{}", operation);
        let sent = self
            .http
            .post(&url,)
            .query(params,)
            .query(&[("key", &self.credentials.api_key,), ("token", &self.credentials.user_token,)],)
            .send()
            .await;
        read_json(operation, sent,).await
    }
}

#[async_trait]
impl BoardService for BoardClient
{
    async fn create_board(&self, name: &str,) -> Result<BoardId, Error,>
    {
        let created: Created = self
            .post(
                "create board",
                "boards",
                &[("name", name.to_owned(),), ("defaultLists", "false".to_owned(),)],
            )
            .await?;
        Ok(BoardId(created.id,),)
    }

    async fn create_list(&self, board: &BoardId, name: &str, position: usize,) -> Result<ListId, Error,>
    {
        let created: Created = self
            .post(
                "create list",
                "lists",
                &[
                    ("name", name.to_owned(),),
                    ("idBoard", board.0.clone(),),
                    ("pos", position.to_string(),),
                ],
            )
            .await?;
        Ok(ListId(created.id,),)
    }

    async fn create_card(&self, list: &ListId, name: &str, position: usize,) -> Result<CardId, Error,>
    {
        let created: Created = self
            .post(
                "create card",
                "cards",
                &[
                    ("name", name.to_owned(),),
                    ("idList", list.0.clone(),),
                    ("pos", position.to_string(),),
                ],
            )
            .await?;
        Ok(CardId(created.id,),)
    }

    async fn attach_cover(&self, card: &CardId, url: &str,) -> Result<(), Error,>
    {
        let _: serde_json::Value = self
            .post(
                "attach cover",
                &format!("cards/{}/attachments", card.0),
                &[("url", url.to_owned(),), ("setCover", "true".to_owned(),)],
            )
            .await?;
        Ok((),)
    }
}
