// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Mirrors a dated plain-text catalog into a project board.
//!
//! The local catalog is parsed into `(year, name)` entries and grouped into
//! decade epochs. The same grouping is applied to the subject's catalog on a
//! remote metadata service, whose items carry cover images. A serial matching
//! pass pairs local entries with remote items, then the orchestrator creates
//! one board, one list per epoch and one card per entry, attaching the
//! matched cover to each card. Remote calls are retried with a fixed delay and
//! failures are isolated to the entity that failed.

mod board;
mod catalog;
mod config;
mod epoch;
mod error;
mod http;
mod matcher;
mod metadata;
mod orchestrator;
mod retry;

pub use board::{BoardClient, BoardCredentials, BoardId, BoardService, CardId, ListId, RequestQuota};
pub use catalog::{Entry, load_catalog, parse_catalog};
pub use config::{
    CatalogSettings, EndpointSettings, MAX_PAGE_SIZE, QuotaSettings, RetrySettings, SyncSettings,
    load_settings, parse_settings,
};
pub use epoch::{Dated, Epoch, by_year_and_name, decade_key, group_by_key, group_into_epochs, sort_dated};
pub use error::{Error, io_error};
pub use http::build_client;
pub use matcher::{CoverSource, EpochMatcher, names_match, plan_covers, plan_epoch};
pub use metadata::{
    CatalogItem, CatalogPaging, CoverImage, CoverSearch, MetadataClient, MetadataCredentials,
    MetadataEndpoints, Subject, album_query, collect_pages,
};
pub use orchestrator::{
    AttachmentSummary, CardReport, CoverOutcome, EpochReport, Orchestrator, PendingAttachments,
    SyncOptions, SyncReport, default_board_name,
};
pub use retry::{RetryPolicy, retry_fixed};
