// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Replays grouped catalog entries into the board service.
///
/// One board is created first. Then every epoch becomes a list and every
/// entry a card, with lists requested concurrently once the board exists
/// and the cards of a list requested concurrently once that list exists.
/// Positions are explicit (1-based), so presentation order does not depend
/// on completion order. Cover images are resolved by the matcher before any
/// card is created; entries without a catalog match are looked up through
/// [`CoverSearch`] while their card is being created.
///
/// Every remote call goes through [`retry_fixed`]. A call that exhausts its
/// retries only abandons its own list, card or cover; siblings carry on.
use std::sync::Arc;

use futures::future::join_all;
use indicatif::ProgressBar;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    board::{BoardId, BoardService, CardId, ListId},
    catalog::Entry,
    epoch::Epoch,
    error::Error,
    matcher::{CoverSource, plan_covers},
    metadata::{CatalogItem, CoverSearch},
    retry::{RetryPolicy, retry_fixed},
};

/// Run-level options of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct SyncOptions
{
    /// Name of the board to create.
    pub board_name:        String,
    /// Subject name used in fallback album searches.
    pub subject:           String,
    /// Retry policy applied to every remote call.
    pub retry:             RetryPolicy,
    /// Wait for cover attachments before reporting completion.
    ///
    /// When `false` (the default) attachments are detached: [`Orchestrator::run`]
    /// returns as soon as every card exists and the attachment requests are
    /// handed back in [`SyncReport::pending`].
    pub await_attachments: bool,
}

impl SyncOptions
{
    /// Options with the default board name derived from the subject.
    pub fn for_subject(subject: impl Into<String,>,) -> Self
    {
        let subject = subject.into();
        Self {
            board_name: default_board_name(&subject,),
            subject,
            retry: RetryPolicy::default(),
            await_attachments: false,
        }
    }
}

/// Default board title for a subject.
pub fn default_board_name(subject: &str,) -> String
{
    format!("{subject}'s discography")
}

/// Outcome of the cover step of one card.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum CoverOutcome
{
    /// The attachment was created before the run returned.
    Attached
    {
        /// Image URL set as cover.
        url: String,
    },
    /// The attachment request was detached and may still be running.
    Requested
    {
        /// Image URL being set as cover.
        url: String,
    },
    /// No image is available for this entry.
    Unavailable,
    /// The fallback search or the attachment gave up.
    Failed
    {
        /// Error reported by the last attempt.
        reason: String,
    },
    /// The card itself could not be created.
    Skipped,
}

/// Outcome of one card.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct CardReport
{
    /// Local entry the card represents.
    pub entry:    Entry,
    /// 1-based position inside the list.
    pub position: usize,
    /// Created card, if creation succeeded.
    pub card_id:  Option<CardId,>,
    /// Creation error, if creation gave up.
    pub error:    Option<String,>,
    /// Cover step outcome.
    pub cover:    CoverOutcome,
}

/// Outcome of one epoch list and its cards.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct EpochReport
{
    /// Epoch key.
    pub key:      String,
    /// 1-based position on the board.
    pub position: usize,
    /// Created list, if creation succeeded.
    pub list_id:  Option<ListId,>,
    /// Creation error, if creation gave up.
    pub error:    Option<String,>,
    /// Card outcomes in entry order.
    pub cards:    Vec<CardReport,>,
}

/// Detached attachment requests still owned by the caller.
#[derive(Debug, Default,)]
pub struct PendingAttachments
{
    handles: Vec<(CardId, JoinHandle<Result<(), Error,>,>,),>,
}

/// Final tally of detached attachments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq,)]
pub struct AttachmentSummary
{
    /// Attachments that were created.
    pub attached: usize,
    /// Attachments that gave up or whose task aborted.
    pub failed:   usize,
}

impl PendingAttachments
{
    /// Number of detached requests.
    pub fn len(&self,) -> usize
    {
        self.handles.len()
    }

    /// Returns `true` when nothing was detached.
    pub fn is_empty(&self,) -> bool
    {
        self.handles.is_empty()
    }

    /// Waits for every detached request to finish.
    pub async fn wait(self,) -> AttachmentSummary
    {
        let (cards, handles,): (Vec<CardId,>, Vec<_,>,) = self.handles.into_iter().unzip();
        let mut summary = AttachmentSummary::default();

        for (card, joined,) in cards.into_iter().zip(join_all(handles,).await,) {
            match joined {
                Ok(Ok((),),) => summary.attached += 1,
                Ok(Err(error,),) => {
                    warn!("Cover attachment for card {} failed: {}", card, error);
                    summary.failed += 1;
                }
                Err(error,) => {
                    warn!("Cover attachment task for card {} aborted: {}", card, error);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

/// Result of a synchronization run.
#[derive(Debug,)]
pub struct SyncReport
{
    /// The board created by this run.
    pub board_id: BoardId,
    /// Per-epoch outcomes in board order.
    pub epochs:   Vec<EpochReport,>,
    /// Detached attachment requests (empty when attachments were awaited).
    pub pending:  PendingAttachments,
}

impl SyncReport
{
    /// Number of lists that were created.
    pub fn lists_created(&self,) -> usize
    {
        self.epochs.iter().filter(|epoch| epoch.list_id.is_some(),).count()
    }

    /// Number of cards that were created.
    pub fn cards_created(&self,) -> usize
    {
        self.cards().filter(|card| card.card_id.is_some(),).count()
    }

    /// Number of cards whose cover was attached or requested.
    pub fn covers_requested(&self,) -> usize
    {
        self.cards()
            .filter(|card| {
                matches!(card.cover, CoverOutcome::Attached { .. } | CoverOutcome::Requested { .. })
            },)
            .count()
    }

    /// Human readable descriptions of every isolated failure.
    pub fn failures(&self,) -> Vec<String,>
    {
        let mut failures = Vec::new();
        for epoch in &self.epochs {
            if let Some(error,) = &epoch.error {
                failures.push(format!("list {}0: {error}", epoch.key),);
            }
            for card in &epoch.cards {
                if let Some(error,) = &card.error {
                    failures.push(format!("card '{}': {error}", card.entry),);
                }
                if let CoverOutcome::Failed {
                    reason,
                } = &card.cover
                {
                    failures.push(format!("cover '{}': {reason}", card.entry),);
                }
            }
        }
        failures
    }

    fn cards(&self,) -> impl Iterator<Item = &CardReport,>
    {
        self.epochs.iter().flat_map(|epoch| epoch.cards.iter(),)
    }
}

/// Drives the board → list → card → attachment creation graph.
pub struct Orchestrator<B, S,>
{
    board:    Arc<B,>,
    search:   Arc<S,>,
    options:  SyncOptions,
    progress: ProgressBar,
}

impl<B, S,> Orchestrator<B, S,>
where
    B: BoardService + 'static,
    S: CoverSearch + 'static,
{
    /// Creates an orchestrator over the given services.
    pub fn new(board: Arc<B,>, search: Arc<S,>, options: SyncOptions,) -> Self
    {
        Self {
            board, search, options, progress: ProgressBar::hidden(),
        }
    }

    /// Reports card progress on `progress` instead of a hidden bar.
    pub fn with_progress(mut self, progress: ProgressBar,) -> Self
    {
        self.progress = progress;
        self
    }

    /// Creates the board and replays every epoch into it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RetriesExhausted`] when the board cannot be created.
    /// Failures below the board are recorded in the report instead.
    pub async fn run(
        &self,
        local: &[Epoch<Entry,>],
        remote: &[Epoch<CatalogItem,>],
    ) -> Result<SyncReport, Error,>
    {
        let plan = plan_covers(local, remote,);
        let total: usize = local.iter().map(|epoch| epoch.members.len(),).sum();
        self.progress.set_length(total as u64,);

        info!("Creating board '{}'", self.options.board_name);
        let board_id = retry_fixed(&self.options.retry, "create board", || {
            self.board.create_board(&self.options.board_name,)
        },)
        .await?;

        info!("Creating {} lists with {} cards", local.len(), total);
        let results = join_all(
            local
                .iter()
                .zip(&plan,)
                .enumerate()
                .map(|(index, (epoch, sources,),)| self.sync_epoch(&board_id, index + 1, epoch, sources,),),
        )
        .await;

        let mut pending = PendingAttachments::default();
        let epochs = results
            .into_iter()
            .map(|(report, handles,)| {
                pending.handles.extend(handles,);
                report
            },)
            .collect();

        self.progress.finish_and_clear();
        let report = SyncReport {
            board_id,
            epochs,
            pending,
        };
        info!(
            "Created {} lists and {} cards; {} covers requested, {} failures",
            report.lists_created(),
            report.cards_created(),
            report.covers_requested(),
            report.failures().len()
        );
        Ok(report,)
    }

    async fn sync_epoch(
        &self,
        board_id: &BoardId,
        position: usize,
        epoch: &Epoch<Entry,>,
        sources: &[CoverSource],
    ) -> (EpochReport, Vec<(CardId, JoinHandle<Result<(), Error,>,>,),>,)
    {
        let name = epoch.list_name();
        let created = retry_fixed(&self.options.retry, "create list", || {
            self.board.create_list(board_id, &name, position,)
        },)
        .await;

        let list_id = match created {
            Ok(list_id,) => list_id,
            Err(error,) => {
                warn!("Abandoning list {}: {}", name, error);
                self.progress.inc(epoch.members.len() as u64,);
                let cards = epoch
                    .members
                    .iter()
                    .enumerate()
                    .map(|(index, entry,)| CardReport {
                        entry:    entry.clone(),
                        position: index + 1,
                        card_id:  None,
                        error:    None,
                        cover:    CoverOutcome::Skipped,
                    },)
                    .collect();
                let report = EpochReport {
                    key: epoch.key.clone(),
                    position,
                    list_id: None,
                    error: Some(error.to_string(),),
                    cards,
                };
                return (report, Vec::new(),);
            }
        };

        let outcomes = join_all(
            epoch
                .members
                .iter()
                .zip(sources,)
                .enumerate()
                .map(|(index, (entry, source,),)| self.sync_card(&list_id, index + 1, entry, source,),),
        )
        .await;

        let mut handles = Vec::new();
        let cards = outcomes
            .into_iter()
            .map(|(card, handle,)| {
                handles.extend(handle,);
                card
            },)
            .collect();

        let report = EpochReport {
            key: epoch.key.clone(),
            position,
            list_id: Some(list_id,),
            error: None,
            cards,
        };
        (report, handles,)
    }

    async fn sync_card(
        &self,
        list_id: &ListId,
        position: usize,
        entry: &Entry,
        source: &CoverSource,
    ) -> (CardReport, Option<(CardId, JoinHandle<Result<(), Error,>,>,),>,)
    {
        let title = entry.to_string();
        let (created, cover_url,) = futures::join!(
            retry_fixed(&self.options.retry, "create card", || {
                self.board.create_card(list_id, &title, position,)
            }),
            self.resolve_cover(entry, source)
        );
        self.progress.inc(1,);

        let mut report = CardReport {
            entry: entry.clone(),
            position,
            card_id: None,
            error: None,
            cover: CoverOutcome::Skipped,
        };

        let card_id = match created {
            Ok(card_id,) => card_id,
            Err(error,) => {
                warn!("Abandoning card '{}': {}", entry, error);
                report.error = Some(error.to_string(),);
                return (report, None,);
            }
        };
        report.card_id = Some(card_id.clone(),);

        let url = match cover_url {
            Ok(Some(url,),) => url,
            Ok(None,) => {
                report.cover = CoverOutcome::Unavailable;
                return (report, None,);
            }
            Err(error,) => {
                warn!("No cover for '{}': {}", entry, error);
                report.cover = CoverOutcome::Failed {
                    reason: error.to_string(),
                };
                return (report, None,);
            }
        };

        if self.options.await_attachments {
            report.cover = match attach(&*self.board, &self.options.retry, &card_id, &url,).await {
                Ok((),) => CoverOutcome::Attached {
                    url,
                },
                Err(error,) => {
                    warn!("Cover attachment for '{}' failed: {}", entry, error);
                    CoverOutcome::Failed {
                        reason: error.to_string(),
                    }
                }
            };
            return (report, None,);
        }

        let board = Arc::clone(&self.board,);
        let retry = self.options.retry;
        let task_card = card_id.clone();
        let task_url = url.clone();
        let handle =
            tokio::spawn(async move { attach(&*board, &retry, &task_card, &task_url,).await },);

        report.cover = CoverOutcome::Requested {
            url,
        };
        (report, Some((card_id, handle,),),)
    }

    async fn resolve_cover(&self, entry: &Entry, source: &CoverSource,) -> Result<Option<String,>, Error,>
    {
        match source {
            CoverSource::Catalog(image,) => Ok(Some(image.url.clone(),),),
            CoverSource::Unavailable => Ok(None,),
            CoverSource::Search => {
                let found = retry_fixed(&self.options.retry, "album search", || {
                    self.search.search_cover(&entry.name, &self.options.subject,)
                },)
                .await?;
                Ok(found.map(|image| image.url,),)
            }
        }
    }
}

async fn attach<B: BoardService + ?Sized,>(
    board: &B,
    retry: &RetryPolicy,
    card: &CardId,
    url: &str,
) -> Result<(), Error,>
{
    retry_fixed(retry, "attach cover", || board.attach_cover(card, url,),).await
}
