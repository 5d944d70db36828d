// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Resolution of local entries to remote catalog items.
///
/// Matching runs as one serial pass per epoch, before any card is created,
/// and yields a [`CoverSource`] per entry. Within an epoch a cursor only ever
/// moves forward past claimed items, so no catalog item is claimed twice and
/// later entries only look at items after earlier claims. A scan that finds
/// nothing leaves the cursor where it was and marks the entry for the
/// network fallback search.
use tracing::debug;

use crate::{
    catalog::Entry,
    epoch::Epoch,
    metadata::{CatalogItem, CoverImage},
};

/// Where the cover of one entry comes from.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum CoverSource
{
    /// Claimed catalog item with its best image.
    Catalog(CoverImage,),
    /// Claimed catalog item that lists no image.
    Unavailable,
    /// No catalog item matched; ask the metadata service by name.
    Search,
}

/// Case-insensitive test that `candidate` starts with `wanted`.
///
/// The test is anchored at the start only, so catalog titles carrying a
/// subtitle or edition suffix still match the shorter local name.
///
/// # Examples
///
/// ```
/// use discoboard::names_match;
///
/// assert!(names_match("Blood On The Tracks (Remastered)", "blood on the tracks",));
/// assert!(!names_match("Desire", "Desire Lines",));
/// ```
pub fn names_match(candidate: &str, wanted: &str,) -> bool
{
    candidate.to_lowercase().starts_with(&wanted.to_lowercase(),)
}

/// Forward-only claim cursor over the catalog items of one epoch.
#[derive(Debug,)]
pub struct EpochMatcher<'items,>
{
    items:  &'items [CatalogItem],
    cursor: usize,
}

impl<'items,> EpochMatcher<'items,>
{
    /// Starts a matcher at the beginning of `items`.
    pub fn new(items: &'items [CatalogItem],) -> Self
    {
        Self {
            items, cursor: 0,
        }
    }

    /// Position of the next unclaimed candidate.
    pub fn cursor(&self,) -> usize
    {
        self.cursor
    }

    /// Claims the first item at or after the cursor whose name starts with
    /// `name`. The cursor moves past the claimed item; on a miss it stays put.
    pub fn claim(&mut self, name: &str,) -> Option<&'items CatalogItem,>
    {
        let offset = self.items[self.cursor..]
            .iter()
            .position(|item| names_match(&item.name, name,),)?;

        let claimed = &self.items[self.cursor + offset];
        self.cursor += offset + 1;
        Some(claimed,)
    }
}

/// Resolves every entry of one epoch against that epoch's catalog items.
pub fn plan_epoch(entries: &[Entry], items: &[CatalogItem],) -> Vec<CoverSource,>
{
    let mut matcher = EpochMatcher::new(items,);

    entries
        .iter()
        .map(|entry| match matcher.claim(&entry.name,) {
            Some(item,) => {
                debug!("Matched '{}' to catalog item '{}'", entry.name, item.name);
                item.best_image().cloned().map_or(CoverSource::Unavailable, CoverSource::Catalog,)
            }
            None => {
                debug!("No catalog item for '{}'; falling back to search", entry.name);
                CoverSource::Search
            }
        },)
        .collect()
}

/// Resolves all local epochs, pairing each with the remote epoch of the same
/// key. A local epoch with no remote counterpart searches for every entry.
///
/// The result is indexed like `local`: `plan[i][j]` belongs to
/// `local[i].members[j]`.
pub fn plan_covers(
    local: &[Epoch<Entry,>],
    remote: &[Epoch<CatalogItem,>],
) -> Vec<Vec<CoverSource,>,>
{
    local
        .iter()
        .map(|epoch| {
            let items = remote
                .iter()
                .find(|candidate| candidate.key == epoch.key,)
                .map_or(&[][..], |candidate| candidate.members.as_slice(),);
            plan_epoch(&epoch.members, items,)
        },)
        .collect()
}
