// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Grouping of sorted records into decade epochs.
//!
//! [`group_by_key`] is generic over the key derivation and only merges
//! *adjacent* items, so callers must sort their input in an order compatible
//! with the key. [`group_into_epochs`] applies the decade key to anything
//! implementing [`Dated`]; because the year is the primary sort key, records
//! sorted by `(year, name)` always keep each decade contiguous.

use std::cmp::Ordering;

use serde::Serialize;

/// Records carrying a release year and a name.
pub trait Dated
{
    /// Four-digit release year.
    fn year(&self,) -> u16;
    /// Title of the record.
    fn name(&self,) -> &str;
}

/// Contiguous run of records sharing the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct Epoch<T,>
{
    /// Shared key, e.g. `"197"` for the seventies.
    pub key:     String,
    /// Members in input order.
    pub members: Vec<T,>,
}

impl<T,> Epoch<T,>
{
    /// Name of the board list representing this epoch (`"197"` → `"1970"`).
    pub fn list_name(&self,) -> String
    {
        format!("{}0", self.key)
    }
}

/// Derives the decade key of a year: its first three digits.
///
/// # Examples
///
/// ```
/// use discoboard::decade_key;
///
/// assert_eq!(decade_key(1975,), "197");
/// assert_eq!(decade_key(2001,), "200");
/// ```
pub fn decade_key(year: u16,) -> String
{
    format!("{:03}", year / 10)
}

/// Groups a pre-sorted sequence into maximal runs sharing a derived key.
///
/// One epoch is produced per run, in first-seen order. The input is not
/// re-sorted: if equal keys are not adjacent they end up in separate epochs.
pub fn group_by_key<T, F,>(items: impl IntoIterator<Item = T,>, mut key_of: F,) -> Vec<Epoch<T,>,>
where
    F: FnMut(&T,) -> String,
{
    let mut epochs: Vec<Epoch<T,>,> = Vec::new();

    for item in items {
        let key = key_of(&item,);
        match epochs.last_mut() {
            Some(current,) if current.key == key => current.members.push(item,),
            _ => epochs.push(Epoch {
                key,
                members: vec![item],
            },),
        }
    }

    epochs
}

/// Orders records by year, then lexicographically by name.
pub fn by_year_and_name<T: Dated,>(a: &T, b: &T,) -> Ordering
{
    a.year().cmp(&b.year(),).then_with(|| a.name().cmp(b.name(),),)
}

/// Sorts records into the `(year, name)` order expected by [`group_into_epochs`].
pub fn sort_dated<T: Dated,>(items: &mut [T],)
{
    items.sort_by(by_year_and_name,);
}

/// Groups records sorted by `(year, name)` into decade epochs.
pub fn group_into_epochs<T: Dated,>(items: impl IntoIterator<Item = T,>,) -> Vec<Epoch<T,>,>
{
    group_by_key(items, |item| decade_key(item.year(),),)
}
