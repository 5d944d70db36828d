// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Parser for the locally maintained catalog of dated works.
//!
//! The catalog is plain text with one `<year> <name>` record per line. A
//! single trailing empty line is tolerated; every other line must carry a
//! four-digit year, one space and a non-empty name. Parsing is all or
//! nothing: the first malformed line aborts with
//! [`Error::MalformedRecord`].

use std::{fmt, fs, path::Path, sync::OnceLock};

use regex::Regex;
use serde::Serialize;

use crate::{
    epoch::{Dated, sort_dated},
    error::{self, Error},
};

/// Number of digits a catalog year must have.
const YEAR_DIGITS: usize = 4;

fn record_pattern() -> &'static Regex
{
    static PATTERN: OnceLock<Regex,> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]+) (.+)$",).expect("static pattern compiles",),)
}

/// A single local catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize,)]
pub struct Entry
{
    /// Four-digit release year.
    pub year: u16,
    /// Title of the work.
    pub name: String,
}

impl Entry
{
    /// Builds an entry from its parts.
    pub fn new(year: u16, name: impl Into<String,>,) -> Self
    {
        Self {
            year, name: name.into(),
        }
    }
}

impl Dated for Entry
{
    fn year(&self,) -> u16
    {
        self.year
    }

    fn name(&self,) -> &str
    {
        &self.name
    }
}

impl fmt::Display for Entry
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        write!(f, "{:04} - {}", self.year, self.name)
    }
}

/// Reads and parses the catalog stored at `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and
/// [`Error::MalformedRecord`] for the first line that fails the pattern.
pub fn load_catalog(path: &Path,) -> Result<Vec<Entry,>, Error,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    parse_catalog(&contents,)
}

/// Parses catalog text into entries sorted by `(year, name)`.
///
/// # Examples
///
/// ```
/// use discoboard::parse_catalog;
///
/// let entries = parse_catalog("1976 Desire\n1975 Blood on the Tracks\n",).expect("valid catalog",);
/// assert_eq!(entries[0].name, "Blood on the Tracks");
/// assert_eq!(entries[1].year, 1976);
/// ```
///
/// # Errors
///
/// Returns [`Error::MalformedRecord`] when a line lacks a leading digit run
/// followed by a space, when the year is not exactly four digits, or when the
/// name is empty.
pub fn parse_catalog(contents: &str,) -> Result<Vec<Entry,>, Error,>
{
    let mut entries = contents
        .lines()
        .enumerate()
        .map(|(index, line,)| parse_record(index + 1, line,),)
        .collect::<Result<Vec<_,>, _,>>()?;

    sort_dated(&mut entries,);
    Ok(entries,)
}

fn parse_record(line: usize, content: &str,) -> Result<Entry, Error,>
{
    let malformed = || Error::MalformedRecord {
        line,
        content: content.to_owned(),
    };

    let captures = record_pattern().captures(content,).ok_or_else(malformed,)?;
    let digits = &captures[1];
    if digits.len() != YEAR_DIGITS {
        return Err(malformed(),);
    }

    let year = digits.parse::<u16,>().map_err(|_| malformed(),)?;
    Ok(Entry::new(year, &captures[2],),)
}
