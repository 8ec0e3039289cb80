// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Domain models and core data structures.
//!
//! This module defines the central entities of the application: albums, the
//! charts they appear on, and the per-chart [`Ranking`] that ties the two
//! together over time.

pub(crate) mod chart;
pub(crate) mod date;
pub(crate) mod ranking;

use std::{collections::BTreeMap, fmt};

use tracing::debug;

pub(crate) use chart::{Chart, ChartEntries, ChartKind, RejectSection};
pub(crate) use ranking::{HistoryEntry, Rank, RankHistory, Ranking};

/// Column heading used when no listener names are given.
pub(crate) const GENERIC_LISTENER: &str = "Listened?";

/// Whether someone has listened to an album.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Listened {
    Yes,
    No,
    #[default]
    Unknown,
}

impl Listened {
    /// Parses the spreadsheet spelling; anything other than yes/no is unknown.
    pub(crate) fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Listened::Yes,
            "no" | "n" => Listened::No,
            _ => Listened::Unknown,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Listened::Yes => "Yes",
            Listened::No => "No",
            Listened::Unknown => "?",
        }
    }
}

impl fmt::Display for Listened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The listener columns for a roster: the names given, or the single
/// generic column when the roster is empty.
pub(crate) fn listener_columns(roster: &[String]) -> Vec<String> {
    if roster.is_empty() {
        vec![GENERIC_LISTENER.to_string()]
    } else {
        roster.to_vec()
    }
}

/// Web links and library status for an album.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Links {
    pub(crate) album_url: String,
    pub(crate) artist_url: String,
    /// Streaming service link; `None` when the album is not streamable.
    pub(crate) streaming: Option<String>,
    pub(crate) in_local_library: bool,
    pub(crate) purchased: bool,
    pub(crate) jointly_listened: bool,
    pub(crate) listened: BTreeMap<String, Listened>,
}

impl Links {
    pub(crate) fn on_streaming(&self) -> bool {
        self.streaming.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Album {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) artist: String,
    pub(crate) year: u16,
    pub(crate) genre: String,
    pub(crate) rating: f64,
    pub(crate) rating_count: u32,
    pub(crate) qwr: Option<f64>,
    /// Total running time as `m:ss`, when known.
    pub(crate) duration: Option<String>,
    pub(crate) country: Option<String>,
    pub(crate) rankings: BTreeMap<String, Ranking>,
    pub(crate) links: Links,
}

impl Album {
    pub(crate) fn new(id: &str, title: &str, artist: &str, year: u16) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            year,
            genre: String::new(),
            rating: 0.0,
            rating_count: 0,
            qwr: None,
            duration: None,
            country: None,
            rankings: BTreeMap::new(),
            links: Links::default(),
        }
    }

    pub(crate) fn ranking(&self, chart: &str) -> Option<&Ranking> {
        self.rankings.get(chart)
    }

    /// Records a rank on a chart, creating the chart's ranking on first sight.
    pub(crate) fn add_ranking(&mut self, chart: &str, rank: Rank, date: &str) {
        self.rankings
            .entry(chart.to_string())
            .or_insert_with(|| Ranking::new(chart))
            .set_ranking(rank, date);
    }

    /// Drops a chart's ranking entirely. Only used when decommissioning a
    /// chart.
    pub(crate) fn delete_ranking(&mut self, chart: &str) -> Option<Ranking> {
        self.rankings.remove(chart)
    }

    /// Fills in listening state for a freshly created album.
    ///
    /// An empty roster paired with a single value fills the generic column.
    /// Otherwise the block must match the roster one-to-one; a mismatched
    /// block is ignored.
    pub(crate) fn set_listening_info(&mut self, block: &[Listened], roster: &[String]) {
        if roster.is_empty() && block.len() == 1 {
            self.links
                .listened
                .insert(GENERIC_LISTENER.to_string(), block[0]);
        } else if roster.len() == block.len() {
            for (listener, status) in roster.iter().zip(block) {
                self.links.listened.insert(listener.clone(), *status);
            }
        } else {
            debug!(album = %self.id, "Listening block does not match roster, ignoring");
        }
    }

    /// Merges listening state into an existing album.
    ///
    /// With `literal` every value overwrites. Otherwise `Yes` always wins and
    /// `No` only replaces an unknown state. Listeners not seen before are
    /// added as given.
    pub(crate) fn sync_listened(&mut self, block: &[Listened], roster: &[String], literal: bool) {
        if block.len() != roster.len() {
            debug!(album = %self.id, "Listening block does not match roster, ignoring");
            return;
        }

        for (listener, status) in roster.iter().zip(block) {
            match self.links.listened.get_mut(listener) {
                Some(current) => {
                    let replace = literal
                        || *status == Listened::Yes
                        || (*status == Listened::No && *current == Listened::Unknown);
                    if replace {
                        *current = *status;
                    }
                }
                None => {
                    debug!(album = %self.id, %listener, "New listener profile");
                    self.links.listened.insert(listener.clone(), *status);
                }
            }
        }
    }

    /// Listening state for a listener, unknown if never recorded.
    pub(crate) fn listened_by(&self, listener: &str) -> Listened {
        self.links
            .listened
            .get(listener)
            .copied()
            .unwrap_or_default()
    }
}
