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

//! Per-chart rank tracking.
//!
//! A [`Ranking`] belongs to exactly one album and one chart. It holds the
//! current rank together with an append-only [`RankHistory`] of the states it
//! replaced.
//!
//! Every call to [`Ranking::set_ranking`] snapshots the current state into the
//! history *before* overwriting it, so the very first call records the
//! `(Unranked, "")` placeholder as `history[0]`.

use std::fmt;

use tracing::debug;

/// A position on a chart at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) enum Rank {
    /// The album has never been ranked on this chart.
    #[default]
    Unranked,
    /// 1-based chart position.
    Ranked(u32),
    /// The album was on the chart but is not anymore.
    Rejected,
}

impl Rank {
    pub(crate) fn is_rejected(self) -> bool {
        self == Rank::Rejected
    }

    /// The integer form used by storage: `-1` rejected, `0` unranked.
    pub(crate) fn to_code(self) -> i64 {
        match self {
            Rank::Unranked => 0,
            Rank::Ranked(position) => i64::from(position),
            Rank::Rejected => -1,
        }
    }

    pub(crate) fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Rank::Rejected),
            0 => Some(Rank::Unranked),
            n if n > 0 => u32::try_from(n).ok().map(Rank::Ranked),
            _ => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Unranked => write!(f, "-"),
            Rank::Ranked(position) => write!(f, "#{}", position),
            Rank::Rejected => write!(f, "rejected"),
        }
    }
}

/// One recorded prior state of a ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HistoryEntry {
    pub(crate) rank: Rank,
    pub(crate) date: String,
}

impl HistoryEntry {
    pub(crate) fn new(rank: Rank, date: impl Into<String>) -> Self {
        Self {
            rank,
            date: date.into(),
        }
    }
}

/// Append-only, oldest-first log of ranking states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RankHistory {
    entries: Vec<HistoryEntry>,
}

impl RankHistory {
    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the first entry of the trailing run of entries matching
    /// `pred`, or `None` if the most recent entry does not match.
    ///
    /// The log is walked backwards from the newest entry and the walk stops
    /// at the first entry that fails the predicate.
    pub(crate) fn trailing_run_start<P>(&self, pred: P) -> Option<&HistoryEntry>
    where
        P: Fn(&HistoryEntry) -> bool,
    {
        self.entries
            .iter()
            .rev()
            .take_while(|&entry| pred(entry))
            .last()
    }
}

impl FromIterator<HistoryEntry> for RankHistory {
    fn from_iter<I: IntoIterator<Item = HistoryEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Rank info and history for a single album on a single chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ranking {
    pub(crate) chart: String,
    pub(crate) rank: Rank,
    pub(crate) last_updated: String,
    pub(crate) history: RankHistory,
}

impl Ranking {
    /// Creates a ranking in its unset state: unranked, never updated.
    pub(crate) fn new(chart: impl Into<String>) -> Self {
        Self {
            chart: chart.into(),
            rank: Rank::Unranked,
            last_updated: String::new(),
            history: RankHistory::default(),
        }
    }

    pub(crate) fn is_rejected(&self) -> bool {
        self.rank.is_rejected()
    }

    /// Records a new observation of this album on the chart.
    ///
    /// The state being replaced is appended to the history first. This is not
    /// idempotent: repeating a call appends another entry.
    pub(crate) fn set_ranking(&mut self, rank: Rank, date: &str) {
        if self.history.is_empty() {
            debug!(chart = %self.chart, %rank, "Ranking album for the first time");
        } else {
            debug!(chart = %self.chart, from = %self.rank, to = %rank, "Updating ranking");
        }

        self.history
            .push(HistoryEntry::new(self.rank, self.last_updated.clone()));
        self.rank = rank;
        self.last_updated = date.to_string();
    }

    /// The date the album's current rejection run began.
    ///
    /// Returns `None` unless the album is currently rejected. The current
    /// state counts as the newest element of the run, so an album rejected
    /// once reports the date of that rejection.
    pub(crate) fn first_rejected_on(&self) -> Option<&str> {
        if !self.is_rejected() {
            return None;
        }

        let date = self
            .history
            .trailing_run_start(|entry| entry.rank.is_rejected())
            .map_or(self.last_updated.as_str(), |entry| entry.date.as_str());

        Some(date)
    }
}
