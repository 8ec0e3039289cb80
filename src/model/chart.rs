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

//! Charts and their entry slots.

use std::collections::HashSet;

use tracing::debug;

/// A fixed-length sequence of chart slots, one per rank position.
///
/// Slot `i` holds the album ranked `i + 1`, or `None` when the position is
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ChartEntries {
    slots: Vec<Option<String>>,
}

impl ChartEntries {
    pub(crate) fn with_size(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resizes to `size` slots and returns the slots held before.
    ///
    /// Growing pads with empty slots at the end, shrinking drops trailing
    /// slots. Either way the sequence stays flat.
    pub(crate) fn resize(&mut self, size: usize) -> Vec<Option<String>> {
        let old = self.slots.clone();
        self.slots.resize(size, None);
        old
    }

    /// The album at a 1-based rank, if any.
    pub(crate) fn get(&self, rank: usize) -> Option<&str> {
        rank.checked_sub(1)
            .and_then(|index| self.slots.get(index))
            .and_then(|slot| slot.as_deref())
    }

    /// Places an album at a 1-based rank. Ranks outside the chart are ignored.
    pub(crate) fn set(&mut self, rank: usize, album_id: &str) -> bool {
        match rank.checked_sub(1).and_then(|index| self.slots.get_mut(index)) {
            Some(slot) => {
                *slot = Some(album_id.to_string());
                true
            }
            None => false,
        }
    }

    pub(crate) fn slots(&self) -> &[Option<String>] {
        &self.slots
    }

    /// The distinct album ids currently on the chart, empty slots excluded.
    pub(crate) fn album_ids(&self) -> HashSet<&str> {
        self.slots.iter().flatten().map(String::as_str).collect()
    }
}

impl FromIterator<Option<String>> for ChartEntries {
    fn from_iter<I: IntoIterator<Item = Option<String>>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

/// One date group of a reject chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RejectSection {
    pub(crate) date: String,
    pub(crate) count: usize,
}

/// Where a chart's contents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChartKind {
    /// A ranked list scanned from a source page.
    Live { link: String },
    /// Albums that fell off `base`, grouped by the date they were rejected.
    Reject {
        base: String,
        sections: Vec<RejectSection>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Chart {
    pub(crate) name: String,
    pub(crate) kind: ChartKind,
    pub(crate) scanned_on: String,
    pub(crate) entries: ChartEntries,
}

impl Chart {
    pub(crate) fn new_live(name: &str, link: &str, scanned_on: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ChartKind::Live {
                link: link.to_string(),
            },
            scanned_on: scanned_on.to_string(),
            entries: ChartEntries::default(),
        }
    }

    pub(crate) fn is_reject_chart(&self) -> bool {
        matches!(self.kind, ChartKind::Reject { .. })
    }

    pub(crate) fn size(&self) -> usize {
        self.entries.len()
    }

    /// The source link of a live chart.
    pub(crate) fn link(&self) -> Option<&str> {
        match &self.kind {
            ChartKind::Live { link } => Some(link),
            ChartKind::Reject { .. } => None,
        }
    }

    /// The date sections of a reject chart, empty for live charts.
    pub(crate) fn sections(&self) -> &[RejectSection] {
        match &self.kind {
            ChartKind::Live { .. } => &[],
            ChartKind::Reject { sections, .. } => sections,
        }
    }

    pub(crate) fn resize(&mut self, size: usize) -> Vec<Option<String>> {
        debug!(chart = %self.name, from = self.entries.len(), to = size, "Resizing chart");
        self.entries.resize(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(ids: &[&str]) -> ChartEntries {
        ids.iter().map(|id| Some(id.to_string())).collect()
    }

    #[test]
    fn growing_pads_with_empty_slots() {
        let mut chart = entries(&["A", "B"]);
        let old = chart.resize(4);

        assert_eq!(old, vec![Some("A".to_string()), Some("B".to_string())]);
        assert_eq!(chart.len(), 4);
        assert_eq!(chart.get(2), Some("B"));
        assert_eq!(chart.get(3), None);
        assert_eq!(chart.get(4), None);
    }

    #[test]
    fn shrinking_truncates_trailing_slots() {
        let mut chart = entries(&["A", "B", "C"]);
        let old = chart.resize(1);

        assert_eq!(old.len(), 3);
        assert_eq!(chart.slots(), &[Some("A".to_string())]);
    }

    #[test]
    fn set_ignores_ranks_outside_the_chart() {
        let mut chart = ChartEntries::with_size(2);
        assert!(!chart.set(0, "A"));
        assert!(!chart.set(3, "A"));
        assert!(chart.set(2, "A"));
        assert_eq!(chart.get(2), Some("A"));
    }

    #[test]
    fn album_ids_skip_empty_slots_and_duplicates() {
        let mut chart = entries(&["A", "B", "A"]);
        chart.resize(5);
        let ids = chart.album_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("A") && ids.contains("B"));
    }

    #[test]
    fn live_and_reject_accessors() {
        let live = Chart::new_live("Top5", "http://example.com/top5", "01/01/2024");
        assert_eq!(live.link(), Some("http://example.com/top5"));
        assert!(!live.is_reject_chart());
        assert!(live.sections().is_empty());

        let reject = Chart {
            name: "Top5 REJECT".to_string(),
            kind: ChartKind::Reject {
                base: "Top5".to_string(),
                sections: vec![RejectSection {
                    date: "01/01/2024".to_string(),
                    count: 1,
                }],
            },
            scanned_on: "02/01/2024".to_string(),
            entries: entries(&["A"]),
        };
        assert!(reject.is_reject_chart());
        assert_eq!(reject.link(), None);
        assert_eq!(reject.sections().len(), 1);
    }
}
