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

//! Merging an observed ranked list into the library.
//!
//! Both entry points, [`Reconciler::scan_chart`] and
//! [`Reconciler::update_chart`], run the same sequence against one chart:
//!
//! 1. resize the chart to the snapshot length, keeping the old slots;
//! 2. upsert every observed album, rank it, and place it in its slot;
//! 3. diff the old slots against the new ones;
//! 4. mark every album that dropped off as rejected;
//! 5. store the chart back in the library.
//!
//! The sequence is not idempotent. Running the same snapshot twice appends a
//! second history entry to every ranking it touches.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::{
    error::{LibraryError, MalformedObservation},
    library::Library,
    model::{Album, Chart, ChartKind, Listened, Rank, listener_columns},
};

/// One album as seen on a ranked list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Observation {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) artist: String,
    pub(crate) year: u16,
    pub(crate) genre: String,
    pub(crate) rating: f64,
    pub(crate) rating_count: u32,
    pub(crate) qwr: Option<f64>,
    pub(crate) album_url: String,
    pub(crate) artist_url: String,
    pub(crate) streaming: Option<String>,
}

impl Observation {
    fn to_album(&self) -> Album {
        let mut album = Album::new(&self.id, &self.title, &self.artist, self.year);
        album.genre = self.genre.clone();
        album.rating = self.rating;
        album.rating_count = self.rating_count;
        album.qwr = self.qwr;
        album.links.album_url = self.album_url.clone();
        album.links.artist_url = self.artist_url.clone();
        album.links.streaming = self.streaming.clone();
        album
    }

    /// Overwrites the mutable fields of a known album. Identity changes are
    /// logged but are not errors.
    fn refresh(&self, album: &mut Album) {
        debug!(
            album = %album.id,
            previous = album.rating,
            current = self.rating,
            "Refreshing rating"
        );
        album.rating = self.rating;
        album.rating_count = self.rating_count;
        if self.qwr.is_some() {
            album.qwr = self.qwr;
        }

        if album.title != self.title {
            debug!(album = %album.id, from = %album.title, to = %self.title, "Title changed");
            album.title = self.title.clone();
        }
        if album.artist != self.artist {
            debug!(album = %album.id, from = %album.artist, to = %self.artist, "Artist changed");
            album.artist = self.artist.clone();
        }
        if album.year != self.year {
            debug!(album = %album.id, from = album.year, to = self.year, "Year changed");
            album.year = self.year;
        }
        if album.genre != self.genre {
            debug!(album = %album.id, from = %album.genre, to = %self.genre, "Genre changed");
            album.genre = self.genre.clone();
        }

        album.links.album_url = self.album_url.clone();
        album.links.artist_url = self.artist_url.clone();
        if self.streaming.is_some() {
            album.links.streaming = self.streaming.clone();
        }
    }
}

/// An observed list, in rank order. Rows that could not be parsed keep their
/// position so the ranks of the rows after them are unaffected.
pub(crate) type Snapshot = Vec<Result<Observation, MalformedObservation>>;

/// Which slow lookups to repeat for albums already in the library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RefreshOptions {
    pub(crate) streaming: bool,
    pub(crate) duration: bool,
}

/// The metadata lookups an [`Enricher`] should perform for one album.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Lookups {
    pub(crate) duration: bool,
    pub(crate) country: bool,
    pub(crate) streaming: bool,
    pub(crate) local_library: bool,
}

impl Lookups {
    /// Everything an album created from an observation is missing.
    pub(crate) fn for_new(album: &Album) -> Self {
        Self {
            duration: true,
            country: true,
            streaming: album.links.streaming.is_none(),
            local_library: true,
        }
    }

    pub(crate) fn for_known(album: &Album, refresh: RefreshOptions) -> Self {
        Self {
            duration: refresh.duration,
            country: album.country.is_none(),
            streaming: refresh.streaming,
            local_library: !album.links.in_local_library,
        }
    }

    pub(crate) fn any(&self) -> bool {
        self.duration || self.country || self.streaming || self.local_library
    }
}

/// Fills in album metadata the ranked list itself does not carry.
///
/// Implementations talk to the network or the filesystem, so they handle and
/// log their own failures; a failed lookup leaves the field as it was.
pub(crate) trait Enricher {
    fn enrich(&mut self, album: &mut Album, lookups: Lookups);
}

/// An [`Enricher`] that performs no lookups.
pub(crate) struct NoEnrichment;

impl Enricher for NoEnrichment {
    fn enrich(&mut self, _album: &mut Album, _lookups: Lookups) {}
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ReconcileReport {
    pub(crate) chart: String,
    pub(crate) size: usize,
    pub(crate) created: Vec<String>,
    pub(crate) updated: Vec<String>,
    pub(crate) rejected: BTreeSet<String>,
    pub(crate) malformed: Vec<MalformedObservation>,
}

pub(crate) struct Reconciler<'a> {
    pub(crate) enricher: &'a mut dyn Enricher,
    pub(crate) listeners: &'a [String],
    pub(crate) refresh: RefreshOptions,
    pub(crate) today: String,
}

impl Reconciler<'_> {
    /// Reconciles a freshly scanned list, creating the chart if needed.
    ///
    /// A known chart keeps its previous entries for the diff and takes the
    /// new link.
    pub(crate) fn scan_chart(
        &mut self,
        library: &mut Library,
        name: &str,
        link: &str,
        snapshot: Snapshot,
    ) -> Result<ReconcileReport, LibraryError> {
        info!(chart = %name, %link, "Scanning chart");

        let chart = match library.chart(name) {
            Ok(existing) if existing.is_reject_chart() => {
                return Err(LibraryError::RejectChartReadOnly(name.to_string()));
            }
            Ok(existing) => {
                let mut chart = existing.clone();
                chart.kind = ChartKind::Live {
                    link: link.to_string(),
                };
                chart
            }
            Err(_) => Chart::new_live(name, link, &self.today),
        };

        self.reconcile(library, chart, snapshot)
    }

    /// Reconciles a re-fetched list for a chart already in the library.
    pub(crate) fn update_chart(
        &mut self,
        library: &mut Library,
        name: &str,
        snapshot: Snapshot,
    ) -> Result<ReconcileReport, LibraryError> {
        let chart = library.chart(name)?;
        if chart.is_reject_chart() {
            return Err(LibraryError::RejectChartReadOnly(name.to_string()));
        }
        let chart = chart.clone();

        info!(chart = %name, listeners = ?self.listeners, "Updating chart");
        self.reconcile(library, chart, snapshot)
    }

    fn reconcile(
        &mut self,
        library: &mut Library,
        mut chart: Chart,
        snapshot: Snapshot,
    ) -> Result<ReconcileReport, LibraryError> {
        let mut report = ReconcileReport {
            chart: chart.name.clone(),
            size: snapshot.len(),
            ..ReconcileReport::default()
        };

        let old_entries = chart.resize(snapshot.len());
        chart.scanned_on = self.today.clone();

        let columns = listener_columns(self.listeners);
        let unknown = vec![Listened::Unknown; columns.len()];

        for (index, row) in snapshot.into_iter().enumerate() {
            let position = index + 1;
            let observation = match row {
                Ok(observation) => observation,
                Err(malformed) => {
                    warn!(chart = %chart.name, "{}", malformed);
                    report.malformed.push(malformed);
                    continue;
                }
            };

            let (album, created) =
                library.get_or_create_album(&observation.id, || observation.to_album());

            if created {
                info!(album = %album.id, title = %album.title, "New album");
                album.set_listening_info(&unknown, &columns);
                let lookups = Lookups::for_new(album);
                self.enricher.enrich(album, lookups);
                report.created.push(observation.id.clone());
            } else {
                observation.refresh(album);
                let lookups = Lookups::for_known(album, self.refresh);
                if lookups.any() {
                    self.enricher.enrich(album, lookups);
                }
                report.updated.push(observation.id.clone());
            }

            let rank = u32::try_from(position).unwrap_or(u32::MAX);
            album.add_ranking(&chart.name, Rank::Ranked(rank), &self.today);
            chart.entries.set(position, &observation.id);
        }

        report.rejected = {
            let current = chart.entries.album_ids();
            let unreadable: BTreeSet<&str> =
                report.malformed.iter().filter_map(|m| m.id.as_deref()).collect();
            old_entries
                .into_iter()
                .flatten()
                .filter(|id| !current.contains(id.as_str()) && !unreadable.contains(id.as_str()))
                .collect()
        };

        for id in &report.rejected {
            match library.album_mut(id) {
                Some(album) => {
                    debug!(album = %id, title = %album.title, "Rejecting album");
                    album.add_ranking(&chart.name, Rank::Rejected, &self.today);
                }
                None => warn!(album = %id, "Rejected album is missing from the library"),
            }
        }

        info!(
            chart = %chart.name,
            total = report.size,
            new = report.created.len(),
            rejected = report.rejected.len(),
            malformed = report.malformed.len(),
            "Reconciled chart"
        );

        library.upsert_chart(chart)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TODAY: &str = "10/01/2024";

    fn observation(id: &str) -> Observation {
        Observation {
            id: id.to_string(),
            title: format!("Album {}", id),
            artist: format!("Artist {}", id),
            year: 1972,
            genre: "Symphonic Prog".to_string(),
            rating: 4.2,
            rating_count: 100,
            qwr: None,
            album_url: format!("http://example.com/album.asp?id={}", id),
            artist_url: format!("http://example.com/artist.asp?id={}", id),
            streaming: None,
        }
    }

    fn snapshot(ids: &[&str]) -> Snapshot {
        ids.iter().map(|id| Ok(observation(id))).collect()
    }

    #[derive(Default)]
    struct RecordingEnricher {
        calls: Vec<(String, Lookups)>,
    }

    impl Enricher for RecordingEnricher {
        fn enrich(&mut self, album: &mut Album, lookups: Lookups) {
            if lookups.country {
                album.country = Some("England".to_string());
            }
            self.calls.push((album.id.clone(), lookups));
        }
    }

    fn reconciler<'a>(enricher: &'a mut dyn Enricher, today: &str) -> Reconciler<'a> {
        Reconciler {
            enricher,
            listeners: &[],
            refresh: RefreshOptions::default(),
            today: today.to_string(),
        }
    }

    fn rank_of(library: &Library, id: &str, chart: &str) -> Rank {
        library.album(id).unwrap().ranking(chart).unwrap().rank
    }

    #[test]
    fn scan_creates_chart_and_albums() {
        let mut library = Library::default();
        let mut enricher = RecordingEnricher::default();

        let report = reconciler(&mut enricher, TODAY)
            .scan_chart(&mut library, "Top5", "http://top5", snapshot(&["A", "B", "C"]))
            .unwrap();

        assert_eq!(report.created, vec!["A", "B", "C"]);
        assert!(report.rejected.is_empty());

        let chart = library.chart("Top5").unwrap();
        assert_eq!(chart.size(), 3);
        assert_eq!(chart.entries.get(2), Some("B"));
        assert_eq!(chart.scanned_on, TODAY);
        assert_eq!(rank_of(&library, "C", "Top5"), Rank::Ranked(3));

        let album = library.album("A").unwrap();
        assert_eq!(album.listened_by("Listened?"), Listened::Unknown);
        assert_eq!(album.country.as_deref(), Some("England"));
        assert_eq!(enricher.calls.len(), 3);
        assert!(enricher.calls.iter().all(|(_, l)| l.duration && l.streaming));
    }

    #[test]
    fn rescan_rejects_albums_that_dropped_off() {
        let mut library = Library::default();
        let mut enricher = NoEnrichment;

        reconciler(&mut enricher, "01/01/2024")
            .scan_chart(&mut library, "Top5", "http://top5", snapshot(&["A", "B", "C", "D", "E"]))
            .unwrap();

        let report = reconciler(&mut enricher, "02/01/2024")
            .update_chart(&mut library, "Top5", snapshot(&["B", "C", "F", "D", "E"]))
            .unwrap();

        assert_eq!(report.rejected, BTreeSet::from(["A".to_string()]));
        assert_eq!(report.created, vec!["F"]);

        let a = library.album("A").unwrap().ranking("Top5").unwrap();
        assert_eq!(a.rank, Rank::Rejected);
        assert_eq!(a.last_updated, "02/01/2024");
        assert_eq!(a.history.len(), 2);
        assert_eq!(a.history.entries().last().unwrap().rank, Rank::Ranked(1));

        assert_eq!(rank_of(&library, "F", "Top5"), Rank::Ranked(3));
        for (id, rank) in [("B", 1), ("C", 2), ("D", 4), ("E", 5)] {
            assert_eq!(rank_of(&library, id, "Top5"), Rank::Ranked(rank));
        }

        let chart = library.chart("Top5").unwrap();
        assert!(!chart.entries.album_ids().contains("A"));
        assert_eq!(library.albums.len(), 6);
    }

    #[test]
    fn already_rejected_albums_are_not_rejected_again() {
        let mut library = Library::default();
        let mut enricher = NoEnrichment;

        let mut run = |ids: &[&str], date: &str| {
            reconciler(&mut enricher, date)
                .scan_chart(&mut library, "Top5", "http://top5", snapshot(ids))
                .unwrap()
        };
        run(&["A", "B"], "01/01/2024");
        run(&["B", "C"], "02/01/2024");
        let report = run(&["B", "D"], "03/01/2024");

        assert_eq!(report.rejected, BTreeSet::from(["C".to_string()]));
        let a = library.album("A").unwrap().ranking("Top5").unwrap();
        assert_eq!(a.last_updated, "02/01/2024");
        assert_eq!(a.history.len(), 2);
    }

    #[test]
    fn shrinking_chart_rejects_truncated_albums() {
        let mut library = Library::default();
        let mut enricher = NoEnrichment;

        reconciler(&mut enricher, "01/01/2024")
            .scan_chart(&mut library, "Top5", "http://top5", snapshot(&["A", "B", "C"]))
            .unwrap();
        let report = reconciler(&mut enricher, "02/01/2024")
            .update_chart(&mut library, "Top5", snapshot(&["A"]))
            .unwrap();

        assert_eq!(report.rejected.len(), 2);
        assert_eq!(library.chart("Top5").unwrap().size(), 1);
    }

    #[test]
    fn malformed_rows_leave_an_empty_slot() {
        let mut library = Library::default();
        let mut enricher = NoEnrichment;
        let rows: Snapshot = vec![
            Ok(observation("A")),
            Err(MalformedObservation::new(2, "no year")),
            Ok(observation("C")),
        ];

        let report = reconciler(&mut enricher, TODAY)
            .scan_chart(&mut library, "Top5", "http://top5", rows)
            .unwrap();

        assert_eq!(report.malformed, vec![MalformedObservation::new(2, "no year")]);
        let chart = library.chart("Top5").unwrap();
        assert_eq!(chart.size(), 3);
        assert_eq!(chart.entries.get(2), None);
        assert_eq!(rank_of(&library, "C", "Top5"), Rank::Ranked(3));
    }

    #[test]
    fn unreadable_rows_for_listed_albums_are_not_rejected() {
        let mut library = Library::default();
        let mut enricher = NoEnrichment;

        reconciler(&mut enricher, "01/01/2024")
            .scan_chart(&mut library, "Top5", "http://top5", snapshot(&["A", "B", "C"]))
            .unwrap();
        let rows: Snapshot = vec![
            Ok(observation("A")),
            Err(MalformedObservation::for_album(2, "B", "missing year")),
            Err(MalformedObservation::new(3, "expected 5 cells, found 1")),
        ];
        let report = reconciler(&mut enricher, "02/01/2024")
            .update_chart(&mut library, "Top5", rows)
            .unwrap();

        assert_eq!(report.rejected, BTreeSet::from(["C".to_string()]));
        let b = library.album("B").unwrap().ranking("Top5").unwrap();
        assert_eq!(b.rank, Rank::Ranked(2));
        assert_eq!(b.last_updated, "01/01/2024");
        assert_eq!(library.chart("Top5").unwrap().entries.get(2), None);
    }

    #[test]
    fn known_albums_refresh_fields_and_honour_flags() {
        let mut library = Library::default();
        let mut enricher = RecordingEnricher::default();

        reconciler(&mut enricher, "01/01/2024")
            .scan_chart(&mut library, "Top5", "http://top5", snapshot(&["A"]))
            .unwrap();

        let mut changed = observation("A");
        changed.rating = 4.6;
        changed.rating_count = 120;
        changed.title = "Renamed".to_string();

        let mut enricher = RecordingEnricher::default();
        let mut reconciler = reconciler(&mut enricher, "02/01/2024");
        reconciler.refresh = RefreshOptions {
            streaming: true,
            duration: false,
        };
        reconciler
            .update_chart(&mut library, "Top5", vec![Ok(changed)])
            .unwrap();

        let album = library.album("A").unwrap();
        assert_eq!(album.rating, 4.6);
        assert_eq!(album.rating_count, 120);
        assert_eq!(album.title, "Renamed");

        let (_, lookups) = &enricher.calls[0];
        assert!(lookups.streaming);
        assert!(!lookups.duration);
        assert!(!lookups.country);
        assert!(lookups.local_library);
    }

    #[test]
    fn update_of_unknown_chart_is_reported_without_mutation() {
        let mut library = Library::default();
        let mut enricher = NoEnrichment;

        let err = reconciler(&mut enricher, TODAY)
            .update_chart(&mut library, "Nope", snapshot(&["A"]))
            .unwrap_err();

        assert_eq!(err, LibraryError::ChartNotFound("Nope".to_string()));
        assert!(library.albums.is_empty());
    }

    #[test]
    fn reject_charts_refuse_updates() {
        let mut library = Library::default();
        library.charts.insert(
            "Top5 REJECT".to_string(),
            Chart {
                name: "Top5 REJECT".to_string(),
                kind: ChartKind::Reject {
                    base: "Top5".to_string(),
                    sections: vec![],
                },
                scanned_on: TODAY.to_string(),
                entries: Default::default(),
            },
        );
        let mut enricher = NoEnrichment;

        let err = reconciler(&mut enricher, TODAY)
            .update_chart(&mut library, "Top5 REJECT", snapshot(&["A"]))
            .unwrap_err();
        assert_eq!(err, LibraryError::RejectChartReadOnly("Top5 REJECT".to_string()));

        let err = reconciler(&mut enricher, TODAY)
            .scan_chart(&mut library, "Top5 REJECT", "http://x", snapshot(&["A"]))
            .unwrap_err();
        assert_eq!(err, LibraryError::RejectChartReadOnly("Top5 REJECT".to_string()));
        assert!(library.albums.is_empty());
    }

    #[test]
    fn rerunning_a_scan_appends_duplicate_history() {
        let mut library = Library::default();
        let mut enricher = NoEnrichment;

        for _ in 0..2 {
            reconciler(&mut enricher, TODAY)
                .scan_chart(&mut library, "Top5", "http://top5", snapshot(&["A"]))
                .unwrap();
        }

        let ranking = library.album("A").unwrap().ranking("Top5").unwrap();
        assert_eq!(ranking.history.len(), 2);
        assert_eq!(ranking.history.entries().last().unwrap().rank, Rank::Ranked(1));
    }
}
