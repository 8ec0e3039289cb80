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

//! The album and chart library.
//!
//! A [`Library`] is loaded once per run, passed by reference into every
//! operation, and saved when the run is done. Albums are keyed by the source
//! site's identifier, charts by name. Albums are never removed: falling off a
//! chart is recorded in the album's ranking instead.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::{
    error::LibraryError,
    model::{Album, Chart},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Library {
    pub(crate) albums: BTreeMap<String, Album>,
    pub(crate) charts: BTreeMap<String, Chart>,
}

impl Library {
    pub(crate) fn album(&self, id: &str) -> Option<&Album> {
        self.albums.get(id)
    }

    pub(crate) fn album_mut(&mut self, id: &str) -> Option<&mut Album> {
        self.albums.get_mut(id)
    }

    /// Returns the album with `id`, building and inserting it with `factory`
    /// if it is not in the library yet.
    ///
    /// The boolean is `true` when the album was created by this call. An
    /// existing album is never replaced.
    pub(crate) fn get_or_create_album<F>(&mut self, id: &str, factory: F) -> (&mut Album, bool)
    where
        F: FnOnce() -> Album,
    {
        let created = !self.albums.contains_key(id);
        let album = self.albums.entry(id.to_string()).or_insert_with(|| {
            let mut album = factory();
            album.id = id.to_string();
            album
        });
        if created {
            debug!(album = %id, "Added album to library");
        }
        (album, created)
    }

    pub(crate) fn chart(&self, name: &str) -> Result<&Chart, LibraryError> {
        self.charts
            .get(name)
            .ok_or_else(|| LibraryError::ChartNotFound(name.to_string()))
    }

    /// Adds a chart or replaces the chart with the same name.
    ///
    /// Reject charts are derived on demand and are refused here.
    pub(crate) fn upsert_chart(&mut self, chart: Chart) -> Result<(), LibraryError> {
        if chart.is_reject_chart() {
            return Err(LibraryError::RejectChartNotStorable(chart.name));
        }
        self.charts.insert(chart.name.clone(), chart);
        Ok(())
    }

    /// Decommissions a chart: the chart goes, and so does every album's
    /// ranking for it. Returns the number of rankings removed.
    pub(crate) fn delete_chart(&mut self, name: &str) -> Result<usize, LibraryError> {
        self.charts
            .remove(name)
            .ok_or_else(|| LibraryError::ChartNotFound(name.to_string()))?;

        let removed = self
            .albums
            .values_mut()
            .filter_map(|album| album.delete_ranking(name))
            .count();

        info!(chart = %name, rankings = removed, "Deleted chart");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChartKind, Rank};

    #[test]
    fn get_or_create_never_overwrites() {
        let mut library = Library::default();

        let (album, created) =
            library.get_or_create_album("42", || Album::new("ignored", "Foxtrot", "Genesis", 1972));
        assert!(created);
        assert_eq!(album.id, "42");
        album.rating = 4.5;

        let (album, created) =
            library.get_or_create_album("42", || Album::new("42", "Other", "Other", 2000));
        assert!(!created);
        assert_eq!(album.title, "Foxtrot");
        assert_eq!(album.rating, 4.5);
        assert_eq!(library.albums.len(), 1);
    }

    #[test]
    fn missing_chart_is_not_found() {
        let library = Library::default();
        assert_eq!(
            library.chart("Top5").unwrap_err(),
            LibraryError::ChartNotFound("Top5".to_string())
        );
    }

    #[test]
    fn upsert_replaces_by_name() {
        let mut library = Library::default();
        library
            .upsert_chart(Chart::new_live("Top5", "http://a", "01/01/2024"))
            .unwrap();
        library
            .upsert_chart(Chart::new_live("Top5", "http://b", "02/01/2024"))
            .unwrap();

        assert_eq!(library.charts.len(), 1);
        assert_eq!(library.chart("Top5").unwrap().link(), Some("http://b"));
    }

    #[test]
    fn reject_charts_are_not_stored() {
        let mut library = Library::default();
        let mut chart = Chart::new_live("Top5 REJECT", "", "01/01/2024");
        chart.kind = ChartKind::Reject {
            base: "Top5".to_string(),
            sections: vec![],
        };

        assert!(matches!(
            library.upsert_chart(chart),
            Err(LibraryError::RejectChartNotStorable(_))
        ));
        assert!(library.charts.is_empty());
    }

    #[test]
    fn delete_chart_drops_rankings_but_keeps_albums() {
        let mut library = Library::default();
        library
            .upsert_chart(Chart::new_live("Top5", "http://a", "01/01/2024"))
            .unwrap();
        for id in ["1", "2"] {
            let (album, _) = library.get_or_create_album(id, || Album::new(id, "t", "a", 2000));
            album.add_ranking("Top5", Rank::Ranked(1), "01/01/2024");
            album.add_ranking("Other", Rank::Ranked(1), "01/01/2024");
        }

        assert_eq!(library.delete_chart("Top5"), Ok(2));
        assert_eq!(library.albums.len(), 2);
        assert!(library.albums.values().all(|a| a.ranking("Top5").is_none()));
        assert!(library.albums.values().all(|a| a.ranking("Other").is_some()));
        assert!(library.delete_chart("Top5").is_err());
    }
}
