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

//! Reject charts.
//!
//! A reject chart lists the albums currently rejected from a base chart,
//! grouped by the date their rejection began, oldest group first. It is built
//! from ranking history alone and is never stored in the library.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::{
    error::LibraryError,
    library::Library,
    model::{Chart, ChartEntries, ChartKind, RejectSection, date::date_sort_key},
};

pub(crate) fn reject_chart_name(base: &str) -> String {
    format!("{} REJECT", base)
}

/// Builds the reject chart for `base`.
///
/// Rank positions within one date group follow album id order and carry no
/// meaning beyond that.
pub(crate) fn derive_reject_chart(
    library: &Library,
    base: &str,
    today: &str,
) -> Result<Chart, LibraryError> {
    library.chart(base)?;
    info!(chart = %base, "Creating reject chart");

    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for album in library.albums.values() {
        let Some(date) = album.ranking(base).and_then(|r| r.first_rejected_on()) else {
            continue;
        };
        debug!(album = %album.id, title = %album.title, %date, "Album was first rejected");
        groups.entry(date).or_default().push(&album.id);
    }

    let mut dates: Vec<&str> = groups.keys().copied().collect();
    dates.sort_by_key(|date| date_sort_key(date));

    let mut entries = Vec::new();
    let mut sections = Vec::with_capacity(dates.len());
    for date in dates {
        let ids = &groups[date];
        debug!(chart = %base, %date, count = ids.len(), "Reject section");
        sections.push(RejectSection {
            date: date.to_string(),
            count: ids.len(),
        });
        entries.extend(ids.iter().map(|id| Some(id.to_string())));
    }

    let entries: ChartEntries = entries.into_iter().collect();
    info!(chart = %base, rejected = entries.len(), sections = sections.len(), "Found rejects");

    Ok(Chart {
        name: reject_chart_name(base),
        kind: ChartKind::Reject {
            base: base.to_string(),
            sections,
        },
        scanned_on: today.to_string(),
        entries,
    })
}
