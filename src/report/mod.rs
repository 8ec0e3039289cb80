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

//! Spreadsheet rendering.
//!
//! A chart is rendered as CSV, one row per rank. The columns are fixed apart
//! from the listener columns, which follow the roster (or the generic
//! `Listened?` column when there is no roster). Reject charts get a row
//! holding just the date before each group of albums.
//!
//! A live chart's spreadsheet can also be read back, carrying the listening
//! columns someone filled in into the library.

use std::{io::Write, mem};

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::{
    error::LibraryError,
    library::Library,
    model::{Album, Chart, Listened, listener_columns},
};

const LEADING_HEADINGS: [&str; 8] = [
    "Artist",
    "Album",
    "Year",
    "Genre",
    "Rating",
    "Ratings",
    "Duration",
    "Country",
];

const TRAILING_HEADINGS: [&str; 4] = [
    "On Streaming?",
    "Purchased?",
    "In Library?",
    "Jointly Listened?",
];

const UNKNOWN_DURATION: &str = "Unknown";

pub(crate) fn headings(listeners: &[String]) -> Vec<String> {
    LEADING_HEADINGS
        .iter()
        .map(|h| h.to_string())
        .chain(listener_columns(listeners))
        .chain(TRAILING_HEADINGS.iter().map(|h| h.to_string()))
        .collect()
}

fn yes_no(flag: bool) -> String {
    String::from(if flag { "Yes" } else { "No" })
}

fn album_row(album: &Album, columns: &[String]) -> Vec<String> {
    let mut row = vec![
        album.artist.clone(),
        album.title.clone(),
        album.year.to_string(),
        album.genre.clone(),
        format!("{:.2}", album.rating),
        album.rating_count.to_string(),
        album
            .duration
            .clone()
            .unwrap_or_else(|| UNKNOWN_DURATION.to_string()),
        album.country.clone().unwrap_or_default(),
    ];
    row.extend(
        columns
            .iter()
            .map(|listener| album.listened_by(listener).to_string()),
    );
    row.push(yes_no(album.links.on_streaming()));
    row.push(yes_no(album.links.purchased));
    row.push(yes_no(album.links.in_local_library));
    row.push(yes_no(album.links.jointly_listened));
    row
}

/// Builds the rows of a chart, heading row first.
///
/// Empty slots of a live chart render as blank rows so that row numbers keep
/// matching ranks.
///
/// # Errors
///
/// Returns [`LibraryError::AlbumNotFound`] if the chart names an album the
/// library does not have.
pub(crate) fn chart_rows(
    library: &Library,
    chart: &Chart,
    listeners: &[String],
) -> Result<Vec<Vec<String>>, LibraryError> {
    let heading = headings(listeners);
    let width = heading.len();
    let columns = listener_columns(listeners);

    let album_row_for = |id: &str| -> Result<Vec<String>, LibraryError> {
        library
            .album(id)
            .map(|album| album_row(album, &columns))
            .ok_or_else(|| LibraryError::AlbumNotFound(id.to_string()))
    };

    let mut rows = vec![heading];
    let slots = chart.entries.slots();

    if chart.is_reject_chart() {
        let mut next = 0;
        for section in chart.sections() {
            debug!(chart = %chart.name, date = %section.date, count = section.count, "Writing section");
            let mut header = vec![String::new(); width];
            header[0] = section.date.clone();
            rows.push(header);

            for slot in slots.iter().skip(next).take(section.count) {
                if let Some(id) = slot {
                    rows.push(album_row_for(id)?);
                }
            }
            next += section.count;
        }
    } else {
        for slot in slots {
            match slot {
                Some(id) => rows.push(album_row_for(id)?),
                None => rows.push(vec![String::new(); width]),
            }
        }
    }

    Ok(rows)
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub(crate) fn write_csv<W: Write>(out: &mut W, rows: &[Vec<String>]) -> std::io::Result<()> {
    for row in rows {
        let line: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        write!(out, "{}\r\n", line.join(","))?;
    }
    out.flush()
}

/// Renders `chart` as CSV into `out`.
pub(crate) fn write_chart<W: Write>(
    out: &mut W,
    library: &Library,
    chart: &Chart,
    listeners: &[String],
) -> Result<()> {
    info!(chart = %chart.name, size = chart.size(), listeners = ?listeners, "Writing chart");
    let rows = chart_rows(library, chart, listeners)?;
    write_csv(out, &rows)?;
    info!(chart = %chart.name, rows = rows.len() - 1, "Wrote chart");
    Ok(())
}

/// Splits CSV text into rows of fields.
///
/// Quoted fields may hold commas, doubled quotes and line breaks. Rows end
/// with either `\r\n` or `\n`.
pub(crate) fn read_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => quoted = true,
            ',' => row.push(mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(mem::take(&mut field));
                rows.push(mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// What reading a spreadsheet back changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ReadSummary {
    pub(crate) synced: usize,
    /// Ranks whose row did not match the album at that rank.
    pub(crate) skipped: Vec<usize>,
}

/// The listener columns of a chart heading row, or `None` if the row is not
/// one [`headings`] would write.
fn roster_of(heading: &[String]) -> Option<Vec<String>> {
    let fixed = LEADING_HEADINGS.len() + TRAILING_HEADINGS.len();
    if heading.len() <= fixed {
        return None;
    }
    let (leading, rest) = heading.split_at(LEADING_HEADINGS.len());
    let (roster, trailing) = rest.split_at(rest.len() - TRAILING_HEADINGS.len());
    let matches = |cells: &[String], expected: &[&str]| cells.iter().zip(expected).all(|(c, e)| c == e);

    (matches(leading, &LEADING_HEADINGS[..]) && matches(trailing, &TRAILING_HEADINGS[..]))
        .then(|| roster.to_vec())
}

/// Carries the listening and purchase columns of a live chart's spreadsheet
/// into the library.
///
/// Rows line up with ranks as [`chart_rows`] writes them. Blank rows are
/// passed over, and a row naming a different album than the one at its rank
/// is skipped. With `literal` the spreadsheet overwrites; otherwise the
/// values merge as [`Album::sync_listened`] describes and a `Yes` purchase or
/// joint listen is never undone.
///
/// # Errors
///
/// Fails if the chart is unknown or the first row is not a chart heading.
pub(crate) fn read_chart(
    library: &mut Library,
    name: &str,
    rows: &[Vec<String>],
    literal: bool,
) -> Result<ReadSummary> {
    let slots = library.chart(name)?.entries.slots().to_vec();
    let Some((heading, rows)) = rows.split_first() else {
        bail!("spreadsheet is empty");
    };
    let Some(roster) = roster_of(heading) else {
        bail!("first row is not a chart heading");
    };
    let listeners = LEADING_HEADINGS.len()..LEADING_HEADINGS.len() + roster.len();
    let purchased = listeners.end + 1;
    let jointly_listened = listeners.end + 3;

    info!(chart = %name, rows = rows.len(), roster = ?roster, literal, "Reading chart");
    let mut summary = ReadSummary::default();

    for (index, row) in rows.iter().enumerate() {
        let rank = index + 1;
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let album = slots
            .get(index)
            .and_then(|slot| slot.as_deref())
            .and_then(|id| library.album_mut(id))
            .filter(|album| {
                row.len() == heading.len() && album.artist == row[0] && album.title == row[1]
            });
        let Some(album) = album else {
            warn!(chart = %name, rank, "Row does not match the chart, skipping");
            summary.skipped.push(rank);
            continue;
        };

        let block: Vec<Listened> = row[listeners.clone()]
            .iter()
            .map(|cell| Listened::parse(cell))
            .collect();
        album.sync_listened(&block, &roster, literal);

        let yes = |cell: &str| Listened::parse(cell) == Listened::Yes;
        if literal {
            album.links.purchased = yes(&row[purchased]);
            album.links.jointly_listened = yes(&row[jointly_listened]);
        } else {
            album.links.purchased |= yes(&row[purchased]);
            album.links.jointly_listened |= yes(&row[jointly_listened]);
        }
        summary.synced += 1;
    }

    info!(chart = %name, synced = summary.synced, skipped = summary.skipped.len(), "Read chart");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ChartEntries, GENERIC_LISTENER, Listened, Rank},
        reject::derive_reject_chart,
    };

    fn roster(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn library() -> Library {
        let mut library = Library::default();

        let mut foxtrot = Album::new("1", "Foxtrot", "Genesis", 1972);
        foxtrot.genre = "Symphonic Prog".to_string();
        foxtrot.rating = 4.6;
        foxtrot.rating_count = 3120;
        foxtrot.duration = Some("51:07".to_string());
        foxtrot.country = Some("United Kingdom".to_string());
        foxtrot.links.streaming = Some("https://open.spotify.com/album/x".to_string());
        foxtrot.links.listened.insert("ann".to_string(), Listened::Yes);
        foxtrot.add_ranking("Top5", Rank::Ranked(1), "01/01/2024");
        library.albums.insert("1".to_string(), foxtrot);

        let mut odd = Album::new("2", "Hello, \"World\"", "Odd", 1999);
        odd.links.purchased = true;
        odd.add_ranking("Top5", Rank::Ranked(1), "01/01/2024");
        odd.add_ranking("Top5", Rank::Rejected, "02/01/2024");
        library.albums.insert("2".to_string(), odd);

        let mut chart = Chart::new_live("Top5", "http://top5", "02/01/2024");
        chart.entries = ChartEntries::with_size(2);
        chart.entries.set(1, "1");
        library.upsert_chart(chart).unwrap();

        library
    }

    #[test]
    fn headings_follow_the_roster() {
        let with_roster = headings(&roster(&["ann", "bo"]));
        assert_eq!(with_roster.len(), 14);
        assert_eq!(with_roster[0], "Artist");
        assert_eq!(with_roster[7], "Country");
        assert_eq!(&with_roster[8..10], &roster(&["ann", "bo"])[..]);
        assert_eq!(with_roster[13], "Jointly Listened?");

        let generic = headings(&[]);
        assert_eq!(generic.len(), 13);
        assert_eq!(generic[8], GENERIC_LISTENER);
    }

    #[test]
    fn live_chart_rows_keep_rank_positions() {
        let library = library();
        let chart = library.chart("Top5").unwrap();
        let rows = chart_rows(&library, chart, &roster(&["ann", "bo"])).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[1],
            roster(&[
                "Genesis",
                "Foxtrot",
                "1972",
                "Symphonic Prog",
                "4.60",
                "3120",
                "51:07",
                "United Kingdom",
                "Yes",
                "?",
                "Yes",
                "No",
                "No",
                "No",
            ])
        );
        assert!(rows[2].iter().all(|cell| cell.is_empty()));
        assert_eq!(rows[2].len(), 14);
    }

    #[test]
    fn reject_chart_rows_have_section_headers() {
        let library = library();
        let chart = derive_reject_chart(&library, "Top5", "03/01/2024").unwrap();
        let rows = chart_rows(&library, &chart, &[]).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], "02/01/2024");
        assert!(rows[1][1..].iter().all(|cell| cell.is_empty()));
        assert_eq!(rows[2][0], "Odd");
        assert_eq!(rows[2][6], "Unknown");
        assert_eq!(rows[2][10], "Yes");
    }

    #[test]
    fn missing_album_is_reported() {
        let mut library = library();
        library.albums.remove("1");
        let chart = library.chart("Top5").unwrap().clone();

        assert_eq!(
            chart_rows(&library, &chart, &[]).unwrap_err(),
            LibraryError::AlbumNotFound("1".to_string())
        );
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        let mut out = Vec::new();
        write_csv(
            &mut out,
            &[roster(&["plain", "Hello, \"World\"", "two\nlines"])],
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "plain,\"Hello, \"\"World\"\"\",\"two\nlines\"\r\n"
        );
    }

    #[test]
    fn csv_reads_back_what_it_writes() {
        let rows = vec![
            roster(&["plain", "Hello, \"World\"", "two\r\nlines"]),
            roster(&["", "", ""]),
            roster(&["last", "", "row"]),
        ];
        let mut out = Vec::new();
        write_csv(&mut out, &rows).unwrap();

        assert_eq!(read_csv(&String::from_utf8(out).unwrap()), rows);
        assert_eq!(read_csv("a,b\nc,d"), vec![roster(&["a", "b"]), roster(&["c", "d"])]);
    }

    fn sheet(library: &Library, listeners: &[String]) -> Vec<Vec<String>> {
        let chart = library.chart("Top5").unwrap();
        chart_rows(library, chart, listeners).unwrap()
    }

    #[test]
    fn reading_a_chart_merges_listening_state() {
        let mut library = library();
        library
            .album_mut("1")
            .unwrap()
            .links
            .listened
            .insert("bo".to_string(), Listened::No);
        let listeners = roster(&["ann", "bo", "cy"]);
        let mut rows = sheet(&library, &listeners);
        rows[1][8] = "No".to_string();
        rows[1][9] = "Yes".to_string();
        rows[1][10] = "no".to_string();
        rows[1][12] = "Yes".to_string();

        let summary = read_chart(&mut library, "Top5", &rows, false).unwrap();

        assert_eq!(summary, ReadSummary { synced: 1, skipped: vec![] });
        let album = library.album("1").unwrap();
        assert_eq!(album.listened_by("ann"), Listened::Yes);
        assert_eq!(album.listened_by("bo"), Listened::Yes);
        assert_eq!(album.listened_by("cy"), Listened::No);
        assert!(album.links.purchased);
    }

    #[test]
    fn reading_literally_overwrites() {
        let mut library = library();
        let listeners = roster(&["ann"]);
        let mut rows = sheet(&library, &listeners);
        rows[1][8] = "?".to_string();

        read_chart(&mut library, "Top5", &rows, true).unwrap();
        assert_eq!(library.album("1").unwrap().listened_by("ann"), Listened::Unknown);
    }

    #[test]
    fn rows_for_other_albums_are_skipped() {
        let mut library = library();
        let mut rows = sheet(&library, &[]);
        rows[1][1] = "Nursery Cryme".to_string();
        rows[1][8] = "Yes".to_string();
        rows[2] = roster(&["Odd", "Stray"]);

        let summary = read_chart(&mut library, "Top5", &rows, false).unwrap();

        assert_eq!(summary, ReadSummary { synced: 0, skipped: vec![1, 2] });
        assert_eq!(
            library.album("1").unwrap().listened_by(GENERIC_LISTENER),
            Listened::Unknown
        );
    }

    #[test]
    fn reading_needs_a_known_chart_and_heading() {
        let mut library = library();
        let mut rows = sheet(&library, &[]);

        let err = read_chart(&mut library, "Nope", &rows, false).unwrap_err();
        assert_eq!(
            err.downcast_ref::<LibraryError>(),
            Some(&LibraryError::ChartNotFound("Nope".to_string()))
        );

        rows[0][0] = "Band".to_string();
        assert!(read_chart(&mut library, "Top5", &rows, false).is_err());
        assert!(read_chart(&mut library, "Top5", &[], false).is_err());
    }
}
