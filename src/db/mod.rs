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

//! Data access layer.
//!
//! This module loads and stores the whole [`Library`] in an SQLite database.
//! The library is read once when a run starts and written back in full when
//! it ends, so there are no finer-grained updates.
//!
//! # Tables
//!
//! * `albums` - Album metadata and links, keyed by the source site's id.
//! * `listened` - Per-listener listening state for each album.
//! * `rankings` - The current rank of an album on a chart.
//! * `rank_history` - The prior ranking states, in order.
//! * `charts` - Live charts and their source links.
//! * `chart_entries` - One row per chart slot, empty slots included.

mod model;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::{
    library::Library,
    model::{Album, Chart, ChartEntries, ChartKind, HistoryEntry, Listened, Rank, RankHistory, Ranking},
};

/// Opens a connection to the SQLite database and configures performance settings.
///
/// This function performs the following setup:
/// * **WAL Mode**: Enables Write-Ahead Logging.
/// * **Constraints**: Enforces foreign key integrity.
/// * **Schema**: Executes [`create_schema`] to ensure all tables and indices exist.
///
/// # Arguments
///
/// * `path` - The file system path to the SQLite database file.
///
/// # Errors
///
/// Returns an error if:
/// * The database file cannot be opened.
/// * The initial PRAGMA configurations fail.
/// * The schema initialization fails.
pub(crate) fn init_db(path: &str) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;

    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    if journal_mode != "wal" {
        anyhow::bail!(
            "Failed to switch to WAL mode. Current mode: {}",
            journal_mode
        );
    }

    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
    ",
    )?;

    create_schema(&conn)?;

    Ok(conn)
}

/// Create the database schema.
///
/// Rankings, history, and listening state cascade with their album. Chart
/// names in `rankings` are not foreign keys: an album keeps its ranking for a
/// chart until the chart is deleted explicitly.
///
/// # Errors
///
/// Returns an error if the transaction fails, if there are permission issues
/// with the database file, or if the SQL syntax is invalid.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;

        CREATE TABLE IF NOT EXISTS albums (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            year INTEGER NOT NULL,
            genre TEXT NOT NULL,
            rating REAL NOT NULL,
            rating_count INTEGER NOT NULL,
            qwr REAL,
            duration TEXT,
            country TEXT,
            album_url TEXT NOT NULL,
            artist_url TEXT NOT NULL,
            streaming_link TEXT,
            in_library INTEGER NOT NULL,
            purchased INTEGER NOT NULL,
            jointly_listened INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS listened (
            album_id TEXT NOT NULL,
            listener TEXT NOT NULL,
            status INTEGER NOT NULL,
            PRIMARY KEY (album_id, listener),
            FOREIGN KEY (album_id) REFERENCES albums (id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS rankings (
            album_id TEXT NOT NULL,
            chart TEXT NOT NULL,
            rank INTEGER NOT NULL,
            last_updated TEXT NOT NULL,
            PRIMARY KEY (album_id, chart),
            FOREIGN KEY (album_id) REFERENCES albums (id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS rank_history (
            album_id TEXT NOT NULL,
            chart TEXT NOT NULL,
            seq INTEGER NOT NULL,
            rank INTEGER NOT NULL,
            date TEXT NOT NULL,
            PRIMARY KEY (album_id, chart, seq),
            FOREIGN KEY (album_id, chart) REFERENCES rankings (album_id, chart) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS charts (
            name TEXT PRIMARY KEY,
            link TEXT NOT NULL,
            scanned_on TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chart_entries (
            chart TEXT NOT NULL,
            slot INTEGER NOT NULL,
            album_id TEXT,
            PRIMARY KEY (chart, slot),
            FOREIGN KEY (chart) REFERENCES charts (name) ON DELETE CASCADE,
            FOREIGN KEY (album_id) REFERENCES albums (id)
        );

        CREATE INDEX IF NOT EXISTS idx_chart_entries_album_id ON chart_entries (album_id);

        COMMIT;",
    )
    .context("Failed to create schema")
}

/// Reads the full library.
///
/// # Errors
///
/// Returns an error if a query fails, or if a stored rank or listening value
/// is out of range.
pub(crate) fn load_library(conn: &Connection) -> Result<Library> {
    let mut albums = fetch_albums(conn)?;

    let mut stmt = conn.prepare_cached("SELECT album_id, listener, status FROM listened")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Listened>(2)?,
        ))
    })?;
    for row in rows {
        let (album_id, listener, status) = row?;
        if let Some(album) = albums.get_mut(&album_id) {
            album.links.listened.insert(listener, status);
        }
    }

    let mut histories = fetch_histories(conn)?;

    let mut stmt =
        conn.prepare_cached("SELECT album_id, chart, rank, last_updated FROM rankings")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Rank>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    for row in rows {
        let (album_id, chart, rank, last_updated) = row?;
        let history = histories
            .remove(&(album_id.clone(), chart.clone()))
            .unwrap_or_default();
        if let Some(album) = albums.get_mut(&album_id) {
            album.rankings.insert(
                chart.clone(),
                Ranking {
                    chart,
                    rank,
                    last_updated,
                    history,
                },
            );
        }
    }

    let charts = fetch_charts(conn)?;

    info!(albums = albums.len(), charts = charts.len(), "Loaded library");
    Ok(Library { albums, charts })
}

fn fetch_albums(conn: &Connection) -> Result<BTreeMap<String, Album>> {
    let sql = "
        SELECT id, title, artist, year, genre, rating, rating_count, qwr, duration, country,
               album_url, artist_url, streaming_link, in_library, purchased, jointly_listened
        FROM albums
    ";

    let mut stmt = conn.prepare_cached(sql)?;
    let results = stmt
        .query_map([], Album::from_row)?
        .map(|album| album.map(|a| (a.id.clone(), a)))
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    Ok(results)
}

fn fetch_histories(conn: &Connection) -> Result<BTreeMap<(String, String), RankHistory>> {
    let mut stmt = conn.prepare_cached(
        "SELECT album_id, chart, rank, date FROM rank_history ORDER BY album_id, chart, seq",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            HistoryEntry {
                rank: row.get(2)?,
                date: row.get(3)?,
            },
        ))
    })?;

    let mut grouped: BTreeMap<(String, String), Vec<HistoryEntry>> = BTreeMap::new();
    for row in rows {
        let (album_id, chart, entry) = row?;
        grouped.entry((album_id, chart)).or_default().push(entry);
    }

    Ok(grouped
        .into_iter()
        .map(|(key, entries)| (key, entries.into_iter().collect()))
        .collect())
}

fn fetch_charts(conn: &Connection) -> Result<BTreeMap<String, Chart>> {
    let mut stmt =
        conn.prepare_cached("SELECT chart, slot, album_id FROM chart_entries ORDER BY chart, slot")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;
    let mut slots: BTreeMap<String, Vec<Option<String>>> = BTreeMap::new();
    for row in rows {
        let (chart, album_id) = row?;
        slots.entry(chart).or_default().push(album_id);
    }

    let mut stmt = conn.prepare_cached("SELECT name, link, scanned_on FROM charts")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut charts = BTreeMap::new();
    for row in rows {
        let (name, link, scanned_on) = row?;
        let entries: ChartEntries = slots.remove(&name).unwrap_or_default().into_iter().collect();
        charts.insert(
            name.clone(),
            Chart {
                name,
                kind: ChartKind::Live { link },
                scanned_on,
                entries,
            },
        );
    }

    Ok(charts)
}

/// Replaces the stored library with `library`.
///
/// The whole write happens in one transaction, so a failure leaves the
/// previously saved library in place.
///
/// # Errors
///
/// Returns an error if the transaction fails or a constraint is violated,
/// for example a chart slot naming an album that is not in the library.
pub(crate) fn save_library(conn: &mut Connection, library: &Library) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM chart_entries", [])?;
    tx.execute("DELETE FROM charts", [])?;
    tx.execute("DELETE FROM rank_history", [])?;
    tx.execute("DELETE FROM rankings", [])?;
    tx.execute("DELETE FROM listened", [])?;
    tx.execute("DELETE FROM albums", [])?;

    {
        let mut insert_album = tx.prepare_cached(
            "INSERT INTO albums (id, title, artist, year, genre, rating, rating_count, qwr,
                duration, country, album_url, artist_url, streaming_link, in_library,
                purchased, jointly_listened)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )?;
        let mut insert_listened = tx.prepare_cached(
            "INSERT INTO listened (album_id, listener, status) VALUES (?1, ?2, ?3)",
        )?;
        let mut insert_ranking = tx.prepare_cached(
            "INSERT INTO rankings (album_id, chart, rank, last_updated) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut insert_history = tx.prepare_cached(
            "INSERT INTO rank_history (album_id, chart, seq, rank, date) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for album in library.albums.values() {
            let links = &album.links;
            insert_album.execute(params![
                album.id,
                album.title,
                album.artist,
                album.year,
                album.genre,
                album.rating,
                album.rating_count,
                album.qwr,
                album.duration,
                album.country,
                links.album_url,
                links.artist_url,
                links.streaming,
                links.in_local_library,
                links.purchased,
                links.jointly_listened,
            ])?;

            for (listener, status) in &links.listened {
                insert_listened.execute(params![album.id, listener, status])?;
            }

            for ranking in album.rankings.values() {
                insert_ranking.execute(params![
                    album.id,
                    ranking.chart,
                    ranking.rank,
                    ranking.last_updated
                ])?;
                for (seq, entry) in ranking.history.entries().iter().enumerate() {
                    insert_history.execute(params![
                        album.id,
                        ranking.chart,
                        seq as i64,
                        entry.rank,
                        entry.date
                    ])?;
                }
            }
        }

        let mut insert_chart =
            tx.prepare_cached("INSERT INTO charts (name, link, scanned_on) VALUES (?1, ?2, ?3)")?;
        let mut insert_entry = tx.prepare_cached(
            "INSERT INTO chart_entries (chart, slot, album_id) VALUES (?1, ?2, ?3)",
        )?;

        for chart in library.charts.values() {
            let Some(link) = chart.link() else {
                debug!(chart = %chart.name, "Skipping derived chart");
                continue;
            };
            insert_chart.execute(params![chart.name, link, chart.scanned_on])?;
            for (slot, album_id) in chart.entries.slots().iter().enumerate() {
                insert_entry.execute(params![chart.name, slot as i64, album_id])?;
            }
        }
    }

    tx.commit().context("Failed to commit transaction")?;

    info!(
        albums = library.albums.len(),
        charts = library.charts.len(),
        "Saved library"
    );
    Ok(())
}
