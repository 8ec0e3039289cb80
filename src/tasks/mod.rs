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

//! Application task processing.
//!
//! Each command line subcommand is an [`AppTask`]. Tasks run one at a time
//! against the library loaded at startup; a task that changes the library
//! saves it before returning, so a failure in a later task never loses the
//! work of an earlier one.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::{
    config::{self, AppConfig},
    db,
    error::LibraryError,
    library::Library,
    model::{Album, Listened, date},
    reconcile::{Enricher, ReconcileReport, Reconciler, RefreshOptions},
    reject::derive_reject_chart,
    report,
    source::{ChartSource, NetworkEnricher},
};

const CHART_LIST_DELIMITER: &str = "::";

#[derive(Debug, Subcommand)]
pub(crate) enum AppTask {
    /// Write the configuration file.
    Setup(SetupArgs),

    /// Scan a ranked list into a chart, creating the chart if it is new.
    ScanChart {
        name: String,
        link: String,
        #[command(flatten)]
        refresh: RefreshArgs,
    },

    /// Re-fetch a known chart from its stored link.
    UpdateChart {
        name: String,
        /// Fetch from this link instead. The stored link is kept.
        #[arg(long)]
        link: Option<String>,
        #[command(flatten)]
        refresh: RefreshArgs,
    },

    /// Scan every chart in a file of `name::link` lines.
    ScanCharts {
        file: PathBuf,
        #[command(flatten)]
        refresh: RefreshArgs,
    },

    /// Write the reject chart of a chart as CSV.
    RejectChart {
        base: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a chart as CSV.
    WriteChart {
        name: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy the listening columns of a chart spreadsheet into the library.
    ReadChart {
        file: PathBuf,
        chart: String,
        /// Overwrite stored values instead of merging.
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a chart along with every album's ranking on it.
    DeleteChart { name: String },

    /// Record whether a listener has heard the album at a chart rank.
    SetListened {
        chart: String,
        rank: usize,
        listener: String,
        /// yes, no, or ?
        status: String,
    },

    /// Print an album's rankings and their history.
    ShowHistory { album_id: String },
}

#[derive(Debug, Args)]
pub(crate) struct SetupArgs {
    #[arg(long)]
    database: Option<String>,
    #[arg(long)]
    library_dir: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    request_delay_ms: Option<u64>,
    #[arg(long)]
    spotify_client_id: Option<String>,
    #[arg(long)]
    spotify_client_secret: Option<String>,
}

/// Lookups repeated for albums already in the library. New albums always
/// get every lookup.
#[derive(Debug, Clone, Copy, Default, Args)]
pub(crate) struct RefreshArgs {
    /// Look up streaming links again.
    #[arg(long)]
    update_streaming: bool,
    /// Look up running times again.
    #[arg(long)]
    update_duration: bool,
}

impl From<RefreshArgs> for RefreshOptions {
    fn from(args: RefreshArgs) -> Self {
        Self {
            streaming: args.update_streaming,
            duration: args.update_duration,
        }
    }
}

/// Writes the configuration from `args`, on top of the defaults.
pub(crate) fn setup(args: SetupArgs, path: Option<&Path>) -> Result<()> {
    let defaults = AppConfig::default();
    let config = AppConfig {
        database_file: args.database.unwrap_or(defaults.database_file),
        library_dir: args.library_dir,
        base_url: args.base_url.unwrap_or(defaults.base_url),
        request_delay_ms: args.request_delay_ms.unwrap_or(defaults.request_delay_ms),
        spotify_client_id: args.spotify_client_id,
        spotify_client_secret: args.spotify_client_secret,
        ..defaults
    };

    config.validate()?;
    config::save_config(&config, path)?;
    info!("Saved configuration");
    println!("Configuration saved");
    Ok(())
}

/// Bundles shared resources required by task handlers to simplify resource
/// passing when invoking those handler functions.
pub(crate) struct TaskContext<'a> {
    pub(crate) config: &'a AppConfig,
    pub(crate) conn: &'a mut Connection,
    pub(crate) library: &'a mut Library,
    pub(crate) listeners: &'a [String],
}

impl TaskContext<'_> {
    fn save(&mut self) -> Result<()> {
        db::save_library(self.conn, self.library).context("Failed to save library")
    }
}

fn reconciler<'e>(
    enricher: &'e mut dyn Enricher,
    listeners: &'e [String],
    refresh: RefreshArgs,
) -> Reconciler<'e> {
    Reconciler {
        enricher,
        listeners,
        refresh: refresh.into(),
        today: date::today(),
    }
}

/// Runs a single task.
///
/// [`AppTask::Setup`] never reaches here, as it runs before there is a
/// configuration to build a context from.
pub(crate) fn handle_task(task: AppTask, ctx: &mut TaskContext) -> Result<()> {
    match task {
        AppTask::Setup(_) => Ok(()),

        AppTask::ScanChart {
            name,
            link,
            refresh,
        } => scan_chart(ctx, &name, &link, refresh),
        AppTask::UpdateChart {
            name,
            link,
            refresh,
        } => update_chart(ctx, &name, link.as_deref(), refresh),
        AppTask::ScanCharts { file, refresh } => scan_charts(ctx, &file, refresh),

        AppTask::RejectChart { base, output } => reject_chart(ctx, &base, output.as_deref()),
        AppTask::WriteChart { name, output } => write_chart(ctx, &name, output.as_deref()),

        AppTask::ReadChart {
            file,
            chart,
            overwrite,
        } => read_chart(ctx, &file, &chart, overwrite),
        AppTask::DeleteChart { name } => delete_chart(ctx, &name),
        AppTask::SetListened {
            chart,
            rank,
            listener,
            status,
        } => set_listened(ctx, &chart, rank, &listener, &status),
        AppTask::ShowHistory { album_id } => show_history(ctx, &album_id),
    }
}

fn print_report(report: &ReconcileReport) {
    println!(
        "{}: {} albums, {} new, {} rejected",
        report.chart,
        report.size,
        report.created.len(),
        report.rejected.len()
    );
    for malformed in &report.malformed {
        println!("  skipped {}", malformed);
    }
}

/// Fetches a chart from `source` and scans it, saving the library.
fn scan_from<S: ChartSource + Enricher>(
    ctx: &mut TaskContext,
    source: &mut S,
    name: &str,
    link: &str,
    refresh: RefreshArgs,
) -> Result<ReconcileReport> {
    let snapshot = source.fetch_snapshot(link)?;

    let report = reconciler(source, ctx.listeners, refresh)
        .scan_chart(ctx.library, name, link, snapshot)?;

    ctx.save()?;
    Ok(report)
}

fn scan_chart(ctx: &mut TaskContext, name: &str, link: &str, refresh: RefreshArgs) -> Result<()> {
    let mut enricher = NetworkEnricher::from_config(ctx.config)?;
    let report = scan_from(ctx, &mut enricher, name, link, refresh)?;
    print_report(&report);
    Ok(())
}

fn update_chart(
    ctx: &mut TaskContext,
    name: &str,
    link: Option<&str>,
    refresh: RefreshArgs,
) -> Result<()> {
    let chart = ctx.library.chart(name)?;
    if chart.is_reject_chart() {
        return Err(LibraryError::RejectChartReadOnly(name.to_string()).into());
    }
    let link = match (link, chart.link()) {
        (Some(link), _) | (None, Some(link)) => link.to_string(),
        (None, None) => return Err(LibraryError::RejectChartReadOnly(name.to_string()).into()),
    };

    let mut enricher = NetworkEnricher::from_config(ctx.config)?;
    let snapshot = enricher.fetch_snapshot(&link)?;

    let report = reconciler(&mut enricher, ctx.listeners, refresh)
        .update_chart(ctx.library, name, snapshot)?;

    ctx.save()?;
    print_report(&report);
    Ok(())
}

/// Charts named in a batch file, plus the lines that could not be read.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ChartList {
    pub(crate) charts: Vec<(String, String)>,
    pub(crate) malformed: Vec<(usize, String)>,
}

/// Reads `name::link` lines. Blank lines and lines starting with `#` are
/// skipped; line numbers in `malformed` are 1-based.
pub(crate) fn parse_chart_list(text: &str) -> ChartList {
    let mut list = ChartList::default();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.split_once(CHART_LIST_DELIMITER) {
            Some((name, link)) if !name.trim().is_empty() && !link.trim().is_empty() => {
                list.charts
                    .push((name.trim().to_string(), link.trim().to_string()));
            }
            _ => list.malformed.push((index + 1, line.to_string())),
        }
    }

    list
}

fn scan_charts(ctx: &mut TaskContext, file: &Path, refresh: RefreshArgs) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read chart list {}", file.display()))?;
    let list = parse_chart_list(&text);

    for (line, content) in &list.malformed {
        warn!(line, %content, "Skipping malformed chart line");
        println!("line {}: expected name{}link, skipped", line, CHART_LIST_DELIMITER);
    }

    let mut enricher = NetworkEnricher::from_config(ctx.config)?;
    let failed = scan_listed(ctx, &mut enricher, &list.charts, refresh);
    if failed > 0 {
        anyhow::bail!("{} of {} charts failed to scan", failed, list.charts.len());
    }
    Ok(())
}

/// Scans each chart through the one `source`, carrying on past failures.
/// Returns how many charts failed.
fn scan_listed<S: ChartSource + Enricher>(
    ctx: &mut TaskContext,
    source: &mut S,
    charts: &[(String, String)],
    refresh: RefreshArgs,
) -> usize {
    info!(charts = charts.len(), "Scanning charts");
    let mut failed = 0;
    for (name, link) in charts {
        match scan_from(ctx, source, name, link, refresh) {
            Ok(report) => print_report(&report),
            Err(e) => {
                error!(chart = %name, "Scan failed: {:#}", e);
                println!("{}: failed: {:#}", name, e);
                failed += 1;
            }
        }
    }
    failed
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn reject_chart(ctx: &mut TaskContext, base: &str, output: Option<&Path>) -> Result<()> {
    let chart = derive_reject_chart(ctx.library, base, &date::today())?;
    let mut out = output_writer(output)?;
    report::write_chart(&mut out, ctx.library, &chart, ctx.listeners)
}

fn write_chart(ctx: &mut TaskContext, name: &str, output: Option<&Path>) -> Result<()> {
    let chart = ctx.library.chart(name)?;
    let mut out = output_writer(output)?;
    report::write_chart(&mut out, ctx.library, chart, ctx.listeners)
}

fn read_chart(ctx: &mut TaskContext, file: &Path, chart: &str, overwrite: bool) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read spreadsheet {}", file.display()))?;
    let rows = report::read_csv(text.strip_prefix('\u{feff}').unwrap_or(&text));

    let summary = report::read_chart(ctx.library, chart, &rows, overwrite)?;
    ctx.save()?;

    println!(
        "{}: {} albums synced, {} rows skipped",
        chart,
        summary.synced,
        summary.skipped.len()
    );
    for rank in &summary.skipped {
        println!("  row for rank {} does not match the chart", rank);
    }
    Ok(())
}

fn delete_chart(ctx: &mut TaskContext, name: &str) -> Result<()> {
    let removed = ctx.library.delete_chart(name)?;
    ctx.save()?;
    println!("Deleted {} and {} rankings", name, removed);
    Ok(())
}

/// Finds the album at `rank` on `chart` and sets one listener's state,
/// overwriting whatever was there.
pub(crate) fn set_listened_at<'a>(
    library: &'a mut Library,
    chart: &str,
    rank: usize,
    listener: &str,
    status: Listened,
) -> Result<&'a Album, LibraryError> {
    let id = library
        .chart(chart)?
        .entries
        .get(rank)
        .map(str::to_string)
        .ok_or_else(|| LibraryError::EmptySlot {
            chart: chart.to_string(),
            rank,
        })?;

    let album = library
        .album_mut(&id)
        .ok_or_else(|| LibraryError::AlbumNotFound(id.clone()))?;
    album.sync_listened(&[status], &[listener.to_string()], true);
    Ok(album)
}

fn set_listened(
    ctx: &mut TaskContext,
    chart: &str,
    rank: usize,
    listener: &str,
    status: &str,
) -> Result<()> {
    let status = Listened::parse(status);
    let album = set_listened_at(ctx.library, chart, rank, listener, status)?;
    println!("{} - {}: {} = {}", album.artist, album.title, listener, status);
    ctx.save()
}

/// An album's rankings and history as printable text.
pub(crate) fn format_history(album: &Album) -> String {
    let mut text = format!(
        "{} - {} ({}) [{}]\n",
        album.artist, album.title, album.year, album.id
    );
    for ranking in album.rankings.values() {
        text.push_str(&format!(
            "  {}: {} since {}\n",
            ranking.chart, ranking.rank, ranking.last_updated
        ));
        for entry in ranking.history.entries() {
            let when = if entry.date.is_empty() {
                "-"
            } else {
                entry.date.as_str()
            };
            text.push_str(&format!("    {:<10}  {}\n", when, entry.rank));
        }
    }
    text
}

fn show_history(ctx: &mut TaskContext, album_id: &str) -> Result<()> {
    let album = ctx
        .library
        .album(album_id)
        .ok_or_else(|| LibraryError::AlbumNotFound(album_id.to_string()))?;
    print!("{}", format_history(album));
    Ok(())
}
