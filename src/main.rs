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

//! # Chart Helper.
//!
//! Keeps a library of albums in step with ranked album lists published on a
//! music website.
//!
//! Each scan of a list is reconciled against the library: new albums are
//! added, known albums are refreshed, every album's position is recorded in
//! its ranking history, and albums that dropped off the list are marked as
//! rejected. Charts can be written out as CSV for a spreadsheet, and the
//! rejected albums of a chart can be listed grouped by the date they fell
//! off.
//!
//! ## Architecture
//!
//! The application runs one task per invocation, strictly in sequence:
//!
//! * The **configuration** is loaded and validated first. Any problem with it
//!   ends the run before the library is touched.
//! * The **library** is loaded from SQLite, handed to the task by reference,
//!   and saved by the task once it has changed it.
//! * **Collaborators** (the list site, the streaming service, and the local
//!   music library) sit behind the enrichment trait so the core can run
//!   without them.

mod config;
mod db;
mod error;
mod library;
mod model;
mod reconcile;
mod reject;
mod report;
mod source;
mod tasks;
mod util;

use std::{fs::File, io, path::PathBuf, sync::Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::tasks::{AppTask, TaskContext};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the configuration file. Defaults to the per-user location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Listener names, comma separated, for the listening columns.
    #[arg(long, global = true, value_delimiter = ',')]
    listeners: Vec<String>,

    /// Log progress.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log everything.
    #[arg(long, global = true)]
    debug: bool,

    /// Also write a full debug log to this file.
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    task: AppTask,
}

impl Cli {
    fn level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::DEBUG
        } else if self.verbose {
            LevelFilter::INFO
        } else {
            LevelFilter::WARN
        }
    }
}

/// Sets up console logging, plus a file log when one was asked for.
///
/// The `LOG_LEVEL` environment variable overrides the console level.
fn init_logging(cli: &Cli) -> Result<()> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(cli.level().into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        );

    let file = match &cli.log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to initialise logging")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    debug!(?cli, "Starting");

    let config_path = cli.config.as_deref();
    let task = match cli.task {
        AppTask::Setup(args) => return tasks::setup(args, config_path),
        task => task,
    };

    let config = config::load_config(config_path).context("Configuration error")?;

    let mut conn = db::init_db(&config.database_file)?;
    let mut library = db::load_library(&conn)?;

    let mut ctx = TaskContext {
        config: &config,
        conn: &mut conn,
        library: &mut library,
        listeners: &cli.listeners,
    };

    tasks::handle_task(task, &mut ctx)
}
