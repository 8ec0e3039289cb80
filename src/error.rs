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

//! Error conditions the application distinguishes.
//!
//! Everything else travels as [`anyhow::Error`].

use std::path::PathBuf;

use thiserror::Error;

/// Lookup failures against the library. These are reported to the user and
/// leave the library untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum LibraryError {
    #[error("could not find chart '{0}'")]
    ChartNotFound(String),

    #[error("chart '{0}' is a reject chart and cannot be updated")]
    RejectChartReadOnly(String),

    #[error("reject chart '{0}' is derived and cannot be stored")]
    RejectChartNotStorable(String),

    #[error("could not find album '{0}'")]
    AlbumNotFound(String),

    #[error("chart '{chart}' has no album at rank {rank}")]
    EmptySlot { chart: String, rank: usize },
}

/// A snapshot row that could not be turned into an observation.
///
/// The album id is kept when the row got far enough to name its album, so a
/// listed album with a broken row is not mistaken for one that dropped off.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed observation at rank {rank}: {reason}")]
pub(crate) struct MalformedObservation {
    pub(crate) rank: usize,
    pub(crate) id: Option<String>,
    pub(crate) reason: String,
}

impl MalformedObservation {
    pub(crate) fn new(rank: usize, reason: impl Into<String>) -> Self {
        Self {
            rank,
            id: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn for_album(rank: usize, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rank,
            id: Some(id.into()),
            reason: reason.into(),
        }
    }
}

/// Missing or malformed settings. Always fatal.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] confy::ConfyError),

    #[error("no configuration at {0:?}, try running setup")]
    NotSetUp(PathBuf),

    #[error("no database file configured, try running setup")]
    MissingDatabase,

    #[error("library directory {0:?} is not a directory")]
    InvalidLibraryDir(PathBuf),

    #[error("both a Spotify client id and secret are needed, only one is set")]
    IncompleteSpotifyCredentials,
}
