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

//! Local music library lookups.
//!
//! The library is expected to be laid out as `<root>/<letter>/<artist>/<album>`.
//! The directory tree is walked once and indexed, so checking an album is a
//! set lookup rather than a filesystem check.

use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result};
use tracing::{debug, info};
use walkdir::WalkDir;

pub(crate) struct LocalLibrary {
    albums: HashSet<(String, String)>,
}

impl LocalLibrary {
    /// Indexes every album directory under `root`.
    ///
    /// Unreadable entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` itself is not a readable directory.
    pub(crate) fn index(root: &Path) -> Result<Self> {
        std::fs::read_dir(root)
            .with_context(|| format!("Failed to read library directory {}", root.display()))?;

        let albums: HashSet<(String, String)> = WalkDir::new(root)
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter_map(|entry| {
                let album = entry.file_name().to_str()?;
                let artist = entry.path().parent()?.file_name()?.to_str()?;
                Some(key(artist, album))
            })
            .collect();

        info!(root = %root.display(), albums = albums.len(), "Indexed local library");
        Ok(Self { albums })
    }

    /// Whether the album is on disk, ignoring case.
    ///
    /// An artist filed without a leading "The " is found too.
    pub(crate) fn contains(&self, artist: &str, album: &str) -> bool {
        if self.albums.contains(&key(artist, album)) {
            debug!(%artist, %album, "Album found on disk");
            return true;
        }

        let found = artist
            .strip_prefix("The ")
            .is_some_and(|bare| self.albums.contains(&key(bare, album)));
        if found {
            debug!(%artist, %album, "Album found on disk without article");
        } else {
            debug!(%artist, %album, "Album not found on disk");
        }
        found
    }
}

fn key(artist: &str, album: &str) -> (String, String) {
    (artist.to_lowercase(), album.to_lowercase())
}
