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

//! Network and filesystem collaborators.
//!
//! Everything the reconciliation engine needs from outside the library lives
//! here: the ranked-list site that supplies snapshots and album details, the
//! streaming service, and the local music library. [`NetworkEnricher`] ties
//! them together behind the [`Enricher`] and [`ChartSource`] traits.
//!
//! # Sub-modules
//!
//! * [`local`]: Index of album directories on disk.
//! * [`progarchives`]: Chart, album, and artist pages of the ranked-list site.
//! * [`spotify`]: Streaming link searches.

pub(crate) mod local;
pub(crate) mod progarchives;
pub(crate) mod spotify;

use std::{
    path::Path,
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    model::Album,
    reconcile::{Enricher, Lookups, Snapshot},
};
use local::LocalLibrary;
use progarchives::ProgArchives;
use spotify::SpotifyClient;

/// Keeps successive requests at least a fixed delay apart.
pub(crate) struct RequestThrottle {
    delay: Duration,
    last_request: Option<Instant>,
}

impl RequestThrottle {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: None,
        }
    }

    /// Blocks until the delay since the previous call has passed. The first
    /// call never blocks.
    pub(crate) fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                thread::sleep(self.delay - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// Stores a looked-up value. A page without the value leaves what is
/// already known.
fn keep_known(field: &mut Option<String>, found: Option<String>) {
    if found.is_some() {
        *field = found;
    }
}

/// The production [`Enricher`].
///
/// The streaming and local library collaborators are optional; lookups for
/// a collaborator that is not configured are skipped.
pub(crate) struct NetworkEnricher {
    site: ProgArchives,
    streaming: Option<SpotifyClient>,
    local: Option<LocalLibrary>,
}

impl NetworkEnricher {
    pub(crate) fn from_config(config: &AppConfig) -> Result<Self> {
        let site = ProgArchives::new(&config.base_url, RequestThrottle::new(config.request_delay()))?;

        let streaming = match config.spotify_credentials() {
            Some((id, secret)) => Some(SpotifyClient::new(
                id,
                secret,
                RequestThrottle::new(config.request_delay()),
            )?),
            None => {
                debug!("No streaming credentials configured");
                None
            }
        };

        let local = match &config.library_dir {
            Some(dir) => Some(LocalLibrary::index(Path::new(dir))?),
            None => None,
        };

        Ok(Self {
            site,
            streaming,
            local,
        })
    }
}

/// Supplies the snapshot behind a chart link.
pub(crate) trait ChartSource {
    fn fetch_snapshot(&mut self, link: &str) -> Result<Snapshot>;
}

impl ChartSource for NetworkEnricher {
    fn fetch_snapshot(&mut self, link: &str) -> Result<Snapshot> {
        self.site.fetch_snapshot(link)
    }
}

impl Enricher for NetworkEnricher {
    fn enrich(&mut self, album: &mut Album, lookups: Lookups) {
        if lookups.local_library {
            if let Some(local) = &self.local {
                album.links.in_local_library = local.contains(&album.artist, &album.title);
            }
        }

        if lookups.duration {
            match self.site.fetch_duration(&album.links.album_url) {
                Ok(duration) => keep_known(&mut album.duration, duration),
                Err(e) => warn!(album = %album.id, "Duration lookup failed: {:#}", e),
            }
        }

        if lookups.country {
            match self.site.fetch_country(&album.links.artist_url) {
                Ok(country) => keep_known(&mut album.country, country),
                Err(e) => warn!(album = %album.id, "Country lookup failed: {:#}", e),
            }
        }

        if lookups.streaming {
            if let Some(streaming) = &mut self.streaming {
                match streaming.find_album(&album.artist, &album.title, album.year) {
                    Ok(link) => album.links.streaming = link,
                    Err(e) => warn!(album = %album.id, "Streaming lookup failed: {:#}", e),
                }
            }
        }
    }
}
