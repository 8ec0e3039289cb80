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

//! Streaming service lookups.
//!
//! Uses the client-credentials flow, so no user account is involved. An
//! album is looked up with up to three searches of decreasing precision and
//! the first hit wins.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::RequestThrottle;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const SEARCH_LIMIT: &str = "3";
const MARKET: &str = "US";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    albums: AlbumPage,
}

impl SearchResponse {
    fn first_link(self) -> Option<String> {
        self.albums
            .items
            .into_iter()
            .find_map(|item| item.external_urls.spotify)
    }
}

#[derive(Deserialize)]
struct AlbumPage {
    #[serde(default)]
    items: Vec<AlbumItem>,
}

#[derive(Deserialize)]
struct AlbumItem {
    external_urls: ExternalUrls,
}

#[derive(Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub(crate) struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    token: Option<AccessToken>,
    throttle: RequestThrottle,
}

impl SpotifyClient {
    pub(crate) fn new(client_id: &str, client_secret: &str, throttle: RequestThrottle) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: None,
            throttle,
        })
    }

    fn access_token(&mut self) -> Result<String> {
        if let Some(token) = &self.token {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting access token");
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .context("Token request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Token request failed with status {}", response.status());
        }

        let body: TokenResponse = response.json()?;
        // Renew a minute early.
        let lifetime = Duration::from_secs(body.expires_in.saturating_sub(60));
        self.token = Some(AccessToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(body.access_token)
    }

    fn search(&mut self, query: &str) -> Result<Option<String>> {
        let token = self.access_token()?;
        self.throttle.wait();

        info!(%query, "Searching streaming service");
        let response = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("type", "album"),
                ("limit", SEARCH_LIMIT),
                ("market", MARKET),
            ])
            .send()
            .with_context(|| format!("Search for {} failed", query))?;

        if !response.status().is_success() {
            anyhow::bail!("Search for {} failed with status {}", query, response.status());
        }

        let body: SearchResponse = response.json()?;
        Ok(body.first_link())
    }

    /// Finds the album's streaming link, if it has one.
    pub(crate) fn find_album(&mut self, artist: &str, title: &str, year: u16) -> Result<Option<String>> {
        for query in search_queries(artist, title, year) {
            if let Some(link) = self.search(&query)? {
                info!(%artist, %title, %link, "Found streaming link");
                return Ok(Some(link));
            }
            debug!(%query, "No results, trying again");
        }

        info!(%artist, %title, "Not on streaming service");
        Ok(None)
    }
}

fn search_queries(artist: &str, title: &str, year: u16) -> [String; 3] {
    [
        format!("artist:{} album:{}", artist, title),
        format!("artist:{} year:{}", artist, year),
        format!("album:{} year:{}", title, year),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_loosen_in_order() {
        assert_eq!(
            search_queries("Genesis", "Foxtrot", 1972),
            [
                "artist:Genesis album:Foxtrot".to_string(),
                "artist:Genesis year:1972".to_string(),
                "album:Foxtrot year:1972".to_string(),
            ]
        );
    }

    #[test]
    fn empty_search_has_no_link() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"albums":{"total":0,"items":[]}}"#).unwrap();
        assert_eq!(parsed.first_link(), None);
    }

    #[test]
    fn search_response_takes_first_link() {
        let body = r#"{"albums":{"total":2,"items":[
            {"external_urls":{}},
            {"external_urls":{"spotify":"https://open.spotify.com/album/abc"}}
        ]}}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.first_link().as_deref(), Some("https://open.spotify.com/album/abc"));
    }
}
