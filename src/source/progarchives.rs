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

//! The ranked-list site.
//!
//! Pages are fetched with a blocking client, one at a time, behind a
//! [`RequestThrottle`]. Parsing is plain pattern matching over the markup,
//! scoped to the table rows, cells, and headings that carry the data, so the
//! parsers can be tested offline against captured page fragments.
//!
//! # Pages
//!
//! * Chart pages: one table row per album, in rank order.
//! * Album pages: the track listing, used to work out the running time.
//! * Artist pages: the `<h2>` header, which reads `genre • country`.

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use super::RequestThrottle;
use crate::{
    error::MalformedObservation,
    reconcile::{Observation, Snapshot},
    util::format::{add_times, format_time, parse_time},
};

pub(crate) struct ProgArchives {
    client: Client,
    base_url: String,
    throttle: RequestThrottle,
    parser: PageParser,
}

impl ProgArchives {
    pub(crate) fn new(base_url: &str, throttle: RequestThrottle) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("charthelper/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            throttle,
            parser: PageParser::new().context("Failed to compile page patterns")?,
        })
    }

    fn fetch_page(&mut self, url: &str) -> Result<String> {
        self.throttle.wait();

        debug!(%url, "Requesting page");
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Request for {} failed", url))?;

        let status = response.status();
        debug!(%url, %status, "Received page");
        if !status.is_success() {
            anyhow::bail!("Request for {} failed with status {}", url, status);
        }

        Ok(response.text()?)
    }

    /// Fetches a chart page and reads its rows, in rank order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the page cannot be fetched. Rows that cannot
    /// be read are returned as [`MalformedObservation`]s in their rank
    /// position.
    pub(crate) fn fetch_snapshot(&mut self, link: &str) -> Result<Snapshot> {
        info!(%link, "Scanning chart page");
        let html = self.fetch_page(link)?;
        let snapshot = self.parser.parse_chart(&html, &self.base_url);
        info!(%link, albums = snapshot.len(), "Read chart page");
        Ok(snapshot)
    }

    /// Works out an album's running time from its page. `None` when the page
    /// carries no usable stamps.
    pub(crate) fn fetch_duration(&mut self, album_url: &str) -> Result<Option<String>> {
        let html = self.fetch_page(album_url)?;
        let duration = self.parser.parse_duration(&html);
        info!(%album_url, duration = ?duration, "Found duration");
        Ok(duration)
    }

    pub(crate) fn fetch_country(&mut self, artist_url: &str) -> Result<Option<String>> {
        let html = self.fetch_page(artist_url)?;
        let country = self.parser.parse_country(&html);
        if country.is_none() {
            warn!(%artist_url, "No country in artist header");
        }
        Ok(country)
    }
}

struct PageParser {
    row: Regex,
    cell: Regex,
    album_link: Regex,
    artist_link: Regex,
    anchor: Regex,
    year: Regex,
    rating: Regex,
    rating_count: Regex,
    qwr: Regex,
    tag: Regex,
    line_break: Regex,
    whitespace: Regex,
    heading: Regex,
    listing: Regex,
    total_time: Regex,
    total_stamp: Regex,
    track_stamp: Regex,
}

impl PageParser {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            row: Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>")?,
            cell: Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>")?,
            album_link: Regex::new(r#"(?is)<a\b[^>]*href="([^"]*album\.asp\?id=(\d+))"[^>]*>(.*?)</a>"#)?,
            artist_link: Regex::new(r#"(?is)<a\b[^>]*href="([^"]*artist\.asp\?id=\d+)"[^>]*>(.*?)</a>"#)?,
            anchor: Regex::new(r"(?is)<a\b[^>]*>(.*?)</a>")?,
            year: Regex::new(r"\b(\d{4})\b")?,
            rating: Regex::new(r"\d\.\d+")?,
            rating_count: Regex::new(r"(?i)(\d[\d,]*)\s*ratings?")?,
            qwr: Regex::new(r"(?i)QWR\s*=\s*(\d\.\d*)")?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
            line_break: Regex::new(r"(?i)<br\s*/?>|</p>")?,
            whitespace: Regex::new(r"[ \t\r\u{a0}]+")?,
            heading: Regex::new(r"(?is)<h2\b[^>]*>(.*?)</h2>")?,
            listing: Regex::new(r"(?is)tracks\s+listing(.*?)(?:line-up\s*/\s*musicians|$)")?,
            total_time: Regex::new(r"(?i)total(?: | \w+ )time.*")?,
            total_stamp: Regex::new(r"\d{2,3}:\d{2}")?,
            track_stamp: Regex::new(r"\d{1,2}:\d{2}")?,
        })
    }

    /// Markup to single-line text.
    fn text(&self, html: &str) -> String {
        let stripped = self.tag.replace_all(html, " ");
        let decoded = decode_entities(&stripped);
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Markup to text, one entry per line break.
    fn lines(&self, html: &str) -> Vec<String> {
        let broken = self.line_break.replace_all(html, "\n");
        let stripped = self.tag.replace_all(&broken, "");
        decode_entities(&stripped)
            .lines()
            .map(|line| self.whitespace.replace_all(line, " ").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }

    fn parse_chart(&self, html: &str, base_url: &str) -> Snapshot {
        self.row
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|row| row.as_str())
            .filter(|row| self.album_link.is_match(row))
            .enumerate()
            .map(|(i, row)| {
                let rank = i + 1;
                let observation = self.parse_chart_row(rank, row, base_url);
                if let Err(e) = &observation {
                    warn!(rank, reason = %e.reason, "Malformed chart row");
                }
                observation
            })
            .collect()
    }

    fn parse_chart_row(
        &self,
        rank: usize,
        row: &str,
        base_url: &str,
    ) -> Result<Observation, MalformedObservation> {
        let malformed = |reason: &str| MalformedObservation::new(rank, reason);

        let cells: Vec<&str> = self
            .cell
            .captures_iter(row)
            .filter_map(|caps| caps.get(1))
            .map(|cell| cell.as_str())
            .collect();
        if cells.len() < 5 {
            return Err(malformed(&format!("expected 5 cells, found {}", cells.len())));
        }

        let album = self
            .album_link
            .captures(cells[3])
            .ok_or_else(|| malformed("missing album link"))?;
        let artist = self
            .artist_link
            .captures(cells[3])
            .ok_or_else(|| malformed("missing artist link"))?;
        let id = &album[2];
        let malformed = |reason: &str| MalformedObservation::for_album(rank, id, reason);

        let genre = self
            .anchor
            .captures(cells[4])
            .map(|caps| self.text(&caps[1]))
            .unwrap_or_default();
        let year = self
            .year
            .captures(&self.text(cells[4]))
            .and_then(|caps| caps[1].parse::<u16>().ok())
            .ok_or_else(|| malformed("missing year"))?;

        let stats = self.text(cells[2]);
        let (before_qwr, _) = stats.split_once("QWR").unwrap_or((stats.as_str(), ""));
        let rating = self
            .rating
            .find(before_qwr)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .ok_or_else(|| malformed("unparsable rating"))?;
        let rating_count = self
            .rating_count
            .captures(&stats)
            .and_then(|caps| caps[1].replace(',', "").parse::<u32>().ok())
            .ok_or_else(|| malformed("unparsable rating count"))?;
        let qwr = self
            .qwr
            .captures(&stats)
            .and_then(|caps| caps[1].parse::<f64>().ok());

        let observation = Observation {
            id: id.to_string(),
            title: self.text(&album[3]),
            artist: self.text(&artist[2]),
            year,
            genre,
            rating,
            rating_count,
            qwr,
            album_url: absolute_url(base_url, &album[1]),
            artist_url: absolute_url(base_url, &artist[1]),
            streaming: None,
        };
        debug!(rank, album = %observation.id, title = %observation.title, artist = %observation.artist, "Found album");
        Ok(observation)
    }

    /// Running time of an album page.
    ///
    /// One "total time" line is used as it stands and two are summed, as a
    /// two-disc release lists one per disc. Anything else falls back to
    /// adding up every track stamp in the listing.
    fn parse_duration(&self, html: &str) -> Option<String> {
        let listing = self
            .listing
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map_or(html, |m| m.as_str());
        let lines = self.lines(listing);

        let totals: Vec<&str> = lines
            .iter()
            .filter_map(|line| self.total_time.find(line))
            .map(|m| m.as_str())
            .collect();

        match totals.as_slice() {
            [total] => {
                debug!("Found one total time, using it");
                self.total_stamp.find(total).map(|m| m.as_str().to_string())
            }
            [first, second] => {
                debug!("Found two total times, adding them together");
                let first = self.total_stamp.find(first)?.as_str();
                match self.total_stamp.find(second) {
                    Some(second) => add_times(first, second.as_str()),
                    None => Some(first.to_string()),
                }
            }
            _ => {
                debug!("No clear total time, adding up tracks");
                let seconds: u64 = lines
                    .iter()
                    .flat_map(|line| self.track_stamp.find_iter(line))
                    .filter_map(|m| parse_time(m.as_str()))
                    .sum();
                (seconds > 0).then(|| format_time(seconds))
            }
        }
    }

    fn parse_country(&self, html: &str) -> Option<String> {
        self.heading
            .captures_iter(html)
            .map(|caps| self.text(&caps[1]))
            .find_map(|heading| {
                let (_, country) = heading.split_once('•')?;
                let country = country.trim();
                (!country.is_empty()).then(|| country.to_string())
            })
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&bull;", "•")
        .replace("&#8226;", "•")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://www.progarchives.com/";

    fn parser() -> PageParser {
        PageParser::new().unwrap()
    }

    fn chart_row(rank: u32, id: &str, title: &str, artist: &str, stats: &str, genre_cell: &str) -> String {
        format!(
            r#"<tr style="background-color:#f0f0f0">
              <td><strong>{rank}</strong></td>
              <td><a href="album.asp?id={id}"><img src="cover.jpg"></a></td>
              <td><div class="stars"></div>{stats}</td>
              <td><a href="album.asp?id={id}"><strong>{title}</strong></a><br>
                  <a href="artist.asp?id=9{id}">{artist}</a></td>
              <td>{genre_cell}</td>
            </tr>"#
        )
    }

    fn chart_page(rows: &[String]) -> String {
        format!(
            "<html><body><table><tr><td>Rank</td><td></td><td>Rating</td><td>Album</td><td>Genre</td></tr>{}</table></body></html>",
            rows.join("\n")
        )
    }

    #[test]
    fn reads_chart_rows_in_order() {
        let html = chart_page(&[
            chart_row(
                1,
                "1234",
                "Close to the Edge",
                "Yes",
                "<span>4.65</span> | <span>3,250 ratings</span><br><span>QWR = 4.62</span>",
                r#"<a href="subgenre.asp?style=4">Symphonic Prog</a><br>1972"#,
            ),
            chart_row(
                2,
                "55",
                "Tom &amp; Jerry",
                "The Band",
                "4.50 | 120 ratings",
                r#"<a href="subgenre.asp?style=9">Canterbury Scene</a> 1970"#,
            ),
        ]);

        let snapshot = parser().parse_chart(&html, BASE);
        assert_eq!(snapshot.len(), 2);

        let first = snapshot[0].as_ref().unwrap();
        assert_eq!(first.id, "1234");
        assert_eq!(first.title, "Close to the Edge");
        assert_eq!(first.artist, "Yes");
        assert_eq!(first.year, 1972);
        assert_eq!(first.genre, "Symphonic Prog");
        assert_eq!(first.rating, 4.65);
        assert_eq!(first.rating_count, 3250);
        assert_eq!(first.qwr, Some(4.62));
        assert_eq!(first.album_url, "http://www.progarchives.com/album.asp?id=1234");
        assert_eq!(first.artist_url, "http://www.progarchives.com/artist.asp?id=91234");
        assert_eq!(first.streaming, None);

        let second = snapshot[1].as_ref().unwrap();
        assert_eq!(second.title, "Tom & Jerry");
        assert_eq!(second.qwr, None);
        assert_eq!(second.year, 1970);
    }

    #[test]
    fn bad_rows_are_reported_in_place() {
        let html = chart_page(&[
            chart_row(1, "1", "A", "X", "4.10 | 10 ratings", "<a>Zeuhl</a> 1973"),
            chart_row(2, "2", "B", "Y", "4.00 | 9 ratings", "<a>Zeuhl</a> unknown"),
            chart_row(3, "3", "C", "Z", "no stats", "<a>Zeuhl</a> 1975"),
            chart_row(4, "4", "D", "W", "3.90 | 8 ratings", "<a>Zeuhl</a> 1976"),
        ]);

        let snapshot = parser().parse_chart(&html, BASE);
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot[0].is_ok());
        assert_eq!(
            snapshot[1].as_ref().unwrap_err(),
            &MalformedObservation::for_album(2, "2", "missing year")
        );
        assert_eq!(
            snapshot[2].as_ref().unwrap_err(),
            &MalformedObservation::for_album(3, "3", "unparsable rating")
        );
        assert_eq!(snapshot[3].as_ref().unwrap().id, "4");
    }

    #[test]
    fn short_rows_are_malformed() {
        let html = r#"<table><tr><td><a href="album.asp?id=7">Seven</a></td></tr></table>"#;
        let snapshot = parser().parse_chart(html, BASE);
        assert_eq!(
            snapshot,
            vec![Err(MalformedObservation::new(1, "expected 5 cells, found 1"))]
        );
    }

    fn album_page(listing: &str) -> String {
        format!(
            "<html><body><h3>Songs / Tracks Listing</h3><p>{}</p><h3>Line-up / Musicians</h3><p>- Jon / vocals 1:23</p></body></html>",
            listing
        )
    }

    #[test]
    fn single_total_time_is_used_directly() {
        let html = album_page("1. Close to the Edge (18:50)<br>2. And You and I (10:09)<br><br>Total Time 37:51");
        assert_eq!(parser().parse_duration(&html).as_deref(), Some("37:51"));
    }

    #[test]
    fn two_total_times_are_summed() {
        let html = album_page(
            "CD 1<br>1. Part One (20:00)<br>Total time 39:45<br>CD 2<br>1. Part Two (22:00)<br>Total time: 44:27",
        );
        assert_eq!(parser().parse_duration(&html).as_deref(), Some("84:12"));
    }

    #[test]
    fn tracks_are_summed_without_a_total() {
        let html = album_page("1. Watcher (7:21)<br>2. Supper's Ready (22:58)");
        assert_eq!(parser().parse_duration(&html).as_deref(), Some("30:19"));
    }

    #[test]
    fn no_stamps_means_unknown_duration() {
        let html = album_page("Track listing not yet available");
        assert_eq!(parser().parse_duration(&html), None);
    }

    #[test]
    fn country_comes_from_the_artist_header() {
        let html = r#"<div><h1>GENESIS</h1><h2 style="color:#777">Symphonic Prog &bull; United Kingdom</h2></div>"#;
        assert_eq!(parser().parse_country(html).as_deref(), Some("United Kingdom"));

        let html = "<h2>Reviews</h2><h2>Zeuhl • France</h2>";
        assert_eq!(parser().parse_country(html).as_deref(), Some("France"));

        assert_eq!(parser().parse_country("<h2>Zeuhl</h2>"), None);
    }

    #[test]
    fn relative_links_are_joined_to_the_base() {
        assert_eq!(absolute_url(BASE, "album.asp?id=1"), "http://www.progarchives.com/album.asp?id=1");
        assert_eq!(absolute_url("http://x.org", "/artist.asp?id=2"), "http://x.org/artist.asp?id=2");
        assert_eq!(absolute_url(BASE, "https://y.org/a"), "https://y.org/a");
    }
}
