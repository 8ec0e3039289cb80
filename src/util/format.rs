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

use tracing::debug;

/// Formats a duration in seconds as `M:SS`.
///
/// Minutes are not padded and are not folded into hours, so a double album
/// reads `84:12`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_time(65), "1:05");
/// assert_eq!(format_time(3600), "60:00");
/// ```
pub(crate) fn format_time(total_seconds: u64) -> String {
    let mins = total_seconds / 60;
    let secs = total_seconds % 60;
    format!("{}:{:02}", mins, secs)
}

/// Parses an `M:SS` stamp into seconds.
///
/// Seconds above 59 are accepted and carried, as some track listings are
/// sloppy about it.
pub(crate) fn parse_time(stamp: &str) -> Option<u64> {
    let (mins, secs) = stamp.trim().split_once(':')?;
    let mins: u64 = mins.parse().ok()?;
    let secs: u64 = secs.parse().ok()?;
    Some(mins * 60 + secs)
}

/// Adds two `M:SS` stamps, returning the formatted sum.
pub(crate) fn add_times(first: &str, second: &str) -> Option<String> {
    let total = parse_time(first)? + parse_time(second)?;
    let result = format_time(total);
    debug!(%first, %second, %result, "Added times");
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_unpadded() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(65), "1:05");
        assert_eq!(format_time(3600), "60:00");
    }

    #[test]
    fn parses_stamps() {
        assert_eq!(parse_time("4:07"), Some(247));
        assert_eq!(parse_time(" 101:00 "), Some(6060));
        assert_eq!(parse_time("4:7x"), None);
        assert_eq!(parse_time("unknown"), None);
    }

    #[test]
    fn adding_carries_seconds() {
        assert_eq!(add_times("39:45", "44:27").as_deref(), Some("84:12"));
        assert_eq!(add_times("0:00", "3:05").as_deref(), Some("3:05"));
        assert_eq!(add_times("1:00", "bad"), None);
    }
}
