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

//! Observation dates.
//!
//! Dates are kept as the `dd/mm/yyyy` strings they were recorded with, since
//! that is what gets persisted and rendered. Ordering needs the calendar
//! value, so [`date_sort_key`] reorders them to year/month/day.

use chrono::{Local, NaiveDate};

pub(crate) const DATE_FORMAT: &str = "%d/%m/%Y";

/// Today's date in the observation format.
pub(crate) fn today() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

/// Key used to order observation dates chronologically.
///
/// Unparsable dates (including the empty placeholder date) sort before every
/// real date, and among themselves by their text.
pub(crate) fn date_sort_key(date: &str) -> (Option<NaiveDate>, String) {
    (
        NaiveDate::parse_from_str(date, DATE_FORMAT).ok(),
        date.to_string(),
    )
}
