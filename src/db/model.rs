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

//! Database row mapping for domain models.
//!
//! This module provides the conversion logic between raw SQLite result rows
//! and high-level domain models, ensuring type-safe extraction of model
//! attributes from database queries.

use std::collections::BTreeMap;

use rusqlite::{
    Result, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};

use crate::model::{Album, Links, Listened, Rank};

impl Album {
    /// Maps an SQLite row from the `albums` table to an [`Album`] instance.
    ///
    /// Rankings and listening state live in their own tables and start out
    /// empty here.
    ///
    /// # Errors
    ///
    /// Returns a [`rusqlite::Error`] if:
    /// * The row does not contain enough columns.
    /// * The data in a column cannot be converted to the required Rust type.
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            artist: row.get(2)?,
            year: row.get(3)?,
            genre: row.get(4)?,
            rating: row.get(5)?,
            rating_count: row.get(6)?,
            qwr: row.get(7)?,
            duration: row.get(8)?,
            country: row.get(9)?,
            rankings: BTreeMap::new(),
            links: Links {
                album_url: row.get(10)?,
                artist_url: row.get(11)?,
                streaming: row.get(12)?,
                in_local_library: row.get(13)?,
                purchased: row.get(14)?,
                jointly_listened: row.get(15)?,
                listened: BTreeMap::new(),
            },
        })
    }
}

impl ToSql for Rank {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_code()))
    }
}

impl FromSql for Rank {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        Rank::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

impl ToSql for Listened {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        let val = match self {
            Listened::Yes => 1,
            Listened::Unknown => 0,
            Listened::No => -1,
        };
        Ok(ToSqlOutput::from(val))
    }
}

impl FromSql for Listened {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            1 => Ok(Listened::Yes),
            0 => Ok(Listened::Unknown),
            -1 => Ok(Listened::No),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
