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

//! Application configuration.
//!
//! This module manages the application configuration file. Unlike most other
//! failures, a configuration problem is fatal: nothing is scanned or saved
//! until the configuration loads and validates.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_NAME: &str = "charthelper";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub version: u32,
    pub database_file: String,
    pub library_dir: Option<String>,
    pub base_url: String,
    pub request_delay_ms: u64,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            database_file: "charthelper.db".to_string(),
            library_dir: None,
            base_url: "http://www.progarchives.com/".to_string(),
            request_delay_ms: 1000,
            spotify_client_id: None,
            spotify_client_secret: None,
        }
    }
}

impl AppConfig {
    /// Checks the settings the rest of the application relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_file.trim().is_empty() {
            return Err(ConfigError::MissingDatabase);
        }

        if let Some(dir) = &self.library_dir {
            if !Path::new(dir).is_dir() {
                return Err(ConfigError::InvalidLibraryDir(dir.into()));
            }
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            return Err(ConfigError::IncompleteSpotifyCredentials);
        }

        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Client id and secret, when both are configured.
    pub fn spotify_credentials(&self) -> Option<(&str, &str)> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) => Some((id, secret)),
            _ => None,
        }
    }
}

/// Loads the configuration from `path`, or from the default location.
///
/// A missing file is an error rather than a fresh default, as only setup
/// writes the configuration.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => confy::get_configuration_file_path(CONFIG_NAME, None)?,
    };
    if !path.is_file() {
        return Err(ConfigError::NotSetUp(path));
    }

    let config: AppConfig = confy::load_path(&path)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(cfg: &AppConfig, path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        Some(path) => confy::store_path(path, cfg)?,
        None => confy::store(CONFIG_NAME, None, cfg)?,
    }
    Ok(())
}
