use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::schema::{ClubName, LeagueName, SeasonYear};

/// Run configuration, loaded from a TOML file.  See `config.example.toml`
/// at the repository root.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default)]
    pub fetch: FetchSettings,
    pub leagues: Vec<LeagueConfig>,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Clone, Debug, Deserialize)]
pub struct LeagueConfig {
    pub name: LeagueName,
    pub seasons: Vec<SeasonYear>,
    pub clubs: Vec<ClubConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClubConfig {
    pub name: ClubName,
    /// URL slug of the club on the source site.
    pub slug: String,
    /// The source site's numeric club id.
    pub id: u32,
}

/// Politeness and retry parameters for the fetcher.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub min_delay_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub default_cooldown_secs: u64,
    pub timeout_secs: u64,
    pub max_in_flight: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: 3000,
            max_attempts: 4,
            backoff_base_ms: 2000,
            default_cooldown_secs: 60,
            timeout_secs: 30,
            max_in_flight: 4,
        }
    }
}

impl FetchSettings {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
    pub fn default_cooldown(&self) -> Duration {
        Duration::from_secs(self.default_cooldown_secs)
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
