// Configuration loading and validation (league.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::jobs::PriceRules;
use crate::model::{CompetitionId, Price};
use crate::roster::{LineupRules, TransferRules};
use crate::scoring::ScoringRules;
use crate::squad::{Band, SquadRules};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub squad: SquadRules,
    pub lineup: LineupRules,
    pub transfers: TransferRules,
    pub scoring: ScoringRules,
    pub pricing: PriceRules,
    pub jobs: JobsConfig,
    /// Empty means "use the platform data directory"; see `resolve_db_path`.
    pub db_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            league: LeagueConfig {
                name: "Gaffer League".into(),
                competition_id: 1,
                budget: 1000,
            },
            squad: SquadRules::default(),
            lineup: LineupRules::default(),
            transfers: TransferRules::default(),
            scoring: ScoringRules::default(),
            pricing: PriceRules::default(),
            jobs: JobsConfig {
                poll_interval_secs: 60,
            },
            db_path: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire league.toml file.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
    squad: SquadRules,
    lineup: LineupRules,
    transfers: TransferRules,
    scoring: ScoringRules,
    pricing: PriceRules,
    jobs: JobsConfig,
    database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    /// Competition whose gameweeks gate roster changes.
    pub competition_id: CompetitionId,
    /// Squad budget ceiling for new teams.
    pub budget: Price,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/league.toml` relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let league_path = base_dir.join("config").join("league.toml");
    let text = read_file(&league_path)?;
    let file: LeagueFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: league_path.clone(),
        source: e,
    })?;

    let config = Config {
        league: file.league,
        squad: file.squad,
        lineup: file.lineup,
        transfers: file.transfers,
        scoring: file.scoring,
        pricing: file.pricing,
        jobs: file.jobs,
        db_path: file.database.path,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

/// Where the SQLite file lives: the configured path, or `gaffer.db` in the
/// platform data directory when none is configured.
pub fn resolve_db_path(config: &Config) -> Result<PathBuf, ConfigError> {
    if !config.db_path.trim().is_empty() {
        return Ok(PathBuf::from(&config.db_path));
    }
    let dirs = directories::ProjectDirs::from("", "", "gaffer").ok_or_else(|| {
        ConfigError::ValidationError {
            field: "database.path".into(),
            message: "no home directory available; set an explicit path".into(),
        }
    })?;
    Ok(dirs.data_dir().join("gaffer.db"))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

/// Bands must be ordered and able to add up to `total` together with the
/// fixed goalkeeper count.
fn validate_bands(
    section: &str,
    total: usize,
    goalkeepers: usize,
    bands: [(&str, Band); 3],
) -> Result<(), ConfigError> {
    for (name, band) in bands {
        if band.min > band.max {
            return Err(invalid(
                &format!("{section}.{name}"),
                format!("min {} is above max {}", band.min, band.max),
            ));
        }
    }
    let min_sum: usize = goalkeepers + bands.iter().map(|(_, b)| b.min).sum::<usize>();
    let max_sum: usize = goalkeepers + bands.iter().map(|(_, b)| b.max).sum::<usize>();
    if !(min_sum..=max_sum).contains(&total) {
        return Err(invalid(
            section,
            format!("position bands allow {min_sum}..={max_sum} players, not {total}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.budget == 0 {
        return Err(invalid("league.budget", "must be greater than 0"));
    }

    let squad = &config.squad;
    if squad.size == 0 {
        return Err(invalid("squad.size", "must be greater than 0"));
    }
    if squad.max_per_team == 0 {
        return Err(invalid("squad.max_per_team", "must be greater than 0"));
    }
    validate_bands(
        "squad",
        squad.size,
        squad.goalkeepers,
        [
            ("defenders", squad.defenders),
            ("midfielders", squad.midfielders),
            ("forwards", squad.forwards),
        ],
    )?;

    let lineup = &config.lineup;
    if lineup.starters == 0 || lineup.starters > squad.size {
        return Err(invalid(
            "lineup.starters",
            format!("must be between 1 and the squad size {}", squad.size),
        ));
    }
    validate_bands(
        "lineup",
        lineup.starters,
        lineup.goalkeepers,
        [
            ("defenders", lineup.defenders),
            ("midfielders", lineup.midfielders),
            ("forwards", lineup.forwards),
        ],
    )?;

    let scoring = &config.scoring;
    if scoring.captain_multiplier < 1 {
        return Err(invalid(
            "scoring.captain_multiplier",
            format!("must be at least 1, got {}", scoring.captain_multiplier),
        ));
    }
    if scoring.start_appearance <= scoring.sub_appearance {
        return Err(invalid(
            "scoring.start_appearance",
            "starting must be worth more than coming off the bench",
        ));
    }

    let pricing = &config.pricing;
    if pricing.min_price > pricing.max_price {
        return Err(invalid(
            "pricing.min_price",
            format!(
                "min_price {} is above max_price {}",
                pricing.min_price, pricing.max_price
            ),
        ));
    }

    if config.jobs.poll_interval_secs == 0 {
        return Err(invalid("jobs.poll_interval_secs", "must be greater than 0"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
