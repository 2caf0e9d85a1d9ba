// Configuration loading and parsing (season.toml, simulator.toml).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use seasoncast_core::model::{Speed, VenueId};
use seasoncast_core::performers::DEFAULT_MVP_WICKET_WEIGHT;
use seasoncast_core::resolve::ScoringParams;

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

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub season: SeasonConfig,
    pub api: ApiConfig,
    pub scoring: ScoringParams,
    pub leaders: LeadersConfig,
    /// Average first-innings score per venue.
    pub venues: HashMap<VenueId, f64>,
    pub timing: TimingConfig,
    pub playback: PlaybackConfig,
    pub outlook: OutlookConfig,
    pub report: ReportConfig,
}

impl Config {
    pub fn venue_avg_score(&self, venue: VenueId) -> f64 {
        self.venues
            .get(&venue)
            .copied()
            .unwrap_or(self.scoring.default_venue_avg_score)
    }
}

// ---------------------------------------------------------------------------
// season.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct SeasonFile {
    season: SeasonConfig,
    api: ApiConfig,
    #[serde(default)]
    scoring: ScoringParams,
    #[serde(default)]
    leaders: LeadersConfig,
    /// Keys are venue ids; TOML keys are always strings.
    #[serde(default)]
    venues: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonConfig {
    pub name: String,
    pub year: u32,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        SeasonConfig {
            name: "SA20".into(),
            year: 2025,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub image_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: seasoncast_api::client::DEFAULT_BASE_URL.into(),
            timeout_secs: 10,
            image_timeout_ms: 2000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadersConfig {
    pub mvp_wicket_weight: f64,
}

impl Default for LeadersConfig {
    fn default() -> Self {
        LeadersConfig {
            mvp_wicket_weight: DEFAULT_MVP_WICKET_WEIGHT,
        }
    }
}

// ---------------------------------------------------------------------------
// simulator.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct SimulatorFile {
    timing: TimingConfig,
    playback: PlaybackConfig,
    #[serde(default)]
    outlook: OutlookConfig,
    #[serde(default)]
    report: ReportConfig,
}

/// Stage durations in milliseconds at 1x.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimingConfig {
    pub fixture_reveal_ms: u64,
    pub toss_ms: u64,
    pub lineup_ms: u64,
    pub fade_ms: u64,
    pub result_ms: u64,
    pub standings_ms: u64,
    pub qualification_ms: u64,
    pub champion_ms: u64,
    pub trophy_ms: u64,
    pub rewind_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            fixture_reveal_ms: 4000,
            toss_ms: 3000,
            lineup_ms: 3000,
            fade_ms: 500,
            result_ms: 4000,
            standings_ms: 2500,
            qualification_ms: 5000,
            champion_ms: 5000,
            trophy_ms: 6000,
            rewind_ms: 8000,
        }
    }
}

impl TimingConfig {
    fn fields(&self) -> [(&'static str, u64); 10] {
        [
            ("timing.fixture_reveal_ms", self.fixture_reveal_ms),
            ("timing.toss_ms", self.toss_ms),
            ("timing.lineup_ms", self.lineup_ms),
            ("timing.fade_ms", self.fade_ms),
            ("timing.result_ms", self.result_ms),
            ("timing.standings_ms", self.standings_ms),
            ("timing.qualification_ms", self.qualification_ms),
            ("timing.champion_ms", self.champion_ms),
            ("timing.trophy_ms", self.trophy_ms),
            ("timing.rewind_ms", self.rewind_ms),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    pub speed: Speed,
    /// Start the show as soon as the app launches.
    pub autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            speed: Speed::X1,
            autoplay: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutlookConfig {
    pub enabled: bool,
    pub num_simulations: u32,
}

impl Default for OutlookConfig {
    fn default() -> Self {
        OutlookConfig {
            enabled: true,
            num_simulations: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub enabled: bool,
    pub dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            enabled: true,
            dir: "reports".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/season.toml` and
/// `config/simulator.toml` relative to `base_dir`.
///
/// Does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let season_path = config_dir.join("season.toml");
    let season_text = read_file(&season_path)?;
    let season_file: SeasonFile =
        toml::from_str(&season_text).map_err(|e| ConfigError::ParseError {
            path: season_path.clone(),
            source: e,
        })?;

    let simulator_path = config_dir.join("simulator.toml");
    let simulator_text = read_file(&simulator_path)?;
    let simulator_file: SimulatorFile =
        toml::from_str(&simulator_text).map_err(|e| ConfigError::ParseError {
            path: simulator_path.clone(),
            source: e,
        })?;

    let mut venues = HashMap::with_capacity(season_file.venues.len());
    for (key, avg) in season_file.venues {
        let id = key
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid(format!("venues.{key}"), "venue keys must be numeric ids"))?;
        venues.insert(VenueId(id), avg);
    }

    let config = Config {
        season: season_file.season,
        api: season_file.api,
        scoring: season_file.scoring,
        leaders: season_file.leaders,
        venues,
        timing: simulator_file.timing,
        playback: simulator_file.playback,
        outlook: simulator_file.outlook,
        report: simulator_file.report,
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
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the crate root or ensure defaults/ is present",
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

/// Load config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn check_range(field: &str, (lo, hi): (u32, u32)) -> Result<(), ConfigError> {
    if lo >= hi {
        return Err(invalid(field, format!("range [{lo}, {hi}) is empty")));
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.season.name.trim().is_empty() {
        return Err(invalid("season.name", "must not be empty"));
    }

    if !config.api.base_url.starts_with("http://") && !config.api.base_url.starts_with("https://")
    {
        return Err(invalid(
            "api.base_url",
            format!("must be an http(s) URL, got {}", config.api.base_url),
        ));
    }
    if config.api.timeout_secs == 0 {
        return Err(invalid("api.timeout_secs", "must be greater than 0"));
    }
    if config.api.image_timeout_ms == 0 {
        return Err(invalid("api.image_timeout_ms", "must be greater than 0"));
    }

    let s = &config.scoring;
    if !(0.0..=1.0).contains(&s.no_result_probability) {
        return Err(invalid(
            "scoring.no_result_probability",
            format!("must be between 0.0 and 1.0 inclusive, got {}", s.no_result_probability),
        ));
    }
    if s.default_venue_avg_score <= 0.0 {
        return Err(invalid("scoring.default_venue_avg_score", "must be > 0"));
    }
    if s.strength_min <= 0.0 || s.strength_min > s.strength_max {
        return Err(invalid(
            "scoring.strength_min",
            "must be > 0 and not above strength_max",
        ));
    }
    if s.variance_min <= 0.0 || s.variance_min > s.variance_max {
        return Err(invalid(
            "scoring.variance_min",
            "must be > 0 and not above variance_max",
        ));
    }
    if s.first_innings_min == 0 || s.first_innings_min > s.first_innings_max {
        return Err(invalid(
            "scoring.first_innings_min",
            "must be > 0 and not above first_innings_max",
        ));
    }
    for (field, range) in [
        ("scoring.first_innings_wickets", s.first_innings_wickets),
        ("scoring.chase_wickets", s.chase_wickets),
        ("scoring.defend_wickets", s.defend_wickets),
        ("scoring.all_out_overs", s.all_out_overs),
        ("scoring.fallback_score", s.fallback_score),
    ] {
        check_range(field, range)?;
    }
    for (field, (lo, hi)) in [
        ("scoring.chase_margin_runs", s.chase_margin_runs),
        ("scoring.defend_margin_runs", s.defend_margin_runs),
    ] {
        if lo == 0 || lo > hi {
            return Err(invalid(field, format!("range [{lo}, {hi}] must start above 0")));
        }
    }
    if s.all_out_overs.1 > 20 {
        return Err(invalid("scoring.all_out_overs", "cannot exceed 20 overs"));
    }

    if config.leaders.mvp_wicket_weight < 0.0 {
        return Err(invalid("leaders.mvp_wicket_weight", "must be >= 0"));
    }

    for (venue, avg) in &config.venues {
        if *avg <= 0.0 {
            return Err(invalid(format!("venues.{venue}"), format!("must be > 0, got {avg}")));
        }
    }

    for (field, ms) in config.timing.fields() {
        if ms == 0 {
            return Err(invalid(field, "must be greater than 0"));
        }
    }

    if config.outlook.enabled && config.outlook.num_simulations == 0 {
        return Err(invalid("outlook.num_simulations", "must be > 0 when enabled"));
    }

    if config.report.enabled && config.report.dir.trim().is_empty() {
        return Err(invalid("report.dir", "must not be empty when enabled"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// The crate root holding `defaults/` (cargo runs tests from the crate
    /// root; fall back to the workspace root).
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/seasoncast-app/defaults").exists() {
            cwd.join("crates/seasoncast-app")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Fresh temp dir with both default files copied into `config/`.
    fn scratch(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        let config_dir = tmp.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        let root = project_root();
        for file in ["season.toml", "simulator.toml"] {
            fs::copy(root.join("defaults").join(file), config_dir.join(file)).unwrap();
        }
        tmp
    }

    fn rewrite(tmp: &Path, file: &str, from: &str, to: &str) {
        let path = tmp.join("config").join(file);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(from), "{file} does not contain {from:?}");
        fs::write(&path, text.replace(from, to)).unwrap();
    }

    fn expect_field(tmp: &Path, field: &str) {
        match load_config_from(tmp).unwrap_err() {
            ConfigError::ValidationError { field: got, .. } => assert_eq!(got, field),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_default_config_files() {
        let tmp = scratch("seasoncast_config_defaults");
        let config = load_config_from(&tmp).expect("defaults should load");

        assert_eq!(config.season.name, "SA20");
        assert_eq!(config.season.year, 2025);
        assert_eq!(config.api.base_url, "http://localhost:8000/api/v1");
        assert_eq!(config.api.image_timeout(), Duration::from_secs(2));
        assert_eq!(config.scoring, ScoringParams::default());
        assert!((config.leaders.mvp_wicket_weight - 25.0).abs() < f64::EPSILON);
        assert_eq!(config.venues.len(), 6);
        assert!((config.venue_avg_score(VenueId(4)) - 175.0).abs() < f64::EPSILON);
        assert!((config.venue_avg_score(VenueId(99)) - 165.0).abs() < f64::EPSILON);
        assert_eq!(config.timing, TimingConfig::default());
        assert_eq!(config.playback.speed, Speed::X1);
        assert!(config.playback.autoplay);
        assert_eq!(config.outlook.num_simulations, 1000);
        assert_eq!(config.report.dir, "reports");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn scoring_section_is_optional() {
        let tmp = scratch("seasoncast_config_no_scoring");
        let path = tmp.join("config/season.toml");
        let text = fs::read_to_string(&path).unwrap();
        let trimmed: String = text
            .split("[scoring]")
            .next()
            .unwrap()
            .to_string();
        fs::write(&path, trimmed).unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.scoring, ScoringParams::default());
        assert!(config.venues.is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn partial_scoring_keeps_defaults() {
        let tmp = scratch("seasoncast_config_partial_scoring");
        rewrite(
            &tmp,
            "season.toml",
            "no_result_probability = 0.02",
            "no_result_probability = 0.1",
        );
        let config = load_config_from(&tmp).unwrap();
        assert!((config.scoring.no_result_probability - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.scoring.chase_margin_runs, (1, 15));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unsupported_speed() {
        let tmp = scratch("seasoncast_config_bad_speed");
        rewrite(&tmp, "simulator.toml", "speed = 1", "speed = 3");
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with("simulator.toml")),
            other => panic!("expected ParseError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_no_result_probability_above_one() {
        let tmp = scratch("seasoncast_config_bad_washout");
        rewrite(
            &tmp,
            "season.toml",
            "no_result_probability = 0.02",
            "no_result_probability = 1.5",
        );
        expect_field(&tmp, "scoring.no_result_probability");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_wicket_range() {
        let tmp = scratch("seasoncast_config_bad_wickets");
        rewrite(
            &tmp,
            "season.toml",
            "first_innings_wickets = [4, 9]",
            "first_innings_wickets = [9, 9]",
        );
        expect_field(&tmp, "scoring.first_innings_wickets");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_numeric_venue_key() {
        let tmp = scratch("seasoncast_config_bad_venue");
        rewrite(&tmp, "season.toml", "1 = 168.0", "newlands = 168.0");
        expect_field(&tmp, "venues.newlands");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_duration() {
        let tmp = scratch("seasoncast_config_zero_toss");
        rewrite(&tmp, "simulator.toml", "toss_ms = 3000", "toss_ms = 0");
        expect_field(&tmp, "timing.toss_ms");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_http_base_url() {
        let tmp = scratch("seasoncast_config_bad_url");
        rewrite(
            &tmp,
            "season.toml",
            "base_url = \"http://localhost:8000/api/v1\"",
            "base_url = \"localhost:8000\"",
        );
        expect_field(&tmp, "api.base_url");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_simulator_toml() {
        let tmp = scratch("seasoncast_config_missing_simulator");
        fs::remove_file(tmp.join("config/simulator.toml")).unwrap();
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("simulator.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = scratch("seasoncast_config_invalid_toml");
        fs::write(tmp.join("config/season.toml"), "this is not valid [[[ toml").unwrap();
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with("season.toml")),
            other => panic!("expected ParseError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_and_skips_existing() {
        let tmp = std::env::temp_dir().join("seasoncast_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        let config_dir = tmp.join("config");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::create_dir_all(&config_dir).unwrap();

        let root = project_root();
        for file in ["season.toml", "simulator.toml"] {
            fs::copy(root.join("defaults").join(file), defaults_dir.join(file)).unwrap();
        }
        fs::write(defaults_dir.join("secrets.toml.example"), "token = \"...\"\n").unwrap();
        fs::write(config_dir.join("season.toml"), "# custom\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(copied[0].ends_with("simulator.toml"));
        assert_eq!(
            fs::read_to_string(config_dir.join("season.toml")).unwrap(),
            "# custom\n"
        );
        assert!(!config_dir.join("secrets.toml.example").exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("seasoncast_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        match ensure_config_files(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }
}
