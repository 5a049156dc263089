use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Default location of the driver configuration, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/pacer.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub dispatch: DispatchConfig,
    pub metrics: MetricsConfig,
    pub scenario: ScenarioConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&data)
    }

    pub fn from_yaml_str(data: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("target.base_url must not be empty".into()));
        }
        if self.dispatch.step_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.step_interval_ms must be greater than zero".into(),
            ));
        }

        let fixtures = &self.scenario.fixtures;
        if !self.scenario.suites.is_empty() {
            let required = [
                ("existing_ids", fixtures.existing_ids.is_empty()),
                ("missing_ids", fixtures.missing_ids.is_empty()),
                ("create_payloads", fixtures.create_payloads.is_empty()),
                ("update_records", fixtures.update_records.is_empty()),
            ];
            if let Some((name, _)) = required.iter().find(|(_, empty)| *empty) {
                return Err(ConfigError::Invalid(format!(
                    "scenario.fixtures.{} must not be empty when suites are selected",
                    name
                )));
            }
        }
        if fixtures.update_records.iter().any(|r| r.id.is_none()) {
            return Err(ConfigError::Invalid(
                "scenario.fixtures.update_records entries need an id".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: String,
    /// Endpoint used for the availability check before any suite runs.
    pub probe_path: String,
    /// Accept self-signed certificates (local dev servers).
    pub accept_invalid_certs: bool,
    pub request_timeout_ms: Option<u64>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:7170".to_string(),
            probe_path: "/gamedata".to_string(),
            accept_invalid_certs: false,
            request_timeout_ms: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DispatchConfig {
    pub step_interval_ms: u64,
    /// How long outstanding invocations get to settle after a cancellation
    /// before they are aborted.
    pub cancel_grace_ms: u64,
    /// Optional hard upper bound on a single dispatch run.
    pub run_deadline_secs: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: 1000,
            cancel_grace_ms: 5000,
            run_deadline_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9100,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SuiteKind {
    Smoke,
    Average,
    Spike,
}

impl SuiteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteKind::Smoke => "smoke",
            SuiteKind::Average => "average",
            SuiteKind::Spike => "spike",
        }
    }
}

impl fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuiteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smoke" => Ok(SuiteKind::Smoke),
            "average" => Ok(SuiteKind::Average),
            "spike" => Ok(SuiteKind::Spike),
            _ => Err(format!(
                "unknown suite '{}', expected smoke, average or spike",
                s
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Suites to run, in order.
    pub suites: Vec<SuiteKind>,
    /// Requests per case for the smoke suite, fired as one step.
    pub smoke_requests: usize,
    /// Requests per second for each step of the average-load suite.
    pub average_steps: Vec<usize>,
    pub spike: SpikeConfig,
    pub fixtures: FixtureConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            suites: vec![SuiteKind::Smoke, SuiteKind::Average, SuiteKind::Spike],
            smoke_requests: 100,
            average_steps: vec![20, 40, 80, 15],
            spike: SpikeConfig::default(),
            fixtures: FixtureConfig::default(),
        }
    }
}

/// Single-step burst sizes for each spike case.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SpikeConfig {
    pub list: usize,
    pub get_by_id: usize,
    pub update: usize,
    pub delete: usize,
    pub create: usize,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            list: 750,
            get_by_id: 600,
            update: 350,
            delete: 4000,
            create: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FixtureConfig {
    /// Ids the API under test is expected to know.
    pub existing_ids: Vec<String>,
    /// Ids that must resolve to 404.
    pub missing_ids: Vec<String>,
    pub create_payloads: Vec<GameData>,
    pub update_records: Vec<GameData>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            existing_ids: vec![
                "000582cf-0b3d-4855-9f5e-54d3be5443cb".to_string(),
                "000fc79c-38c1-4c37-bafe-3b5b15f405aa".to_string(),
                "00358a92-4bd2-4cc2-a3bb-1ded6f5994ba".to_string(),
            ],
            missing_ids: vec![
                "19e44f74-x-4284-90ea-e6f02be75613".to_string(),
                "1cfffeb9-66a3-x-b1b3-208610be7a73".to_string(),
                "27896d44-x-48bd-9b14-50ac09e5b0a4".to_string(),
            ],
            create_payloads: vec![
                GameData::new("Peck a Bo", "Dice Game", 6000),
                GameData::new("Gin Poker-Texas Hold-Em", "Card Game", 5000),
                GameData::new("Chinchon", "Card Game", 2000),
            ],
            update_records: vec![
                GameData::new("Volleyball Game", "Recreational machines", 0)
                    .with_id("000582cf-0b3d-4855-9f5e-54d3be5443cb"),
                GameData::new("Caribbean Stud Poker", "Card Game", 0)
                    .with_id("000fc79c-38c1-4c37-bafe-3b5b15f405aa"),
            ],
        }
    }
}

/// Game statistics record as exchanged with the API under test.
///
/// `id` is serialized as `null` when absent; the server assigns it on create.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    #[serde(default)]
    pub id: Option<String>,
    pub game_name: String,
    pub category: String,
    #[serde(default)]
    pub total_bets: i64,
}

impl GameData {
    pub fn new(game_name: impl Into<String>, category: impl Into<String>, total_bets: i64) -> Self {
        Self {
            id: None,
            game_name: game_name.into(),
            category: category.into(),
            total_bets,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Fields every record returned by the API must carry.
pub const GAME_DATA_FIELDS: &[&str] = &[
    "id",
    "gameName",
    "category",
    "totalBets",
    "totalWins",
    "averageBetAmount",
    "popularityScore",
];
