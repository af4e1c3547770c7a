use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::GeoPoint;
use crate::routing::{RoutingProfile, DEFAULT_SPEED_KMH, DEFAULT_STOP_SERVICE_MINUTES, MAX_STOPS_PER_ROUTE};

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub warehouse: WarehouseConfig,
    pub fanout: FanoutConfig,
    pub routing: RoutingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug)]
pub struct WarehouseConfig {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug)]
pub struct FanoutConfig {
    /// Bounded fan-out width for per-product store reads.
    pub width: usize,
}

#[derive(Clone, Debug)]
pub struct RoutingConfig {
    pub speed_kmh: f64,
    pub stop_service_minutes: f64,
    pub max_stops_per_route: usize,
    /// Hour of day (UTC) at which routes depart the warehouse.
    pub departure_hour: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub fanout_width: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://mercato.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            warehouse: WarehouseConfig { latitude: 35.6892, longitude: 51.3890 },
            fanout: FanoutConfig { width: 5 },
            routing: RoutingConfig {
                speed_kmh: DEFAULT_SPEED_KMH,
                stop_service_minutes: DEFAULT_STOP_SERVICE_MINUTES,
                max_stops_per_route: MAX_STOPS_PER_ROUTE,
                departure_hour: 8,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    warehouse: Option<WarehousePatch>,
    fanout: Option<FanoutPatch>,
    routing: Option<RoutingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct WarehousePatch {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct FanoutPatch {
    width: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutingPatch {
    speed_kmh: Option<f64>,
    stop_service_minutes: Option<f64>,
    max_stops_per_route: Option<usize>,
    departure_hour: Option<u32>,
}

impl EngineConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("mercato.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn warehouse_point(&self) -> GeoPoint {
        GeoPoint::new(self.warehouse.latitude, self.warehouse.longitude)
    }

    pub fn routing_profile(&self) -> RoutingProfile {
        RoutingProfile {
            warehouse: self.warehouse_point(),
            speed_kmh: self.routing.speed_kmh,
            stop_service_minutes: self.routing.stop_service_minutes,
            max_stops_per_route: self.routing.max_stops_per_route,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(warehouse) = patch.warehouse {
            if let Some(latitude) = warehouse.latitude {
                self.warehouse.latitude = latitude;
            }
            if let Some(longitude) = warehouse.longitude {
                self.warehouse.longitude = longitude;
            }
        }

        if let Some(fanout) = patch.fanout {
            if let Some(width) = fanout.width {
                self.fanout.width = width;
            }
        }

        if let Some(routing) = patch.routing {
            if let Some(speed_kmh) = routing.speed_kmh {
                self.routing.speed_kmh = speed_kmh;
            }
            if let Some(stop_service_minutes) = routing.stop_service_minutes {
                self.routing.stop_service_minutes = stop_service_minutes;
            }
            if let Some(max_stops_per_route) = routing.max_stops_per_route {
                self.routing.max_stops_per_route = max_stops_per_route;
            }
            if let Some(departure_hour) = routing.departure_hour {
                self.routing.departure_hour = departure_hour;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MERCATO_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("MERCATO_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("MERCATO_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MERCATO_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("MERCATO_DATABASE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MERCATO_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("MERCATO_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        if let Some(value) = read_env("MERCATO_WAREHOUSE_LATITUDE") {
            self.warehouse.latitude = parse_f64("MERCATO_WAREHOUSE_LATITUDE", &value)?;
        }
        if let Some(value) = read_env("MERCATO_WAREHOUSE_LONGITUDE") {
            self.warehouse.longitude = parse_f64("MERCATO_WAREHOUSE_LONGITUDE", &value)?;
        }
        if let Some(value) = read_env("MERCATO_FANOUT_WIDTH") {
            self.fanout.width = parse_usize("MERCATO_FANOUT_WIDTH", &value)?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(width) = overrides.fanout_width {
            self.fanout.width = width;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database url must not be empty".to_owned()));
        }
        if self.fanout.width == 0 {
            return Err(ConfigError::Validation("fanout width must be at least 1".to_owned()));
        }
        if !(-90.0..=90.0).contains(&self.warehouse.latitude) {
            return Err(ConfigError::Validation(format!(
                "warehouse latitude {} is outside [-90, 90]",
                self.warehouse.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.warehouse.longitude) {
            return Err(ConfigError::Validation(format!(
                "warehouse longitude {} is outside [-180, 180]",
                self.warehouse.longitude
            )));
        }
        if self.routing.speed_kmh <= 0.0 {
            return Err(ConfigError::Validation("routing speed must be positive".to_owned()));
        }
        if self.routing.max_stops_per_route == 0 {
            return Err(ConfigError::Validation(
                "max stops per route must be at least 1".to_owned(),
            ));
        }
        if self.routing.departure_hour >= 24 {
            return Err(ConfigError::Validation(format!(
                "departure hour {} is outside [0, 23]",
                self.routing.departure_hour
            )));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("mercato.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fanout.width, 5);
        assert_eq!(config.warehouse.latitude, 35.6892);
    }

    #[test]
    fn patch_overrides_only_named_fields() {
        let mut config = EngineConfig::default();
        let patch: ConfigPatch = toml::from_str(
            r#"
            [database]
            url = "sqlite://analytics.db"

            [routing]
            speed_kmh = 25.0
            "#,
        )
        .unwrap();
        config.apply_patch(patch);
        assert_eq!(config.database.url, "sqlite://analytics.db");
        assert_eq!(config.routing.speed_kmh, 25.0);
        assert_eq!(config.routing.max_stops_per_route, MAX_STOPS_PER_ROUTE);
    }

    #[test]
    fn zero_fanout_width_fails_validation() {
        let mut config = EngineConfig::default();
        config.fanout.width = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn missing_required_file_errors() {
        let options = LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/mercato.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        };
        assert!(matches!(EngineConfig::load(options), Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn routing_profile_carries_the_warehouse() {
        let config = EngineConfig::default();
        let profile = config.routing_profile();
        assert_eq!(profile.warehouse.latitude, 35.6892);
        assert_eq!(profile.max_stops_per_route, MAX_STOPS_PER_ROUTE);
    }
}
