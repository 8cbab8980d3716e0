// Dashboard configuration: defaults in code, optionally overridden by a TOML file.

use crate::ctb_api_models::{CtbError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedStop {
    pub name: String,
    pub stop: String,
}

impl NamedStop {
    fn new(name: &str, stop: &str) -> Self {
        NamedStop {
            name: name.to_string(),
            stop: stop.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// ETA endpoint prefix; `/{stop}/{route}` is appended per request.
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_concurrency: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "https://rt.data.gov.hk/v2/transport/citybus/eta/CTB".to_string(),
            timeout_secs: 20,
            max_concurrency: 8,
        }
    }
}

/// "Bus times from Central": free-text start stop, fixed destination stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FromCentralConfig {
    pub lookup_file: PathBuf,
    pub suggested_starts: Vec<NamedStop>,
    pub destinations: Vec<String>,
    /// Arrivals heading to any of these destinations are dropped.
    pub exclude_dest_en: Vec<String>,
}

impl Default for FromCentralConfig {
    fn default() -> Self {
        FromCentralConfig {
            lookup_file: PathBuf::from("data/bus_stop_data_complete_outbound.csv"),
            suggested_starts: vec![
                NamedStop::new("Exchange Square", "001032"),
                NamedStop::new("City Hall", "001031"),
                NamedStop::new("Admiralty", "001136"),
            ],
            destinations: ["002378", "002302", "002277", "002400"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_dest_en: vec!["Central (Exchange Square)".to_string()],
        }
    }
}

/// "Bus times to Central": pick one of the named stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToCentralConfig {
    pub lookup_file: PathBuf,
    pub stops: Vec<NamedStop>,
    pub exclude_dest_en: Vec<String>,
}

impl Default for ToCentralConfig {
    fn default() -> Self {
        ToCentralConfig {
            lookup_file: PathBuf::from("data/bus_stop_data_complete_inbound.csv"),
            stops: vec![
                NamedStop::new("HKCC", "002349"),
                NamedStop::new("Ocean Park carpark", "002353"),
            ],
            exclude_dest_en: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Attribution {
    pub source: String,
    pub source_url: String,
    pub disclaimer: String,
}

impl Default for Attribution {
    fn default() -> Self {
        Attribution {
            source: "The data is obtained by application program interface from Citybus Limited with link from Hong Kong government.".to_string(),
            source_url: "https://data.gov.hk/en-data/dataset/ctb-eta-transport-realtime-eta/resource/e1961565-f6ba-4831-958e-1b2dab7b8703".to_string(),
            disclaimer: "The presented table provides estimated time for next bus departures and no responsibility assumed for those times.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api: ApiConfig,
    pub server: ServerConfig,
    pub from_central: FromCentralConfig,
    pub to_central: ToCentralConfig,
    pub attribution: Attribution,
}

impl DashboardConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: DashboardConfig = toml::from_str(contents)
            .map_err(|e| CtbError::ConfigError(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CtbError::FileError(format!("Failed to read {:?}: {}", path, e)))?;
        Self::from_toml_str(&contents)
    }

    /// `<config dir>/ctb_bus_times/dashboard.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ctb_bus_times").join("dashboard.toml"))
    }

    /// Explicit path first, then the per-user file if it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            log::info!("loading config from {:?}", path);
            return Self::from_path(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("loading config from {:?}", path);
                Self::from_path(&path)
            }
            _ => {
                log::debug!("no config file found, using defaults");
                Ok(DashboardConfig::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == 0 {
            return Err(CtbError::ConfigError("api.timeout_secs must be positive".to_string()));
        }
        if self.api.max_concurrency == 0 {
            return Err(CtbError::ConfigError("api.max_concurrency must be positive".to_string()));
        }
        if self.from_central.destinations.is_empty() {
            return Err(CtbError::ConfigError("from_central.destinations is empty".to_string()));
        }
        if self.to_central.stops.is_empty() {
            return Err(CtbError::ConfigError("to_central.stops is empty".to_string()));
        }
        Ok(())
    }

    pub fn named_inbound_stop(&self, stop: &str) -> Option<&NamedStop> {
        self.to_central.stops.iter().find(|s| s.stop == stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DashboardConfig::default();
        config.validate().unwrap();
        assert_eq!(config.api.timeout_secs, 20);
        assert_eq!(config.from_central.destinations.len(), 4);
        assert_eq!(config.from_central.exclude_dest_en, vec!["Central (Exchange Square)"]);
        assert!(config.to_central.exclude_dest_en.is_empty());
    }

    #[test]
    fn sample_file_parses() {
        let config = DashboardConfig::from_toml_str(include_str!("../dashboard.toml")).unwrap();
        assert_eq!(config.from_central.suggested_starts[0].stop, "001032");
        assert_eq!(config.to_central.stops.len(), 2);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = DashboardConfig::from_toml_str(
            r#"
            [api]
            max_concurrency = 2

            [from_central]
            destinations = ["002378"]
            "#,
        )
        .unwrap();
        assert_eq!(config.api.max_concurrency, 2);
        assert_eq!(config.api.timeout_secs, 20);
        assert_eq!(config.from_central.destinations, vec!["002378"]);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn stop_codes_stay_strings() {
        let config = DashboardConfig::from_toml_str(
            r#"
            [[to_central.stops]]
            name = "HKCC"
            stop = "002349"
            "#,
        )
        .unwrap();
        assert_eq!(config.named_inbound_stop("002349").unwrap().name, "HKCC");
        assert!(config.named_inbound_stop("2349").is_none());
    }

    #[test]
    fn rejects_zero_timeout_and_empty_destinations() {
        let err = DashboardConfig::from_toml_str("[api]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, CtbError::ConfigError(_)));
        let err = DashboardConfig::from_toml_str("[from_central]\ndestinations = []\n").unwrap_err();
        assert!(matches!(err, CtbError::ConfigError(_)));
    }
}
