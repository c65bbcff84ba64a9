//! Configuration: environment variables naming an optional YAML file, with
//! defaults that let the board start bare.

use std::path::PathBuf;
use std::time::Duration;

use envconfig::Envconfig;
use lightboard_tokio::lifx::discovery::DiscoveryConfig;
use lightboard_tokio::lifx::transport::TransportConfig;
use lightboard_tokio::lifx::LIFX_PORT;
use lightboard_tokio::services::http;
use serde::Deserialize;
use thiserror::Error;

/// The environment variables the server reads.
#[derive(Envconfig)]
pub struct Environment {
    /// Path to the YAML config file. Defaults apply when unset.
    #[envconfig(from = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

impl Environment {
    /// Load the environment from the environment variables.
    pub fn load() -> Result<Self, envconfig::Error> {
        Self::init_from_env()
    }

    /// Load the config file, or the defaults when no file is named.
    pub fn config(&self) -> Result<Config, Error> {
        let Some(filename) = &self.config_file else {
            return Ok(Config::default());
        };

        let f = std::fs::File::open(filename)
            .map_err(|e| Error::File(filename.clone(), e))?;
        serde_yml::from_reader(f).map_err(|e| Error::Yaml(filename.clone(), e))
    }
}

/// An error loading the Config
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading the file
    #[error("Error reading file {0}: {1}")]
    File(PathBuf, std::io::Error),

    /// Error parsing the file
    #[error("Error parsing file {0}: {1}")]
    Yaml(PathBuf, serde_yml::Error),
}

/// The whole server configuration.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP listener.
    pub http: http::Config,

    /// LIFX transport and job timing.
    pub lifx: LifxConfig,

    /// Where uploaded audio lives.
    pub audio: AudioConfig,

    /// Log filtering.
    pub logging: crate::logging::Config,
}

/// LIFX settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LifxConfig {
    /// The local bind address.
    pub bind_address: String,

    /// Where discovery broadcasts go.
    pub broadcast_address: String,

    /// The port devices listen on.
    pub device_port: u16,

    /// Seconds between discovery broadcasts.
    pub discovery_interval_secs: u64,

    /// Seconds between per-device state polls.
    pub poll_interval_secs: u64,

    /// Seconds between liveness sweeps.
    pub sweep_interval_secs: u64,

    /// Seconds a silent device stays online.
    pub offline_grace_secs: u64,

    /// Ask devices to confirm Set messages with a State reply.
    pub set_res_required: bool,
}

impl Default for LifxConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{LIFX_PORT}"),
            broadcast_address: format!("255.255.255.255:{LIFX_PORT}"),
            device_port: LIFX_PORT,
            discovery_interval_secs: 30,
            poll_interval_secs: 2,
            sweep_interval_secs: 10,
            offline_grace_secs: 60,
            set_res_required: true,
        }
    }
}

impl LifxConfig {
    /// The transport's view of this config.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            bind_address: self.bind_address.clone(),
            broadcast_address: self.broadcast_address.clone(),
            device_port: self.device_port,
            set_res_required: self.set_res_required,
            ..TransportConfig::default()
        }
    }

    /// The periodic jobs' view of this config.
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            discovery_interval: Duration::from_secs(self.discovery_interval_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            offline_grace: Duration::from_secs(self.offline_grace_secs),
            device_port: self.device_port,
        }
    }
}

/// Audio store settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Directory for uploaded audio blobs.
    pub directory: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./audio"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.listen_address, "0.0.0.0:3000");
        assert_eq!(config.lifx.device_port, 56700);
        assert_eq!(config.lifx.offline_grace_secs, 60);
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let config: Config = serde_yml::from_str(
            "lifx:\n  broadcast_address: 192.168.1.255:56700\n  poll_interval_secs: 5\n",
        )
        .unwrap();
        assert_eq!(config.lifx.broadcast_address, "192.168.1.255:56700");
        assert_eq!(config.lifx.poll_interval_secs, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.lifx.discovery_interval_secs, 30);
        assert_eq!(config.http.listen_address, "0.0.0.0:3000");
    }
}
