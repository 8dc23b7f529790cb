//! Configuration for the SetuBACnet daemon
//!
//! Loads configuration from a TOML file. Defaults mirror the reference
//! deployment: device 389055 on BACnet/IP port 47808 with one simulated
//! analog input.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default BACnet/IP UDP port
pub const DEFAULT_BACNET_PORT: u16 = 47808;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub network: NetworkConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// BACnet device identity
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Device instance number
    pub instance: u32,
    /// Device object name
    pub name: String,
    /// Object instance of the simulated analog input
    pub analog_input_instance: u32,
    /// Object name of the simulated analog input
    pub analog_input_name: String,
}

/// Interface parameters for the one bound socket
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Interface address the socket binds to
    pub ip: String,
    /// Subnet mask used to derive the broadcast address
    pub subnet: String,
    /// UDP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Default gateway, if known
    #[serde(default)]
    pub gateway: Option<String>,
    /// DNS servers exposed through the network port object
    #[serde(default)]
    pub dns: Vec<String>,
    /// Interface MAC address, if known ("aa:bb:cc:dd:ee:ff")
    #[serde(default)]
    pub mac: Option<String>,
    /// Foreign-device registration address ("host:port")
    #[serde(default)]
    pub foreign_device: Option<String>,
    /// Replace the encoded port with the well-known port on broadcasts
    #[serde(default)]
    pub force_broadcast_port: bool,
}

/// Simulated sensor input
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub enabled: bool,
    /// Seconds between simulated updates
    pub period_secs: u64,
    /// Amount added to the analog input each update
    pub increment: f32,
    /// Present-value seeded at startup
    pub initial_value: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_secs: 1,
            increment: 1.1,
            initial_value: 127.5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_BACNET_PORT
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                instance: 389055,
                name: "Setu BACnet Bridge".to_string(),
                analog_input_instance: 0,
                analog_input_name: "AnalogInput Bronze".to_string(),
            },
            network: NetworkConfig {
                ip: "192.168.1.50".to_string(),
                subnet: "255.255.255.0".to_string(),
                port: DEFAULT_BACNET_PORT,
                gateway: None,
                dns: vec!["8.8.8.8".to_string(), "8.8.4.4".to_string()],
                mac: None,
                foreign_device: None,
                force_broadcast_port: false,
            },
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
