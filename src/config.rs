//! Startup configuration.

use std::net::Ipv4Addr;
use std::path::Path;

use serde::Deserialize;

use crate::errors::Error;
use crate::registry::DEFAULT_BULB_ALIAS;
use crate::switch::SwitchSetup;

type Result<T> = std::result::Result<T, Error>;

/// Static configuration loaded once at startup.
///
/// Lists the fixed bulb addresses to connect to and the switch setups to
/// monitor. The file uses camelCase keys:
///
/// ```json
/// {
///     "mainBulbIps": ["192.168.1.209", "192.168.1.151"],
///     "switchSetups": [
///         { "switchIps": ["192.168.1.182"], "bulbIps": ["192.168.1.209"] }
///     ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub main_bulb_ips: Vec<Ipv4Addr>,
    #[serde(default)]
    pub switch_setups: Vec<SwitchSetup>,
    /// Alias substring that marks a device as a bulb during discovery.
    #[serde(default = "default_bulb_alias")]
    pub bulb_alias: String,
}

impl Config {
    /// Load the configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(Error::ConfigRead)?;
        serde_json::from_str(&raw).map_err(Error::JsonLoad)
    }
}

fn default_bulb_alias() -> String {
    DEFAULT_BULB_ALIAS.to_string()
}
