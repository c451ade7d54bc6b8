//! TOML description of a BSC device
//!
//! ```toml
//! address = "ACME.Lighting.apartment"
//! uid = "FF345600"      # random when absent
//! interval = 60
//!
//! [[endpoints]]
//! name = "Output 1"
//! output = true
//! state = "off"
//! level = "0/30"
//! ```

use crate::bsc_device::BscDevice;
use crate::endpoint::EndpointSpec;
use crate::error::{DeviceError, Result};
use serde::Deserialize;
use std::path::Path;
use xap_core::heartbeat::DEFAULT_INTERVAL;
use xap_core::{Address, Level, State, Uid};

fn default_interval() -> u32 {
    DEFAULT_INTERVAL
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub address: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    #[serde(default)]
    pub uid: Option<u32>,
    #[serde(default)]
    pub output: bool,
    /// `on`, `off` or `?`
    #[serde(default)]
    pub state: Option<String>,
    /// `n/d` or `n%`
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub display_text: Option<String>,
}

impl DeviceConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DeviceError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DeviceError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Build the device, validating every field
    pub fn build(&self) -> Result<BscDevice> {
        let address = Address::parse(&self.address)
            .map_err(|e| DeviceError::Config(format!("address: {}", e)))?;
        let uid = match &self.uid {
            Some(uid) => Uid::parse(uid).map_err(|e| DeviceError::Config(format!("uid: {}", e)))?,
            None => Uid::random(),
        };
        let specs = self
            .endpoints
            .iter()
            .map(EndpointConfig::to_spec)
            .collect::<Result<Vec<_>>>()?;
        BscDevice::with_endpoints(address, uid, self.interval, specs)
    }
}

impl EndpointConfig {
    pub fn to_spec(&self) -> Result<EndpointSpec> {
        let invalid = |field: &str, e: xap_core::Error| {
            DeviceError::Config(format!("endpoint {} {}: {}", self.name, field, e))
        };

        Ok(EndpointSpec {
            name: self.name.clone(),
            uid: self.uid,
            output: self.output,
            state: self
                .state
                .as_deref()
                .map(str::parse::<State>)
                .transpose()
                .map_err(|e| invalid("state", e))?,
            level: self
                .level
                .as_deref()
                .map(str::parse::<Level>)
                .transpose()
                .map_err(|e| invalid("level", e))?,
            text: self.text.clone(),
            display_text: self.display_text.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::from_toml("address = \"a.b.c\"\n").unwrap();
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert!(config.uid.is_none());
        assert!(config.endpoints.is_empty());
        let device = config.build().unwrap();
        assert!(device.is_empty());
    }

    #[test]
    fn test_bad_state() {
        let config = DeviceConfig::from_toml(
            "address = \"a.b.c\"\n[[endpoints]]\nname = \"x\"\nstate = \"dim\"\n",
        )
        .unwrap();
        assert!(matches!(config.build(), Err(DeviceError::Config(_))));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            DeviceConfig::from_toml("address = "),
            Err(DeviceError::Config(_))
        ));
    }
}
