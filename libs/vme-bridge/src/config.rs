//! Bridge core configuration

use serde::{Deserialize, Serialize};
use vme_common::{config, Error, LogConfig, Result};
use vme_model::{AddressModifier, CycleClass};

/// Environment/config-file name; env vars use the `VME_BRIDGE_` prefix
pub const CONFIG_NAME: &str = "vme-bridge";

/// Default size of the handle table
pub const DEFAULT_MAX_SESSIONS: usize = 32;
/// VME BLT bursts may not cross a 256-byte boundary
pub const DEFAULT_BLT_BURST_BYTES: usize = 256;
/// VME MBLT bursts may not cross a 2 KiB boundary
pub const DEFAULT_MBLT_BURST_BYTES: usize = 2048;
pub const DEFAULT_MAX_BATCH_CYCLES: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Number of handles that may be open at once
    pub max_sessions: usize,
    pub blt_burst_bytes: usize,
    pub mblt_burst_bytes: usize,
    /// Upper bound on cycles in one batch call
    pub max_batch_cycles: usize,
    /// Allow flash page write and erase
    pub flash_write_enabled: bool,
    pub logging: LogConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            blt_burst_bytes: DEFAULT_BLT_BURST_BYTES,
            mblt_burst_bytes: DEFAULT_MBLT_BURST_BYTES,
            max_batch_cycles: DEFAULT_MAX_BATCH_CYCLES,
            flash_write_enabled: false,
            logging: LogConfig {
                service_name: "vme_bridge".to_string(),
                ..Default::default()
            },
        }
    }
}

impl BridgeConfig {
    /// Defaults, `config/` files and `VME_BRIDGE_*` environment
    pub fn load() -> Result<Self> {
        let config: Self = config::load_config(CONFIG_NAME)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config: Self = config::load_config_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 || self.max_sessions > usize::from(u16::MAX) {
            return Err(Error::Config(format!(
                "max_sessions must be in 1..={}, got {}",
                u16::MAX,
                self.max_sessions
            )));
        }
        for (name, value) in [
            ("blt_burst_bytes", self.blt_burst_bytes),
            ("mblt_burst_bytes", self.mblt_burst_bytes),
        ] {
            if value < 8 || !value.is_power_of_two() {
                return Err(Error::Config(format!(
                    "{} must be a power of two >= 8, got {}",
                    name, value
                )));
            }
        }
        if self.max_batch_cycles == 0 {
            return Err(Error::Config("max_batch_cycles must be > 0".to_string()));
        }
        Ok(())
    }

    /// Install the global subscriber described by `logging`
    pub fn init_logging(&self) -> Result<()> {
        vme_common::logging::init_with_config(&self.logging)
    }

    /// Burst boundary for a block transfer with this address modifier
    pub fn burst_bytes(&self, am: AddressModifier) -> usize {
        match am.class() {
            CycleClass::Mblt => self.mblt_burst_bytes,
            _ => self.blt_burst_bytes,
        }
    }
}
