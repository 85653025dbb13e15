//! NVS (Non-Volatile Storage) config store.
//!
//! Implements [`ConfigPort`]: the whole [`SystemConfig`] is one postcard
//! blob under `thermo::syscfg`.  Every save is validated first; a blob
//! that fails to decode or validate on load is reported as
//! [`ConfigError::Corrupted`] so the caller can fall back to defaults.
//!
//! On the host the blob lives in memory (dev/test only).

use std::sync::{Mutex, PoisonError};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "thermo";
const CONFIG_KEY: &str = "syscfg";
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsConfigStore {
    #[cfg(target_os = "espidf")]
    nvs: Mutex<EspNvs<NvsDefault>>,
    #[cfg(not(target_os = "espidf"))]
    blob: Mutex<Option<Vec<u8>>>,
}

impl NvsConfigStore {
    #[cfg(target_os = "espidf")]
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            warn!("NvsConfigStore: cannot open namespace '{}': {}", CONFIG_NAMESPACE, e);
            ConfigError::IoError
        })?;
        info!("NvsConfigStore: namespace '{}' open", CONFIG_NAMESPACE);
        Ok(Self { nvs: Mutex::new(nvs) })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, ConfigError> {
        info!("NvsConfigStore: simulation backend");
        Ok(Self { blob: Mutex::new(None) })
    }

    /// Overwrite the stored blob without validation (host tests only).
    #[cfg(not(target_os = "espidf"))]
    pub fn store_raw(&self, bytes: &[u8]) {
        *self.blob.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let nvs = self.nvs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match nvs.get_blob(CONFIG_KEY, &mut buf) {
            Ok(found) => Ok(found.map(<[u8]>::to_vec)),
            Err(e) => {
                warn!("NvsConfigStore: read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.blob.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let mut nvs = self.nvs.lock().unwrap_or_else(PoisonError::into_inner);
        nvs.set_blob(CONFIG_KEY, bytes).map_err(|e| {
            warn!("NvsConfigStore: write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        *self.blob.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
        Ok(())
    }
}

fn checked(config: &SystemConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|e| match e {
        crate::Error::Config(msg) => ConfigError::ValidationFailed(msg),
        _ => ConfigError::ValidationFailed("invalid configuration"),
    })
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsConfigStore: no stored config, using defaults");
            return Ok(SystemConfig::default());
        };
        let config: SystemConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        if checked(&config).is_err() {
            warn!("NvsConfigStore: stored config fails validation");
            return Err(ConfigError::Corrupted);
        }
        info!("NvsConfigStore: loaded config ({} bytes)", bytes.len());
        Ok(config)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        checked(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }
        self.write_blob(&bytes)?;
        info!("NvsConfigStore: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
