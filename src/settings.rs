use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

pub const DEFAULT_OCAL_HOST: &str = "http://localhost:8081/";
pub const OCAL_HOST_ENV: &str = "IFEED_OCAL_HOST";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    pub ocal_host: String,
    pub request_timeout_secs: u64,
    pub tick_interval_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            ocal_host: DEFAULT_OCAL_HOST.into(),
            request_timeout_secs: 30,
            tick_interval_ms: 1000,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Zero would spin the ticker, so it is raised to one millisecond.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    fn apply_env(mut self) -> Self {
        if let Ok(host) = std::env::var(OCAL_HOST_ENV) {
            if !host.trim().is_empty() {
                self.ocal_host = host;
            }
        }
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ClientSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            ClientSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ClientSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ClientSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stored settings with environment overrides applied.
    pub fn client(&self) -> ClientSettings {
        self.read().clone().apply_env()
    }

    pub fn update_client(&self, settings: ClientSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: ClientSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &ClientSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
