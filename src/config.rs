//! Tool configuration loaded from TOML
//!
//! Every field has a default, so a missing or partial file is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// System-wide configuration file, read when present.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/webstack/webstack.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix for every managed path (`/` on a real host).
    pub root: PathBuf,
    pub log_file: PathBuf,
    /// Directory under which per-run backup snapshots are created.
    pub backup_root: PathBuf,
    pub os_release_path: PathBuf,
    pub meminfo_path: PathBuf,
    pub min_disk_gb: u64,
    pub min_memory_mb: u64,
    pub restart: RestartSettings,
    pub firewall: FirewallSettings,
    pub connectivity_hosts: Vec<String>,
    pub phpmyadmin_url: String,
    pub composer_installer_url: String,
    pub cleanup_ports: Vec<u16>,
    pub notify: NotifySettings,
    /// Generated maintenance helper, relative to `root`.
    pub helper_script: PathBuf,
    /// One-line version marker, relative to `root`.
    pub version_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartSettings {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallSettings {
    pub enabled: bool,
    pub ports: Vec<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub email: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            log_file: PathBuf::from("/var/log/webstack.log"),
            backup_root: std::env::temp_dir(),
            os_release_path: PathBuf::from("/etc/os-release"),
            meminfo_path: PathBuf::from("/proc/meminfo"),
            min_disk_gb: 5,
            min_memory_mb: 1024,
            restart: RestartSettings::default(),
            firewall: FirewallSettings::default(),
            connectivity_hosts: vec![
                "google.com".to_string(),
                "cloudflare.com".to_string(),
                "github.com".to_string(),
            ],
            phpmyadmin_url:
                "https://www.phpmyadmin.net/downloads/phpMyAdmin-latest-all-languages.tar.gz"
                    .to_string(),
            composer_installer_url: "https://getcomposer.org/installer".to_string(),
            cleanup_ports: vec![80, 443, 3306, 9000],
            notify: NotifySettings::default(),
            helper_script: PathBuf::from("usr/local/bin/webstack-maintenance"),
            version_file: PathBuf::from("etc/webstack/version"),
        }
    }
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 5,
        }
    }
}

impl Default for FirewallSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ports: vec![22, 80, 443],
        }
    }
}

impl RestartSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Settings {
    /// Load settings from an explicit path, else the system file, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let system = Path::new(DEFAULT_CONFIG_PATH);
                if system.exists() {
                    Self::from_file(system)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Resolve a root-relative path.
    pub fn under_root(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        let relative = relative.strip_prefix("/").unwrap_or(relative);
        self.root.join(relative)
    }
}
