//! Host requirement checks
//!
//! Privilege, OS identity and OS version are fatal; disk space, memory and
//! network reachability only produce warnings. Nothing here mutates the host.

use std::fs;
use std::path::Path;

use log::{info, warn};
use regex::Regex;

use crate::config::Settings;
use crate::error::ProvisionError;
use crate::system::System;

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distro {
    Ubuntu,
    Debian,
}

impl Distro {
    fn from_id(id: &str) -> Option<Self> {
        match id {
            "ubuntu" => Some(Self::Ubuntu),
            "debian" => Some(Self::Debian),
            _ => None,
        }
    }

    /// Oldest supported release as (major, minor).
    pub fn minimum_version(self) -> (u32, u32) {
        match self {
            Self::Ubuntu => (20, 4),
            Self::Debian => (10, 0),
        }
    }

    fn minimum_label(self) -> &'static str {
        match self {
            Self::Ubuntu => "20.04",
            Self::Debian => "10",
        }
    }
}

/// Identity of the host operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsInfo {
    pub distro: Distro,
    pub version: String,
    pub codename: Option<String>,
}

impl OsInfo {
    /// Parse `/etc/os-release` content and validate id and version.
    pub fn from_os_release(content: &str) -> Result<Self, ProvisionError> {
        let field = |key: &str| -> Option<String> {
            content.lines().find_map(|line| {
                let (k, v) = line.split_once('=')?;
                (k.trim() == key).then(|| v.trim().trim_matches('"').to_string())
            })
        };

        let id = field("ID").unwrap_or_default().to_lowercase();
        let distro =
            Distro::from_id(&id).ok_or_else(|| ProvisionError::UnsupportedOs(id.clone()))?;
        let version = field("VERSION_ID").unwrap_or_default();
        let codename = field("VERSION_CODENAME").filter(|c| !c.is_empty());

        let found = parse_version(&version);
        if found.is_none_or(|v| v < distro.minimum_version()) {
            return Err(ProvisionError::UnsupportedVersion {
                os: id,
                found: if version.is_empty() {
                    "unknown".to_string()
                } else {
                    version
                },
                minimum: distro.minimum_label().to_string(),
            });
        }

        Ok(Self {
            distro,
            version,
            codename,
        })
    }
}

/// "22.04" → (22, 4), "12" → (12, 0).
fn parse_version(version: &str) -> Option<(u32, u32)> {
    let re = Regex::new(r"^(\d+)(?:\.(\d+))?").ok()?;
    let caps = re.captures(version.trim())?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps
        .get(2)
        .map(|m| m.as_str().parse().unwrap_or(0))
        .unwrap_or(0);
    Some((major, minor))
}

/// `MemTotal` from `/proc/meminfo`, in MiB.
fn parse_mem_total_mb(meminfo: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let rest = line.strip_prefix("MemTotal:")?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb / 1024)
    })
}

/// Outcome of a passing requirement check.
#[derive(Debug, Clone)]
pub struct RequirementReport {
    pub os: OsInfo,
    pub warnings: Vec<String>,
}

/// Check the host before any mutation.
pub fn check(system: &dyn System, settings: &Settings) -> Result<RequirementReport, ProvisionError> {
    if !system.is_superuser() {
        return Err(ProvisionError::NotSuperuser);
    }

    let os_release = read(&settings.os_release_path)?;
    let os = OsInfo::from_os_release(&os_release)?;
    info!("Detected {:?} {}", os.distro, os.version);

    let mut warnings = Vec::new();

    match system.free_disk_bytes(&settings.root) {
        Ok(free) if free < settings.min_disk_gb.saturating_mul(GIB) => warnings.push(format!(
            "low disk space: {:.1} GiB free, {} GiB recommended",
            free as f64 / GIB as f64,
            settings.min_disk_gb
        )),
        Ok(_) => {}
        Err(e) => warnings.push(format!("could not determine free disk space: {e}")),
    }

    match fs::read_to_string(&settings.meminfo_path)
        .ok()
        .as_deref()
        .and_then(parse_mem_total_mb)
    {
        Some(total) if total < settings.min_memory_mb => warnings.push(format!(
            "low memory: {total} MiB total, {} MiB recommended",
            settings.min_memory_mb
        )),
        Some(_) => {}
        None => warnings.push("could not determine total memory".to_string()),
    }

    if !settings.connectivity_hosts.is_empty()
        && !settings.connectivity_hosts.iter().any(|h| system.probe(h))
    {
        warnings.push(format!(
            "no network connectivity to {}",
            settings.connectivity_hosts.join(", ")
        ));
    }

    for warning in &warnings {
        warn!("{warning}");
    }

    Ok(RequirementReport { os, warnings })
}

fn read(path: &Path) -> Result<String, ProvisionError> {
    fs::read_to_string(path).map_err(|source| ProvisionError::HostInfo {
        path: path.to_path_buf(),
        source,
    })
}
