//! Configuration snapshots and rollback
//!
//! A snapshot is taken once per install run, before anything on the host is
//! touched. Rollback copies it back over the live directories, one subsystem
//! at a time, and keeps going when a subsystem fails to restore.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::error::ProvisionError;

/// Configuration trees captured before installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Apache,
    Nginx,
    Mysql,
    Php,
}

impl Subsystem {
    pub const ALL: [Subsystem; 4] = [Self::Apache, Self::Nginx, Self::Mysql, Self::Php];

    /// Directory name, both under `/etc` and inside a snapshot.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Apache => "apache2",
            Self::Nginx => "nginx",
            Self::Mysql => "mysql",
            Self::Php => "php",
        }
    }

    pub fn live_path(self, settings: &Settings) -> PathBuf {
        settings.under_root(Path::new("etc").join(self.dir_name()))
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A per-run copy of the subsystem configuration directories.
#[derive(Debug, Clone)]
pub struct BackupSnapshot {
    pub directory: PathBuf,
    pub captured: Vec<(Subsystem, PathBuf)>,
}

impl BackupSnapshot {
    pub fn snapshot_path(&self, subsystem: Subsystem) -> PathBuf {
        self.directory.join(subsystem.dir_name())
    }
}

/// What a rollback managed to do.
#[derive(Debug, Default, Clone)]
pub struct RollbackReport {
    pub restored: Vec<Subsystem>,
    pub skipped: Vec<Subsystem>,
    pub failed: Vec<(Subsystem, String)>,
}

impl RollbackReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Snapshot every existing subsystem directory into a fresh timestamped
/// directory under `settings.backup_root`.
pub fn create_backup(settings: &Settings) -> Result<BackupSnapshot, ProvisionError> {
    let directory = unique_backup_dir(&settings.backup_root);
    fs::create_dir_all(&directory).map_err(|e| ProvisionError::io(&directory, e))?;
    info!("Creating backup in {}", directory.display());

    let mut captured = Vec::new();
    for subsystem in Subsystem::ALL {
        let live = subsystem.live_path(settings);
        if !live.is_dir() {
            continue;
        }
        copy_tree(&live, &directory.join(subsystem.dir_name()))?;
        captured.push((subsystem, live));
    }

    info!(
        "Backup captured: {}",
        if captured.is_empty() {
            "nothing to back up".to_string()
        } else {
            captured
                .iter()
                .map(|(s, _)| s.dir_name())
                .collect::<Vec<_>>()
                .join(", ")
        }
    );

    Ok(BackupSnapshot {
        directory,
        captured,
    })
}

fn unique_backup_dir(root: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let base = root.join(format!("webstack_backup_{stamp}"));
    if !base.exists() {
        return base;
    }
    (1..)
        .map(|n| root.join(format!("webstack_backup_{stamp}_{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

/// Restore every captured subsystem from `snapshot`.
pub fn rollback(snapshot: &BackupSnapshot) -> RollbackReport {
    warn!("Rolling back configuration from {}", snapshot.directory.display());
    let mut report = RollbackReport::default();

    for (subsystem, live) in &snapshot.captured {
        let source = snapshot.snapshot_path(*subsystem);
        if !source.is_dir() {
            warn!("No snapshot for {subsystem}, skipping");
            report.skipped.push(*subsystem);
            continue;
        }
        match copy_tree(&source, live) {
            Ok(()) => {
                info!("Restored {}", live.display());
                report.restored.push(*subsystem);
            }
            Err(e) => {
                warn!("Failed to restore {subsystem}: {e}");
                report.failed.push((*subsystem, e.to_string()));
            }
        }
    }

    report
}

/// Recursively copy `from` into `to`, overwriting files that exist.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> Result<(), ProvisionError> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            ProvisionError::io(path, e.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| ProvisionError::io(&target, e))?;
        } else if file_type.is_symlink() {
            let link =
                fs::read_link(entry.path()).map_err(|e| ProvisionError::io(entry.path(), e))?;
            if target.symlink_metadata().is_ok() {
                fs::remove_file(&target).map_err(|e| ProvisionError::io(&target, e))?;
            }
            std::os::unix::fs::symlink(&link, &target)
                .map_err(|e| ProvisionError::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| ProvisionError::io(&target, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(root: &Path) -> Settings {
        Settings {
            root: root.join("host"),
            backup_root: root.join("backups"),
            ..Settings::default()
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn missing_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        write(&settings.under_root("etc/nginx/nginx.conf"), "worker_processes 1;");

        let snapshot = create_backup(&settings).unwrap();
        assert_eq!(snapshot.captured.len(), 1);
        assert_eq!(snapshot.captured[0].0, Subsystem::Nginx);
        assert_eq!(
            fs::read_to_string(snapshot.directory.join("nginx/nginx.conf")).unwrap(),
            "worker_processes 1;"
        );
        assert!(
            snapshot
                .directory
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("webstack_backup_")
        );
    }

    #[test]
    fn backups_in_the_same_second_get_distinct_directories() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let a = create_backup(&settings).unwrap();
        let b = create_backup(&settings).unwrap();
        assert_ne!(a.directory, b.directory);
    }

    #[test]
    fn rollback_restores_captured_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let conf = settings.under_root("etc/apache2/apache2.conf");
        write(&conf, "original");
        write(&settings.under_root("etc/php/8.2/cli/php.ini"), "memory_limit=128M");

        let snapshot = create_backup(&settings).unwrap();
        write(&conf, "broken by install");
        fs::remove_dir_all(settings.under_root("etc/php")).unwrap();

        let report = rollback(&snapshot);
        assert!(report.is_complete());
        assert_eq!(report.restored, vec![Subsystem::Apache, Subsystem::Php]);
        assert_eq!(fs::read_to_string(&conf).unwrap(), "original");
        assert_eq!(
            fs::read_to_string(settings.under_root("etc/php/8.2/cli/php.ini")).unwrap(),
            "memory_limit=128M"
        );
    }

    #[test]
    fn absent_snapshot_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        write(&settings.under_root("etc/mysql/my.cnf"), "[mysqld]");
        write(&settings.under_root("etc/nginx/nginx.conf"), "events {}");

        let snapshot = create_backup(&settings).unwrap();
        fs::remove_dir_all(snapshot.snapshot_path(Subsystem::Mysql)).unwrap();
        write(&settings.under_root("etc/nginx/nginx.conf"), "garbage");

        let report = rollback(&snapshot);
        assert_eq!(report.skipped, vec![Subsystem::Mysql]);
        assert_eq!(report.restored, vec![Subsystem::Nginx]);
        assert_eq!(
            fs::read_to_string(settings.under_root("etc/nginx/nginx.conf")).unwrap(),
            "events {}"
        );
    }

    #[test]
    fn symlinks_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        write(&settings.under_root("etc/nginx/sites-available/default"), "server {}");
        let enabled = settings.under_root("etc/nginx/sites-enabled");
        fs::create_dir_all(&enabled).unwrap();
        std::os::unix::fs::symlink("../sites-available/default", enabled.join("default")).unwrap();

        let snapshot = create_backup(&settings).unwrap();
        let copied = snapshot.directory.join("nginx/sites-enabled/default");
        assert_eq!(
            fs::read_link(copied).unwrap(),
            PathBuf::from("../sites-available/default")
        );

        // restoring over an existing link replaces it
        assert!(rollback(&snapshot).is_complete());
    }
}
