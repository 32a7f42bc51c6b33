//! Stack removal
//!
//! Best-effort and idempotent: each subsystem that is detectable is stopped,
//! purged and its directories deleted. A failure is recorded against the
//! subsystem and removal moves on. Removal never touches backups.

use std::path::PathBuf;

use log::{info, warn};

use crate::config::Settings;
use crate::error::ProvisionError;
use crate::fsutil::remove_path;
use crate::packages;
use crate::request::PhpVersion;
use crate::service;
use crate::system::{Invocation, System, run_quiet};

/// Yes/no questions asked during removal.
pub trait Prompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, ProvisionError>;
}

/// Answers every question with a fixed value (`--yes`, `--no-interaction`).
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Prompter for FixedAnswer {
    fn confirm(&self, question: &str, _default: bool) -> Result<bool, ProvisionError> {
        info!("{question} {}", if self.0 { "yes" } else { "no" });
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Apache,
    Nginx,
    Mysql,
    Php,
    PhpMyAdmin,
    Composer,
    Supervisor,
}

impl Target {
    const ORDER: [Target; 7] = [
        Self::Apache,
        Self::Nginx,
        Self::Mysql,
        Self::Php,
        Self::PhpMyAdmin,
        Self::Composer,
        Self::Supervisor,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Apache => "apache",
            Self::Nginx => "nginx",
            Self::Mysql => "mysql",
            Self::Php => "php",
            Self::PhpMyAdmin => "phpmyadmin",
            Self::Composer => "composer",
            Self::Supervisor => "supervisor",
        }
    }

    fn is_present(self, system: &dyn System, settings: &Settings) -> bool {
        match self {
            Self::Apache => system.command_exists("apache2"),
            Self::Nginx => system.command_exists("nginx"),
            Self::Mysql => system.command_exists("mysql") || system.command_exists("mysqld"),
            Self::Php => system.command_exists("php"),
            Self::PhpMyAdmin => settings.under_root("usr/share/phpmyadmin").exists(),
            Self::Composer => {
                system.command_exists("composer")
                    || settings.under_root("usr/local/bin/composer").exists()
            }
            Self::Supervisor => system.command_exists("supervisord"),
        }
    }

    fn services(self, system: &dyn System) -> Vec<String> {
        match self {
            Self::Apache => vec!["apache2".into()],
            Self::Nginx => vec!["nginx".into()],
            Self::Mysql => vec!["mysql".into()],
            Self::Php => PhpVersion::ALL
                .iter()
                .filter(|v| system.command_exists(&format!("php-fpm{}", v.as_str())))
                .map(|v| v.fpm_service())
                .collect(),
            Self::Supervisor => vec!["supervisor".into()],
            Self::PhpMyAdmin | Self::Composer => Vec::new(),
        }
    }

    fn package_patterns(self) -> &'static [&'static str] {
        match self {
            Self::Apache => &["apache2*", "libapache2-mod-php*"],
            Self::Nginx => &["nginx*", "libnginx-mod-*"],
            Self::Mysql => &["mysql-*", "mariadb-*", "default-mysql-*"],
            Self::Php => &["php*"],
            Self::Supervisor => &["supervisor"],
            Self::PhpMyAdmin | Self::Composer => &[],
        }
    }

    fn paths(self) -> &'static [&'static str] {
        match self {
            Self::Apache => &["etc/apache2", "var/log/apache2", "var/lib/apache2"],
            Self::Nginx => &["etc/nginx", "var/log/nginx", "var/lib/nginx"],
            Self::Mysql => &["etc/mysql", "var/lib/mysql", "var/log/mysql"],
            Self::Php => &[
                "etc/php",
                "var/lib/php",
                "etc/apt/sources.list.d/php.list",
                "etc/apt/trusted.gpg.d/php.gpg",
            ],
            Self::PhpMyAdmin => &[
                "usr/share/phpmyadmin",
                "var/lib/phpmyadmin",
                "etc/apache2/conf-available/phpmyadmin.conf",
                "etc/apache2/conf-enabled/phpmyadmin.conf",
                "etc/nginx/snippets/phpmyadmin.conf",
            ],
            Self::Composer => &["usr/local/bin/composer", "root/.config/composer"],
            Self::Supervisor => &["etc/supervisor", "var/log/supervisor"],
        }
    }
}

/// Outcome of a removal run.
#[derive(Debug, Default, Clone)]
pub struct RemovalReport {
    pub removed: Vec<String>,
    pub skipped: Vec<String>,
    pub declined: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub killed: Vec<(u16, i32)>,
}

impl RemovalReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (label, names) in [
            ("removed", &self.removed),
            ("kept", &self.declined),
            ("not installed", &self.skipped),
        ] {
            if !names.is_empty() {
                out.push_str(&format!("{label}: {}\n", names.join(", ")));
            }
        }
        for (name, reason) in &self.failed {
            out.push_str(&format!("failed: {name}: {reason}\n"));
        }
        for (port, pid) in &self.killed {
            out.push_str(&format!("killed pid {pid} on port {port}\n"));
        }
        out
    }
}

/// Remove everything the installer may have put on the host.
pub fn remove(
    system: &dyn System,
    settings: &Settings,
    prompter: &dyn Prompter,
) -> Result<RemovalReport, ProvisionError> {
    if !system.is_superuser() {
        return Err(ProvisionError::NotSuperuser);
    }

    let mut report = RemovalReport::default();

    for target in Target::ORDER {
        let name = target.name().to_string();
        if !target.is_present(system, settings) {
            info!("{name} not found, skipping");
            report.skipped.push(name);
            continue;
        }

        if target == Target::Supervisor
            && !prompter.confirm("Remove Supervisor? Other applications may rely on it.", false)?
        {
            report.declined.push(name);
            continue;
        }

        info!("Removing {name}");
        match remove_target(system, settings, target) {
            Ok(()) => report.removed.push(name),
            Err(e) => {
                warn!("Failed to remove {name}: {e}");
                report.failed.push((name, e));
            }
        }
    }

    if !packages::autoremove(system) {
        report
            .failed
            .push(("autoremove".into(), "apt-get autoremove failed".into()));
    }

    for marker in [&settings.helper_script, &settings.version_file] {
        let path = settings.under_root(marker);
        if let Err(e) = remove_path(&path) {
            report.failed.push((path.display().to_string(), e.to_string()));
        }
    }

    cleanup_ports(system, settings, &mut report);

    Ok(report)
}

fn remove_target(system: &dyn System, settings: &Settings, target: Target) -> Result<(), String> {
    for svc in target.services(system) {
        let stopped = service::stop(system, &svc);
        service::disable(system, &svc);
        if !stopped && target == Target::Mysql {
            warn!("{svc} did not stop cleanly, killing mysqld");
            run_quiet(system, &Invocation::new("pkill").args(["-9", "mysqld"]));
        }
    }

    let mut errors = Vec::new();

    let installed = packages::installed_matching(system, target.package_patterns());
    if !installed.is_empty() {
        let names: Vec<&str> = installed.iter().map(String::as_str).collect();
        if !packages::purge(system, &names) {
            errors.push(format!("purge of {} failed", installed.join(" ")));
        }
    }

    let paths: Vec<PathBuf> = target
        .paths()
        .iter()
        .map(|p| settings.under_root(p))
        .collect();
    for path in paths {
        if let Err(e) = remove_path(&path) {
            errors.push(e.to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// PIDs listening on a TCP port; peers of outbound connections are excluded.
fn listener_query(port: u16) -> Invocation {
    Invocation::new("lsof").args([
        "-t".to_string(),
        "-sTCP:LISTEN".to_string(),
        format!("-iTCP:{port}"),
    ])
}

fn cleanup_ports(system: &dyn System, settings: &Settings, report: &mut RemovalReport) {
    if !system.command_exists("lsof") {
        warn!("lsof not available, skipping port cleanup");
        return;
    }

    for &port in &settings.cleanup_ports {
        let query = listener_query(port);
        // lsof exits 1 when nothing listens
        let Ok(output) = system.run(&query) else {
            continue;
        };
        for pid in output
            .stdout
            .lines()
            .filter_map(|l| l.trim().parse::<i32>().ok())
        {
            match system.terminate(pid) {
                Ok(()) => {
                    info!("Killed process {pid} on port {port}");
                    report.killed.push((port, pid));
                }
                Err(e) => report.failed.push((format!("port {port}"), e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::RecordingSystem;

    fn settings(root: &std::path::Path) -> Settings {
        Settings {
            root: root.to_path_buf(),
            cleanup_ports: vec![80],
            ..Settings::default()
        }
    }

    #[test]
    fn mysql_is_killed_when_stop_fails() {
        let dir = tempfile::tempdir().unwrap();
        let system = RecordingSystem::new()
            .with_commands(["mysql"])
            .fail_when("systemctl stop mysql", 1, "timeout");
        let report = remove(&system, &settings(dir.path()), &FixedAnswer(true)).unwrap();
        assert_eq!(report.removed, vec!["mysql"]);
        assert_eq!(system.count("pkill -9 mysqld"), 1);
    }

    #[test]
    fn supervisor_kept_when_declined() {
        let dir = tempfile::tempdir().unwrap();
        let system = RecordingSystem::new().with_commands(["supervisord"]);
        let report = remove(&system, &settings(dir.path()), &FixedAnswer(false)).unwrap();
        assert_eq!(report.declined, vec!["supervisor"]);
        assert_eq!(system.count("systemctl stop supervisor"), 0);
    }

    #[test]
    fn purge_failure_is_recorded_and_removal_continues() {
        let dir = tempfile::tempdir().unwrap();
        let system = RecordingSystem::new()
            .with_commands(["apache2", "nginx"])
            .respond(
                "dpkg-query -W -f=${db:Status-Abbrev} ${Package}\\n apache2*",
                "ii  apache2\n",
            )
            .fail_when("apt-get purge -y --allow-change-held-packages apache2", 100, "");
        let report = remove(&system, &settings(dir.path()), &FixedAnswer(true)).unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.failed[0].0, "apache");
        assert_eq!(report.removed, vec!["nginx"]);
    }

    #[test]
    fn listeners_on_cleanup_ports_are_killed() {
        let dir = tempfile::tempdir().unwrap();
        let system = RecordingSystem::new()
            .with_commands(["lsof"])
            .respond("lsof -t -sTCP:LISTEN -iTCP:80", "1234\n5678\n");
        let report = remove(&system, &settings(dir.path()), &FixedAnswer(true)).unwrap();
        assert_eq!(system.terminated(), vec![1234, 5678]);
        assert_eq!(report.killed, vec![(80, 1234), (80, 5678)]);
    }

    #[test]
    fn port_query_only_matches_listeners() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            cleanup_ports: vec![443],
            ..settings(dir.path())
        };
        let system = RecordingSystem::new().with_commands(["lsof"]);
        remove(&system, &settings, &FixedAnswer(true)).unwrap();
        let queries: Vec<String> = system
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("lsof"))
            .collect();
        assert_eq!(queries, vec!["lsof -t -sTCP:LISTEN -iTCP:443"]);
    }

    #[test]
    fn markers_are_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let helper = settings.under_root(&settings.helper_script);
        std::fs::create_dir_all(helper.parent().unwrap()).unwrap();
        std::fs::write(&helper, "#!/bin/sh").unwrap();
        let system = RecordingSystem::new().with_commands(Vec::<String>::new());
        let report = remove(&system, &settings, &FixedAnswer(true)).unwrap();
        assert!(report.is_clean());
        assert!(!helper.exists());
    }
}
