//! apt-get wrapper
//!
//! All package operations run with `DEBIAN_FRONTEND=noninteractive` so no
//! dpkg dialog can block the workflow.

use log::info;

use crate::error::ProvisionError;
use crate::system::{Invocation, System, run_checked, run_quiet};

fn apt_get() -> Invocation {
    Invocation::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
}

/// Refresh the package index.
pub fn update(system: &dyn System) -> Result<(), ProvisionError> {
    info!("Updating package index");
    run_checked(system, &apt_get().arg("update"))?;
    Ok(())
}

/// Install packages, failing on the first apt error.
pub fn install(system: &dyn System, packages: &[String]) -> Result<(), ProvisionError> {
    if packages.is_empty() {
        return Ok(());
    }
    info!("Installing {}", packages.join(" "));
    run_checked(
        system,
        &apt_get().args(["install", "-y"]).args(packages.iter().cloned()),
    )?;
    Ok(())
}

/// Force-purge packages. Returns whether apt succeeded.
pub fn purge(system: &dyn System, packages: &[&str]) -> bool {
    info!("Purging {}", packages.join(" "));
    run_quiet(
        system,
        &apt_get()
            .args(["purge", "-y", "--allow-change-held-packages"])
            .args(packages.iter().copied()),
    )
}

pub fn autoremove(system: &dyn System) -> bool {
    run_quiet(system, &apt_get().args(["autoremove", "-y", "--purge"]))
}

/// Installed packages whose names match any of the dpkg glob `patterns`.
pub fn installed_matching(system: &dyn System, patterns: &[&str]) -> Vec<String> {
    if patterns.is_empty() {
        return Vec::new();
    }
    let query = Invocation::new("dpkg-query")
        .args(["-W", "-f=${db:Status-Abbrev} ${Package}\\n"])
        .args(patterns.iter().copied());
    // dpkg-query exits 1 when a pattern matches nothing; the listing is still valid
    let Ok(output) = system.run(&query) else {
        return Vec::new();
    };
    output
        .stdout
        .lines()
        .filter_map(|line| {
            let (status, name) = line.split_once(' ')?;
            status.starts_with("ii").then(|| name.trim().to_string())
        })
        .collect()
}

/// Feed answers to debconf before a package asks for them.
pub fn preseed(system: &dyn System, selections: &str) -> Result<(), ProvisionError> {
    run_checked(
        system,
        &Invocation::new("debconf-set-selections").stdin(selections),
    )?;
    Ok(())
}

/// Add an apt repository through `add-apt-repository`.
pub fn add_repository(system: &dyn System, repository: &str) -> Result<(), ProvisionError> {
    if !system.command_exists("add-apt-repository") {
        install(system, &["software-properties-common".to_string()])?;
    }
    info!("Adding repository {repository}");
    run_checked(
        system,
        &Invocation::new("add-apt-repository").args(["-y", repository]),
    )?;
    Ok(())
}
