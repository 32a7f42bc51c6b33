//! Composer and Supervisor.

use log::info;

use super::StepContext;
use crate::error::ProvisionError;
use crate::packages;
use crate::service;
use crate::system::{Invocation, run_checked};

const COMPOSER_DIR: &str = "usr/local/bin";

pub(super) fn install_composer(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    info!("Installing Composer");
    let download = tempfile::tempdir().map_err(|e| ProvisionError::io(std::env::temp_dir(), e))?;
    let installer = download.path().join("composer-setup.php");
    ctx.system
        .fetch(&ctx.settings.composer_installer_url, &installer)?;

    let install_dir = ctx.settings.under_root(COMPOSER_DIR);
    run_checked(
        ctx.system,
        &Invocation::new("php")
            .arg(installer.to_string_lossy())
            .arg(format!("--install-dir={}", install_dir.display()))
            .arg("--filename=composer")
            .env("COMPOSER_ALLOW_SUPERUSER", "1"),
    )?;

    run_checked(
        ctx.system,
        &Invocation::new(install_dir.join("composer").to_string_lossy())
            .arg("--version")
            .env("COMPOSER_ALLOW_SUPERUSER", "1"),
    )?;
    Ok(())
}

pub(super) fn install_supervisor(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    info!("Installing Supervisor");
    packages::install(ctx.system, &["supervisor".to_string()])?;
    service::start_and_enable(ctx.system, "supervisor")
}
