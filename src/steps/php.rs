//! PHP installation from the Ondřej Surý packages.

use std::path::Path;

use log::info;

use super::StepContext;
use crate::error::ProvisionError;
use crate::fsutil::write_file_atomic;
use crate::packages;
use crate::request::{PhpVersion, Stack};
use crate::requirements::Distro;
use crate::service;
use crate::system::{Invocation, run_checked};

const SURY_KEY_URL: &str = "https://packages.sury.org/php/apt.gpg";

const EXTENSIONS: [&str; 9] = [
    "cli", "common", "mysql", "xml", "curl", "mbstring", "zip", "gd", "intl",
];

/// Packages for a PHP version on the given stack.
pub(super) fn package_list(version: PhpVersion, stack: Stack) -> Vec<String> {
    let v = version.as_str();
    let mut packages = vec![format!("php{v}")];
    packages.extend(EXTENSIONS.iter().map(|ext| format!("php{v}-{ext}")));
    match stack {
        Stack::Lamp => packages.push(format!("libapache2-mod-php{v}")),
        Stack::Lemp => packages.push(format!("php{v}-fpm")),
    }
    packages
}

pub(super) fn install(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    let Some(version) = ctx.request.php else {
        return Ok(());
    };
    info!("Installing PHP {version}");

    add_repository(ctx)?;
    packages::update(ctx.system)?;
    packages::install(ctx.system, &package_list(version, ctx.request.stack))?;

    run_checked(ctx.system, &Invocation::new("php").arg("-v"))?;

    if ctx.request.stack == Stack::Lemp {
        service::start_and_enable(ctx.system, &version.fpm_service())?;
    }
    Ok(())
}

fn add_repository(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    match ctx.os.distro {
        Distro::Ubuntu => packages::add_repository(ctx.system, "ppa:ondrej/php"),
        Distro::Debian => {
            let codename = ctx.os.codename.as_deref().ok_or_else(|| {
                ProvisionError::Verification(
                    "VERSION_CODENAME missing from os-release; cannot configure PHP repository"
                        .to_string(),
                )
            })?;
            packages::install(
                ctx.system,
                &["ca-certificates".to_string(), "apt-transport-https".to_string()],
            )?;
            let key = ctx
                .settings
                .under_root(Path::new("etc/apt/trusted.gpg.d/php.gpg"));
            ctx.system.fetch(SURY_KEY_URL, &key)?;
            write_file_atomic(
                &ctx.settings
                    .under_root(Path::new("etc/apt/sources.list.d/php.list")),
                &format!("deb https://packages.sury.org/php/ {codename} main\n"),
                0o644,
            )
        }
    }
}
