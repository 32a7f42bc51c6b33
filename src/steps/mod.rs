//! Installer steps
//!
//! Each step installs one package group and verifies it. Steps return errors
//! instead of exiting; the orchestrator decides what a failure means.
//!
//! - `php` - PHP repository, packages and php-fpm
//! - `webserver` - Apache or Nginx
//! - `database` - MySQL / MariaDB and the root password
//! - `admin_ui` - phpMyAdmin wired into the web server
//! - `tools` - Composer and Supervisor
//! - `firewall` - ufw rules
//! - `maintenance` - helper script and version marker

mod admin_ui;
mod database;
mod firewall;
mod maintenance;
mod php;
mod tools;
mod webserver;

use std::fmt;

use crate::config::Settings;
use crate::error::ProvisionError;
use crate::packages;
use crate::password::Secret;
use crate::request::InstallationRequest;
use crate::requirements::OsInfo;
use crate::service::RestartPolicy;
use crate::system::System;

pub use maintenance::{helper_script, version_marker};
pub use webserver::nginx_site;

/// Unit of installation work, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    PackageIndex,
    Php,
    WebServer,
    Database,
    AdminUi,
    Composer,
    Supervisor,
    Firewall,
    Maintenance,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PackageIndex => "package index",
            Self::Php => "php",
            Self::WebServer => "web server",
            Self::Database => "database",
            Self::AdminUi => "phpmyadmin",
            Self::Composer => "composer",
            Self::Supervisor => "supervisor",
            Self::Firewall => "firewall",
            Self::Maintenance => "maintenance",
        })
    }
}

impl Component {
    /// Components that must already have run.
    pub fn requires(self, request: &InstallationRequest) -> Vec<Component> {
        match self {
            Self::WebServer if request.php.is_some() => vec![Self::Php],
            Self::AdminUi => vec![Self::Php, Self::Database, Self::WebServer],
            Self::Composer => vec![Self::Php],
            _ => Vec::new(),
        }
    }

    fn install(self, ctx: &StepContext<'_>, state: &mut RunState) -> Result<(), ProvisionError> {
        match self {
            Self::PackageIndex => packages::update(ctx.system),
            Self::Php => php::install(ctx),
            Self::WebServer => webserver::install(ctx),
            Self::Database => database::install(ctx, state),
            Self::AdminUi => admin_ui::install(ctx),
            Self::Composer => tools::install_composer(ctx),
            Self::Supervisor => tools::install_supervisor(ctx),
            Self::Firewall => firewall::install(ctx),
            Self::Maintenance => maintenance::install(ctx),
        }
    }
}

/// Ordered list of components for a request.
pub fn plan(request: &InstallationRequest, settings: &Settings) -> Vec<Component> {
    let mut steps = vec![Component::PackageIndex];
    if request.php.is_some() {
        steps.push(Component::Php);
    }
    steps.push(Component::WebServer);
    if request.install_database {
        steps.push(Component::Database);
    }
    if request.wants_admin_ui() {
        steps.push(Component::AdminUi);
    }
    if request.install_composer {
        steps.push(Component::Composer);
    }
    if request.install_supervisor {
        steps.push(Component::Supervisor);
    }
    if settings.firewall.enabled {
        steps.push(Component::Firewall);
    }
    steps.push(Component::Maintenance);
    steps
}

/// Read-only inputs shared by every step.
pub struct StepContext<'a> {
    pub system: &'a dyn System,
    pub settings: &'a Settings,
    pub os: &'a OsInfo,
    pub request: &'a InstallationRequest,
    pub restart: RestartPolicy,
}

/// Values produced by steps for later steps and the final summary.
#[derive(Debug, Default)]
pub struct RunState {
    pub mysql_password: Option<Secret>,
    pub password_generated: bool,
    pub completed: Vec<Component>,
}

/// Run one step after checking its dependencies completed.
pub fn run(
    component: Component,
    ctx: &StepContext<'_>,
    state: &mut RunState,
) -> Result<(), ProvisionError> {
    if let Some(missing) = component
        .requires(ctx.request)
        .into_iter()
        .find(|dep| !state.completed.contains(dep))
    {
        return Err(ProvisionError::step(
            component,
            ProvisionError::Verification(format!("{missing} has not been installed")),
        ));
    }

    component
        .install(ctx, state)
        .map_err(|e| ProvisionError::step(component, e))?;
    state.completed.push(component);
    Ok(())
}
