//! ufw rules for the web stack.

use log::info;

use super::StepContext;
use crate::error::ProvisionError;
use crate::packages;
use crate::system::{Invocation, run_checked};

pub(super) fn install(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    if !ctx.system.command_exists("ufw") {
        packages::install(ctx.system, &["ufw".to_string()])?;
    }

    for port in &ctx.settings.firewall.ports {
        run_checked(
            ctx.system,
            &Invocation::new("ufw").args(["allow".to_string(), format!("{port}/tcp")]),
        )?;
    }
    run_checked(
        ctx.system,
        &Invocation::new("ufw").args(["default", "deny", "incoming"]),
    )?;
    run_checked(ctx.system, &Invocation::new("ufw").args(["--force", "enable"]))?;

    info!(
        "Firewall enabled, allowing {}",
        ctx.settings
            .firewall
            .ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}
