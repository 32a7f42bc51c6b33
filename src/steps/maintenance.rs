//! Maintenance helper script and version marker.

use log::info;

use super::StepContext;
use crate::error::ProvisionError;
use crate::fsutil::write_file_atomic;
use crate::request::{InstallationRequest, Stack};

/// Services the helper script manages for a request.
fn managed_services(request: &InstallationRequest) -> Vec<String> {
    let mut services = vec![request.stack.web_server().to_string()];
    if let (Stack::Lemp, Some(php)) = (request.stack, request.php) {
        services.push(php.fpm_service());
    }
    if request.install_database {
        services.push("mysql".to_string());
    }
    if request.install_supervisor {
        services.push("supervisor".to_string());
    }
    services
}

/// Shell helper offering status, restart and log tailing for the stack.
pub fn helper_script(request: &InstallationRequest) -> String {
    let services = managed_services(request).join(" ");
    let logs = match request.stack {
        Stack::Lamp => "/var/log/apache2/error.log",
        Stack::Lemp => "/var/log/nginx/error.log",
    };
    format!(
        r#"#!/bin/sh
# {stack} stack maintenance helper generated by webstack {version}
set -e

SERVICES="{services}"

case "$1" in
    status)
        for s in $SERVICES; do
            printf '%-20s %s\n' "$s" "$(systemctl is-active "$s" || true)"
        done
        ;;
    restart)
        for s in $SERVICES; do
            systemctl restart "$s"
        done
        ;;
    logs)
        tail -n "${{2:-50}}" {logs}
        ;;
    *)
        echo "usage: $0 {{status|restart|logs [lines]}}" >&2
        exit 1
        ;;
esac
"#,
        stack = request.stack,
        version = env!("CARGO_PKG_VERSION"),
    )
}

/// One-line marker recording what was installed.
pub fn version_marker(request: &InstallationRequest) -> String {
    let php = request
        .php
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "webstack {} stack={} php={} installed={}\n",
        env!("CARGO_PKG_VERSION"),
        request.stack,
        php,
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%z"),
    )
}

pub(super) fn install(ctx: &StepContext<'_>) -> Result<(), ProvisionError> {
    let script = ctx.settings.under_root(&ctx.settings.helper_script);
    write_file_atomic(&script, &helper_script(ctx.request), 0o755)?;
    info!("Installed maintenance helper {}", script.display());

    write_file_atomic(
        &ctx.settings.under_root(&ctx.settings.version_file),
        &version_marker(ctx.request),
        0o644,
    )
}
