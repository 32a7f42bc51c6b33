//! Completion mail through the local `mail` command.

use log::{info, warn};

use crate::config::Settings;
use crate::system::{Invocation, System, run_checked};

/// Mail `body` to the configured address. Never fails the run.
pub fn send(system: &dyn System, settings: &Settings, subject: &str, body: &str) {
    let Some(email) = settings.notify.email.as_deref().filter(|e| !e.is_empty()) else {
        return;
    };
    if !system.command_exists("mail") {
        warn!("notification to {email} skipped: `mail` is not installed");
        return;
    }

    let invocation = Invocation::new("mail")
        .args(["-s", subject, email])
        .stdin(body);
    match run_checked(system, &invocation) {
        Ok(_) => info!("Notification sent to {email}"),
        Err(e) => warn!("failed to send notification to {email}: {e}"),
    }
}
