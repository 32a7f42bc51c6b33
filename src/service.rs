//! Systemd service control (systemctl)

use std::time::Duration;

use log::{info, warn};

use crate::config::RestartSettings;
use crate::error::ProvisionError;
use crate::system::{Invocation, System, run_checked, run_quiet};

/// Bounded retry policy for [`safe_restart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl From<&RestartSettings> for RestartPolicy {
    fn from(settings: &RestartSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            delay: settings.delay(),
        }
    }
}

fn systemctl(action: &str, service: &str) -> Invocation {
    Invocation::new("systemctl").args([action, service])
}

/// Start a service.
pub fn start(system: &dyn System, service: &str) -> Result<(), ProvisionError> {
    run_checked(system, &systemctl("start", service))?;
    Ok(())
}

/// Enable a service at boot.
pub fn enable(system: &dyn System, service: &str) -> Result<(), ProvisionError> {
    run_checked(system, &systemctl("enable", service))?;
    Ok(())
}

/// Stop a service; returns whether systemctl reported success.
pub fn stop(system: &dyn System, service: &str) -> bool {
    run_quiet(system, &systemctl("stop", service))
}

pub fn disable(system: &dyn System, service: &str) -> bool {
    run_quiet(system, &systemctl("disable", service))
}

pub fn reload(system: &dyn System, service: &str) -> Result<(), ProvisionError> {
    run_checked(system, &systemctl("reload", service))?;
    Ok(())
}

/// `systemctl is-active` exits 0 only for an active unit.
pub fn is_active(system: &dyn System, service: &str) -> bool {
    run_quiet(system, &systemctl("is-active", service))
}

/// Start and enable, then fail unless the unit reports active.
pub fn start_and_enable(system: &dyn System, service: &str) -> Result<(), ProvisionError> {
    start(system, service)?;
    enable(system, service)?;
    ensure_active(system, service)
}

pub fn ensure_active(system: &dyn System, service: &str) -> Result<(), ProvisionError> {
    if is_active(system, service) {
        info!("{service} is active");
        Ok(())
    } else {
        Err(ProvisionError::Verification(format!(
            "{service} is not active after start"
        )))
    }
}

/// Restart a service and confirm it is active, retrying on failure.
///
/// Performs at most `policy.max_attempts` attempts, sleeping `policy.delay`
/// between them. Returns `false` once attempts are exhausted; the caller
/// decides whether that is fatal.
pub fn safe_restart(system: &dyn System, service: &str, policy: RestartPolicy) -> bool {
    for attempt in 1..=policy.max_attempts {
        let restarted = run_quiet(system, &systemctl("restart", service));
        if restarted && is_active(system, service) {
            info!("{service} restarted (attempt {attempt}/{})", policy.max_attempts);
            return true;
        }
        warn!(
            "restart of {service} failed (attempt {attempt}/{})",
            policy.max_attempts
        );
        if attempt < policy.max_attempts {
            system.sleep(policy.delay);
        }
    }
    false
}

/// [`safe_restart`] for callers that treat failure as fatal.
pub fn restart_or_fail(
    system: &dyn System,
    service: &str,
    policy: RestartPolicy,
) -> Result<(), ProvisionError> {
    if safe_restart(system, service, policy) {
        Ok(())
    } else {
        Err(ProvisionError::Verification(format!(
            "{service} failed to restart after {} attempts",
            policy.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::RecordingSystem;

    #[test]
    fn persistent_failure_stops_after_max_attempts() {
        let system = RecordingSystem::new().fail_when("systemctl restart nginx", 1, "boom");
        let policy = RestartPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        };

        assert!(!safe_restart(&system, "nginx", policy));
        assert_eq!(system.count("systemctl restart nginx"), 3);
        assert_eq!(system.sleeps(), vec![Duration::from_secs(5); 2]);
    }

    #[test]
    fn inactive_after_restart_counts_as_failure() {
        let system = RecordingSystem::new().fail_times("systemctl is-active mysql", 1, 3, "");
        assert!(safe_restart(&system, "mysql", RestartPolicy::default()));
        assert_eq!(system.count("systemctl restart mysql"), 2);
        assert_eq!(system.sleeps().len(), 1);
    }

    #[test]
    fn first_attempt_success_does_not_sleep() {
        let system = RecordingSystem::new();
        assert!(safe_restart(&system, "apache2", RestartPolicy::default()));
        assert_eq!(system.count("systemctl restart"), 1);
        assert!(system.sleeps().is_empty());
    }

    #[test]
    fn restart_or_fail_reports_attempts() {
        let system = RecordingSystem::new().fail_when("systemctl restart", 1, "");
        let policy = RestartPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(10),
        };
        let err = restart_or_fail(&system, "php8.2-fpm", policy).unwrap_err();
        assert_eq!(err.to_string(), "php8.2-fpm failed to restart after 2 attempts");
    }

    #[test]
    fn start_and_enable_verifies_state() {
        let system = RecordingSystem::new().fail_when("systemctl is-active", 3, "");
        assert!(start_and_enable(&system, "supervisor").is_err());
        assert_eq!(
            system.commands(),
            vec![
                "systemctl start supervisor",
                "systemctl enable supervisor",
                "systemctl is-active supervisor",
            ]
        );
    }
}
