//! Installation workflow
//!
//! Requirement check, backup, then the planned steps in order. The first
//! failing step (or a pending SIGINT/SIGTERM) stops the run and triggers one
//! rollback from the snapshot. Nothing below this module exits the process.

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};

use crate::backup::{self, BackupSnapshot, RollbackReport};
use crate::config::Settings;
use crate::error::ProvisionError;
use crate::password::Secret;
use crate::request::InstallationRequest;
use crate::requirements::{self, OsInfo};
use crate::service::RestartPolicy;
use crate::signals;
use crate::steps::{self, Component, RunState, StepContext};
use crate::system::System;

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub component: Component,
    pub success: bool,
    pub error: Option<String>,
}

/// Everything the caller needs to report on an install run.
#[derive(Debug)]
pub struct RunReport {
    pub os: OsInfo,
    pub warnings: Vec<String>,
    pub backup: BackupSnapshot,
    pub steps: Vec<StepResult>,
    pub failure: Option<ProvisionError>,
    pub rollback: Option<RollbackReport>,
    pub mysql_password: Option<Secret>,
    pub password_generated: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// Plain-text summary for logs and mail. Never contains the password.
    pub fn summary(&self, request: &InstallationRequest) -> String {
        let mut out = format!(
            "{} installation on {:?} {}: {}\n",
            request.stack,
            self.os.distro,
            self.os.version,
            if self.succeeded() { "succeeded" } else { "FAILED" }
        );
        for step in &self.steps {
            out.push_str(&format!(
                "  [{}] {}{}\n",
                if step.success { "ok" } else { "failed" },
                step.component,
                step.error
                    .as_deref()
                    .map(|e| format!(": {e}"))
                    .unwrap_or_default()
            ));
        }
        for warning in &self.warnings {
            out.push_str(&format!("  warning: {warning}\n"));
        }
        if let Some(rollback) = &self.rollback {
            out.push_str(&format!(
                "  rollback: {} restored, {} failed\n",
                rollback.restored.len(),
                rollback.failed.len()
            ));
        }
        out.push_str(&format!("  backup: {}\n", self.backup.directory.display()));
        out
    }
}

/// Drives one installation run against a host.
pub struct Orchestrator<'a> {
    system: &'a dyn System,
    settings: &'a Settings,
    interrupt: fn() -> Option<i32>,
    progress: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(system: &'a dyn System, settings: &'a Settings) -> Self {
        Self {
            system,
            settings,
            interrupt: signals::take,
            progress: false,
        }
    }

    /// Show an indicatif bar while steps run.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the pending-signal check.
    pub fn with_interrupt_check(mut self, check: fn() -> Option<i32>) -> Self {
        self.interrupt = check;
        self
    }

    /// Run the installation.
    ///
    /// Errors before the backup exists (requirements, backup creation) are
    /// returned as `Err`; once mutation has started the outcome, including a
    /// failure and its rollback, is carried in the [`RunReport`].
    pub fn install(&self, request: &InstallationRequest) -> Result<RunReport, ProvisionError> {
        let requirements = requirements::check(self.system, self.settings)?;
        let snapshot = backup::create_backup(self.settings)?;

        let ctx = StepContext {
            system: self.system,
            settings: self.settings,
            os: &requirements.os,
            request,
            restart: RestartPolicy::from(&self.settings.restart),
        };
        let plan = steps::plan(request, self.settings);
        let bar = self.progress_bar(plan.len() as u64);

        let mut state = RunState::default();
        let mut results = Vec::with_capacity(plan.len());
        let mut failure = None;

        for component in plan {
            if let Some(sig) = (self.interrupt)() {
                warn!("Received signal {sig}, aborting");
                failure = Some(ProvisionError::Interrupted(sig));
                break;
            }

            bar.set_message(format!("Installing {component}"));
            info!("==> {component}");
            match bar.suspend(|| steps::run(component, &ctx, &mut state)) {
                Ok(()) => {
                    results.push(StepResult {
                        component,
                        success: true,
                        error: None,
                    });
                    bar.inc(1);
                }
                Err(e) => {
                    error!("{e}");
                    results.push(StepResult {
                        component,
                        success: false,
                        error: Some(e.to_string()),
                    });
                    failure = Some(e);
                    break;
                }
            }
        }

        let rollback = if failure.is_some() {
            bar.abandon_with_message("Installation failed");
            let report = backup::rollback(&snapshot);
            if report.is_complete() {
                info!("Rollback complete");
            } else {
                error!("Rollback incomplete: {} subsystem(s) failed", report.failed.len());
            }
            Some(report)
        } else {
            bar.finish_with_message("Installation complete");
            None
        };

        Ok(RunReport {
            os: requirements.os,
            warnings: requirements.warnings,
            backup: snapshot,
            steps: results,
            failure,
            rollback,
            mysql_password: state.mysql_password,
            password_generated: state.password_generated,
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len}  {msg}")
            .map(|s| s.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }
}
