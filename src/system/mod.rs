//! Host abstraction
//!
//! Every interaction with the machine being provisioned (running commands,
//! downloading files, probing the network, signalling processes) goes through
//! the [`System`] trait. [`LinuxSystem`] talks to the real host;
//! [`RecordingSystem`] records what would happen, which backs `--dry-run` and
//! the test-suite.

mod linux;
mod recording;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use log::debug;

pub use linux::LinuxSystem;
pub use recording::{Presence, RecordingSystem};

use crate::error::{ProvisionError, SystemError};

/// A command to run on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Data piped to stdin. Never logged.
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Operations the provisioning workflow needs from the host.
pub trait System {
    /// Run a command to completion. Only a failure to spawn is an `Err`;
    /// a non-zero exit is reported through [`CommandOutput::code`].
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, SystemError>;

    /// Whether an executable is reachable through `PATH`.
    fn command_exists(&self, name: &str) -> bool;

    fn is_superuser(&self) -> bool;

    fn sleep(&self, duration: Duration);

    /// Download `url` to `dest`.
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), SystemError>;

    /// Unpack a `.tar.gz` into `dest`, dropping `strip` leading path components.
    fn extract_tar_gz(&self, archive: &Path, dest: &Path, strip: usize)
    -> Result<(), SystemError>;

    /// Forcibly kill a process.
    fn terminate(&self, pid: i32) -> Result<(), SystemError>;

    /// Bytes available to unprivileged users on the filesystem holding `path`.
    fn free_disk_bytes(&self, path: &Path) -> Result<u64, SystemError>;

    /// Whether `host` answers over HTTPS.
    fn probe(&self, host: &str) -> bool;
}

/// Run a command and turn a non-zero exit into a [`ProvisionError`].
pub fn run_checked(
    system: &dyn System,
    invocation: &Invocation,
) -> Result<CommandOutput, ProvisionError> {
    debug!("running: {invocation}");
    let output = system.run(invocation)?;
    if output.is_success() {
        Ok(output)
    } else {
        Err(ProvisionError::CommandFailed {
            command: invocation.to_string(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// Run a command whose failure is tolerated; returns whether it succeeded.
pub fn run_quiet(system: &dyn System, invocation: &Invocation) -> bool {
    debug!("running (tolerant): {invocation}");
    match system.run(invocation) {
        Ok(output) => output.is_success(),
        Err(e) => {
            debug!("{e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let inv = Invocation::new("apt-get")
            .args(["install", "-y"])
            .arg("nginx")
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin("secret");
        assert_eq!(inv.to_string(), "apt-get install -y nginx");
    }

    #[test]
    fn run_checked_reports_failures() {
        let system = RecordingSystem::new().fail_when("nginx -t", 1, "syntax error");
        let err = run_checked(&system, &Invocation::new("nginx").arg("-t")).unwrap_err();
        match err {
            ProvisionError::CommandFailed { command, code, stderr } => {
                assert_eq!(command, "nginx -t");
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "syntax error");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!run_quiet(&system, &Invocation::new("nginx").arg("-t")));
        assert!(run_quiet(&system, &Invocation::new("nginx").arg("-v")));
    }
}
