//! Recording host used for dry runs and tests.
//!
//! Commands are logged and recorded instead of executed. Failures can be
//! scripted by command prefix so callers can exercise their error paths.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;

use super::{CommandOutput, Invocation, System};
use crate::error::SystemError;

/// Which executables the recording host claims to have.
#[derive(Debug, Clone)]
pub enum Presence {
    All,
    Only(HashSet<String>),
}

#[derive(Debug, Clone)]
struct FailureRule {
    prefix: String,
    code: i32,
    stderr: String,
    /// Remaining failures; `None` fails forever.
    remaining: Option<u32>,
}

#[derive(Debug, Clone)]
struct OutputRule {
    prefix: String,
    stdout: String,
}

/// A [`System`] that records instead of acting.
#[derive(Debug)]
pub struct RecordingSystem {
    presence: RefCell<Presence>,
    superuser: bool,
    free_disk: u64,
    reachable: bool,
    echo: bool,
    failures: RefCell<Vec<FailureRule>>,
    outputs: Vec<OutputRule>,
    calls: RefCell<Vec<Invocation>>,
    sleeps: RefCell<Vec<Duration>>,
    fetched: RefCell<Vec<(String, PathBuf)>>,
    terminated: RefCell<Vec<i32>>,
}

impl Default for RecordingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSystem {
    pub fn new() -> Self {
        Self {
            presence: RefCell::new(Presence::All),
            superuser: true,
            free_disk: u64::MAX,
            reachable: true,
            echo: false,
            failures: RefCell::new(Vec::new()),
            outputs: Vec::new(),
            calls: RefCell::new(Vec::new()),
            sleeps: RefCell::new(Vec::new()),
            fetched: RefCell::new(Vec::new()),
            terminated: RefCell::new(Vec::new()),
        }
    }

    /// Dry-run flavour: every command is echoed through the logger.
    pub fn dry_run() -> Self {
        Self {
            echo: true,
            ..Self::new()
        }
    }

    pub fn with_commands<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.presence.borrow_mut() = Presence::Only(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn superuser(mut self, superuser: bool) -> Self {
        self.superuser = superuser;
        self
    }

    pub fn free_disk(mut self, bytes: u64) -> Self {
        self.free_disk = bytes;
        self
    }

    pub fn reachable(mut self, reachable: bool) -> Self {
        self.reachable = reachable;
        self
    }

    /// Every command starting with `prefix` exits with `code`.
    pub fn fail_when(self, prefix: &str, code: i32, stderr: &str) -> Self {
        self.push_failure(prefix, code, stderr, None)
    }

    /// The next `times` commands starting with `prefix` exit with `code`.
    pub fn fail_times(self, prefix: &str, times: u32, code: i32, stderr: &str) -> Self {
        self.push_failure(prefix, code, stderr, Some(times))
    }

    /// Commands starting with `prefix` print `stdout`.
    pub fn respond(mut self, prefix: &str, stdout: &str) -> Self {
        self.outputs.push(OutputRule {
            prefix: prefix.to_string(),
            stdout: stdout.to_string(),
        });
        self
    }

    fn push_failure(self, prefix: &str, code: i32, stderr: &str, remaining: Option<u32>) -> Self {
        self.failures.borrow_mut().push(FailureRule {
            prefix: prefix.to_string(),
            code,
            stderr: stderr.to_string(),
            remaining,
        });
        self
    }

    /// Mark an executable as installed (or not) from now on.
    pub fn set_command(&self, name: &str, present: bool) {
        let mut presence = self.presence.borrow_mut();
        if let Presence::Only(set) = &mut *presence {
            if present {
                set.insert(name.to_string());
            } else {
                set.remove(name);
            }
        }
    }

    /// All invocations so far, rendered as command lines.
    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Number of recorded commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.commands().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Index of the first command starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.starts_with(prefix))
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn fetched(&self) -> Vec<(String, PathBuf)> {
        self.fetched.borrow().clone()
    }

    pub fn terminated(&self) -> Vec<i32> {
        self.terminated.borrow().clone()
    }
}

impl System for RecordingSystem {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, SystemError> {
        let line = invocation.to_string();
        if self.echo {
            info!("[dry-run] {line}");
        }
        self.calls.borrow_mut().push(invocation.clone());

        let mut failures = self.failures.borrow_mut();
        if let Some(rule) = failures
            .iter_mut()
            .find(|r| line.starts_with(&r.prefix) && r.remaining != Some(0))
        {
            if let Some(left) = rule.remaining.as_mut() {
                *left -= 1;
            }
            return Ok(CommandOutput::failure(rule.code, rule.stderr.clone()));
        }

        let stdout = self
            .outputs
            .iter()
            .find(|r| line.starts_with(&r.prefix))
            .map(|r| r.stdout.clone())
            .unwrap_or_default();
        Ok(CommandOutput {
            stdout,
            ..CommandOutput::success()
        })
    }

    fn command_exists(&self, name: &str) -> bool {
        match &*self.presence.borrow() {
            Presence::All => true,
            Presence::Only(set) => set.contains(name),
        }
    }

    fn is_superuser(&self) -> bool {
        self.superuser
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }

    fn fetch(&self, url: &str, dest: &Path) -> Result<(), SystemError> {
        if self.echo {
            info!("[dry-run] download {url} -> {}", dest.display());
        }
        self.fetched
            .borrow_mut()
            .push((url.to_string(), dest.to_path_buf()));
        Ok(())
    }

    fn extract_tar_gz(
        &self,
        archive: &Path,
        dest: &Path,
        _strip: usize,
    ) -> Result<(), SystemError> {
        if self.echo {
            info!("[dry-run] extract {} -> {}", archive.display(), dest.display());
        }
        fs::create_dir_all(dest).map_err(|source| SystemError::Io {
            path: dest.to_path_buf(),
            source,
        })
    }

    fn terminate(&self, pid: i32) -> Result<(), SystemError> {
        if self.echo {
            info!("[dry-run] kill -9 {pid}");
        }
        self.terminated.borrow_mut().push(pid);
        Ok(())
    }

    fn free_disk_bytes(&self, _path: &Path) -> Result<u64, SystemError> {
        Ok(self.free_disk)
    }

    fn probe(&self, _host: &str) -> bool {
        self.reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_failures_recover() {
        let system = RecordingSystem::new().fail_times("systemctl is-active", 2, 3, "inactive");
        let probe = Invocation::new("systemctl").args(["is-active", "nginx"]);
        assert!(!system.run(&probe).unwrap().is_success());
        assert!(!system.run(&probe).unwrap().is_success());
        assert!(system.run(&probe).unwrap().is_success());
        assert_eq!(system.count("systemctl is-active"), 3);
    }

    #[test]
    fn presence_can_change() {
        let system = RecordingSystem::new().with_commands(["nginx"]);
        assert!(system.command_exists("nginx"));
        assert!(!system.command_exists("php"));
        system.set_command("php", true);
        system.set_command("nginx", false);
        assert!(system.command_exists("php"));
        assert!(!system.command_exists("nginx"));
    }

    #[test]
    fn scripted_output_is_returned() {
        let system = RecordingSystem::new().respond("lsof", "101\n202\n");
        let out = system.run(&Invocation::new("lsof").arg("-t")).unwrap();
        assert_eq!(out.stdout, "101\n202\n");
    }
}
