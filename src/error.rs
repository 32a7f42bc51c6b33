//! Error types for provisioning
//!
//! `RequestError` covers input validation (flags, prompts, passwords),
//! `SystemError` covers failures talking to the host, and `ProvisionError`
//! is what the orchestrator and remover see and act upon.

use std::path::PathBuf;

use thiserror::Error;

use crate::steps::Component;

/// Invalid or inconsistent installation request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("unsupported PHP version '{given}' (supported: {supported})")]
    UnsupportedPhpVersion { given: String, supported: String },

    #[error("a stack selection (--lamp/--lemp) cannot be combined with --remove")]
    ConflictingModes,

    #[error("no operation selected: pass --lamp, --lemp or --remove")]
    NoModeSelected,

    #[error("password must be at least {min} characters long (got {len})")]
    PasswordTooShort { min: usize, len: usize },

    #[error("{component} requires {requires}, which is not part of this run")]
    MissingDependency {
        component: &'static str,
        requires: &'static str,
    },
}

/// Failure interacting with the host (process spawning, downloads, probes).
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("failed to extract {archive}: {message}")]
    Extract { archive: PathBuf, message: String },

    #[error("failed to signal process {pid}: {message}")]
    Signal { pid: i32, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced to the top-level workflow.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("this program must be run as root")]
    NotSuperuser,

    #[error("unsupported operating system '{0}' (supported: ubuntu, debian)")]
    UnsupportedOs(String),

    #[error("{os} {found} is older than the minimum supported version {minimum}")]
    UnsupportedVersion {
        os: String,
        found: String,
        minimum: String,
    },

    #[error("could not read {path}: {source}")]
    HostInfo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    System(#[from] SystemError),

    #[error("command `{command}` failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{0}")]
    Verification(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{component} step failed: {source}")]
    StepFailed {
        component: Component,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("interrupted by signal {0}")]
    Interrupted(i32),

    #[error("prompt cancelled: {0}")]
    Prompt(String),
}

impl ProvisionError {
    /// Environment errors are raised before any host mutation.
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            Self::NotSuperuser
                | Self::UnsupportedOs(_)
                | Self::UnsupportedVersion { .. }
                | Self::HostInfo { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn step(component: Component, source: ProvisionError) -> Self {
        Self::StepFailed {
            component,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_errors_are_classified() {
        assert!(ProvisionError::NotSuperuser.is_environment());
        assert!(ProvisionError::UnsupportedOs("arch".into()).is_environment());
        assert!(!ProvisionError::Interrupted(2).is_environment());
        assert!(!ProvisionError::Verification("x".into()).is_environment());
    }

    #[test]
    fn step_failure_names_the_component() {
        let err = ProvisionError::step(
            Component::Database,
            ProvisionError::Verification("mysql is not active".into()),
        );
        assert_eq!(
            err.to_string(),
            "database step failed: mysql is not active"
        );
    }
}
