//! Typed installation request
//!
//! Both input adapters (command-line flags and the interactive wizard) feed a
//! [`RequestBuilder`]; the workflow only ever sees a validated [`Operation`].

use std::fmt;
use std::str::FromStr;

use log::warn;

use crate::error::RequestError;
use crate::password::{self, Secret};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stack {
    Lamp,
    Lemp,
}

impl Stack {
    pub fn web_server(self) -> &'static str {
        match self {
            Self::Lamp => "apache2",
            Self::Lemp => "nginx",
        }
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lamp => "LAMP",
            Self::Lemp => "LEMP",
        })
    }
}

/// Supported PHP releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhpVersion {
    V7_4,
    V8_0,
    V8_1,
    V8_2,
    V8_3,
}

impl PhpVersion {
    pub const ALL: [PhpVersion; 5] = [
        Self::V7_4,
        Self::V8_0,
        Self::V8_1,
        Self::V8_2,
        Self::V8_3,
    ];

    pub const DEFAULT: PhpVersion = Self::V8_2;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V7_4 => "7.4",
            Self::V8_0 => "8.0",
            Self::V8_1 => "8.1",
            Self::V8_2 => "8.2",
            Self::V8_3 => "8.3",
        }
    }

    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Unix socket served by this version's php-fpm pool.
    pub fn fpm_socket(self) -> String {
        format!("/run/php/php{}-fpm.sock", self.as_str())
    }

    pub fn fpm_service(self) -> String {
        format!("php{}-fpm", self.as_str())
    }
}

impl fmt::Display for PhpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhpVersion {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == trimmed)
            .ok_or_else(|| RequestError::UnsupportedPhpVersion {
                given: s.to_string(),
                supported: Self::supported_list(),
            })
    }
}

/// Everything needed to install a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRequest {
    pub stack: Stack,
    /// `None` skips PHP entirely.
    pub php: Option<PhpVersion>,
    pub install_database: bool,
    /// `None` means a password is generated during the database step.
    pub mysql_password: Option<Secret>,
    pub install_composer: bool,
    pub install_supervisor: bool,
}

impl InstallationRequest {
    /// phpMyAdmin needs both PHP and the database.
    pub fn wants_admin_ui(&self) -> bool {
        self.php.is_some() && self.install_database
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Install(InstallationRequest),
    Remove,
}

/// Collects loosely typed answers and validates them into an [`Operation`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    stack: Option<Stack>,
    remove: bool,
    install_php: bool,
    php_version: Option<String>,
    install_database: bool,
    mysql_password: Option<String>,
    install_composer: bool,
    install_supervisor: bool,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            stack: None,
            remove: false,
            install_php: true,
            php_version: None,
            install_database: true,
            mysql_password: None,
            install_composer: false,
            install_supervisor: false,
        }
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack(mut self, stack: Stack) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn remove(mut self, remove: bool) -> Self {
        self.remove = remove;
        self
    }

    pub fn install_php(mut self, install: bool) -> Self {
        self.install_php = install;
        self
    }

    pub fn php_version(mut self, version: impl Into<String>) -> Self {
        self.php_version = Some(version.into());
        self
    }

    pub fn install_database(mut self, install: bool) -> Self {
        self.install_database = install;
        self
    }

    pub fn mysql_password(mut self, password: impl Into<String>) -> Self {
        self.mysql_password = Some(password.into());
        self
    }

    pub fn install_composer(mut self, install: bool) -> Self {
        self.install_composer = install;
        self
    }

    pub fn install_supervisor(mut self, install: bool) -> Self {
        self.install_supervisor = install;
        self
    }

    /// Validate the collected answers.
    pub fn build(self) -> Result<Operation, RequestError> {
        match (self.stack, self.remove) {
            (Some(_), true) => Err(RequestError::ConflictingModes),
            (None, true) => Ok(Operation::Remove),
            (None, false) => Err(RequestError::NoModeSelected),
            (Some(stack), false) => {
                let php = if self.install_php {
                    match self.php_version.as_deref() {
                        Some(v) => Some(v.parse::<PhpVersion>()?),
                        None => Some(PhpVersion::DEFAULT),
                    }
                } else {
                    None
                };

                if self.install_composer && php.is_none() {
                    return Err(RequestError::MissingDependency {
                        component: "composer",
                        requires: "php",
                    });
                }

                let mysql_password = match self.mysql_password {
                    Some(pw) if !pw.is_empty() => {
                        let assessment = password::check(&pw)?;
                        if let Some(warning) = assessment.warning() {
                            warn!("{warning}");
                        }
                        Some(Secret::new(pw))
                    }
                    _ => None,
                };

                Ok(Operation::Install(InstallationRequest {
                    stack,
                    php,
                    install_database: self.install_database,
                    mysql_password,
                    install_composer: self.install_composer,
                    install_supervisor: self.install_supervisor,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install(op: Operation) -> InstallationRequest {
        match op {
            Operation::Install(req) => req,
            Operation::Remove => panic!("expected install"),
        }
    }

    #[test]
    fn php_versions_outside_the_allow_list_are_rejected() {
        for bad in ["5.6", "8", "8.4", "latest", "", "8.2.1"] {
            let err = bad.parse::<PhpVersion>().expect_err(bad);
            assert!(matches!(err, RequestError::UnsupportedPhpVersion { .. }));
        }
        assert_eq!("8.1".parse::<PhpVersion>(), Ok(PhpVersion::V8_1));
        assert_eq!(" 7.4 ".parse::<PhpVersion>(), Ok(PhpVersion::V7_4));
    }

    #[test]
    fn unsupported_version_error_lists_choices() {
        let err = "9.0".parse::<PhpVersion>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported PHP version '9.0' (supported: 7.4, 8.0, 8.1, 8.2, 8.3)"
        );
    }

    #[test]
    fn stack_and_remove_are_exclusive() {
        let err = RequestBuilder::new()
            .stack(Stack::Lamp)
            .remove(true)
            .build()
            .unwrap_err();
        assert_eq!(err, RequestError::ConflictingModes);
        assert_eq!(
            RequestBuilder::new().build().unwrap_err(),
            RequestError::NoModeSelected
        );
        assert_eq!(
            RequestBuilder::new().remove(true).build(),
            Ok(Operation::Remove)
        );
    }

    #[test]
    fn defaults_install_php_and_database() {
        let req = install(RequestBuilder::new().stack(Stack::Lemp).build().unwrap());
        assert_eq!(req.php, Some(PhpVersion::V8_2));
        assert!(req.install_database);
        assert!(req.wants_admin_ui());
        assert_eq!(req.mysql_password, None);
    }

    #[test]
    fn empty_password_means_generate() {
        let req = install(
            RequestBuilder::new()
                .stack(Stack::Lamp)
                .mysql_password("")
                .build()
                .unwrap(),
        );
        assert_eq!(req.mysql_password, None);
    }

    #[test]
    fn short_password_is_fatal() {
        let err = RequestBuilder::new()
            .stack(Stack::Lamp)
            .mysql_password("short")
            .build()
            .unwrap_err();
        assert!(matches!(err, RequestError::PasswordTooShort { .. }));
    }

    #[test]
    fn composer_requires_php() {
        let err = RequestBuilder::new()
            .stack(Stack::Lamp)
            .install_php(false)
            .install_composer(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, RequestError::MissingDependency { .. }));
    }

    #[test]
    fn admin_ui_only_with_php_and_database() {
        let req = install(
            RequestBuilder::new()
                .stack(Stack::Lamp)
                .install_database(false)
                .build()
                .unwrap(),
        );
        assert!(!req.wants_admin_ui());
    }
}
