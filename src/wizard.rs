//! Interactive menu and prompts
//!
//! Answers are collected into [`WizardAnswers`] and handed to the same
//! [`RequestBuilder`] the command-line flags use.

use std::fmt;

use inquire::validator::Validation;
use inquire::{Confirm, Password, PasswordDisplayMode, Select, Text};

use crate::error::ProvisionError;
use crate::password::MIN_PASSWORD_LEN;
use crate::remover::Prompter;
use crate::request::{PhpVersion, RequestBuilder, Stack};
use crate::ui;

/// Main menu entries, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    InstallLamp,
    InstallLemp,
    Remove,
    Exit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 4] = [
        Self::InstallLamp,
        Self::InstallLemp,
        Self::Remove,
        Self::Exit,
    ];

    fn stack(self) -> Option<Stack> {
        match self {
            Self::InstallLamp => Some(Stack::Lamp),
            Self::InstallLemp => Some(Stack::Lemp),
            Self::Remove | Self::Exit => None,
        }
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InstallLamp => "1) Install LAMP (Apache, MySQL, PHP)",
            Self::InstallLemp => "2) Install LEMP (Nginx, MySQL, PHP-FPM)",
            Self::Remove => "3) Remove installed stack",
            Self::Exit => "4) Exit",
        })
    }
}

/// Answers gathered by the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardAnswers {
    pub choice: MenuChoice,
    pub install_php: bool,
    pub php_version: String,
    pub install_database: bool,
    pub mysql_password: String,
    pub install_supervisor: bool,
    pub install_composer: bool,
}

impl WizardAnswers {
    fn for_choice(choice: MenuChoice) -> Self {
        Self {
            choice,
            install_php: true,
            php_version: PhpVersion::DEFAULT.as_str().to_string(),
            install_database: true,
            mysql_password: String::new(),
            install_supervisor: false,
            install_composer: false,
        }
    }

    /// `None` when the user chose to exit.
    pub fn into_builder(self) -> Option<RequestBuilder> {
        if self.choice == MenuChoice::Exit {
            return None;
        }
        let mut builder = RequestBuilder::new().remove(self.choice == MenuChoice::Remove);
        if let Some(stack) = self.choice.stack() {
            builder = builder
                .stack(stack)
                .install_php(self.install_php)
                .php_version(self.php_version)
                .install_database(self.install_database)
                .mysql_password(self.mysql_password)
                .install_supervisor(self.install_supervisor)
                .install_composer(self.install_composer);
        }
        Some(builder)
    }
}

fn cancelled(e: inquire::InquireError) -> ProvisionError {
    ProvisionError::Prompt(e.to_string())
}

fn confirm(question: &str, default: bool) -> Result<bool, ProvisionError> {
    Confirm::new(question)
        .with_default(default)
        .prompt()
        .map_err(cancelled)
}

fn php_version_valid(input: &str) -> Validation {
    match input.parse::<PhpVersion>() {
        Ok(_) => Validation::Valid,
        Err(e) => Validation::Invalid(e.to_string().into()),
    }
}

fn password_valid(input: &str) -> Validation {
    let len = input.chars().count();
    if len == 0 || len >= MIN_PASSWORD_LEN {
        Validation::Valid
    } else {
        Validation::Invalid(
            format!("password must be at least {MIN_PASSWORD_LEN} characters").into(),
        )
    }
}

/// Show the banner and menu, then ask the install questions.
pub fn run_wizard() -> Result<WizardAnswers, ProvisionError> {
    ui::show_welcome();

    let choice = Select::new("What would you like to do?", MenuChoice::ALL.to_vec())
        .prompt()
        .map_err(cancelled)?;
    let mut answers = WizardAnswers::for_choice(choice);
    if choice.stack().is_none() {
        return Ok(answers);
    }

    answers.install_php = confirm("Install PHP?", true)?;
    if answers.install_php {
        answers.php_version = Text::new("PHP version:")
            .with_default(PhpVersion::DEFAULT.as_str())
            .with_help_message(&format!("Supported: {}", PhpVersion::supported_list()))
            .with_validator(|input: &str| Ok(php_version_valid(input)))
            .prompt()
            .map_err(cancelled)?;
    }

    answers.install_database = confirm("Install MySQL?", true)?;
    if answers.install_database {
        answers.mysql_password = Password::new("MySQL root password:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .with_help_message("Leave empty to generate a strong password")
            .with_validator(|input: &str| Ok(password_valid(input)))
            .prompt()
            .map_err(cancelled)?;
    }

    answers.install_supervisor = confirm("Install Supervisor?", false)?;
    if answers.install_php {
        answers.install_composer = confirm("Install Composer?", false)?;
    }

    Ok(answers)
}

/// Confirmation prompts backed by inquire.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool, ProvisionError> {
        confirm(question, default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Operation;

    #[test]
    fn exit_builds_nothing() {
        assert!(WizardAnswers::for_choice(MenuChoice::Exit).into_builder().is_none());
    }

    #[test]
    fn remove_ignores_install_answers() {
        let builder = WizardAnswers::for_choice(MenuChoice::Remove)
            .into_builder()
            .unwrap();
        assert_eq!(builder.build().unwrap(), Operation::Remove);
    }

    #[test]
    fn lemp_answers_become_request() {
        let answers = WizardAnswers {
            php_version: "8.3".into(),
            install_composer: true,
            ..WizardAnswers::for_choice(MenuChoice::InstallLemp)
        };
        let Operation::Install(req) = answers.into_builder().unwrap().build().unwrap() else {
            panic!("expected install");
        };
        assert_eq!(req.stack, Stack::Lemp);
        assert_eq!(req.php, Some(PhpVersion::V8_3));
        assert!(req.mysql_password.is_none());
        assert!(req.install_composer);
    }

    #[test]
    fn validators() {
        assert!(matches!(php_version_valid("8.2"), Validation::Valid));
        assert!(matches!(php_version_valid("9.9"), Validation::Invalid(_)));
        assert!(matches!(password_valid(""), Validation::Valid));
        assert!(matches!(password_valid("short"), Validation::Invalid(_)));
        assert!(matches!(password_valid("Long-enough1"), Validation::Valid));
    }

    #[test]
    fn menu_is_numbered() {
        let labels: Vec<String> = MenuChoice::ALL.iter().map(ToString::to_string).collect();
        assert!(labels[0].starts_with("1)"));
        assert!(labels[3].starts_with("4) Exit"));
    }
}
