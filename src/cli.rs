use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::request::{RequestBuilder, Stack};

#[derive(Parser, Debug, Default)]
#[command(version, about = "Install or remove a LAMP / LEMP web stack")]
#[command(group(ArgGroup::new("mode").args(["lamp", "lemp", "remove"])))]
pub struct Args {
    /// Install Apache, MySQL and PHP
    #[arg(long)]
    pub lamp: bool,

    /// Install Nginx, MySQL and PHP-FPM
    #[arg(long)]
    pub lemp: bool,

    /// Remove every installed stack component
    #[arg(long)]
    pub remove: bool,

    /// PHP version (7.4, 8.0, 8.1, 8.2, 8.3)
    #[arg(long, value_name = "VERSION", conflicts_with = "no_php")]
    pub php_version: Option<String>,

    /// Skip PHP
    #[arg(long)]
    pub no_php: bool,

    /// Skip MySQL (and phpMyAdmin)
    #[arg(long)]
    pub no_mysql: bool,

    /// MySQL root password; generated when omitted or empty
    #[arg(long, value_name = "PASSWORD")]
    pub mysql_password: Option<String>,

    /// Install Composer (requires PHP)
    #[arg(long)]
    pub composer: bool,

    /// Install Supervisor
    #[arg(long)]
    pub supervisor: bool,

    /// Path to configuration file
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log the commands that would run without touching the host
    #[arg(long)]
    pub dry_run: bool,

    /// Never prompt; fail when a choice is missing
    #[arg(long)]
    pub no_interaction: bool,

    /// Answer yes to confirmation prompts
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Debug-level logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Args {
    /// Whether a mode flag was given.
    pub fn has_mode(&self) -> bool {
        self.lamp || self.lemp || self.remove
    }

    /// Skip the wizard when a mode was chosen on the command line or
    /// prompting is disabled.
    pub fn is_non_interactive(&self) -> bool {
        self.no_interaction || self.has_mode()
    }

    /// Feed the flags into a request builder.
    pub fn to_builder(&self) -> RequestBuilder {
        let mut builder = RequestBuilder::new()
            .remove(self.remove)
            .install_php(!self.no_php)
            .install_database(!self.no_mysql)
            .install_composer(self.composer)
            .install_supervisor(self.supervisor);

        if self.lamp {
            builder = builder.stack(Stack::Lamp);
        } else if self.lemp {
            builder = builder.stack(Stack::Lemp);
        }
        if let Some(version) = &self.php_version {
            builder = builder.php_version(version.as_str());
        }
        if let Some(password) = &self.mysql_password {
            builder = builder.mysql_password(password.as_str());
        }
        builder
    }
}
