//! MySQL / MariaDB installation and root password.

use log::{info, warn};

use super::{RunState, StepContext};
use crate::error::ProvisionError;
use crate::packages;
use crate::password::{self, Secret};
use crate::requirements::Distro;
use crate::service;
use crate::system::{Invocation, run_checked};

pub(super) const SERVICE: &str = "mysql";

/// Server package per distribution: Debian ships MariaDB as the default.
pub(super) fn server_package(distro: Distro) -> &'static str {
    match distro {
        Distro::Ubuntu => "mysql-server",
        Distro::Debian => "default-mysql-server",
    }
}

/// Escape a value for a single-quoted SQL string literal.
fn sql_quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn set_root_password_sql(distro: Distro, password: &Secret) -> String {
    let quoted = sql_quote(password.expose());
    match distro {
        Distro::Ubuntu => format!(
            "ALTER USER 'root'@'localhost' IDENTIFIED WITH caching_sha2_password BY '{quoted}';\nFLUSH PRIVILEGES;\n"
        ),
        Distro::Debian => format!(
            "ALTER USER 'root'@'localhost' IDENTIFIED VIA mysql_native_password USING PASSWORD('{quoted}');\nFLUSH PRIVILEGES;\n"
        ),
    }
}

fn preseed_answers(password: &Secret) -> String {
    let p = password.expose();
    format!(
        "mysql-server mysql-server/root_password password {p}\n\
         mysql-server mysql-server/root_password_again password {p}\n"
    )
}

pub(super) fn install(ctx: &StepContext<'_>, state: &mut RunState) -> Result<(), ProvisionError> {
    let password = match &ctx.request.mysql_password {
        Some(p) => p.clone(),
        None => {
            warn!("No MySQL root password supplied; generating one");
            state.password_generated = true;
            password::generate()
        }
    };

    info!("Installing database server");
    packages::preseed(ctx.system, &preseed_answers(&password))?;
    packages::install(ctx.system, &[server_package(ctx.os.distro).to_string()])?;
    service::start_and_enable(ctx.system, SERVICE)?;

    // statements go through stdin so the password never shows in argv.
    // MYSQL_PWD covers a preseeded root password; auth_socket ignores it.
    run_checked(
        ctx.system,
        &Invocation::new("mysql")
            .args(["-u", "root"])
            .env("MYSQL_PWD", password.expose())
            .stdin(set_root_password_sql(ctx.os.distro, &password)),
    )?;

    run_checked(
        ctx.system,
        &Invocation::new("mysql")
            .args(["-u", "root", "-e", "SELECT VERSION();"])
            .env("MYSQL_PWD", password.expose()),
    )
    .map_err(|e| ProvisionError::Verification(format!("cannot log in as root: {e}")))?;

    state.mysql_password = Some(password);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(sql_quote(r"it's\x"), r"it\'s\\x");
    }

    #[test]
    fn password_is_set_per_flavour() {
        let secret = Secret::new("S3cure!pass");
        assert!(set_root_password_sql(Distro::Ubuntu, &secret).contains("BY 'S3cure!pass'"));
        assert!(
            set_root_password_sql(Distro::Debian, &secret).contains("PASSWORD('S3cure!pass')")
        );
    }

    #[test]
    fn preseed_answers_both_questions() {
        let answers = preseed_answers(&Secret::new("abc"));
        assert_eq!(answers.lines().count(), 2);
        assert!(answers.lines().all(|l| l.ends_with("password abc")));
    }
}
