//! Terminal presentation: banner and run summaries.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::orchestrator::RunReport;
use crate::remover::RemovalReport;
use crate::request::InstallationRequest;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn colored<W: WriteColor + ?Sized>(stream: &mut W, color: Color, bold: bool, text: &str) {
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
    let _ = writeln!(stream, "{text}");
    let _ = stream.reset();
}

/// Welcome banner shown before the interactive menu.
pub fn show_welcome() {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    colored(&mut stdout, Color::Cyan, false, &format!("\n{RULE}"));
    colored(
        &mut stdout,
        Color::Cyan,
        true,
        "\n                    W E B S T A C K",
    );
    let _ = writeln!(stdout, "\n           LAMP / LEMP server provisioning");
    colored(&mut stdout, Color::Cyan, false, &format!("\n{RULE}\n"));
}

/// Completion summary. A generated password is shown here and nowhere else.
pub fn show_completion(request: &InstallationRequest, report: &RunReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    render_completion(&mut stdout, request, report);
}

pub fn render_completion(
    out: &mut dyn WriteColor,
    request: &InstallationRequest,
    report: &RunReport,
) {
    colored(out, Color::Cyan, false, &format!("\n{RULE}"));
    colored(
        out,
        Color::Green,
        true,
        &format!("\n                 ✓ {} INSTALLATION COMPLETE\n", request.stack),
    );
    colored(out, Color::Cyan, false, &format!("{RULE}\n"));

    let _ = writeln!(out, "Installed components:");
    for step in &report.steps {
        colored(out, Color::Green, false, &format!("  ✓ {}", step.component));
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for warning in &report.warnings {
            colored(out, Color::Yellow, false, &format!("  ⚠ {warning}"));
        }
    }

    if let (true, Some(password)) = (report.password_generated, &report.mysql_password) {
        let _ = writeln!(out, "\nGenerated MySQL root password (store it now, it is not saved):");
        colored(out, Color::Yellow, true, &format!("  {}", password.expose()));
    }

    if request.wants_admin_ui() {
        let _ = writeln!(out, "\nphpMyAdmin: http://<server>/phpmyadmin");
    }
    let _ = writeln!(out, "Backup: {}", report.backup.directory.display());
    colored(out, Color::Cyan, false, &format!("\n{RULE}\n"));
}

/// Failure summary on stderr.
pub fn show_failure(report: &RunReport) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    colored(&mut stderr, Color::Red, true, "\n❌ Installation failed");
    if let Some(failure) = &report.failure {
        colored(&mut stderr, Color::Red, false, &format!("   Error: {failure}"));
    }
    match &report.rollback {
        Some(rollback) if rollback.is_complete() => {
            let _ = writeln!(
                stderr,
                "   Configuration restored from {}",
                report.backup.directory.display()
            );
        }
        Some(rollback) => {
            for (subsystem, reason) in &rollback.failed {
                colored(
                    &mut stderr,
                    Color::Yellow,
                    false,
                    &format!("   ⚠ could not restore {subsystem}: {reason}"),
                );
            }
            let _ = writeln!(
                stderr,
                "   Manual restore possible from {}",
                report.backup.directory.display()
            );
        }
        None => {}
    }
}

pub fn show_removal(report: &RemovalReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = writeln!(stdout, "\nRemoval summary:");
    for name in &report.removed {
        colored(&mut stdout, Color::Green, false, &format!("  ✓ {name} removed"));
    }
    for name in &report.declined {
        colored(&mut stdout, Color::Yellow, false, &format!("  ⚠ {name} kept"));
    }
    for (name, reason) in &report.failed {
        colored(&mut stdout, Color::Red, false, &format!("  ✗ {name}: {reason}"));
    }
    if !report.skipped.is_empty() {
        let _ = writeln!(stdout, "  not installed: {}", report.skipped.join(", "));
    }
}
