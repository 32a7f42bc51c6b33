use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::{error, info, warn};

use webstack::cli::Args;
use webstack::config::Settings;
use webstack::orchestrator::Orchestrator;
use webstack::remover::{self, FixedAnswer, Prompter};
use webstack::request::{InstallationRequest, Operation};
use webstack::system::{LinuxSystem, RecordingSystem, System};
use webstack::wizard::{self, InquirePrompter};
use webstack::{logging, notify, signals, ui};

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => {
                    let _ = Args::command().print_help();
                    ExitCode::FAILURE
                }
            };
        }
    };

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(args.verbose, &settings.log_file);

    match real_main(&args, settings) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn real_main(args: &Args, mut settings: Settings) -> Result<ExitCode> {
    let interactive = !args.is_non_interactive();

    let builder = if interactive {
        match wizard::run_wizard()?.into_builder() {
            Some(builder) => builder,
            None => {
                info!("Exit selected, nothing to do");
                return Ok(ExitCode::SUCCESS);
            }
        }
    } else {
        args.to_builder()
    };
    let operation = builder.build()?;

    // dry runs stage every write in a throwaway root
    let staging = if args.dry_run {
        let dir = tempfile::tempdir().context("Failed to create dry-run staging directory")?;
        settings.root = dir.path().to_path_buf();
        settings.backup_root = dir.path().join("backups");
        info!("Dry run: staging writes under {}", dir.path().display());
        Some(dir)
    } else {
        None
    };
    let system: Box<dyn System> = if staging.is_some() {
        Box::new(RecordingSystem::dry_run())
    } else {
        Box::new(LinuxSystem::new())
    };

    match operation {
        Operation::Install(request) => install(system.as_ref(), &settings, &request, interactive),
        Operation::Remove => remove(system.as_ref(), &settings, args, interactive),
    }
}

fn install(
    system: &dyn System,
    settings: &Settings,
    request: &InstallationRequest,
    interactive: bool,
) -> Result<ExitCode> {
    if let Err(e) = signals::install_handlers() {
        warn!("Failed to register signal handlers: {e}; interrupts will not roll back");
    }

    let report = Orchestrator::new(system, settings)
        .with_progress(interactive)
        .install(request)?;

    let summary = report.summary(request);
    info!("{}", summary.trim_end());
    let subject = if report.succeeded() {
        format!("{} stack installed", request.stack)
    } else {
        format!("{} stack installation failed", request.stack)
    };
    notify::send(system, settings, &subject, &summary);

    if report.succeeded() {
        ui::show_completion(request, &report);
        Ok(ExitCode::SUCCESS)
    } else {
        ui::show_failure(&report);
        Ok(ExitCode::FAILURE)
    }
}

fn remove(
    system: &dyn System,
    settings: &Settings,
    args: &Args,
    interactive: bool,
) -> Result<ExitCode> {
    let prompter: Box<dyn Prompter> = if args.yes {
        Box::new(FixedAnswer(true))
    } else if interactive {
        Box::new(InquirePrompter)
    } else {
        Box::new(FixedAnswer(false))
    };

    if interactive
        && !args.yes
        && !prompter.confirm("Remove every web stack component from this host?", false)?
    {
        info!("Removal cancelled");
        return Ok(ExitCode::SUCCESS);
    }

    let report = remover::remove(system, settings, prompter.as_ref())?;
    ui::show_removal(&report);

    let subject = if report.is_clean() {
        "web stack removed"
    } else {
        "web stack removal finished with errors"
    };
    notify::send(system, settings, subject, &report.summary());

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("{} item(s) could not be removed", report.failed.len());
        Ok(ExitCode::FAILURE)
    }
}
