use clap::Parser;
use folderchronicle::cli::{Cli, CliError, OrganizeCommand, RunStatus, run_cli_with_config};
use folderchronicle::output::OutputFormatter;
use folderchronicle::state::AppState;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let state_path = AppState::default_path();
    let mut state = match state_path.as_deref().map(AppState::load) {
        Some(Ok(state)) => state,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "ignoring unreadable state file");
            AppState::default()
        }
        None => AppState::default(),
    };

    let directory: Option<PathBuf> = cli
        .command
        .directory()
        .map(|dir| dir.to_path_buf())
        .or_else(|| state.last_directory.clone());
    let Some(directory) = directory else {
        OutputFormatter::error(&CliError::MissingDirectory.to_string());
        return ExitCode::from(2);
    };

    let command = cli.command.to_organize_command();
    match run_cli_with_config(command, &directory, cli.config.as_deref()) {
        Ok(status) => {
            if let (OrganizeCommand::Sort(flags), Some(path)) = (command, &state_path)
                && !flags.dry_run
            {
                let remembered = std::fs::canonicalize(&directory).unwrap_or(directory);
                state.remember(&remembered);
                if let Err(e) = state.save(path) {
                    tracing::warn!(error = %e, "could not save state");
                }
            }
            match status {
                RunStatus::Clean => ExitCode::SUCCESS,
                RunStatus::WithFailures => ExitCode::from(1),
            }
        }
        Err(e) => {
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::from(2)
        }
    }
}
