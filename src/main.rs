// ABOUTME: Entry point for the shellfs CLI application.
// ABOUTME: Parses arguments, opens one session, and dispatches to the file system operations.

mod cli;
mod output;

use chrono::DateTime;
use clap::Parser;
use cli::{Cli, Commands};
use output::{Output, OutputMode};
use serde::Serialize;
use shellfs::config::{self, Config};
use shellfs::error::{Error, Result};
use shellfs::fs::{self as generic, LocalFileSystem};
use shellfs::remote::{FileSystemError, RemoteFileSystem};
use shellfs::session::Session;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Normal
    });

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let Cli {
        config: config_path,
        command,
        ..
    } = cli;

    if let Commands::Init { host, force } = &command {
        let cwd = env::current_dir()?;
        config::init_config(&cwd, host.as_deref(), *force)?;
        output.success(&format!("Created {}", config::CONFIG_FILENAME));
        return Ok(());
    }

    let config = load_config(config_path.as_deref())?;
    let session = Arc::new(Session::new(config.session_config()?));
    let result = dispatch(command, &session, output).await;

    if let Err(e) = session.disconnect().await {
        tracing::warn!("Failed to disconnect cleanly: {}", e);
    }
    result
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}

#[derive(Serialize)]
struct EntryRecord<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct StatRecord {
    path: String,
    mode: String,
    directory: bool,
    size: Option<u64>,
    modified: Option<String>,
}

async fn dispatch(command: Commands, session: &Arc<Session>, output: &Output) -> Result<()> {
    let fs = RemoteFileSystem::new(Arc::clone(session));

    match command {
        // Handled in `run` before any session exists.
        Commands::Init { .. } => Ok(()),
        Commands::Exec { status, commands } => {
            if let [single] = commands.as_slice() {
                let result = session.execute(single, status).await?;
                output.command(&result.lines, result.exit_code);
                return Ok(());
            }

            let mut first_error = None;
            for result in session.execute_batch(&commands, status).await {
                match result {
                    Ok(result) => output.command(&result.lines, result.exit_code),
                    Err(e) => {
                        output.error(&e.to_string());
                        first_error.get_or_insert(e);
                    }
                }
            }
            first_error.map_or(Ok(()), Err)
        }
        Commands::Ls { recursive, path } => {
            let dir = fs.get_file(&path);
            for entry in dir.read_directory(recursive).await?.keys() {
                output.record(entry, &EntryRecord { path: entry });
            }
            Ok(())
        }
        Commands::Stat { path } => {
            let file = fs.get_file(&path);
            let absolute = file.absolute_path().await?;
            let stat = file
                .stat()
                .await?
                .ok_or_else(|| FileSystemError::NotFound {
                    path: absolute.clone(),
                })?;
            let modified = stat
                .mtime
                .and_then(|t| DateTime::from_timestamp(i64::try_from(t).ok()?, 0))
                .map(|t| t.to_rfc3339());
            let record = StatRecord {
                path: absolute,
                mode: format!("{:o}", stat.permissions()),
                directory: stat.is_dir(),
                size: stat.size,
                modified,
            };
            let text = format!(
                "{}\n  mode: {}\n  type: {}\n  size: {}\n  modified: {}",
                record.path,
                record.mode,
                if record.directory { "directory" } else { "file" },
                record
                    .size
                    .map_or_else(|| "unknown".to_string(), |s| s.to_string()),
                record.modified.as_deref().unwrap_or("unknown"),
            );
            output.record(&text, &record);
            Ok(())
        }
        Commands::Mkdir { path } => {
            let dir = fs.get_file(&path);
            dir.create().await?;
            output.success(&format!("Created {}", dir.absolute_path().await?));
            Ok(())
        }
        Commands::Rm { path } => {
            let file = fs.get_file(&path);
            file.delete().await?;
            output.success(&format!("Removed {}", file.absolute_path().await?));
            Ok(())
        }
        Commands::Chmod { mode, path } => {
            let bits = u32::from_str_radix(&mode, 8)
                .map_err(|_| Error::Configuration(format!("invalid octal mode: {}", mode)))?;
            let file = fs.get_file(&path);
            file.set_permissions(bits).await?;
            let absolute = file.absolute_path().await?;
            output.success(&format!("Changed mode of {} to {:o}", absolute, bits));
            Ok(())
        }
        Commands::Get { remote, local } => {
            let file = fs.get_file(&remote);
            let bytes = file.copy_to(&LocalFileSystem::new(), &local).await?;
            output.success(&format!("Copied {} bytes to {}", bytes, local));
            Ok(())
        }
        Commands::Put { local, remote } => {
            let bytes = generic::copy(&LocalFileSystem::new(), &local, &*fs, &remote).await?;
            output.success(&format!("Copied {} bytes to {}", bytes, remote));
            Ok(())
        }
        Commands::Fingerprint => {
            session.connect().await?;
            let fingerprint = session
                .fingerprint()
                .unwrap_or_else(|| "unknown".to_string());
            output.success(&fingerprint);
            Ok(())
        }
    }
}
