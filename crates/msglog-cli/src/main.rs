use std::io::{BufWriter, Write, stdout};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use msglog_cli::commands::{check, convert, events, messages, summary};
use msglog_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = stdout();
    let mut writer = BufWriter::new(stdout.lock());

    match command {
        Commands::Convert { file, output } => {
            convert::run(&mut writer, file, output.as_deref(), &config)?;
        }
        Commands::Check { files } => {
            let found = check::run(&mut writer, files, &config)?;
            if found < files.len() {
                writer.flush()?;
                bail!("{} of {} files are not message logs", files.len() - found, files.len());
            }
        }
        Commands::Summary { paths, json } => {
            summary::run(&mut writer, paths, *json, &config)?;
        }
        Commands::Messages {
            file,
            message_type,
            from,
            until,
        } => {
            let printed = messages::run(&mut writer, file, message_type.as_deref(), *from, *until, &config)?;
            tracing::debug!(printed, "messages written");
        }
        Commands::Events {
            file,
            start,
            stop_scanning,
            stop_timer,
            interesting,
            json,
        } => {
            let query = events::EventQuery {
                start: *start,
                stop_scanning,
                stop_timer,
                interesting,
            };
            events::run(&mut writer, file, &query, *json, &config)?;
        }
    }

    writer.flush()?;
    Ok(())
}
