use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "folio", version, about = "Build sites from composable item pipelines")]
struct Args {
    /// The command to execute
    #[command(subcommand)]
    command: FolioCommand,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Parser)]
struct RunArgs {
    /// The pipe to run
    #[arg(default_value = "compile")]
    pipe: String,

    /// The path to the configuration file
    #[arg(short, long, default_value = folio::config::DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,
}

#[derive(Parser)]
struct PipesArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = folio::config::DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,
}

#[derive(Subcommand)]
enum FolioCommand {
    /// Run a pipe and drain its items
    Run(RunArgs),

    /// List the pipes defined in the configuration file
    Pipes(PipesArgs),
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    logging::init(&args.log_level);

    match args.command {
        FolioCommand::Run(args) => commands::run::run(&args)?,
        FolioCommand::Pipes(args) => commands::pipes::run(&args)?,
    }

    Ok(())
}
