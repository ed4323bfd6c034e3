use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(
    name = "restore-agent",
    about = "Restores PostgreSQL backups onto the local node",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// PostgreSQL restore commands
    #[clap(subcommand)]
    Postgresql(postgres::cli::PostgresqlCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .format_level(true)
        .format_module_path(false)
        .format_indent(Some(4))
        .filter_level(log::LevelFilter::Info)
        .try_init()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Postgresql(postgres_command) => match postgres_command {
            postgres::cli::PostgresqlCommands::Restore {
                strategy,
                location,
                checksum,
                config,
            } => postgres::cli::commands::restore(strategy, location, checksum, config).await?,
            postgres::cli::PostgresqlCommands::ShowChain {
                location,
                checksum,
                config,
            } => postgres::cli::commands::show_chain(location, checksum, config).await?,
            postgres::cli::PostgresqlCommands::ShowConfig { config } => {
                postgres::cli::commands::show_config(config).await?
            }
        },
    }

    Ok(())
}
