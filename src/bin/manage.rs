use blacklist_server::{
    blacklist::{BlacklistStore, open_store},
    config::Config,
    telemetry,
};
use clap::{Parser, Subcommand};

/// Administrative commands for the blacklist service
#[derive(Parser, Debug)]
#[command(name = "manage", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the blacklist schema in the configured database
    InitDb,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Command::InitDb => {
            let store = open_store(&config.database).await?;
            store.migrate().await?;
            println!("DB schema created.");
        }
    }

    Ok(())
}
