use blacklist_server::{
    blacklist::{BlacklistStore, open_store},
    config::{Config, DEFAULT_BEARER_TOKEN},
    server::{AppState, Server},
    telemetry,
};
use secrecy::ExposeSecret;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    if config.auth.bearer_token.expose_secret() == DEFAULT_BEARER_TOKEN {
        tracing::warn!("Using the default bearer token, set APP_AUTH__BEARER_TOKEN");
    }

    let store = open_store(&config.database).await?;
    if config.database.run_migrations {
        store.migrate().await?;
    }

    let state = AppState::new(store, config.auth.bearer_token.clone());
    let server = Server::new(state, &config.server)?;
    server.run().await
}
