use blacklist_server::{
    blacklist::MemoryStore,
    config::Config,
    server::{AppState, Server},
    telemetry,
};
use secrecy::SecretString;

pub const TOKEN: &str = "testtoken";

// Helper function to spawn a test server on a random port
pub async fn spawn_server() -> (String, MemoryStore) {
    telemetry::init_tracing();

    let config = {
        let mut config = Config::load().unwrap();
        config.server.host = "127.0.0.1".to_string();
        // Use a random OS port
        config.server.port = 0;
        config.server.tls = None;
        config
    };

    let store = MemoryStore::new();
    let state = AppState::new(store.clone(), SecretString::from(TOKEN.to_string()));
    let server = Server::new(state, &config.server).unwrap();

    let port = server.port();
    tokio::spawn(async move {
        server.run().await.expect("failed to run server");
    });

    (format!("http://{}:{}", config.server.host, port), store)
}
