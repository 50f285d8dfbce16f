pub mod auth;
pub mod client_ip;
pub mod errors;
pub mod handlers;

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use axum_server::tls_openssl::{OpenSSLAcceptor, OpenSSLConfig};
use color_eyre::eyre::{Result, WrapErr};
use secrecy::SecretString;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::blacklist::BlacklistStore;
use crate::config::{ServerConfig, TlsConfig};
use handlers::blacklist::{create_entry, lookup_entry};
use handlers::health::health_check;

/// State shared by every handler: the injected store and the API secret.
#[derive(Debug, Clone)]
pub struct AppState<S: BlacklistStore> {
    pub store: Arc<S>,
    pub bearer_token: Arc<SecretString>,
}

impl<S: BlacklistStore> AppState<S> {
    pub fn new(store: S, bearer_token: SecretString) -> Self {
        Self {
            store: Arc::new(store),
            bearer_token: Arc::new(bearer_token),
        }
    }
}

/// Builds the API router.
pub fn router<S: BlacklistStore>(state: AppState<S>) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
            let uri = request.uri().to_string();
            tracing::info_span!("request", method = %request.method(), uri)
        });

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/health", get(health_check))
        .route("/blacklists", post(create_entry::<S>))
        .route("/blacklists/{email}", get(lookup_entry::<S>))
        .layer(cors_layer)
        .layer(trace_layer)
        .with_state(state)
}

pub struct Server {
    router: Router,
    listener: TcpListener,
    tls: Option<TlsConfig>,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the listener right away so that the chosen port is known before serving.
    ///
    /// A port of `0` lets the OS pick a free port, see [`Server::port`].
    pub fn new<S: BlacklistStore>(state: AppState<S>, config: &ServerConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .wrap_err_with(|| format!("Binding TCP listener on {addr}"))?;
        listener
            .set_nonblocking(true)
            .wrap_err("Setting non-blocking mode")?;
        let local_addr = listener
            .local_addr()
            .wrap_err("Getting local address")?;

        Ok(Self {
            router: router(state),
            listener,
            tls: config.tls.clone(),
            local_addr,
        })
    }

    /// The port the server is bound to.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Serves requests until the process is stopped.
    pub async fn run(self) -> Result<()> {
        let service = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match self.tls {
            Some(tls) => {
                let tls_config = OpenSSLConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .wrap_err("Loading TLS certificate and private key")?;
                tracing::info!("Server listening on https://{}", self.local_addr);
                tracing::info!("Using certificate: {}", tls.cert_path);
                axum_server::from_tcp(self.listener)
                    .acceptor(OpenSSLAcceptor::new(tls_config))
                    .serve(service)
                    .await
                    .wrap_err("Running HTTPS server")
            }
            None => {
                tracing::info!("Server listening on http://{}", self.local_addr);
                axum_server::from_tcp(self.listener)
                    .serve(service)
                    .await
                    .wrap_err("Running HTTP server")
            }
        }
    }
}
