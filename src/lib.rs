pub mod blacklist;
pub mod config;
pub mod server;
pub mod telemetry;
