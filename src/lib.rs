pub mod config;
pub mod database;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use config::Config;
pub use database::postgres_repository::PostgresRepository;
pub use error::app_error::AppError;

use tracing_subscriber::EnvFilter;

/// Configure logging with environment variable support.
/// RUST_LOG can be used for fine-grained control per module:
///   RUST_LOG=debug                        - Set all to debug
///   RUST_LOG=quickbill=debug              - Set this crate to debug
///   RUST_LOG=info,quickbill::service=trace - Global info, services at trace
pub fn init_tracing(log_level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    if json_format {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
