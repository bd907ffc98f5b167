use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use session_core::auth::{seed_account, AuthService};
use session_core::clock::{Clock, SystemClock};
use session_core::configuration::load_settings;
use session_core::startup::run;
use session_core::store::PostgresStore;
use session_core::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match load_settings() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };
    tracing::info!("Configuration loaded successfully");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(
            configuration.database.acquire_timeout_seconds,
        ))
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    let store = Arc::new(PostgresStore::new(pool));
    store.migrate().await.map_err(|e| {
        tracing::error!("Failed to migrate database: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
    })?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if let Some(seed) = &configuration.seed {
        if let Err(e) =
            seed_account(store.as_ref(), clock.as_ref(), &seed.username, &seed.password).await
        {
            tracing::error!("Failed to seed account: {}", e);
        }
    }

    let service = AuthService::new(store.clone(), store, &configuration.jwt, clock);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, service, configuration.jwt.clone())?.await
}
