use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use usergate::auth::{LoginRateLimiter, SessionIssuer};
use usergate::configuration::get_configuration;
use usergate::startup::run;
use usergate::telemetry::init_telemetry;
use usergate::users::{InMemoryUserStore, PgUserStore, UserStore};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    // A missing or empty signing secret stops the process here.
    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!(auth = ?config.auth, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let store: Arc<dyn UserStore> = match &configuration.database {
        Some(database) => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;
            tracing::info!("Database connection pool created successfully");
            Arc::new(PgUserStore::new(pool))
        }
        None => {
            tracing::warn!("No database configured, users are kept in memory");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let issuer = SessionIssuer::from_settings(&configuration.auth, store.clone()).map_err(|e| {
        tracing::error!("Failed to build session issuer: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let login_limiter = LoginRateLimiter::from_attempts(configuration.auth.login_attempts_per_minute);

    let server = run(listener, store, Arc::new(issuer), Arc::new(login_limiter))?;
    server.await
}
