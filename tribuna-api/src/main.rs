use crate::server::ServerState;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tribuna_db::client::DbClient;

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error connecting to database: {0}")]
    DbConnect(sqlx::Error),
    #[error("Error running migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tribuna_api=debug,tribuna_db=debug,tribuna_common=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&env.database_url)
        .await
        .map_err(InitError::DbConnect)?;

    let db_client = Arc::new(DbClient::new(pool));
    db_client.run_migrations().await?;

    let state = ServerState { db_client };
    let app = server::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
