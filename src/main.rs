use std::sync::Arc;

use anyhow::{Error, Result};
use evemail_relay::{
    api::{AppState, run_api_server},
    clients::{
        account::AccountApiClient, circuit_breaker::CircuitBreaker, database::DatabaseClient,
        health::HealthChecker, mailer::HttpMailer, redis::RedisSeenCache,
    },
    config::Config,
    formatter::Formatter,
    relay::{Relay, RelaySettings},
    seen::SeenStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    let database = Arc::new(DatabaseClient::connect(&config.database_url).await?);
    let cache = RedisSeenCache::connect(&config).await?;

    let account_breaker = Arc::new(CircuitBreaker::new(
        "account_api",
        config.circuit_breaker_config(),
    ));
    let mail_breaker = Arc::new(CircuitBreaker::new("mail_api", config.circuit_breaker_config()));

    let account_api = AccountApiClient::new(&config, Arc::clone(&account_breaker))?;
    let mailer = HttpMailer::new(&config, Arc::clone(&mail_breaker))?;

    let seen = SeenStore::new(Arc::new(cache.clone()), database.clone());

    let relay = Relay::new(
        database.clone(),
        database.clone(),
        Arc::new(account_api),
        Arc::new(mailer),
        seen,
        RelaySettings {
            mail_from: config.mail_from.clone(),
            dispatch_concurrency: config.dispatch_concurrency,
            run_deadline: config.run_deadline(),
            formatter: Formatter::new(config.display_offset()?),
        },
    );

    let health_checker = HealthChecker::new(database, cache, vec![account_breaker, mail_breaker]);

    info!("Configuration validated, relay is ready");

    run_api_server(
        Arc::new(AppState {
            relay,
            health_checker,
        }),
        config.server_port,
    )
    .await
}
