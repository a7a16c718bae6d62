use actix_web::HttpServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payment_confirm_be::{build_app, config::Config, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env().map_err(startup_error)?;
    if config.bot.is_none() {
        tracing::warn!("BOT_TOKEN or ADMIN_CHAT_ID is not set, every confirmation will be refused");
    }

    let state = AppState::from_config(&config).map_err(startup_error)?;

    let limiter = state.rate_limiter.clone();
    actix_rt::spawn(async move {
        let mut interval =
            tokio::time::interval(limiter.window().max(std::time::Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let removed = limiter.purge_expired(tokio::time::Instant::now()).await;
            if removed > 0 {
                tracing::debug!(removed, "Purged idle rate limit entries");
            }
        }
    });

    let bind_addr = format!("{}:{}", config.host, config.port);
    tracing::info!(address = %bind_addr, "Server running");

    HttpServer::new(move || build_app(state.clone()))
    .bind(bind_addr)?
    .run()
    .await
}

fn startup_error(err: anyhow::Error) -> std::io::Error {
    tracing::error!(error = ?err, "Startup failed");
    std::io::Error::new(std::io::ErrorKind::Other, format!("{:#}", err))
}
