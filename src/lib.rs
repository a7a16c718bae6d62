use actix_cors::Cors;
use actix_multipart::form::{tempfile::TempFileConfig, MultipartFormConfig};
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    http::header::CONTENT_LENGTH,
    middleware::from_fn,
    web, App, HttpRequest,
};
use anyhow::Result;

use crate::{
    commons::{app_error::AppError, upload_storage::UploadStorage},
    config::Config,
    models::confirmation::MAX_PROOF_BYTES,
    services::{
        metrics_service::MetricsService,
        rate_limiter::{limit_requests, RateLimiter},
        telegram_service::TelegramService,
    },
};

pub mod commons;
pub mod config;
pub mod confirmations;
pub mod models;
pub mod services;

/// Room for the text fields and multipart framing on top of the proof image.
const FORM_OVERHEAD_BYTES: usize = 256 * 1024;

/// Shared handles, built once at startup and cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    pub storage: web::Data<UploadStorage>,
    pub telegram: web::Data<TelegramService>,
    pub metrics: web::Data<MetricsService>,
    pub rate_limiter: web::Data<RateLimiter>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let metrics = MetricsService::new(&config.statsd_host, config.statsd_port, &config.statsd_prefix)?;
        let storage = UploadStorage::new(&config.uploads_dir)?;
        let telegram = TelegramService::new(config, metrics.clone())?;
        let rate_limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);

        Ok(Self {
            storage: web::Data::new(storage),
            telegram: web::Data::new(telegram),
            metrics: web::Data::new(metrics),
            rate_limiter: web::Data::new(rate_limiter),
        })
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.storage.clone())
            .app_data(self.telegram.clone())
            .app_data(self.metrics.clone())
            .app_data(self.rate_limiter.clone())
            .app_data(multipart_form_config())
            .app_data(TempFileConfig::default().directory(self.storage.dir()))
            .configure(confirmations::confirmation_controller::configure);
    }
}

/// The full application: CORS outermost, then the rate limiter, then the routes.
pub fn build_app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(from_fn(limit_requests))
        .wrap(Cors::permissive())
        .configure(move |cfg| state.configure(cfg))
}

/// Upload failures are answered with the same `{"message": ...}` body as every other error.
pub fn multipart_form_config() -> MultipartFormConfig {
    MultipartFormConfig::default()
        .total_limit(MAX_PROOF_BYTES + FORM_OVERHEAD_BYTES)
        .memory_limit(FORM_OVERHEAD_BYTES)
        .error_handler(|err, req| AppError::from_upload(err, content_length(req)).into())
}

fn content_length(req: &HttpRequest) -> Option<usize> {
    req.headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
