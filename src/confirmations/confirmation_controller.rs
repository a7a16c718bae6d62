use std::collections::HashMap;

use actix_multipart::form::MultipartForm;
use actix_web::{web, HttpResponse, ResponseError};
use tracing::{info, info_span, Instrument};

use crate::{
    commons::{app_error::AppError, upload_storage::UploadStorage},
    confirmations::confirmation_service::ConfirmationService,
    models::confirmation::{ApiMessage, ConfirmationForm},
    services::{metrics_service::MetricsService, telegram_service::TelegramService},
};

#[actix_web::post("/confirm")]
async fn confirm(
    storage: web::Data<UploadStorage>,
    telegram: web::Data<TelegramService>,
    metrics: web::Data<MetricsService>,
    form: Result<MultipartForm<ConfirmationForm>, actix_web::Error>,
) -> HttpResponse {
    let span = info_span!("confirm-api", correlation_id = uuid::Uuid::new_v4().to_string());
    let start = std::time::Instant::now();
    let mut tags = HashMap::new();
    tags.insert("endpoint".to_string(), "confirm".to_string());

    let result = async {
        let form = form?;
        let confirmation_service = ConfirmationService::new(
            storage.get_ref().clone(),
            telegram.get_ref().clone(),
        );
        confirmation_service.confirm(form.into_inner()).await?;
        Ok::<_, actix_web::Error>(())
    }
    .instrument(span.clone())
    .await;

    match result {
        Ok(()) => {
            info!(parent: &span, elapsed = ?start.elapsed(), "Confirmation relayed");
            metrics.increment("confirm.success", Some(tags.clone()));
            metrics.timing("confirm.duration", start.elapsed(), Some(tags));
            HttpResponse::Ok().json(ApiMessage::ok())
        }
        Err(e) => {
            let kind = e
                .as_error::<AppError>()
                .map(AppError::kind)
                .unwrap_or("malformed_upload");
            let status = ResponseError::status_code(e.as_response_error());
            info!(parent: &span, error = kind, status = %status, "Confirmation rejected");
            tags.insert("error".to_string(), kind.to_string());
            metrics.increment("confirm.rejected", Some(tags.clone()));
            metrics.timing("confirm.duration", start.elapsed(), Some(tags));
            e.error_response()
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(confirm);
}
