use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web, Error, ResponseError,
};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::{commons::app_error::AppError, services::metrics_service::MetricsService};

/// Sliding-log limiter: a client may make `max_requests` requests in any `window`.
/// State is in memory only and starts empty on every process start.
#[derive(Clone)]
pub struct RateLimiter {
    hits: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            hits: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a request from `client` and returns whether it is admitted.
    pub async fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now()).await
    }

    pub async fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut hits = self.hits.lock().await;
        let log = hits.entry(client.to_string()).or_default();

        while let Some(&oldest) = log.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.max_requests {
            return false;
        }
        log.push_back(now);
        true
    }

    /// Forgets clients whose every request has aged out of the window.
    pub async fn purge_expired(&self, now: Instant) -> usize {
        let mut hits = self.hits.lock().await;
        let before = hits.len();
        hits.retain(|_, log| {
            log.back()
                .map(|&last| now.saturating_duration_since(last) < self.window)
                .unwrap_or(false)
        });
        before - hits.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.hits.lock().await.len()
    }
}

/// `from_fn` middleware placed in front of every route. Rejected requests are answered
/// here and never reach a handler.
pub async fn limit_requests(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, Error> {
    if let Some(limiter) = req.app_data::<web::Data<RateLimiter>>().cloned() {
        let client = req
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if !limiter.check(&client).await {
            tracing::warn!(client = %client, path = %req.path(), "Rate limit exceeded");
            if let Some(metrics) = req.app_data::<web::Data<MetricsService>>() {
                let mut tags = HashMap::new();
                tags.insert("endpoint".to_string(), req.path().to_string());
                metrics.increment("rate_limit.rejected", Some(tags));
            }
            let response = AppError::RateLimited.error_response();
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}
