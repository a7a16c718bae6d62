pub mod metrics_service;
pub mod rate_limiter;
pub mod telegram_service;
