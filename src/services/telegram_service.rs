use std::collections::HashMap;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde_json::json;

use crate::{
    commons::{app_error::AppError, upload_storage::StoredProof},
    config::{BotCredentials, Config},
    services::metrics_service::MetricsService,
};

/// Telegram rejects photo captions longer than this many characters.
const CAPTION_LIMIT: usize = 1024;

const PROOF_MISSING_NOTICE: &str =
    "Bukti transfer untuk konfirmasi di atas gagal dikirim. Cek folder uploads di server.";

/// Sends notifications to the administrator chat through the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramService {
    client: reqwest::Client,
    api_base: String,
    credentials: Option<BotCredentials>,
    metrics: MetricsService,
}

impl TelegramService {
    pub fn new(config: &Config, metrics: MetricsService) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.telegram_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: config.telegram_api_base.clone(),
            credentials: config.bot.clone(),
            metrics,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Fails with `NotConfigured` when the token or chat id was not supplied.
    pub fn ensure_configured(&self) -> Result<(), AppError> {
        self.credentials().map(|_| ())
    }

    fn credentials(&self) -> Result<&BotCredentials, AppError> {
        self.credentials.as_ref().ok_or(AppError::NotConfigured)
    }

    /// Sends the text first and the photo second. A failure of either call is reported
    /// as `DispatchFailed`; when only the photo failed the admin gets a follow-up notice.
    pub async fn send_confirmation(&self, message: &str, proof: &StoredProof) -> Result<(), AppError> {
        let credentials = self.credentials()?;

        self.send_message(credentials, message)
            .await
            .map_err(|e| self.dispatch_failed("sendMessage", e))?;

        if let Err(e) = self.send_photo(credentials, message, proof).await {
            let err = self.dispatch_failed("sendPhoto", e);
            if let Err(notice_err) = self.send_message(credentials, PROOF_MISSING_NOTICE).await {
                tracing::error!(error = ?notice_err, "Failed to send missing-proof notice");
            }
            return Err(err);
        }

        Ok(())
    }

    async fn send_message(&self, credentials: &BotCredentials, text: &str) -> Result<()> {
        let url = self.method_url(credentials, "sendMessage");
        let body = json!({
            "chat_id": credentials.chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("HTTP request failed: {}", e.without_url()))?;

        ensure_success(response).await
    }

    async fn send_photo(
        &self,
        credentials: &BotCredentials,
        caption: &str,
        proof: &StoredProof,
    ) -> Result<()> {
        let url = self.method_url(credentials, "sendPhoto");
        let bytes = tokio::fs::read(&proof.path)
            .await
            .with_context(|| format!("Failed to read stored proof {}", proof.path.display()))?;

        let photo = Part::bytes(bytes)
            .file_name(proof.file_name.clone())
            .mime_str(&proof.content_type)?;
        let form = Form::new()
            .text("chat_id", credentials.chat_id.clone())
            .text("caption", truncate_caption(caption))
            .part("photo", photo);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("HTTP request failed: {}", e.without_url()))?;

        ensure_success(response).await
    }

    fn method_url(&self, credentials: &BotCredentials, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, credentials.token, method)
    }

    fn dispatch_failed(&self, method: &str, err: anyhow::Error) -> AppError {
        tracing::error!(method = method, error = ?err, "Telegram call failed");
        let mut tags = HashMap::new();
        tags.insert("method".to_string(), method.to_string());
        self.metrics.increment("telegram.error", Some(tags));
        AppError::DispatchFailed(err)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow::anyhow!(
        "Telegram API returned error status: {} {}",
        status,
        body
    ))
}

fn truncate_caption(caption: &str) -> String {
    match caption.char_indices().nth(CAPTION_LIMIT) {
        Some((idx, _)) => caption[..idx].to_string(),
        None => caption.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_captions_are_untouched() {
        assert_eq!(truncate_caption("Produk: Voucher"), "Produk: Voucher");
    }

    #[test]
    fn long_captions_are_cut_on_char_boundary() {
        let caption = "é".repeat(CAPTION_LIMIT + 10);
        let truncated = truncate_caption(&caption);
        assert_eq!(truncated.chars().count(), CAPTION_LIMIT);
    }

    #[test]
    fn unconfigured_service_refuses_work() {
        let config = Config::from_lookup(|_| None).unwrap();
        let metrics = MetricsService::new("127.0.0.1", 8125, "test").unwrap();
        let service = TelegramService::new(&config, metrics).unwrap();
        assert!(!service.is_configured());
        assert!(matches!(service.ensure_configured(), Err(AppError::NotConfigured)));
    }
}
