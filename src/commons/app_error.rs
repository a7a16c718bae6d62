use actix_multipart::MultipartError;
use actix_web::{error::PayloadError, http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::confirmation::{ApiMessage, MAX_PROOF_BYTES};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Terlalu banyak permintaan, coba lagi nanti")]
    RateLimited,

    #[error("File harus berupa gambar")]
    InvalidFileType,

    #[error("Hanya JPG/PNG")]
    UnsupportedFormat,

    #[error("File terlalu besar (maks 5MB)")]
    FileTooLarge,

    #[error("Isian teks terlalu panjang")]
    TextTooLong,

    #[error("{0}")]
    MalformedUpload(String),

    #[error("Data belum lengkap")]
    IncompleteData,

    #[error("Bukti transfer wajib")]
    MissingProof,

    #[error("Bot belum dikonfigurasi")]
    NotConfigured,

    #[error("Server error")]
    DispatchFailed(#[source] anyhow::Error),

    #[error("Server error")]
    InternalError(#[source] anyhow::Error),
}

impl AppError {
    /// Short label used as a metrics tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::RateLimited => "rate_limited",
            AppError::InvalidFileType => "invalid_file_type",
            AppError::UnsupportedFormat => "unsupported_format",
            AppError::FileTooLarge => "file_too_large",
            AppError::TextTooLong => "text_too_long",
            AppError::MalformedUpload(_) => "malformed_upload",
            AppError::IncompleteData => "incomplete_data",
            AppError::MissingProof => "missing_proof",
            AppError::NotConfigured => "not_configured",
            AppError::DispatchFailed(_) => "dispatch_failed",
            AppError::InternalError(_) => "internal_error",
        }
    }

    /// Maps a multipart parsing failure. The parser reports every size overflow the same
    /// way; a body no bigger than the proof limit cannot have overflowed the proof field,
    /// so such an overflow came from the in-memory text fields.
    pub fn from_upload(err: MultipartError, content_length: Option<usize>) -> Self {
        match AppError::from(err) {
            AppError::FileTooLarge if content_length.is_some_and(|len| len <= MAX_PROOF_BYTES) => {
                AppError::TextTooLong
            }
            other => other,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidFileType
            | AppError::UnsupportedFormat
            | AppError::FileTooLarge
            | AppError::TextTooLong
            | AppError::MalformedUpload(_)
            | AppError::IncompleteData
            | AppError::MissingProof => StatusCode::BAD_REQUEST,
            AppError::NotConfigured | AppError::DispatchFailed(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiMessage {
            message: self.to_string(),
        })
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        match err {
            MultipartError::Payload(PayloadError::Overflow) => AppError::FileTooLarge,
            other => {
                let message = other.to_string();
                if message.is_empty() {
                    AppError::MalformedUpload("Upload error".to_string())
                } else {
                    AppError::MalformedUpload(message)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn caller_errors_are_bad_requests() {
        for err in [
            AppError::InvalidFileType,
            AppError::UnsupportedFormat,
            AppError::FileTooLarge,
            AppError::TextTooLong,
            AppError::MalformedUpload("Upload error".to_string()),
            AppError::IncompleteData,
            AppError::MissingProof,
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{}", err.kind());
        }
        assert_eq!(AppError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn server_errors_hide_details() {
        let err = AppError::DispatchFailed(anyhow::anyhow!("telegram said 401: Unauthorized"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Server error");
        assert_eq!(AppError::NotConfigured.to_string(), "Bot belum dikonfigurasi");
    }

    #[actix_web::test]
    async fn error_body_is_a_single_message() {
        let response = AppError::InvalidFileType.error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let parsed: ApiMessage = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.message, "File harus berupa gambar");
    }

    #[test]
    fn overflow_maps_to_file_too_large() {
        let err: AppError = MultipartError::Payload(PayloadError::Overflow).into();
        assert!(matches!(err, AppError::FileTooLarge));
    }

    #[test]
    fn small_body_overflow_is_a_text_field_problem() {
        let overflow = || MultipartError::Payload(PayloadError::Overflow);

        let err = AppError::from_upload(overflow(), Some(300 * 1024));
        assert!(matches!(err, AppError::TextTooLong));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::from_upload(overflow(), Some(MAX_PROOF_BYTES + 1));
        assert!(matches!(err, AppError::FileTooLarge));

        let err = AppError::from_upload(overflow(), None);
        assert!(matches!(err, AppError::FileTooLarge));
    }
}
