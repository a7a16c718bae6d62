use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Upper bound for the proof image, matching the `limit` on [`ConfirmationForm::proof`].
pub const MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;

pub const ACCEPTED_PROOF_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// Every response body of the service, success or failure.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn ok() -> Self {
        Self {
            message: "OK".to_string(),
        }
    }
}

/// Raw multipart body of `POST /confirm`. Text fields are optional here so that a
/// missing key is reported as incomplete data rather than as a parser failure.
#[derive(Debug, MultipartForm)]
#[multipart(duplicate_field = "deny")]
pub struct ConfirmationForm {
    #[multipart(rename = "productName")]
    pub product_name: Option<Text<String>>,
    #[multipart(rename = "productPrice")]
    pub product_price: Option<Text<String>>,
    pub recipient: Option<Text<String>>,
    #[multipart(limit = "5MiB")]
    pub proof: Option<TempFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct ConfirmationFields {
    #[validate(length(min = 1, message = "productName cannot be empty"))]
    pub product_name: String,
    #[validate(length(min = 1, message = "productPrice cannot be empty"))]
    pub product_price: String,
    #[validate(length(min = 1, message = "recipient cannot be empty"))]
    pub recipient: String,
}

impl ConfirmationFields {
    pub fn sanitized(
        product_name: Option<&str>,
        product_price: Option<&str>,
        recipient: Option<&str>,
    ) -> Self {
        Self {
            product_name: sanitize_text(product_name.unwrap_or_default()),
            product_price: sanitize_text(product_price.unwrap_or_default()),
            recipient: sanitize_text(recipient.unwrap_or_default()),
        }
    }
}

/// Drops `<` and `>` and then trims, so the result is stable under repeated application.
pub fn sanitize_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_brackets_and_whitespace() {
        assert_eq!(sanitize_text("  <b>Voucher</b> Game "), "bVoucher/b Game");
        assert_eq!(sanitize_text("<>"), "");
        assert_eq!(sanitize_text("   "), "");
        assert_eq!(sanitize_text("50000"), "50000");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "",
            "  plain  ",
            "< leading bracket",
            "trailing bracket >",
            " <<>> ",
            "\t<script>alert(1)</script>\n",
            "a < b > c",
            "> \u{3000}x\u{3000} <",
        ];
        for sample in samples {
            let once = sanitize_text(sample);
            assert_eq!(sanitize_text(&once), once, "sample {:?}", sample);
        }
    }

    #[test]
    fn empty_fields_fail_validation() {
        let fields = ConfirmationFields::sanitized(Some("Voucher"), Some(" <> "), Some("0812"));
        assert!(fields.validate().is_err());

        let fields = ConfirmationFields::sanitized(Some("Voucher"), Some("50000"), None);
        assert!(fields.validate().is_err());

        let fields = ConfirmationFields::sanitized(Some("Voucher"), Some("50000"), Some("0812"));
        assert!(fields.validate().is_ok());
    }
}
