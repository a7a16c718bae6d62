use validator::Validate;

use crate::{
    commons::{
        app_error::AppError,
        upload_storage::{check_proof_type, UploadStorage},
    },
    models::confirmation::{ConfirmationFields, ConfirmationForm},
    services::telegram_service::TelegramService,
};

pub struct ConfirmationService {
    storage: UploadStorage,
    telegram: TelegramService,
}

impl ConfirmationService {
    pub fn new(storage: UploadStorage, telegram: TelegramService) -> Self {
        Self { storage, telegram }
    }

    /// Runs one submission through receipt checks, configuration and field validation,
    /// storage and the two notification calls, in that order. Nothing is sent unless
    /// every check passed.
    pub async fn confirm(&self, form: ConfirmationForm) -> Result<(), AppError> {
        let ConfirmationForm {
            product_name,
            product_price,
            recipient,
            proof,
        } = form;

        check_proof_type(proof.as_ref())?;
        self.telegram.ensure_configured()?;

        let fields = ConfirmationFields::sanitized(
            product_name.as_ref().map(|t| t.as_str()),
            product_price.as_ref().map(|t| t.as_str()),
            recipient.as_ref().map(|t| t.as_str()),
        );
        if fields.validate().is_err() {
            return Err(AppError::IncompleteData);
        }
        let proof = proof.ok_or(AppError::MissingProof)?;

        let stored = self
            .storage
            .store(proof)
            .map_err(AppError::InternalError)?;
        tracing::info!(
            stored_file = %stored.file_name,
            product_name = %fields.product_name,
            "Proof stored, notifying admin"
        );

        let message = compose_message(&fields);
        self.telegram.send_confirmation(&message, &stored).await
    }
}

pub fn compose_message(fields: &ConfirmationFields) -> String {
    format!(
        "KONFIRMASI PEMBAYARAN BARU\n\
         Produk: {} Harga: Rp{} Penerima Akun: {}\n\
         Bukti transfer terlampir.",
        fields.product_name, fields.product_price, fields.recipient
    )
}
