pub mod app_error;
pub mod upload_storage;
