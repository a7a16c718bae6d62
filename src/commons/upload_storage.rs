use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use actix_multipart::form::tempfile::TempFile;
use anyhow::{Context, Result};
use chrono::Utc;

use crate::{commons::app_error::AppError, models::confirmation::ACCEPTED_PROOF_TYPES};

const MAX_NAME_ATTEMPTS: u32 = 100;

/// A proof image that has been moved into the uploads directory.
#[derive(Debug, Clone)]
pub struct StoredProof {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct UploadStorage {
    dir: PathBuf,
}

impl UploadStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create uploads directory {}", dir.display()))?;
        tracing::info!(uploads_dir = %dir.display(), "Upload storage ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Moves the temp file to `<unix-millis>-<name>`. Temp files live in the same
    /// directory, so this is a rename. Existing files are never overwritten.
    pub fn store(&self, proof: TempFile) -> Result<StoredProof> {
        let millis = Utc::now().timestamp_millis();
        let safe_name = safe_file_name(proof.file_name.as_deref());
        let content_type = proof
            .content_type
            .as_ref()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut file = proof.file;
        let mut attempt = 0;
        loop {
            let file_name = stored_file_name(millis, attempt, &safe_name);
            let path = self.dir.join(&file_name);
            match file.persist_noclobber(&path) {
                Ok(_) => {
                    return Ok(StoredProof {
                        path,
                        file_name,
                        content_type,
                    })
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    file = e.file;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e.error)
                        .context(format!("Failed to store proof at {}", path.display())))
                }
            }
        }
    }
}

/// Receipt-time checks on the declared content type. An absent proof passes here and
/// is reported by field validation instead.
pub fn check_proof_type(proof: Option<&TempFile>) -> Result<(), AppError> {
    let Some(proof) = proof else {
        return Ok(());
    };

    let Some(mime) = proof.content_type.as_ref() else {
        return Err(AppError::InvalidFileType);
    };

    if mime.type_().as_str() != "image" {
        return Err(AppError::InvalidFileType);
    }

    if !ACCEPTED_PROOF_TYPES.contains(&mime.essence_str()) {
        return Err(AppError::UnsupportedFormat);
    }

    Ok(())
}

pub fn safe_file_name(original: Option<&str>) -> String {
    let original = original.map(str::trim).unwrap_or_default();
    if original.is_empty() {
        return "proof".to_string();
    }

    let mut name = String::with_capacity(original.len());
    let mut in_whitespace = false;
    for c in original.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                name.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        match c {
            '/' | '\\' => name.push('_'),
            c if c.is_control() => {}
            c => name.push(c),
        }
    }
    name
}

pub fn stored_file_name(millis: i64, attempt: u32, safe_name: &str) -> String {
    if attempt == 0 {
        format!("{}-{}", millis, safe_name)
    } else {
        format!("{}-{}-{}", millis, attempt, safe_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_runs_become_single_dash() {
        assert_eq!(safe_file_name(Some("bukti  transfer\tbca.png")), "bukti-transfer-bca.png");
        assert_eq!(safe_file_name(Some("proof.png")), "proof.png");
    }

    #[test]
    fn path_separators_are_neutralised() {
        assert_eq!(safe_file_name(Some("../../etc/passwd")), ".._.._etc_passwd");
        assert_eq!(safe_file_name(Some("C:\\tmp\\a.jpg")), "C:_tmp_a.jpg");
    }

    #[test]
    fn missing_name_falls_back() {
        assert_eq!(safe_file_name(None), "proof");
        assert_eq!(safe_file_name(Some("   ")), "proof");
    }

    #[test]
    fn stored_name_carries_timestamp_and_disambiguator() {
        assert_eq!(stored_file_name(1700000000000, 0, "proof.png"), "1700000000000-proof.png");
        assert_eq!(stored_file_name(1700000000000, 2, "proof.png"), "1700000000000-2-proof.png");
    }

    #[test]
    fn new_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("uploads");
        let storage = UploadStorage::new(&dir).unwrap();
        assert!(storage.dir().is_dir());
    }
}
