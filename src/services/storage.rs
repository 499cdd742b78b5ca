use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;

/// File types accepted for upload: documents and images only. Checked
/// against both the original extension and the declared MIME type.
const ALLOWED_TYPES: &[&str] = &["jpeg", "jpg", "png", "pdf", "doc", "docx", "xls", "xlsx"];

/// Where an upload lands under the storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Invoice,
    Payment,
}

impl UploadKind {
    fn subdir(&self) -> &'static str {
        match self {
            UploadKind::Invoice => "invoices",
            UploadKind::Payment => "payments",
        }
    }

    fn field(&self) -> &'static str {
        match self {
            UploadKind::Invoice => "invoice",
            UploadKind::Payment => "proof",
        }
    }
}

/// Filesystem store for uploaded files and generated documents.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
    max_file_size: usize,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            root: root.into(),
            max_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory tree if it does not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.root.join("invoices/generated"))?;
        fs::create_dir_all(self.root.join("payments"))?;
        Ok(())
    }

    /// Write an uploaded file to disk as a staged upload. The returned
    /// guard deletes the file on drop unless `persist` is called, so a
    /// request rejected after the write can never leave an orphan.
    pub fn stage(
        &self,
        kind: UploadKind,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StagedUpload, AppError> {
        if bytes.len() > self.max_file_size {
            return Err(AppError::ValidationError(format!(
                "File exceeds the maximum size of {} bytes",
                self.max_file_size
            )));
        }

        let ext = extension_of(original_name);
        let ct = content_type.to_ascii_lowercase();
        let ext_allowed = ALLOWED_TYPES.contains(&ext.as_str());
        let mime_allowed = ALLOWED_TYPES.iter().any(|t| ct.contains(t))
            || ct.contains("msword")
            || ct.contains("officedocument")
            || ct.contains("ms-excel")
            || ct.contains("image/");
        if !ext_allowed || !mime_allowed {
            return Err(AppError::ValidationError(
                "Only documents and images are allowed".to_string(),
            ));
        }

        let file_name = format!(
            "{}-{}-{}.{}",
            kind.field(),
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            ext
        );
        let path = self.root.join(kind.subdir()).join(file_name);

        fs::write(&path, bytes)?;

        Ok(StagedUpload {
            path,
            persisted: false,
        })
    }

    /// Write a generated invoice document and return its stored path.
    pub fn write_generated_pdf(
        &self,
        invoice_number: &str,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        let sanitized: String = invoice_number
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let file_name = format!(
            "invoice-{}-{}.pdf",
            sanitized,
            Utc::now().timestamp_millis()
        );
        let path = self.root.join("invoices/generated").join(file_name);

        fs::write(&path, bytes)?;

        Ok(path.to_string_lossy().into_owned())
    }

    /// Best-effort file removal. Absence is not an error; failures are
    /// logged and swallowed.
    pub fn remove_quiet(&self, path: &str) {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to remove stored file");
            }
        }
    }
}

/// Scoped acquisition for an uploaded file: the file is deleted when
/// the guard drops unless ownership is transferred with `persist`.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    persisted: bool,
}

impl StagedUpload {
    /// The on-disk path while staged.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file and return its stored path.
    pub fn persist(mut self) -> String {
        self.persisted = true;
        self.path.to_string_lossy().into_owned()
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
