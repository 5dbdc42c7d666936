//! Resume storage: uploaded candidate files on S3-compatible blob storage.
//!
//! Objects are laid out per agency and job: `<company>/<job-title>/<owner>/<uuid>-<file>`.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ResumeStorageError {
    #[error("uploaded file is empty")]
    Empty,

    #[error("S3 upload failed: {0}")]
    Upload(String),
}

#[async_trait]
pub trait ResumeStorage: Send + Sync {
    /// Persists `bytes` under `owner_path` and returns the reference URL.
    async fn store(
        &self,
        owner_path: &str,
        file_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<String, ResumeStorageError>;

    /// Creates an empty folder marker object. `path` must end with `/`.
    async fn create_folder(&self, path: &str) -> Result<String, ResumeStorageError>;
}

#[derive(Clone)]
pub struct S3ResumeStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
}

impl S3ResumeStorage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, endpoint: &str) -> Self {
        Self {
            client,
            bucket,
            public_base: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.bucket, key)
    }
}

#[async_trait]
impl ResumeStorage for S3ResumeStorage {
    async fn store(
        &self,
        owner_path: &str,
        file_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<String, ResumeStorageError> {
        if bytes.is_empty() {
            return Err(ResumeStorageError::Empty);
        }

        let key = object_key(owner_path, file_name);
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ResumeStorageError::Upload(e.to_string()))?;

        info!("Uploaded resume ({size} bytes) to s3://{}/{}", self.bucket, key);
        Ok(self.url_for(&key))
    }

    async fn create_folder(&self, path: &str) -> Result<String, ResumeStorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| ResumeStorageError::Upload(e.to_string()))?;

        info!("Created folder s3://{}/{}", self.bucket, path);
        Ok(path.to_string())
    }
}

/// Lowercases and collapses every run of non-alphanumeric characters into `-`.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Folder holding every resume submitted to one job.
pub fn job_folder(company_name: &str, job_title: &str) -> String {
    format!(
        "{}/{}/",
        sanitize_identifier(company_name),
        sanitize_identifier(job_title)
    )
}

/// Builds a collision-free object key, keeping the file extension readable.
pub fn object_key(owner_path: &str, file_name: &str) -> String {
    let file = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}.{}", sanitize_identifier(stem), sanitize_identifier(ext))
        }
        _ => sanitize_identifier(file_name),
    };
    format!(
        "{}/{}-{}",
        owner_path.trim_end_matches('/'),
        Uuid::new_v4(),
        file
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_identifier_collapses_separators() {
        assert_eq!(sanitize_identifier("  Acme Corp, Inc. "), "acme-corp-inc");
        assert_eq!(sanitize_identifier("Senior  Rust // Engineer"), "senior-rust-engineer");
    }

    #[test]
    fn test_sanitize_identifier_never_returns_empty() {
        assert_eq!(sanitize_identifier("***"), "untitled");
        assert_eq!(sanitize_identifier(""), "untitled");
    }

    #[test]
    fn test_job_folder_layout() {
        assert_eq!(
            job_folder("Acme Corp", "Backend Engineer"),
            "acme-corp/backend-engineer/"
        );
    }

    #[test]
    fn test_object_key_keeps_extension_under_owner_path() {
        let key = object_key("acme/backend-engineer/a-x-com/", "My CV (final).PDF");
        assert!(key.starts_with("acme/backend-engineer/a-x-com/"));
        assert!(key.ends_with("-my-cv-final.pdf"));
    }

    #[test]
    fn test_object_keys_are_unique() {
        assert_ne!(object_key("a", "cv.pdf"), object_key("a", "cv.pdf"));
    }
}
