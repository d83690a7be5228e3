use crate::error::{UploadError, ValidationError};
use crate::models::StorageKey;
use crate::utils::progress::ProgressObserver;
use crate::utils::validation::sanitize_filename;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;

/// Builds `{prefix}{unix_millis}-{filename}`.
///
/// Millisecond timestamps keep keys distinct within one session; they are not
/// globally unique.
pub fn build_storage_key(
    prefix: &str,
    filename: &str,
    unix_millis: i64,
) -> Result<StorageKey, ValidationError> {
    let name = sanitize_filename(filename)?;
    Ok(StorageKey::new(format!("{}{}-{}", prefix, unix_millis, name)))
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Transfers the full content under `key`, reporting progress as it goes.
    async fn put_object(
        &self,
        key: &StorageKey,
        content_type: &str,
        content: Bytes,
        progress: &dyn ProgressObserver,
    ) -> Result<(), UploadError>;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    chunk_size: usize,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, chunk_size: usize) -> Self {
        Self {
            client,
            bucket,
            chunk_size,
        }
    }

    async fn put_single(
        &self,
        key: &str,
        content_type: &str,
        content: Bytes,
    ) -> Result<(), UploadError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| UploadError::Storage(DisplayErrorContext(e).to_string()))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        content_type: &str,
        content: Bytes,
        progress: &dyn ProgressObserver,
    ) -> Result<(), UploadError> {
        let multipart_err = |message: String| UploadError::Multipart {
            key: key.to_string(),
            message,
        };

        let multipart_upload_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| multipart_err(DisplayErrorContext(e).to_string()))?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| multipart_err("No upload ID".to_string()))?
            .to_string();

        let total = content.len() as u64;
        let mut completed_parts = Vec::new();
        let mut sent = 0u64;

        for (index, start) in (0..content.len()).step_by(self.chunk_size).enumerate() {
            let end = (start + self.chunk_size).min(content.len());
            let part_number = index as i32 + 1;

            let upload_part_res = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .body(ByteStream::from(content.slice(start..end)))
                .part_number(part_number)
                .send()
                .await;

            let upload_part_res = match upload_part_res {
                Ok(res) => res,
                Err(e) => {
                    let message = DisplayErrorContext(e).to_string();
                    self.abort_multipart(key, &upload_id).await;
                    return Err(multipart_err(message));
                }
            };

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(upload_part_res.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            sent += (end - start) as u64;
            // Completion is only reported once the upload is committed
            progress.on_progress(((sent * 99) / total) as u8);
        }

        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        let res = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await;

        if let Err(e) = res {
            let message = DisplayErrorContext(e).to_string();
            self.abort_multipart(key, &upload_id).await;
            return Err(multipart_err(message));
        }

        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            tracing::error!(
                "S3 abort_multipart_upload failed: {}/{}, error={}",
                self.bucket,
                key,
                DisplayErrorContext(e)
            );
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &StorageKey,
        content_type: &str,
        content: Bytes,
        progress: &dyn ProgressObserver,
    ) -> Result<(), UploadError> {
        progress.on_progress(0);

        let res = if content.len() > self.chunk_size {
            self.put_multipart(key.as_str(), content_type, content, progress)
                .await
        } else {
            self.put_single(key.as_str(), content_type, content).await
        };

        if let Err(e) = &res {
            tracing::error!("S3 upload failed: {}/{}, error={}", self.bucket, key, e);
            return res;
        }

        progress.on_progress(100);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_storage_key() {
        let key = build_storage_key("uploads/", "rx.pdf", 1_700_000_000_000).unwrap();
        assert_eq!(key.as_str(), "uploads/1700000000000-rx.pdf");
    }

    #[test]
    fn test_build_storage_key_strips_path() {
        let key = build_storage_key("scans/", "../tmp/a:b.pdf", 42).unwrap();
        assert_eq!(key.as_str(), "scans/42-a:b.pdf");
        assert!(build_storage_key("scans/", "", 42).is_err());
    }

    #[test]
    fn test_build_storage_key_keeps_original_filename() {
        let original = "Rx: May?; refill|2.pdf";
        let key = build_storage_key("uploads/", original, 1).unwrap();
        assert_eq!(key.as_str(), "uploads/1-Rx: May?; refill|2.pdf");
        assert!(key.as_str().ends_with(original));

        let long = format!("{}.pdf", "a".repeat(250));
        let key = build_storage_key("uploads/", &long, 1).unwrap();
        assert!(key.as_str().ends_with(".pdf"));
    }
}
