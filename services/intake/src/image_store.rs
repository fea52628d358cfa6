use crate::config::S3Config;
use crate::item::ImageUpload;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Image store errors
#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("Failed to upload {key}: {message}")]
    Upload { key: String, message: String },

    #[error("Failed to make {key} public: {message}")]
    Acl { key: String, message: String },
}

/// Location of an uploaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub bucket: String,
    pub key: String,
    /// Public URL of the object
    pub url: String,
}

/// Object storage for item images
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store the image under a unique key and return where it lives
    async fn store_image(&self, image: &ImageUpload) -> Result<StoredImage, ImageStoreError>;
}

/// S3 image store with public-read objects
pub struct S3ImageStore {
    client: S3Client,
    bucket: String,
    config: S3Config,
}

impl S3ImageStore {
    /// Create a new S3 image store from the shared AWS configuration
    pub fn new(aws_config: &SdkConfig, config: &S3Config) -> Self {
        let mut s3_config_builder = S3ConfigBuilder::from(aws_config)
            .region(aws_config::Region::new(config.region.clone()));

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 image store initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            config: config.clone(),
        }
    }

    /// Simple single-part upload for small files
    async fn simple_upload(
        &self,
        image: &ImageUpload,
        key: &str,
        content_type: &str,
    ) -> Result<(), ImageStoreError> {
        let body = ByteStream::from(image.data.clone());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| upload_error(key, DisplayErrorContext(&e)))?;

        Ok(())
    }

    /// Multipart upload for large files
    async fn multipart_upload(
        &self,
        image: &ImageUpload,
        key: &str,
        content_type: &str,
    ) -> Result<(), ImageStoreError> {
        let create_response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| upload_error(key, DisplayErrorContext(&e)))?;

        let upload_id = create_response
            .upload_id()
            .map(String::from)
            .ok_or_else(|| upload_error(key, "No upload ID in response"))?;

        match self.upload_parts(image, key, &upload_id).await {
            Ok(completed_parts) => {
                let completed_upload = CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build();

                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed_upload)
                    .send()
                    .await
                    .map_err(|e| upload_error(key, DisplayErrorContext(&e)))?;

                Ok(())
            }
            Err(e) => {
                // Discard the parts already uploaded
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        s3_key = %key,
                        error = %DisplayErrorContext(&abort_err),
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        image: &ImageUpload,
        key: &str,
        upload_id: &str,
    ) -> Result<Vec<CompletedPart>, ImageStoreError> {
        let mut completed_parts = Vec::new();

        for (index, chunk) in image.data.chunks(self.config.part_size_bytes).enumerate() {
            let part_number = index as i32 + 1;

            let upload_part_response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| upload_error(key, DisplayErrorContext(&e)))?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(upload_part_response.e_tag().unwrap_or_default())
                    .build(),
            );
        }

        Ok(completed_parts)
    }

    async fn set_public_read(&self, key: &str) -> Result<(), ImageStoreError> {
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| ImageStoreError::Acl {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    #[instrument(skip(self, image), fields(bucket = %self.bucket, size_bytes = image.data.len()))]
    async fn store_image(&self, image: &ImageUpload) -> Result<StoredImage, ImageStoreError> {
        let key = generate_image_key(Utc::now(), image);
        let content_type = image
            .content_type
            .clone()
            .unwrap_or_else(|| get_content_type(extension_for(image)));

        debug!(s3_key = %key, "Uploading item image to S3");

        if image.data.len() > self.config.multipart_threshold_bytes {
            self.multipart_upload(image, &key, &content_type).await?;
        } else {
            self.simple_upload(image, &key, &content_type).await?;
        }

        if self.config.public_read {
            self.set_public_read(&key).await?;
        }

        let url = public_url(&self.config, &key);

        info!(s3_key = %key, url = %url, "Item image uploaded");

        Ok(StoredImage {
            bucket: self.bucket.clone(),
            key,
            url,
        })
    }
}

/// Unique, timestamp-derived object key: `{UTC ISO-8601 with microseconds}.{ext}`
pub fn generate_image_key(now: DateTime<Utc>, image: &ImageUpload) -> String {
    format!(
        "{}.{}",
        now.format("%Y-%m-%dT%H:%M:%S%.6f"),
        extension_for(image)
    )
}

/// Public URL of an object in the configured bucket
pub fn public_url(config: &S3Config, key: &str) -> String {
    match config.public_base_url {
        Some(ref base) => format!("{}/{}", base.trim_end_matches('/'), key),
        None => format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            config.bucket, config.region, key
        ),
    }
}

/// File extension for the upload: from the file name, else the content type, else `jpg`
fn extension_for(image: &ImageUpload) -> &'static str {
    let from_name = image
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext);

    let from_type = image
        .content_type
        .as_deref()
        .and_then(|ct| ct.strip_prefix("image/"));

    from_name
        .and_then(known_extension)
        .or_else(|| from_type.and_then(known_extension))
        .unwrap_or("jpg")
}

fn known_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "jpeg" | "jpg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "bmp" => Some("bmp"),
        "gif" => Some("gif"),
        _ => None,
    }
}

/// Get content type for image extension
fn get_content_type(ext: &str) -> String {
    match ext.to_lowercase().as_str() {
        "jpeg" | "jpg" => "image/jpeg".to_string(),
        "png" => "image/png".to_string(),
        "webp" => "image/webp".to_string(),
        "bmp" => "image/bmp".to_string(),
        "gif" => "image/gif".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

fn upload_error(key: &str, message: impl std::fmt::Display) -> ImageStoreError {
    ImageStoreError::Upload {
        key: key.to_string(),
        message: message.to_string(),
    }
}
