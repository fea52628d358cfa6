use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_rekognition::error::DisplayErrorContext;
use aws_sdk_rekognition::types::{Image, S3Object};
use aws_sdk_rekognition::Client as RekognitionClient;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum LabelDetectionError {
    #[error("Rekognition request failed: {0}")]
    Sdk(String),
}

/// Image classification service
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LabelDetector: Send + Sync {
    /// Labels describing the object at `bucket/key`, most confident first
    async fn detect_labels(
        &self,
        bucket: &str,
        key: &str,
        max_labels: i32,
    ) -> Result<Vec<String>, LabelDetectionError>;
}

/// Rekognition-backed label detector
pub struct RekognitionLabelDetector {
    client: RekognitionClient,
    min_confidence: Option<f32>,
}

impl RekognitionLabelDetector {
    pub fn new(aws_config: &SdkConfig, region: &str, min_confidence: Option<f32>) -> Self {
        let config = aws_sdk_rekognition::config::Builder::from(aws_config)
            .region(aws_config::Region::new(region.to_string()))
            .build();

        Self {
            client: RekognitionClient::from_conf(config),
            min_confidence,
        }
    }
}

#[async_trait]
impl LabelDetector for RekognitionLabelDetector {
    #[instrument(skip(self))]
    async fn detect_labels(
        &self,
        bucket: &str,
        key: &str,
        max_labels: i32,
    ) -> Result<Vec<String>, LabelDetectionError> {
        let image = Image::builder()
            .s3_object(S3Object::builder().bucket(bucket).name(key).build())
            .build();

        let response = self
            .client
            .detect_labels()
            .image(image)
            .max_labels(max_labels)
            .set_min_confidence(self.min_confidence)
            .send()
            .await
            .map_err(|e| LabelDetectionError::Sdk(DisplayErrorContext(&e).to_string()))?;

        let labels: Vec<String> = response
            .labels()
            .iter()
            .filter_map(|label| label.name().map(String::from))
            .collect();

        debug!(labels = ?labels, "Labels detected");
        Ok(labels)
    }
}

/// Join detected labels for storage, substituting `fallback` for a failed or empty detection
pub fn label_text(detected: Result<Vec<String>, LabelDetectionError>, fallback: &str) -> String {
    match detected {
        Ok(labels) if !labels.is_empty() => labels.join(", "),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_text_joins_labels() {
        let labels = vec!["Car".to_string(), "Vehicle".to_string(), "Sedan".to_string()];
        assert_eq!(label_text(Ok(labels), "image"), "Car, Vehicle, Sedan");
    }

    #[test]
    fn test_label_text_falls_back() {
        assert_eq!(
            label_text(Err(LabelDetectionError::Sdk("throttled".to_string())), "image"),
            "image"
        );
        assert_eq!(label_text(Ok(vec![]), "image"), "image");
    }
}
