//! In-memory stand-ins for the AWS-backed services.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use intake_service::config::ApiConfig;
use intake_service::{
    create_router, AppState, FunctionInvoker, ImageStore, ImageStoreError, ImageUpload,
    IntakeService, IntakeSettings, InvocationError, InvocationResponse, ItemFields, ItemRecord,
    LabelDetectionError, LabelDetector, NotificationError, Notifier, RecordStore,
    RecordStoreError, StoredImage,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const BUCKET: &str = "test-bucket";
pub const IMAGE_KEY: &str = "2024-01-15T10:30:45.123456.jpg";
pub const BOUNDARY: &str = "intake-test-boundary";

pub fn image_url() -> String {
    format!("https://{}.s3.us-east-1.amazonaws.com/{}", BUCKET, IMAGE_KEY)
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    items: Mutex<BTreeMap<i64, ItemRecord>>,
    pub fail: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn insert(&self, record: ItemRecord) {
        self.items.lock().unwrap().insert(record.id, record);
    }

    pub fn get(&self, id: i64) -> Option<ItemRecord> {
        self.items.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), RecordStoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Sdk(
                "ProvisionedThroughputExceededException".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn scan(&self) -> Result<Vec<ItemRecord>, RecordStoreError> {
        self.check()?;
        Ok(self.items.lock().unwrap().values().cloned().collect())
    }

    async fn scan_ids(&self) -> Result<Vec<i64>, RecordStoreError> {
        self.check()?;
        Ok(self.items.lock().unwrap().keys().copied().collect())
    }

    async fn put(&self, record: &ItemRecord) -> Result<(), RecordStoreError> {
        self.check()?;
        self.insert(record.clone());
        Ok(())
    }

    async fn update(&self, id: i64, fields: &ItemFields) -> Result<(), RecordStoreError> {
        self.check()?;
        // Same upsert semantics as DynamoDB UpdateItem
        self.insert(ItemRecord {
            id,
            item_name: fields.item_name.clone(),
            item_description: fields.item_description.clone(),
            image_url: fields.image_url.clone(),
            image_label: fields.image_label.clone(),
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), RecordStoreError> {
        self.check()?;
        self.items.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeImageStore {
    pub uploads: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl ImageStore for FakeImageStore {
    async fn store_image(&self, image: &ImageUpload) -> Result<StoredImage, ImageStoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ImageStoreError::Upload {
                key: IMAGE_KEY.to_string(),
                message: "AccessDenied".to_string(),
            });
        }
        assert!(!image.data.is_empty());
        self.uploads.fetch_add(1, Ordering::SeqCst);

        Ok(StoredImage {
            bucket: BUCKET.to_string(),
            key: IMAGE_KEY.to_string(),
            url: image_url(),
        })
    }
}

pub struct FakeLabelDetector {
    pub labels: Mutex<Option<Vec<String>>>,
}

impl Default for FakeLabelDetector {
    fn default() -> Self {
        Self {
            labels: Mutex::new(Some(vec!["Car".to_string(), "Vehicle".to_string()])),
        }
    }
}

#[async_trait]
impl LabelDetector for FakeLabelDetector {
    async fn detect_labels(
        &self,
        bucket: &str,
        key: &str,
        _max_labels: i32,
    ) -> Result<Vec<String>, LabelDetectionError> {
        assert_eq!(bucket, BUCKET);
        assert_eq!(key, IMAGE_KEY);

        self.labels
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| LabelDetectionError::Sdk("InvalidS3ObjectException".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingInvoker {
    pub payloads: Mutex<Vec<serde_json::Value>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl FunctionInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        _function_name: &str,
        payload: &serde_json::Value,
    ) -> Result<InvocationResponse, InvocationError> {
        self.payloads.lock().unwrap().push(payload.clone());

        if self.fail.load(Ordering::SeqCst) {
            return Err(InvocationError::Sdk("ServiceException".to_string()));
        }

        Ok(InvocationResponse {
            status_code: 200,
            function_error: None,
            body: "{\"statusCode\":200}".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, message: &str) -> Result<String, NotificationError> {
        self.messages.lock().unwrap().push(message.to_string());

        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Sdk("InvalidParameter".to_string()));
        }
        Ok("message-1".to_string())
    }
}

/// Router wired to in-memory services
pub struct TestApp {
    pub records: Arc<InMemoryRecordStore>,
    pub images: Arc<FakeImageStore>,
    pub labels: Arc<FakeLabelDetector>,
    pub invoker: Arc<RecordingInvoker>,
    pub notifier: Arc<RecordingNotifier>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(IntakeSettings::default())
    }

    pub fn with_settings(settings: IntakeSettings) -> Self {
        Self::build(settings, ApiConfig::default())
    }

    pub fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let api = ApiConfig {
            max_upload_bytes,
            ..ApiConfig::default()
        };
        Self::build(IntakeSettings::default(), api)
    }

    fn build(settings: IntakeSettings, api: ApiConfig) -> Self {
        let records = Arc::new(InMemoryRecordStore::default());
        let images = Arc::new(FakeImageStore::default());
        let labels = Arc::new(FakeLabelDetector::default());
        let invoker = Arc::new(RecordingInvoker::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let intake = IntakeService::new(
            records.clone(),
            images.clone(),
            labels.clone(),
            invoker.clone(),
            settings,
        )
        .with_notifier(notifier.clone());

        let state = AppState {
            intake: Arc::new(intake),
            service_name: "intake-service".to_string(),
        };

        Self {
            records,
            images,
            labels,
            invoker,
            notifier,
            router: create_router(state, &api),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a multipart add-item submission; `None` fields are left out
pub fn add_item_request(
    name: Option<&str>,
    description: Option<&str>,
    image: Option<&[u8]>,
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();

    for (field, value) in [("item_name", name), ("item_description", description)] {
        if let Some(value) = value {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, field, value
                )
                .as_bytes(),
            );
        }
    }

    if let Some(image) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"item_image\"; filename=\"car.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
                BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/add-item/")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

pub fn record(id: i64, name: &str, description: &str) -> ItemRecord {
    ItemRecord {
        id,
        item_name: name.to_string(),
        item_description: description.to_string(),
        image_url: Some(image_url()),
        image_label: "Car, Vehicle".to_string(),
    }
}
