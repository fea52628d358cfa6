//! Item Intake Service
//!
//! Web front end for submitting items (name, description, photo). Each new
//! item's photo is uploaded to S3 and labeled with Rekognition; the record is
//! stored in DynamoDB, handed to a Lambda function for further processing,
//! and a completion notification is published through SNS. Items can be
//! listed, updated and deleted.
//!
//! ## Request flow
//!
//! ```text
//!  Browser form
//!       │
//!       ▼
//! ┌──────────────┐  scan ids   ┌──────────────┐
//! │ Intake       │────────────▶│ DynamoDB     │
//! │ Handler      │◀────────────│ (records)    │
//! └──────────────┘  put        └──────────────┘
//!   │   │   │   │
//!   │   │   │   └──────────────▶ SNS (notification, outcome only logged)
//!   │   │   └──────────────────▶ Lambda (processing, RequestResponse)
//!   │   └──────────────────────▶ Rekognition (labels, falls back to "image")
//!   └──────────────────────────▶ S3 (public-read image)
//! ```
//!
//! Every external call is awaited before the next one starts. Item IDs are
//! `max(existing) + 1` from a table scan, which is not safe under concurrent
//! creates.

pub mod api;
pub mod config;
pub mod error;
pub mod function_invoker;
pub mod image_store;
pub mod intake;
pub mod item;
pub mod label_detector;
pub mod notifier;
pub mod pages;
pub mod record_store;

pub use api::{create_router, start_api_server, AppState};
pub use config::{Config, ConfigError};
pub use error::IntakeError;
pub use function_invoker::{FunctionInvoker, InvocationError, InvocationResponse, LambdaInvoker};
pub use image_store::{ImageStore, ImageStoreError, S3ImageStore, StoredImage};
pub use intake::{IntakeService, IntakeSettings};
pub use item::{ImageUpload, ItemFields, ItemId, ItemRecord};
pub use label_detector::{LabelDetectionError, LabelDetector, RekognitionLabelDetector};
pub use notifier::{Destination, NotificationError, Notifier, SnsNotifier};
pub use record_store::{DynamoRecordStore, RecordStore, RecordStoreError};
