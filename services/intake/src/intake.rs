use crate::config::Config;
use crate::error::IntakeError;
use crate::function_invoker::{FunctionInvoker, InvocationError};
use crate::image_store::ImageStore;
use crate::item::{next_item_id, ItemId, ItemRecord, ItemUpdate, NewItem};
use crate::label_detector::{label_text, LabelDetector};
use crate::notifier::Notifier;
use crate::record_store::RecordStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Tunables for the intake sequence
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    pub max_labels: i32,
    pub fallback_label: String,
    pub function_name: String,
    pub fail_on_function_error: bool,
    pub notification_message: String,
}

impl IntakeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_labels: config.labels.max_labels,
            fallback_label: config.labels.fallback_label.clone(),
            function_name: config.processing.function_name.clone(),
            fail_on_function_error: config.processing.fail_on_function_error,
            notification_message: config.notification.message.clone(),
        }
    }
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            max_labels: 10,
            fallback_label: "image".to_string(),
            function_name: "vehicles_add_operation".to_string(),
            fail_on_function_error: false,
            notification_message: "Data Successfully Saved".to_string(),
        }
    }
}

/// Item intake handler
///
/// Every external call is awaited before the next one starts. Nothing is
/// retried and nothing is rolled back: an image uploaded before a later step
/// fails stays in the bucket.
pub struct IntakeService {
    records: Arc<dyn RecordStore>,
    images: Arc<dyn ImageStore>,
    labels: Arc<dyn LabelDetector>,
    functions: Arc<dyn FunctionInvoker>,
    notifier: Option<Arc<dyn Notifier>>,
    settings: IntakeSettings,
}

impl IntakeService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        images: Arc<dyn ImageStore>,
        labels: Arc<dyn LabelDetector>,
        functions: Arc<dyn FunctionInvoker>,
        settings: IntakeSettings,
    ) -> Self {
        Self {
            records,
            images,
            labels,
            functions,
            notifier: None,
            settings,
        }
    }

    /// Send a completion notification after each created item
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// All records, ordered by ID
    #[instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Vec<ItemRecord>, IntakeError> {
        let mut items = self.records.scan().await.map_err(IntakeError::ListItems)?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    /// Run the full create sequence for a validated submission
    ///
    /// The ID is `max(existing) + 1` from a scan taken here; concurrent
    /// creates can read the same maximum and store under the same ID.
    #[instrument(skip(self, item), fields(item_name = %item.item_name))]
    pub async fn create_item(&self, item: NewItem) -> Result<ItemRecord, IntakeError> {
        let existing_ids = self.records.scan_ids().await.map_err(IntakeError::AssignId)?;
        let id = next_item_id(&existing_ids);

        let upload_started = Instant::now();
        let stored = self
            .images
            .store_image(&item.image)
            .await
            .map_err(IntakeError::UploadImage)?;
        metrics::histogram!("intake.upload.duration_seconds")
            .record(upload_started.elapsed().as_secs_f64());

        let detected = self
            .labels
            .detect_labels(&stored.bucket, &stored.key, self.settings.max_labels)
            .await;
        match detected {
            Ok(ref labels) if !labels.is_empty() => {
                debug!(item_id = id, labels = ?labels, "Labels detected")
            }
            Ok(_) => {
                warn!(item_id = id, "No labels detected, using fallback label");
                metrics::counter!("intake.labels.fallback").increment(1);
            }
            Err(ref e) => {
                warn!(item_id = id, error = %e, "Label detection failed, using fallback label");
                metrics::counter!("intake.labels.fallback").increment(1);
            }
        }

        let record = ItemRecord {
            id,
            item_name: item.item_name,
            item_description: item.item_description,
            image_url: Some(stored.url),
            image_label: label_text(detected, &self.settings.fallback_label),
        };

        self.records
            .put(&record)
            .await
            .map_err(IntakeError::SaveItem)?;

        self.process(&record).await?;
        self.notify(record.id).await;

        metrics::counter!("intake.items.created").increment(1);
        info!(
            item_id = record.id,
            s3_key = %stored.key,
            image_label = %record.image_label,
            "Item created"
        );

        Ok(record)
    }

    /// Overwrite the mutable fields of an item and return the refreshed list
    ///
    /// The ID is not checked for existence.
    #[instrument(skip(self, update), fields(item_id = %update.id))]
    pub async fn update_item(&self, update: ItemUpdate) -> Result<Vec<ItemRecord>, IntakeError> {
        self.records
            .update(update.id.get(), &update.fields)
            .await
            .map_err(IntakeError::UpdateItem)?;

        metrics::counter!("intake.items.updated").increment(1);
        info!("Item updated");

        self.list_items().await
    }

    /// Delete an item and return the refreshed list
    ///
    /// Deleting an absent ID succeeds.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: ItemId) -> Result<Vec<ItemRecord>, IntakeError> {
        self.records
            .delete(id.get())
            .await
            .map_err(IntakeError::DeleteItem)?;

        metrics::counter!("intake.items.deleted").increment(1);
        info!(item_id = %id, "Item deleted");

        self.list_items().await
    }

    /// Hand the record to the processing function
    async fn process(&self, record: &ItemRecord) -> Result<(), IntakeError> {
        let function_name = &self.settings.function_name;

        let outcome = match serde_json::to_value(record) {
            Ok(payload) => self
                .functions
                .invoke(function_name, &payload)
                .await
                .and_then(|response| response.into_result(function_name)),
            Err(e) => Err(InvocationError::from(e)),
        };

        match outcome {
            Ok(response) => {
                debug!(
                    item_id = record.id,
                    status_code = response.status_code,
                    body = %response.body,
                    "Processing function completed"
                );
                Ok(())
            }
            Err(e) => {
                metrics::counter!("intake.invocations.failed").increment(1);

                if self.settings.fail_on_function_error {
                    return Err(IntakeError::Processing(e));
                }

                warn!(
                    item_id = record.id,
                    function_name = %function_name,
                    error = %e,
                    "Processing function failed, continuing"
                );
                Ok(())
            }
        }
    }

    /// Publish the completion message; the outcome is only logged
    async fn notify(&self, item_id: i64) {
        let Some(ref notifier) = self.notifier else {
            return;
        };

        match notifier.publish(&self.settings.notification_message).await {
            Ok(message_id) => debug!(item_id, message_id = %message_id, "Notification sent"),
            Err(e) => {
                metrics::counter!("intake.notifications.failed").increment(1);
                warn!(item_id, error = %e, "Notification failed");
            }
        }
    }
}
