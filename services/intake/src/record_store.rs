use crate::config::RecordsConfig;
use crate::item::{ItemFields, ItemRecord};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::config::Builder as DynamoConfigBuilder;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;
use std::time::{Duration, Instant};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::{debug, info, instrument};

const ID: &str = "id";
const ITEM_NAME: &str = "item_name";
const ITEM_DESCRIPTION: &str = "item_description";
const IMAGE_URL: &str = "image_url";
const IMAGE_LABEL: &str = "image_label";

/// Record store errors
#[derive(Error, Debug)]
pub enum RecordStoreError {
    #[error("DynamoDB request failed: {0}")]
    Sdk(String),

    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// Key-value table holding item records, keyed by integer ID
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record in the table
    async fn scan(&self) -> Result<Vec<ItemRecord>, RecordStoreError>;

    /// Every ID in the table
    async fn scan_ids(&self) -> Result<Vec<i64>, RecordStoreError>;

    /// Insert or replace a record
    async fn put(&self, record: &ItemRecord) -> Result<(), RecordStoreError>;

    /// Overwrite the four mutable fields of `id`, creating the item if absent
    async fn update(&self, id: i64, fields: &ItemFields) -> Result<(), RecordStoreError>;

    /// Remove `id`; deleting an absent ID is not an error
    async fn delete(&self, id: i64) -> Result<(), RecordStoreError>;
}

/// DynamoDB-backed record store
pub struct DynamoRecordStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoRecordStore {
    /// Create a new record store from the shared AWS configuration
    pub fn new(aws_config: &SdkConfig, config: &RecordsConfig) -> Self {
        let mut builder = DynamoConfigBuilder::from(aws_config)
            .region(aws_config::Region::new(config.region.clone()));

        // Configure custom endpoint for DynamoDB Local
        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        let client = DynamoClient::from_conf(builder.build());

        info!(
            table = %config.table_name,
            region = %config.region,
            "DynamoDB record store initialized"
        );

        Self::from_client(client, config.table_name.clone())
    }

    pub fn from_client(client: DynamoClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// Create the table when it does not exist yet and wait until it is active
    pub async fn ensure_table(&self, config: &RecordsConfig, timeout: Duration) -> Result<()> {
        if self.table_exists().await? {
            info!(table = %self.table_name, "Record table already exists");
            return Ok(());
        }

        info!(table = %self.table_name, "Creating record table");

        self.client
            .create_table()
            .table_name(&self.table_name)
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(ID)
                    .key_type(KeyType::Hash)
                    .build()
                    .context("Invalid key schema")?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(ID)
                    .attribute_type(ScalarAttributeType::N)
                    .build()
                    .context("Invalid attribute definition")?,
            )
            .provisioned_throughput(
                ProvisionedThroughput::builder()
                    .read_capacity_units(config.read_capacity_units)
                    .write_capacity_units(config.write_capacity_units)
                    .build()
                    .context("Invalid provisioned throughput")?,
            )
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            .context("Failed to create record table")?;

        self.wait_until_active(timeout).await?;

        info!(table = %self.table_name, "Record table created");
        Ok(())
    }

    async fn table_exists(&self) -> Result<bool> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error()
                    .map(|e| e.is_resource_not_found_exception())
                    .unwrap_or(false)
                {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!("{}", DisplayErrorContext(&e)))
                        .context("Failed to describe record table")
                }
            }
        }
    }

    async fn wait_until_active(&self, timeout: Duration) -> Result<()> {
        let started = Instant::now();

        loop {
            let description = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
                .context("Failed to describe record table")?;

            let status = description.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                return Ok(());
            }

            if started.elapsed() >= timeout {
                bail!(
                    "Table {} not active after {}s (status: {:?})",
                    self.table_name,
                    timeout.as_secs(),
                    status
                );
            }

            debug!(table = %self.table_name, status = ?status, "Waiting for record table");
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    /// Full scan following `LastEvaluatedKey` until the table is exhausted
    async fn scan_pages(
        &self,
        projection: Option<&str>,
    ) -> Result<Vec<HashMap<String, AttributeValue>>, RecordStoreError> {
        let mut items = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_projection_expression(projection.map(String::from))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| RecordStoreError::Sdk(DisplayErrorContext(&e).to_string()))?;

            items.extend(output.items().iter().cloned());

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn scan(&self) -> Result<Vec<ItemRecord>, RecordStoreError> {
        let items = self.scan_pages(None).await?;
        let records = items
            .iter()
            .map(record_from_item)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = records.len(), "Scanned item records");
        Ok(records)
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn scan_ids(&self) -> Result<Vec<i64>, RecordStoreError> {
        let items = self.scan_pages(Some(ID)).await?;
        items.iter().map(id_from_item).collect()
    }

    #[instrument(skip(self, record), fields(table = %self.table_name, item_id = record.id))]
    async fn put(&self, record: &ItemRecord) -> Result<(), RecordStoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item_from_record(record)))
            .send()
            .await
            .map_err(|e| RecordStoreError::Sdk(DisplayErrorContext(&e).to_string()))?;

        debug!("Item record stored");
        Ok(())
    }

    #[instrument(skip(self, fields), fields(table = %self.table_name))]
    async fn update(&self, id: i64, fields: &ItemFields) -> Result<(), RecordStoreError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(ID, AttributeValue::N(id.to_string()))
            .update_expression(
                "SET item_name = :name, item_description = :desc, \
                 image_url = :img_url, image_label = :img_label",
            )
            .expression_attribute_values(":name", AttributeValue::S(fields.item_name.clone()))
            .expression_attribute_values(
                ":desc",
                AttributeValue::S(fields.item_description.clone()),
            )
            .expression_attribute_values(
                ":img_url",
                optional_string(fields.image_url.as_deref()),
            )
            .expression_attribute_values(
                ":img_label",
                AttributeValue::S(fields.image_label.clone()),
            )
            .send()
            .await
            .map_err(|e| RecordStoreError::Sdk(DisplayErrorContext(&e).to_string()))?;

        debug!("Item record updated");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn delete(&self, id: i64) -> Result<(), RecordStoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(ID, AttributeValue::N(id.to_string()))
            .send()
            .await
            .map_err(|e| RecordStoreError::Sdk(DisplayErrorContext(&e).to_string()))?;

        debug!("Item record deleted");
        Ok(())
    }
}

/// Encode a record as a DynamoDB item
pub fn item_from_record(record: &ItemRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (ID.to_string(), AttributeValue::N(record.id.to_string())),
        (ITEM_NAME.to_string(), AttributeValue::S(record.item_name.clone())),
        (
            ITEM_DESCRIPTION.to_string(),
            AttributeValue::S(record.item_description.clone()),
        ),
        (
            IMAGE_URL.to_string(),
            optional_string(record.image_url.as_deref()),
        ),
        (IMAGE_LABEL.to_string(), AttributeValue::S(record.image_label.clone())),
    ])
}

/// Decode a scanned DynamoDB item
pub fn record_from_item(
    item: &HashMap<String, AttributeValue>,
) -> Result<ItemRecord, RecordStoreError> {
    Ok(ItemRecord {
        id: id_from_item(item)?,
        item_name: required_string(item, ITEM_NAME)?,
        item_description: required_string(item, ITEM_DESCRIPTION)?,
        image_url: item
            .get(IMAGE_URL)
            .and_then(|v| v.as_s().ok())
            .cloned(),
        image_label: item
            .get(IMAGE_LABEL)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or_default(),
    })
}

fn id_from_item(item: &HashMap<String, AttributeValue>) -> Result<i64, RecordStoreError> {
    let raw = item
        .get(ID)
        .and_then(|v| v.as_n().ok())
        .ok_or_else(|| RecordStoreError::Malformed("missing numeric id".to_string()))?;

    raw.parse::<i64>()
        .map_err(|_| RecordStoreError::Malformed(format!("id {} is not an integer", raw)))
}

fn required_string(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> Result<String, RecordStoreError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| RecordStoreError::Malformed(format!("missing string attribute {}", name)))
}

fn optional_string(value: Option<&str>) -> AttributeValue {
    match value {
        Some(s) => AttributeValue::S(s.to_string()),
        None => AttributeValue::Null(true),
    }
}
