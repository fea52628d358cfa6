use crate::error::IntakeError;
use serde::{Deserialize, Serialize};

/// Message returned when a required text field is empty or missing
pub const MISSING_TEXT_FIELDS: &str = "Both item_name and item_description are required.";

/// Message returned when the image attachment is empty or missing
pub const MISSING_IMAGE: &str = "item_image is required.";

/// Message returned when `item_id` is absent or not a positive integer
pub const INVALID_ITEM_ID: &str = "A valid item_id is required.";

/// Stored item record
///
/// This is also the JSON payload handed to the processing function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Numeric item ID (table partition key)
    pub id: i64,
    /// Item name
    pub item_name: String,
    /// Item description
    pub item_description: String,
    /// Public URL of the uploaded image
    pub image_url: Option<String>,
    /// Detected labels joined with ", ", or the fallback label
    pub image_label: String,
}

impl ItemRecord {
    /// Mutable fields of this record
    pub fn fields(&self) -> ItemFields {
        ItemFields {
            item_name: self.item_name.clone(),
            item_description: self.item_description.clone(),
            image_url: self.image_url.clone(),
            image_label: self.image_label.clone(),
        }
    }
}

/// The four non-key fields overwritten by an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub item_name: String,
    pub item_description: String,
    pub image_url: Option<String>,
    pub image_label: String,
}

/// Validated item ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(i64);

impl ItemId {
    /// Parse a form value into an item ID
    pub fn parse(raw: Option<&str>) -> Result<Self, IntakeError> {
        raw.map(str::trim)
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(ItemId)
            .ok_or_else(|| IntakeError::Validation(INVALID_ITEM_ID.to_string()))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Uploaded image as received from the form
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Client-side file name, if the browser sent one
    pub file_name: Option<String>,
    /// Declared content type, if any
    pub content_type: Option<String>,
    /// Raw file bytes
    pub data: Vec<u8>,
}

/// Raw fields of the add-item form
#[derive(Debug, Default)]
pub struct NewItemForm {
    pub item_name: Option<String>,
    pub item_description: Option<String>,
    pub item_image: Option<ImageUpload>,
}

/// Validated create request
#[derive(Debug, Clone)]
pub struct NewItem {
    pub item_name: String,
    pub item_description: String,
    pub image: ImageUpload,
}

impl NewItemForm {
    /// Validate the submission before any external call is made
    pub fn validate(self) -> Result<NewItem, IntakeError> {
        let (item_name, item_description) =
            required_text(self.item_name.as_deref(), self.item_description.as_deref())?;

        let image = self
            .item_image
            .filter(|image| !image.data.is_empty())
            .ok_or_else(|| IntakeError::Validation(MISSING_IMAGE.to_string()))?;

        Ok(NewItem {
            item_name,
            item_description,
            image,
        })
    }
}

/// Raw fields of the update form
#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemForm {
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    pub item_description: Option<String>,
    pub image_url: Option<String>,
    pub image_label: Option<String>,
}

/// Validated update request
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub id: ItemId,
    pub fields: ItemFields,
}

impl UpdateItemForm {
    pub fn validate(self) -> Result<ItemUpdate, IntakeError> {
        let (item_name, item_description) =
            required_text(self.item_name.as_deref(), self.item_description.as_deref())?;
        let id = ItemId::parse(self.item_id.as_deref())?;

        Ok(ItemUpdate {
            id,
            fields: ItemFields {
                item_name,
                item_description,
                // An empty URL field means "no image"
                image_url: self.image_url.filter(|url| !url.trim().is_empty()),
                image_label: self.image_label.unwrap_or_default(),
            },
        })
    }
}

/// Raw fields of the delete form (also the query of the update/delete form pages)
#[derive(Debug, Default, Deserialize)]
pub struct DeleteItemForm {
    pub item_id: Option<String>,
}

impl DeleteItemForm {
    pub fn validate(self) -> Result<ItemId, IntakeError> {
        ItemId::parse(self.item_id.as_deref())
    }
}

/// Next ID after the existing ones: `max + 1`, or 1 for an empty table
///
/// Two requests reading the same maximum get the same ID; nothing serializes them.
pub fn next_item_id(existing: &[i64]) -> i64 {
    existing.iter().copied().max().unwrap_or(0) + 1
}

fn required_text(
    name: Option<&str>,
    description: Option<&str>,
) -> Result<(String, String), IntakeError> {
    // Whitespace-only counts as empty; accepted values are kept as submitted
    match (name, description) {
        (Some(name), Some(description))
            if !name.trim().is_empty() && !description.trim().is_empty() =>
        {
            Ok((name.to_string(), description.to_string()))
        }
        _ => Err(IntakeError::Validation(MISSING_TEXT_FIELDS.to_string())),
    }
}
