use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::ProcessError;

/// Marker in an object's name: the annotator flagged it as unworkable
pub const ADDITIONAL_WORK_IMPOSSIBLE: &str = "추가 작업 불가";
/// Marker in `extra.label`: the item is dropped outright
pub const WORK_EXCLUDED_IMAGE: &str = "작업제외이미지";

// The RawRecord struct representing one annotation task submission
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRecord {
    #[serde(rename = "dataID", default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<Value>,
    #[serde(
        rename = "importData_video_file",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub video_file: Option<String>,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

impl RawRecord {
    /// The `data` array of a field, or `None` when the field or its data is absent
    pub fn field_entries(&self, key: &str) -> Option<&Vec<Value>> {
        self.fields.get(key)?.get("data")?.as_array()
    }

    /// The first entry of a field's `data` array
    pub fn first_entry(&self, key: &str) -> Option<FieldEntry> {
        let entry = self.field_entries(key)?.first()?;
        serde_json::from_value(entry.clone()).ok()
    }

    /// A top-level string such as `importData_image_VQA_01`
    pub fn import_value(&self, key: &str) -> Option<&str> {
        self.fields.get(key)?.as_str()
    }

    /// The source groups of `object.data`, empty when the record has none
    pub fn object_groups(&self) -> Result<Vec<SourceGroup>, ProcessError> {
        match self.field_entries("object") {
            Some(entries) => entries
                .iter()
                .map(|entry| {
                    serde_json::from_value(entry.clone()).map_err(|source| {
                        ProcessError::Malformed {
                            field: "object.data".to_string(),
                            source,
                        }
                    })
                })
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Identifier used in log lines
    pub fn display_id(&self) -> String {
        match &self.data_id {
            Some(Value::String(id)) => id.clone(),
            Some(id) => id.to_string(),
            None => "N/A".to_string(),
        }
    }
}

// One entry of a slot field such as `scene_01` or `VQA_answer_02`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldEntry {
    #[serde(rename = "objectID", default)]
    pub object_id: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl FieldEntry {
    pub fn object_id_string(&self) -> Option<String> {
        self.object_id.as_ref().map(value_to_string)
    }

    /// The entry's value as text, `""` when absent
    pub fn value_text(&self) -> String {
        match &self.value {
            Some(Value::Null) | None => String::new(),
            Some(value) => value_to_string(value),
        }
    }
}

// One source image of `object.data` with its annotation chain
#[derive(Debug, Clone, Deserialize)]
pub struct SourceGroup {
    #[serde(rename = "SourceValue")]
    pub source_value: String,
    #[serde(rename = "ChainId", default)]
    pub chain_id: Option<Value>,
    #[serde(rename = "ChainData", default)]
    pub chain_data: Option<Vec<ChainItem>>,
}

// A candidate object annotation inside a chain
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChainItem {
    #[serde(rename = "objectID", default)]
    pub object_id: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<ChainValue>,
}

impl ChainItem {
    pub fn object_id_string(&self) -> String {
        self.object_id
            .as_ref()
            .map(value_to_string)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

// Only `object_name` and `extra.label` are read for every item. The box fields
// are kept loose and only looked at when an annotation is emitted.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChainValue {
    #[serde(default, deserialize_with = "lenient_text")]
    pub object_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub extra: Option<Extra>,
    #[serde(default)]
    pub coords: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub object: Option<ObjectSize>,
}

impl ChainValue {
    pub fn label(&self) -> Option<&Label> {
        self.extra.as_ref()?.label.as_ref()
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Extra {
    #[serde(default)]
    pub label: Option<Label>,
    #[serde(default)]
    pub value: Option<Value>,
}

// `extra.label` shows up as a plain string, as a list, and occasionally as something else
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Label {
    Text(String),
    List(Vec<Value>),
    Other(Value),
}

impl Label {
    pub fn contains(&self, marker: &str) -> bool {
        match self {
            Label::Text(text) => text.contains(marker),
            Label::List(items) => items.iter().any(|item| item.as_str() == Some(marker)),
            Label::Other(_) => false,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Text(text) => f.write_str(text),
            Label::List(items) => {
                let items: Vec<String> = items.iter().map(value_to_string).collect();
                write!(f, "{}", items.join(", "))
            }
            Label::Other(value) => write!(f, "{}", value),
        }
    }
}

// Width and height the annotation tool already computed for the box.
// Copied into the bbox as they are, whatever their JSON type.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ObjectSize {
    #[serde(default)]
    pub width: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
}

/// A flat object annotation of the normalized record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub image_id: String,
    pub object_id: Value,
    pub image_frame: String,
    pub object_name_kr: String,
    pub object_name_en: String,
    pub bbox: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneAnnotation {
    pub scene_id: String,
    pub description_scene_kr: String,
    pub description_scene_en: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VqaAnnotation {
    pub image_id: String,
    pub image_frame: String,
    pub question_id: String,
    pub question_kr: String,
    pub question_en: String,
    pub answer_id: String,
    pub answer: i64,
}

/// The output document: a JSON object shaped by the schema template
pub type NormalizedRecord = Map<String, Value>;

/// Identifiers keep their text when they are strings and their JSON form otherwise
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// A null or missing name reads as "", other non-strings as their JSON text
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(value) => value_to_string(&value),
    })
}

// A nested field of an unexpected shape reads as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub total_records: usize,
    pub successful_records: usize,
    pub skipped_malformed: usize,
    pub failed_records: usize,
    pub dropped_groups: usize,
    pub excluded_items: usize,
    pub skipped_impossible: usize,
    pub annotations_emitted: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_total(&mut self) {
        self.total_records += 1;
    }

    pub fn increment_successful(&mut self) {
        self.successful_records += 1;
    }

    pub fn increment_skipped_malformed(&mut self) {
        self.skipped_malformed += 1;
    }

    pub fn increment_failed(&mut self) {
        self.failed_records += 1;
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total records read: {}", self.total_records);
        log::info!("Successful records: {}", self.successful_records);
        log::info!("Failed records: {}", self.failed_records);
        log::info!("Annotations emitted: {}", self.annotations_emitted);
        if self.dropped_groups > 0 || self.excluded_items > 0 {
            log::info!(
                "Dropped source groups: {}, excluded items: {}, skipped unworkable items: {}",
                self.dropped_groups,
                self.excluded_items,
                self.skipped_impossible
            );
        }
        if self.skipped_malformed > 0 {
            log::warn!("Skipped malformed lines: {}", self.skipped_malformed);
        }
    }
}
