//! Output template construction
//!
//! A normalized record starts from a schema document whose leaves are reset to
//! an empty sentinel, then the common dataset, video and clip metadata is filled
//! in from the raw record.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::{AnnotationKind, TemplatePolicy};
use crate::error::ProcessError;
use crate::types::{NormalizedRecord, RawRecord};

pub const DATASET_NAME: &str = "example_dataset";
pub const DATASET_VERSION: &str = "v1.0";
pub const DATASET_YEAR: &str = "2025";
pub const DEFAULT_VIDEO_FILE: &str = "unknown_video.mp4";

/// Video entry of the normalized record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoInfo {
    pub id: String,
    pub width: String,
    pub height: String,
    pub file_name: String,
}

/// Clip entry of the normalized record. Dimensions, length and fps are never
/// measured; they stay empty.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClipInfo {
    pub id: String,
    pub file_name: String,
    pub length: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: String,
    pub ratio: Option<String>,
    pub fps: String,
}

/// Replace every leaf of `schema` with the policy's empty sentinel
pub fn initialize_template(schema: &Value, policy: TemplatePolicy) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), initialize_template(value, policy)))
                .collect(),
        ),
        Value::Array(items) => match policy {
            TemplatePolicy::Blank => Value::Array(Vec::new()),
            TemplatePolicy::Null => Value::Array(
                items
                    .iter()
                    .map(|item| initialize_template(item, policy))
                    .collect(),
            ),
        },
        _ => match policy {
            TemplatePolicy::Blank => Value::String(String::new()),
            TemplatePolicy::Null => Value::Null,
        },
    }
}

/// Initialize a schema that must be a JSON object at the top level
pub fn template_from_schema(
    schema: &Value,
    policy: TemplatePolicy,
) -> Result<NormalizedRecord, ProcessError> {
    match initialize_template(schema, policy) {
        Value::Object(map) => Ok(map),
        other => Err(ProcessError::SchemaNotObject(json_kind(&other))),
    }
}

/// Format document used when no schema file is supplied
pub fn default_schema(kind: AnnotationKind) -> Value {
    let annotation = match kind {
        AnnotationKind::Object => json!([{
            "image_id": "",
            "object_id": "",
            "image_frame": "",
            "object_name_kr": "",
            "object_name_en": "",
            "bbox": [0, 0, 0, 0]
        }]),
        AnnotationKind::Scene => json!([{
            "scene_id": "",
            "description_scene_kr": "",
            "description_scene_en": ""
        }]),
        AnnotationKind::Vqa => json!([{
            "image_id": "",
            "image_frame": "",
            "question_id": "",
            "question_kr": "",
            "question_en": "",
            "answer_id": "",
            "answer": 0
        }]),
    };

    let mut schema = json!({
        "dataID": 0,
        "dataset_name": "",
        "version": "",
        "year": "",
        "category": [""],
        "subject": [""],
        "video": [{ "id": "", "width": "", "height": "", "file_name": "" }],
        "clip": {
            "id": "",
            "file_name": "",
            "length": "",
            "width": 0,
            "height": 0,
            "format": "",
            "ratio": "",
            "fps": ""
        }
    });
    if let Value::Object(map) = &mut schema {
        map.insert(kind.annotation_key().to_string(), annotation);
    }
    schema
}

/// Fill the dataset-level fields. `dataID` is required.
pub fn add_base(
    template: &mut NormalizedRecord,
    record: &RawRecord,
    policy: TemplatePolicy,
) -> Result<(), ProcessError> {
    let data_id = record
        .data_id
        .clone()
        .ok_or(ProcessError::MissingField("dataID"))?;

    let empty_list = match policy {
        TemplatePolicy::Blank => Value::Array(Vec::new()),
        TemplatePolicy::Null => Value::Array(vec![Value::Null]),
    };

    template.insert("dataID".to_string(), data_id);
    template.insert("dataset_name".to_string(), json!(DATASET_NAME));
    template.insert("version".to_string(), json!(DATASET_VERSION));
    template.insert("year".to_string(), json!(DATASET_YEAR));
    template.insert("category".to_string(), empty_list.clone());
    template.insert("subject".to_string(), empty_list);
    Ok(())
}

pub fn add_video(template: &mut NormalizedRecord, record: &RawRecord) {
    let video = VideoInfo {
        id: "video_001".to_string(),
        width: String::new(),
        height: String::new(),
        file_name: format!("{}.mp4", video_base_name(video_file(record))),
    };
    template.insert("video".to_string(), json!([video]));
}

pub fn add_clip(template: &mut NormalizedRecord, record: &RawRecord) {
    let file_name = video_file(record);
    let clip = ClipInfo {
        id: format!("clip_{}", clip_id(file_name)),
        file_name: file_name.to_string(),
        length: String::new(),
        width: None,
        height: None,
        format: "mp4".to_string(),
        ratio: None,
        fps: String::new(),
    };
    template.insert("clip".to_string(), json!(clip));
}

fn video_file(record: &RawRecord) -> &str {
    record.video_file.as_deref().unwrap_or(DEFAULT_VIDEO_FILE)
}

/// Clip file name without `.mp4` and without a trailing `_<digits>` segment
pub fn video_base_name(file_name: &str) -> String {
    let name = file_name.replace(".mp4", "");
    if let Some((head, last)) = name.rsplit_once('_') {
        if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
            return head.to_string();
        }
    }
    name
}

/// The part of the raw file name after the last `_` and before the first `.`
pub fn clip_id(file_name: &str) -> &str {
    let tail = file_name.rsplit('_').next().unwrap_or(file_name);
    tail.split('.').next().unwrap_or(tail)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build the record skeleton shared by every annotation kind
pub fn build_base_record(
    schema: &Value,
    policy: TemplatePolicy,
    record: &RawRecord,
) -> Result<NormalizedRecord, ProcessError> {
    let mut template: Map<String, Value> = template_from_schema(schema, policy)?;
    add_base(&mut template, record, policy)?;
    add_video(&mut template, record);
    add_clip(&mut template, record);
    Ok(template)
}
