//! VQA extraction
//!
//! Each VQA slot spreads over several raw fields: the selected image, the
//! question, up to four choices and the answer. Extraction is positional; a
//! missing field yields a placeholder id or an empty text.

use log::{debug, warn};
use serde_json::Value;

use crate::types::{RawRecord, VqaAnnotation};

/// Slots converted into `VQA_annotation` entries
pub const VQA_SLOTS: [&str; 3] = ["01", "02", "03"];
/// Slots an export may carry image selections for
pub const VQA_IMAGE_SLOTS: [&str; 9] = ["01", "02", "03", "04", "05", "06", "07", "08", "09"];
pub const MAX_CHOICES: usize = 4;
pub const DEFAULT_ANSWER: i64 = 1;

const IMAGE_SELECTION_PREFIX: &str = "image_VQA_";

pub fn extract_vqa_annotations(record: &RawRecord) -> Vec<VqaAnnotation> {
    VQA_SLOTS
        .iter()
        .map(|slot| extract_vqa_slot(record, slot))
        .collect()
}

fn extract_vqa_slot(record: &RawRecord, slot: &str) -> VqaAnnotation {
    let image_id = record
        .first_entry(&format!("VQA_image_{}", slot))
        .and_then(|entry| entry.object_id_string())
        .unwrap_or_else(|| format!("image_VQA_{}", slot));

    let question = record.first_entry(&format!("VQA_question_{}", slot));
    let question_id = question
        .as_ref()
        .and_then(|entry| entry.object_id_string())
        .unwrap_or_else(|| format!("question_dataId_{}", slot));
    let question_base = question
        .as_ref()
        .map(|entry| entry.value_text())
        .unwrap_or_default();

    let choices: Vec<String> = (1..=MAX_CHOICES)
        .filter_map(|choice| record.first_entry(&format!("VQA_question_{}{}", slot, choice)))
        .map(|entry| entry.value_text())
        .collect();
    debug!("VQA {}: {} choices found", slot, choices.len());

    let answer = record.first_entry(&format!("VQA_answer_{}", slot));
    let answer_id = answer
        .as_ref()
        .and_then(|entry| entry.object_id_string())
        .unwrap_or_else(|| format!("answer_dataId_{}", slot));
    let answer_value = answer
        .as_ref()
        .and_then(|entry| entry.value.as_ref())
        .map(|value| parse_answer(value, slot))
        .unwrap_or(DEFAULT_ANSWER);

    VqaAnnotation {
        image_id,
        image_frame: String::new(),
        question_id,
        question_kr: join_question(&question_base, &choices),
        question_en: String::new(),
        answer_id,
        answer: answer_value,
    }
}

/// Question text followed by the available choices, comma separated
pub fn join_question(question: &str, choices: &[String]) -> String {
    if choices.is_empty() {
        question.to_string()
    } else {
        format!("{},{}", question, choices.join(","))
    }
}

/// The answer is the `value` of the first selected option
fn parse_answer(value: &Value, slot: &str) -> i64 {
    let Some(first) = value.as_array().and_then(|options| options.first()) else {
        return DEFAULT_ANSWER;
    };
    let parsed = match first.get("value") {
        None | Some(Value::Null) => return DEFAULT_ANSWER,
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    parsed.unwrap_or_else(|| {
        warn!(
            "VQA {}: answer {} is not an integer, using {}",
            slot, first, DEFAULT_ANSWER
        );
        DEFAULT_ANSWER
    })
}

/// Images selected by one VQA slot and the files they resolve to
#[derive(Debug, Clone, PartialEq)]
pub struct VqaImageSelection {
    pub slot: String,
    /// Selected image with its file name, `None` when it cannot be resolved
    pub resolved: Vec<(String, Option<String>)>,
}

/// Resolve `VQA_image_NN` selections (`image_VQA_03`) to `importData_image_VQA_03` file names
pub fn map_vqa_images(record: &RawRecord) -> Vec<VqaImageSelection> {
    VQA_IMAGE_SLOTS
        .iter()
        .filter_map(|slot| {
            let entry = record.first_entry(&format!("VQA_image_{}", slot))?;
            let selected: Vec<String> = entry
                .value
                .as_ref()
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| {
                            item.get("value")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string()
                        })
                        .collect()
                })
                .unwrap_or_default();

            let resolved = selected
                .into_iter()
                .map(|image| {
                    let file = image
                        .strip_prefix(IMAGE_SELECTION_PREFIX)
                        .and_then(|num| {
                            record.import_value(&format!("importData_image_VQA_{}", num))
                        })
                        .map(str::to_string);
                    (image, file)
                })
                .collect();

            Some(VqaImageSelection {
                slot: slot.to_string(),
                resolved,
            })
        })
        .collect()
}
