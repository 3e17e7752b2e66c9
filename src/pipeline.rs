use log::{error, info};
use serde_json::Value;
use std::error::Error;

use crate::config::{AnnotationKind, ConvertArgs, TemplatePolicy};
use crate::error::ProcessError;
use crate::io::{load_schema, read_raw_records, write_json};
use crate::object::extract_object_annotations;
use crate::scene::extract_scene_annotations;
use crate::template::build_base_record;
use crate::types::{NormalizedRecord, ProcessingStats, RawRecord};
use crate::utils::create_progress_bar;
use crate::vqa::extract_vqa_annotations;

/// Convert one raw record. Either the whole record is built or an error is returned.
pub fn process_record(
    record: &RawRecord,
    kind: AnnotationKind,
    schema: &Value,
    policy: TemplatePolicy,
    stats: &mut ProcessingStats,
) -> Result<NormalizedRecord, ProcessError> {
    let mut template = build_base_record(schema, policy, record)?;

    let annotations = match kind {
        AnnotationKind::Object => {
            let annotations = extract_object_annotations(record, stats)?;
            stats.annotations_emitted += annotations.len();
            to_value_list(&annotations)
        }
        AnnotationKind::Scene => {
            let annotations = extract_scene_annotations(record);
            stats.annotations_emitted += annotations.len();
            to_value_list(&annotations)
        }
        AnnotationKind::Vqa => {
            let annotations = extract_vqa_annotations(record);
            stats.annotations_emitted += annotations.len();
            to_value_list(&annotations)
        }
    };
    template.insert(kind.annotation_key().to_string(), annotations);

    Ok(template)
}

fn to_value_list<T: serde::Serialize>(items: &[T]) -> Value {
    Value::Array(
        items
            .iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect(),
    )
}

/// Convert a batch of records; failed records are logged and left out
pub fn process_records(
    records: &[RawRecord],
    kind: AnnotationKind,
    schema: &Value,
    policy: TemplatePolicy,
    stats: &mut ProcessingStats,
) -> Vec<NormalizedRecord> {
    let pb = create_progress_bar(records.len() as u64, kind.name());
    let mut results = Vec::with_capacity(records.len());

    for record in records {
        stats.increment_total();
        info!("Processing record {}", record.display_id());

        // Counters of a failed record must not leak into the summary
        let mut record_stats = ProcessingStats::new();
        match process_record(record, kind, schema, policy, &mut record_stats) {
            Ok(result) => {
                merge_record_stats(stats, &record_stats);
                stats.increment_successful();
                results.push(result);
            }
            Err(e) => {
                error!("Failed to process record {}: {}", record.display_id(), e);
                stats.increment_failed();
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!("{} processing complete", kind.name()));
    results
}

fn merge_record_stats(stats: &mut ProcessingStats, record: &ProcessingStats) {
    stats.dropped_groups += record.dropped_groups;
    stats.excluded_items += record.excluded_items;
    stats.skipped_impossible += record.skipped_impossible;
    stats.annotations_emitted += record.annotations_emitted;
}

/// Main conversion pipeline: read, convert, write
pub fn run_conversion(
    args: &ConvertArgs,
    kind: AnnotationKind,
) -> Result<ProcessingStats, Box<dyn Error>> {
    let policy = args.policy_for(kind);
    info!(
        "Converting {} annotations from {} ({:?} template policy)",
        kind.name(),
        args.input.display(),
        policy
    );

    let schema = load_schema(args.schema.as_deref(), kind)?;
    let mut stats = ProcessingStats::new();
    let records = read_raw_records(&args.input, &mut stats)?;
    info!("Read and parsed {} records.", records.len());

    let results = process_records(&records, kind, &schema, policy, &mut stats);
    write_json(&args.output, &results)?;

    stats.print_summary();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::default_schema;
    use serde_json::json;

    fn object_record(data_id: i64) -> RawRecord {
        serde_json::from_value(json!({
            "dataID": data_id,
            "importData_video_file": "drama_ep_03.mp4",
            "object": { "data": [{
                "SourceValue": "frame_00010.jpg",
                "ChainId": 1,
                "ChainData": [
                    { "objectID": "o1", "value": {
                        "object_name": "의자",
                        "coords": { "tl": { "x": 1, "y": 2 } },
                        "object": { "width": 3, "height": 4 }
                    } }
                ]
            }] }
        }))
        .unwrap()
    }

    #[test]
    fn test_process_object_record() {
        let schema = default_schema(AnnotationKind::Object);
        let mut stats = ProcessingStats::new();
        let result = process_record(
            &object_record(7),
            AnnotationKind::Object,
            &schema,
            TemplatePolicy::Null,
            &mut stats,
        )
        .unwrap();

        assert_eq!(result["dataID"], json!(7));
        assert_eq!(result["video"][0]["file_name"], json!("drama_ep.mp4"));
        assert_eq!(result["clip"]["id"], json!("clip_03"));
        assert_eq!(result["object_annotation"][0]["bbox"], json!([1, 2, 3, 4]));
        assert_eq!(stats.annotations_emitted, 1);
    }

    #[test]
    fn test_failed_record_is_left_out() {
        let schema = default_schema(AnnotationKind::Object);
        let mut missing_id = object_record(1);
        missing_id.data_id = None;
        let records = vec![object_record(1), missing_id, object_record(3)];

        let mut stats = ProcessingStats::new();
        let results = process_records(
            &records,
            AnnotationKind::Object,
            &schema,
            TemplatePolicy::Null,
            &mut stats,
        );

        assert_eq!(results.len(), 2);
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.failed_records, 1);
        assert_eq!(stats.successful_records, 2);
        assert_eq!(stats.annotations_emitted, 2);
    }

    #[test]
    fn test_scene_record_uses_blank_template() {
        let schema = default_schema(AnnotationKind::Scene);
        let record: RawRecord = serde_json::from_value(json!({ "dataID": "d-1" })).unwrap();
        let mut stats = ProcessingStats::new();
        let result = process_record(
            &record,
            AnnotationKind::Scene,
            &schema,
            TemplatePolicy::Blank,
            &mut stats,
        )
        .unwrap();

        assert_eq!(result["category"], json!([]));
        assert_eq!(result["scene_annotation"].as_array().unwrap().len(), 3);
        assert!(result.get("object_annotation").is_none());
    }
}
