use serde_json::{json, Value};
use std::fs;
use std::path::Path;

use crowd2dataset::config::ConvertArgs;
use crowd2dataset::template::default_schema;
use crowd2dataset::{
    initialize_template, process_record, run_conversion, AnnotationKind, ProcessingStats,
    RawRecord, TemplatePolicy,
};

fn chain_item(id: &str, name: &str) -> Value {
    json!({
        "objectID": id,
        "value": {
            "object_name": name,
            "coords": { "tl": { "x": 12, "y": 34 }, "br": { "x": 62, "y": 94 } },
            "object": { "width": 50, "height": 60 },
            "extra": { "value": "object" }
        }
    })
}

fn excluded_item(id: &str) -> Value {
    json!({
        "objectID": id,
        "value": {
            "object_name": "사람",
            "extra": { "label": "작업제외이미지", "value": "exclude" }
        }
    })
}

fn raw_record(data_id: i64, chain: Vec<Value>) -> Value {
    json!({
        "dataID": data_id,
        "importData_video_file": "show_ep_12.mp4",
        "object": { "data": [{
            "SourceValue": "show_ep_12_frame_00003.jpg",
            "ChainId": 77,
            "ChainData": chain
        }] }
    })
}

fn write_ndjson(path: &Path, records: &[Value]) {
    let lines: Vec<String> = records.iter().map(Value::to_string).collect();
    fs::write(path, lines.join("\n")).unwrap();
}

#[test]
fn test_excluded_items_yield_three_annotations() {
    let record: RawRecord = serde_json::from_value(raw_record(
        1,
        vec![
            chain_item("a", "의자"),
            excluded_item("b"),
            chain_item("c", "책상"),
            excluded_item("d"),
            chain_item("e", "컵"),
        ],
    ))
    .unwrap();

    let mut stats = ProcessingStats::new();
    let result = process_record(
        &record,
        AnnotationKind::Object,
        &default_schema(AnnotationKind::Object),
        TemplatePolicy::Null,
        &mut stats,
    )
    .unwrap();

    let annotations = result["object_annotation"].as_array().unwrap();
    assert_eq!(annotations.len(), 3);
    for annotation in annotations {
        assert_eq!(annotation["image_id"], json!("show_ep_12_frame_00003.jpg"));
        assert_eq!(annotation["bbox"], json!([12, 34, 50, 60]));
        assert_eq!(annotation["object_name_en"], json!(""));
    }
}

#[test]
fn test_five_unworkable_items_drop_the_group() {
    let mut chain: Vec<Value> = (0..5)
        .map(|i| chain_item(&format!("x{}", i), "추가 작업 불가 (가려짐)"))
        .collect();
    chain.push(chain_item("ok", "의자"));
    let record: RawRecord = serde_json::from_value(raw_record(2, chain)).unwrap();

    let mut stats = ProcessingStats::new();
    let result = process_record(
        &record,
        AnnotationKind::Object,
        &default_schema(AnnotationKind::Object),
        TemplatePolicy::Null,
        &mut stats,
    )
    .unwrap();

    assert_eq!(result["object_annotation"], json!([]));
    assert_eq!(stats.dropped_groups, 1);
}

#[test]
fn test_four_unworkable_items_are_skipped_individually() {
    let mut chain: Vec<Value> = (0..4)
        .map(|i| chain_item(&format!("x{}", i), "추가 작업 불가"))
        .collect();
    chain.push(chain_item("ok", "의자"));
    let record: RawRecord = serde_json::from_value(raw_record(3, chain)).unwrap();

    let mut stats = ProcessingStats::new();
    let result = process_record(
        &record,
        AnnotationKind::Object,
        &default_schema(AnnotationKind::Object),
        TemplatePolicy::Null,
        &mut stats,
    )
    .unwrap();

    let annotations = result["object_annotation"].as_array().unwrap();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0]["object_id"], json!("ok"));
}

#[test]
fn test_template_matches_schema_shape() {
    let schema = json!({
        "dataID": 1,
        "video": [{ "id": "v", "width": 1920 }],
        "clip": { "id": "c", "fps": 30 }
    });

    let blank = initialize_template(&schema, TemplatePolicy::Blank);
    assert_eq!(blank, json!({ "dataID": "", "video": [], "clip": { "id": "", "fps": "" } }));

    let null = initialize_template(&schema, TemplatePolicy::Null);
    assert_eq!(
        null,
        json!({ "dataID": null, "video": [{ "id": null, "width": null }], "clip": { "id": null, "fps": null } })
    );
}

#[test]
fn test_run_object_conversion_end_to_end() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("raw.json");
    let output = temp_dir.path().join("result/result.json");

    let missing_id = json!({ "importData_video_file": "a_1.mp4" });
    write_ndjson(
        &input,
        &[
            raw_record(10, vec![chain_item("a", "의자")]),
            missing_id,
            raw_record(11, vec![chain_item("b", "책상"), excluded_item("c")]),
        ],
    );
    fs::write(
        &input,
        format!("{}\nthis is not json\n", fs::read_to_string(&input).unwrap()),
    )
    .unwrap();

    let args = ConvertArgs {
        input,
        output: output.clone(),
        schema: None,
        template_policy: None,
    };
    let stats = run_conversion(&args, AnnotationKind::Object).unwrap();
    assert_eq!(stats.successful_records, 2);
    assert_eq!(stats.failed_records, 1);
    assert_eq!(stats.skipped_malformed, 1);

    let content = fs::read_to_string(&output).unwrap();
    assert!(content.contains("\"object_name_kr\": \"의자\""));
    let results: Value = serde_json::from_str(&content).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["dataID"], json!(10));
    assert_eq!(results[0]["category"], json!([null]));
    assert_eq!(results[0]["video"][0]["file_name"], json!("show_ep.mp4"));
    assert_eq!(results[0]["clip"]["id"], json!("clip_12"));
    assert_eq!(results[1]["object_annotation"].as_array().unwrap().len(), 1);
}

#[test]
fn test_run_vqa_conversion_with_schema_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("raw.json");
    let schema = temp_dir.path().join("format.txt");
    let output = temp_dir.path().join("vqa_result.json");

    fs::write(
        &schema,
        json!({
            "dataID": 0, "dataset_name": "", "version": "", "year": "",
            "category": [], "subject": [],
            "video": [], "clip": {}, "VQA_annotation": [{ "image_id": "" }]
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        &input,
        json!({
            "dataID": "vqa-1",
            "VQA_question_02": { "data": [{ "objectID": "q2", "value": "몇 명?" }] },
            "VQA_question_021": { "data": [{ "value": "1명" }] },
            "VQA_question_022": { "data": [{ "value": "2명" }] },
            "VQA_question_023": { "data": [{ "value": "3명" }] },
            "VQA_answer_02": { "data": [{ "objectID": "a2", "value": [{ "value": "2" }] }] }
        })
        .to_string(),
    )
    .unwrap();

    let args = ConvertArgs {
        input,
        output: output.clone(),
        schema: Some(schema),
        template_policy: None,
    };
    run_conversion(&args, AnnotationKind::Vqa).unwrap();

    let results: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let vqa = &results[0]["VQA_annotation"];
    assert_eq!(vqa.as_array().unwrap().len(), 3);
    assert_eq!(vqa[1]["question_kr"], json!("몇 명?,1명,2명,3명"));
    assert_eq!(vqa[1]["answer"], json!(2));
    assert_eq!(vqa[0]["question_id"], json!("question_dataId_01"));
    assert_eq!(results[0]["category"], json!([]));
}
