use log::{debug, error, info, warn};
use serde_json::Value;

use crate::error::ProcessError;
use crate::types::{
    Annotation, ChainItem, ObjectSize, ProcessingStats, RawRecord, SourceGroup,
    ADDITIONAL_WORK_IMPOSSIBLE, WORK_EXCLUDED_IMAGE,
};

/// A source group with this many unworkable objects is dropped entirely
pub const IMPOSSIBLE_GROUP_LIMIT: usize = 5;

/// Result of filtering the chain of one source group
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChainFilterOutcome {
    /// Retained items in input order, unworkable ones included
    pub valid_items: Vec<ChainItem>,
    pub impossible_count: usize,
    pub excluded_items: Vec<ChainItem>,
}

impl ChainFilterOutcome {
    pub fn exceeds_limit(&self) -> bool {
        self.impossible_count >= IMPOSSIBLE_GROUP_LIMIT
    }
}

/// Drop work-excluded items and count the unworkable ones.
///
/// Unworkable items are counted *and* retained; the extractor drops them later.
pub fn filter_chain_data(chain_data: &[ChainItem]) -> ChainFilterOutcome {
    let mut outcome = ChainFilterOutcome::default();

    info!("Filtering chain data ({} items)", chain_data.len());

    for (i, chain_item) in chain_data.iter().enumerate() {
        let Some(value) = &chain_item.value else {
            error!("Chain item {} has no `value` field", i + 1);
            continue;
        };
        let object_id = chain_item.object_id_string();
        debug!("ObjectID: {}, Object Name: {}", object_id, value.object_name);

        let excluded_label = value
            .label()
            .filter(|label| label.contains(WORK_EXCLUDED_IMAGE));
        if let Some(label) = excluded_label {
            warn!("Work-excluded image - ObjectID: {} (label: {})", object_id, label);
            outcome.excluded_items.push(chain_item.clone());
            continue;
        }

        if value.object_name.contains(ADDITIONAL_WORK_IMPOSSIBLE) {
            outcome.impossible_count += 1;
            warn!("Unworkable object - ObjectID: {}", object_id);
        }
        outcome.valid_items.push(chain_item.clone());
    }

    info!(
        "Filter result - total: {}, excluded: {}, unworkable: {}, retained: {}",
        chain_data.len(),
        outcome.excluded_items.len(),
        outcome.impossible_count,
        outcome.valid_items.len()
    );

    outcome
}

/// Output of the extractor for one source group
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub annotations: Vec<Annotation>,
    pub skipped: usize,
    /// Running frame number after this group. Inert: nothing writes it to
    /// `image_frame` yet.
    pub frame_counter: usize,
}

/// Turn retained chain items into flat annotations for `source_image`
pub fn process_valid_chain_items(
    valid_items: &[ChainItem],
    source_image: &str,
    frame_counter: usize,
) -> Result<Extraction, ProcessError> {
    let mut extraction = Extraction {
        frame_counter,
        ..Default::default()
    };

    for chain_item in valid_items {
        let Some(value) = &chain_item.value else {
            continue;
        };
        let object_id = chain_item.object_id_string();

        if value.object_name.contains(ADDITIONAL_WORK_IMPOSSIBLE) {
            warn!("Skipping unworkable object - ObjectID: {}", object_id);
            extraction.skipped += 1;
            continue;
        }

        let bbox = match &value.coords {
            Some(coords) => bounding_box(coords, value.object.as_ref(), &object_id)?,
            None => {
                warn!("No coords - ObjectID: {}", object_id);
                Vec::new()
            }
        };

        if chain_item.object_id.is_none() {
            warn!(
                "Object {:?} in {} has no objectID; writing null",
                value.object_name, source_image
            );
        }

        extraction.annotations.push(Annotation {
            image_id: source_image.to_string(),
            object_id: chain_item.object_id.clone().unwrap_or_default(),
            image_frame: String::new(),
            object_name_kr: value.object_name.clone(),
            object_name_en: String::new(),
            bbox,
        });
        extraction.frame_counter += 1;
    }

    info!(
        "Extracted {} annotations, skipped {}",
        extraction.annotations.len(),
        extraction.skipped
    );

    Ok(extraction)
}

// `[tl.x, tl.y, width, height]`, values copied from the payload as they are
fn bounding_box(
    coords: &Value,
    size: Option<&ObjectSize>,
    object_id: &str,
) -> Result<Vec<Value>, ProcessError> {
    let missing = |field: &'static str| ProcessError::MissingBoxField {
        object_id: object_id.to_string(),
        field,
    };
    let top_left = coords.get("tl");
    let x = top_left.and_then(|tl| tl.get("x")).ok_or_else(|| missing("coords.tl.x"))?;
    let y = top_left.and_then(|tl| tl.get("y")).ok_or_else(|| missing("coords.tl.y"))?;
    let width = size
        .and_then(|size| size.width.as_ref())
        .ok_or_else(|| missing("object.width"))?;
    let height = size
        .and_then(|size| size.height.as_ref())
        .ok_or_else(|| missing("object.height"))?;
    Ok(vec![x.clone(), y.clone(), width.clone(), height.clone()])
}

/// Filter and extract one source group. Returns `None` when the group is dropped.
pub fn process_source_group(
    group: &SourceGroup,
    frame_counter: usize,
    stats: &mut ProcessingStats,
) -> Result<Option<Extraction>, ProcessError> {
    let Some(chain_data) = &group.chain_data else {
        warn!("SourceValue {} has no ChainData", group.source_value);
        return Ok(None);
    };

    let outcome = filter_chain_data(chain_data);
    stats.excluded_items += outcome.excluded_items.len();

    if outcome.exceeds_limit() {
        warn!(
            "{} unworkable objects in {}; dropping the whole source group",
            outcome.impossible_count, group.source_value
        );
        stats.dropped_groups += 1;
        return Ok(None);
    }

    let extraction =
        process_valid_chain_items(&outcome.valid_items, &group.source_value, frame_counter)?;
    stats.skipped_impossible += extraction.skipped;
    Ok(Some(extraction))
}

/// Build the `object_annotation` list of one record
pub fn extract_object_annotations(
    record: &RawRecord,
    stats: &mut ProcessingStats,
) -> Result<Vec<Annotation>, ProcessError> {
    let groups = record.object_groups()?;
    let mut annotations = Vec::new();
    let mut frame_counter = 1;

    info!("Processing {} source groups", groups.len());

    for (i, group) in groups.iter().enumerate() {
        debug!(
            "SourceValue {}: {} (ChainId: {})",
            i + 1,
            group.source_value,
            group
                .chain_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default()
        );

        if let Some(extraction) = process_source_group(group, frame_counter, stats)? {
            frame_counter = extraction.frame_counter;
            annotations.extend(extraction.annotations);
        }
    }

    info!("Total annotations for record: {}", annotations.len());
    Ok(annotations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str, name: &str) -> ChainItem {
        serde_json::from_value(json!({
            "objectID": id,
            "value": {
                "object_name": name,
                "coords": { "tl": { "x": 10, "y": 20 } },
                "object": { "width": 30, "height": 40 }
            }
        }))
        .unwrap()
    }

    fn excluded(id: &str) -> ChainItem {
        serde_json::from_value(json!({
            "objectID": id,
            "value": {
                "object_name": "의자",
                "extra": { "label": "작업제외이미지", "value": "object" }
            }
        }))
        .unwrap()
    }

    fn impossible(id: &str) -> ChainItem {
        item(id, "추가 작업 불가")
    }

    #[test]
    fn test_filter_excludes_and_counts() {
        let chain = vec![
            item("1", "의자"),
            excluded("2"),
            impossible("3"),
            item("4", "책상"),
        ];
        let outcome = filter_chain_data(&chain);

        assert_eq!(outcome.impossible_count, 1);
        assert_eq!(outcome.excluded_items.len(), 1);
        let ids: Vec<_> = outcome
            .valid_items
            .iter()
            .map(ChainItem::object_id_string)
            .collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
    }

    #[test]
    fn test_filter_excluded_impossible_is_not_counted() {
        let chain: Vec<ChainItem> = vec![serde_json::from_value(json!({
            "objectID": "9",
            "value": {
                "object_name": "추가 작업 불가",
                "extra": { "label": ["작업제외이미지"] }
            }
        }))
        .unwrap()];
        let outcome = filter_chain_data(&chain);
        assert_eq!(outcome.impossible_count, 0);
        assert!(outcome.valid_items.is_empty());
    }

    #[test]
    fn test_filter_skips_items_without_value() {
        let chain: Vec<ChainItem> = vec![
            serde_json::from_value(json!({ "objectID": "1" })).unwrap(),
            item("2", "의자"),
        ];
        let outcome = filter_chain_data(&chain);
        assert_eq!(outcome.valid_items.len(), 1);
        assert_eq!(outcome.impossible_count, 0);
        assert!(outcome.excluded_items.is_empty());
    }

    #[test]
    fn test_extractor_drops_impossible_and_builds_bbox() {
        let items = vec![item("1", "의자"), impossible("2"), item("3", "책상")];
        let extraction = process_valid_chain_items(&items, "frame_00001.jpg", 1).unwrap();

        assert_eq!(extraction.annotations.len(), 2);
        assert_eq!(extraction.skipped, 1);
        assert_eq!(extraction.frame_counter, 3);

        let first = &extraction.annotations[0];
        assert_eq!(first.image_id, "frame_00001.jpg");
        assert_eq!(first.object_id, json!("1"));
        assert_eq!(first.object_name_kr, "의자");
        assert_eq!(first.object_name_en, "");
        assert_eq!(first.image_frame, "");
        assert_eq!(first.bbox, vec![json!(10), json!(20), json!(30), json!(40)]);
    }

    #[test]
    fn test_bbox_empty_without_coords() {
        let items: Vec<ChainItem> = vec![serde_json::from_value(json!({
            "objectID": 5,
            "value": { "object_name": "나무", "object": { "width": 3, "height": 4 } }
        }))
        .unwrap()];
        let extraction = process_valid_chain_items(&items, "a.jpg", 1).unwrap();
        assert!(extraction.annotations[0].bbox.is_empty());
        assert_eq!(extraction.annotations[0].object_id, json!(5));
    }

    #[test]
    fn test_coords_without_size_is_an_error() {
        let items: Vec<ChainItem> = vec![serde_json::from_value(json!({
            "objectID": "7",
            "value": { "object_name": "나무", "coords": { "tl": { "x": 1.5, "y": 2 } } }
        }))
        .unwrap()];
        let result = process_valid_chain_items(&items, "a.jpg", 1);
        assert!(matches!(
            result,
            Err(ProcessError::MissingBoxField { field: "object.width", .. })
        ));
    }

    #[test]
    fn test_coords_without_top_left_is_an_error() {
        let items: Vec<ChainItem> = vec![serde_json::from_value(json!({
            "objectID": "8",
            "value": { "object_name": "나무", "coords": {}, "object": { "width": 1, "height": 1 } }
        }))
        .unwrap()];
        let result = process_valid_chain_items(&items, "a.jpg", 1);
        assert!(matches!(
            result,
            Err(ProcessError::MissingBoxField { field: "coords.tl.x", .. })
        ));
    }

    #[test]
    fn test_bbox_values_copied_verbatim() {
        let items: Vec<ChainItem> = vec![serde_json::from_value(json!({
            "objectID": "9",
            "value": {
                "object_name": "컵",
                "coords": { "tl": { "x": 1.5, "y": "2" } },
                "object": { "width": "30", "height": 40.25 }
            }
        }))
        .unwrap()];
        let extraction = process_valid_chain_items(&items, "a.jpg", 1).unwrap();
        assert_eq!(extraction.annotations[0].bbox, vec![json!(1.5), json!("2"), json!("30"), json!(40.25)]);
    }

    #[test]
    fn test_item_without_object_id_is_emitted_with_null() {
        let items: Vec<ChainItem> = vec![serde_json::from_value(json!({
            "value": { "object_name": "의자" }
        }))
        .unwrap()];
        let extraction = process_valid_chain_items(&items, "a.jpg", 1).unwrap();
        assert_eq!(extraction.annotations.len(), 1);
        assert_eq!(extraction.annotations[0].object_id, Value::Null);
    }

    #[test]
    fn test_odd_fields_on_dropped_items_are_tolerated() {
        let record: RawRecord = serde_json::from_value(json!({
            "dataID": 1,
            "object": { "data": [{
                "SourceValue": "img_002.jpg",
                "ChainData": [
                    { "objectID": "a", "value": {
                        "object_name": "의자",
                        "coords": { "tl": { "x": 1, "y": 2 } },
                        "object": { "width": "30", "height": 40 },
                        "extra": { "label": [null, "object"] }
                    } },
                    { "objectID": "b", "value": {
                        "object_name": "사람",
                        "coords": {},
                        "object": "n/a",
                        "extra": { "label": "작업제외이미지" }
                    } },
                    { "objectID": "c", "value": {
                        "object_name": "추가 작업 불가",
                        "coords": { "tl": null },
                        "extra": { "label": 3 }
                    } },
                    { "objectID": "d", "value": "broken" }
                ]
            }] }
        }))
        .unwrap();

        let mut stats = ProcessingStats::new();
        let annotations = extract_object_annotations(&record, &mut stats).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].object_id, json!("a"));
        assert_eq!(annotations[0].bbox, vec![json!(1), json!(2), json!("30"), json!(40)]);
        assert_eq!(stats.excluded_items, 1);
        assert_eq!(stats.skipped_impossible, 1);
    }

    #[test]
    fn test_label_list_with_null_still_matches_marker() {
        let chain: Vec<ChainItem> = vec![serde_json::from_value(json!({
            "objectID": "1",
            "value": { "object_name": "컵", "extra": { "label": [null, "작업제외이미지"] } }
        }))
        .unwrap()];
        let outcome = filter_chain_data(&chain);
        assert_eq!(outcome.excluded_items.len(), 1);
        assert!(outcome.valid_items.is_empty());
    }

    #[test]
    fn test_group_dropped_at_limit() {
        let mut chain: Vec<ChainItem> = (0..5).map(|i| impossible(&i.to_string())).collect();
        chain.push(item("normal", "의자"));
        let group = SourceGroup {
            source_value: "frame.jpg".to_string(),
            chain_id: Some(json!(1)),
            chain_data: Some(chain),
        };
        let mut stats = ProcessingStats::new();
        let result = process_source_group(&group, 1, &mut stats).unwrap();
        assert!(result.is_none());
        assert_eq!(stats.dropped_groups, 1);
    }

    #[test]
    fn test_group_below_limit_keeps_normal_items() {
        let mut chain: Vec<ChainItem> = (0..4).map(|i| impossible(&i.to_string())).collect();
        chain.push(item("normal", "의자"));
        let group = SourceGroup {
            source_value: "frame.jpg".to_string(),
            chain_id: None,
            chain_data: Some(chain),
        };
        let mut stats = ProcessingStats::new();
        let extraction = process_source_group(&group, 1, &mut stats)
            .unwrap()
            .unwrap();
        assert_eq!(extraction.annotations.len(), 1);
        assert_eq!(extraction.annotations[0].object_id, json!("normal"));
        assert_eq!(stats.skipped_impossible, 4);
    }

    #[test]
    fn test_record_with_excluded_items() {
        let record: RawRecord = serde_json::from_value(json!({
            "dataID": 1,
            "object": { "data": [{
                "SourceValue": "img_001.jpg",
                "ChainId": 10,
                "ChainData": [
                    item_json("a", "의자"),
                    item_json("b", "책상"),
                    excluded_json("c"),
                    item_json("d", "컵"),
                    excluded_json("e")
                ]
            }] }
        }))
        .unwrap();

        let mut stats = ProcessingStats::new();
        let annotations = extract_object_annotations(&record, &mut stats).unwrap();
        assert_eq!(annotations.len(), 3);
        assert!(annotations.iter().all(|a| a.image_id == "img_001.jpg"));
        assert_eq!(stats.excluded_items, 2);
    }

    #[test]
    fn test_record_without_object_field() {
        let record: RawRecord = serde_json::from_value(json!({ "dataID": 1 })).unwrap();
        let mut stats = ProcessingStats::new();
        assert!(extract_object_annotations(&record, &mut stats)
            .unwrap()
            .is_empty());
    }

    fn item_json(id: &str, name: &str) -> serde_json::Value {
        json!({ "objectID": id, "value": { "object_name": name } })
    }

    fn excluded_json(id: &str) -> serde_json::Value {
        json!({ "objectID": id, "value": { "object_name": "x", "extra": { "label": "작업제외이미지" } } })
    }
}
