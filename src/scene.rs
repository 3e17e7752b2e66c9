use log::debug;

use crate::types::{RawRecord, SceneAnnotation};

/// Slots that carry a scene in the raw export
pub const SCENE_SLOTS: [&str; 3] = ["01", "02", "03"];

/// One scene annotation per slot; absent slots get a placeholder id and an empty description
pub fn extract_scene_annotations(record: &RawRecord) -> Vec<SceneAnnotation> {
    SCENE_SLOTS
        .iter()
        .map(|slot| extract_scene_slot(record, slot))
        .collect()
}

fn extract_scene_slot(record: &RawRecord, slot: &str) -> SceneAnnotation {
    let scene_id = record
        .first_entry(&format!("scene_{}", slot))
        .and_then(|entry| entry.object_id_string())
        .unwrap_or_else(|| format!("scene_dataId_{}", slot));

    let description_scene_kr = record
        .first_entry(&format!("scene_description_{}", slot))
        .map(|entry| entry.value_text())
        .unwrap_or_default();

    debug!("Scene {}: {} ({} chars)", slot, scene_id, description_scene_kr.len());

    SceneAnnotation {
        scene_id,
        description_scene_kr,
        description_scene_en: String::new(),
    }
}
