use glob::glob;
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Free-text scene description field; the export spells it this way
pub const SCENE_DESCRIPTION_FIELD: &str = "scence_description";

/// Outcome of cleansing one raw export line
#[derive(Debug, Clone, PartialEq)]
pub struct LineReport {
    pub data_id: Option<String>,
    pub newlines_removed: usize,
}

/// Replace newlines in every description value with spaces.
/// Returns how many newlines were replaced.
pub fn remove_description_newlines(record: &mut Value) -> usize {
    let Some(items) = record
        .get_mut(SCENE_DESCRIPTION_FIELD)
        .and_then(|field| field.get_mut("data"))
        .and_then(Value::as_array_mut)
    else {
        return 0;
    };

    let mut removed = 0;
    for item in items.iter_mut() {
        if let Some(Value::String(text)) = item.get_mut("value") {
            let count = text.matches('\n').count();
            if count > 0 {
                *text = text.replace('\n', " ");
                removed += count;
            }
        }
    }
    removed
}

/// Cleanse newline-delimited export content. Lines that do not parse are kept
/// verbatim; empty lines are dropped.
pub fn cleanse_content(content: &str) -> (String, Vec<LineReport>) {
    let mut lines = Vec::new();
    let mut reports = Vec::new();

    for line in content.trim().lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(mut record) => {
                let newlines_removed = remove_description_newlines(&mut record);
                let data_id = record.get("dataID").map(|id| match id {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                });
                lines.push(record.to_string());
                reports.push(LineReport {
                    data_id,
                    newlines_removed,
                });
            }
            Err(e) => {
                warn!("Keeping unparsable line as is: {}", e);
                lines.push(line.to_string());
            }
        }
    }

    (lines.join("\n"), reports)
}

/// Rewrite one export file in place
pub fn cleanse_file(path: &Path) -> Result<Vec<LineReport>, Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    let (cleansed, reports) = cleanse_content(&content);
    fs::write(path, cleansed)?;
    Ok(reports)
}

/// Cleanse every `*.json` file below `dir`. Returns the files that were rewritten.
pub fn cleanse_directory(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if !dir.is_dir() {
        return Err(format!("Directory does not exist: {}", dir.display()).into());
    }
    info!("Cleansing {}", dir.display());

    let pattern = format!("{}/**/*.json", dir.display());
    let mut cleansed = Vec::new();
    for path in glob(&pattern)?.filter_map(Result::ok) {
        match cleanse_file(&path) {
            Ok(reports) => {
                for report in &reports {
                    info!(
                        "  {} dataID: {} ({} newlines replaced)",
                        path.file_name().unwrap_or_default().to_string_lossy(),
                        report.data_id.as_deref().unwrap_or("N/A"),
                        report.newlines_removed
                    );
                }
                cleansed.push(path);
            }
            Err(e) => error!("Failed to cleanse {}: {}", path.display(), e),
        }
    }
    Ok(cleansed)
}
