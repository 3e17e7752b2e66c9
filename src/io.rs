use log::{error, info};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::AnnotationKind;
use crate::template::default_schema;
use crate::types::{ProcessingStats, RawRecord};
use crate::utils::{create_parent_directory, parse_json_documents};

/// Read a raw export into typed records. Documents that do not fit the
/// record shape are logged and counted as malformed.
pub fn read_raw_records(
    path: &Path,
    stats: &mut ProcessingStats,
) -> Result<Vec<RawRecord>, Box<dyn Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let records = parse_json_documents(&content, stats)
        .into_iter()
        .enumerate()
        .filter_map(|(index, document)| match serde_json::from_value(document) {
            Ok(record) => Some(record),
            Err(e) => {
                error!("Record {} does not look like an export record: {}", index + 1, e);
                stats.increment_skipped_malformed();
                None
            }
        })
        .collect();

    Ok(records)
}

/// Read JSON documents produced by an earlier conversion
pub fn read_documents(path: &Path) -> Result<Vec<Value>, Box<dyn Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let document: Value = serde_json::from_str(&content)
        .map_err(|e| format!("{} is not a valid JSON document: {}", path.display(), e))?;
    Ok(match document {
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Load the format document, falling back to the built-in one for `kind`
pub fn load_schema(path: Option<&Path>, kind: AnnotationKind) -> Result<Value, Box<dyn Error>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| format!("Failed to open schema {}: {}", path.display(), e))?;
            let schema = serde_json::from_reader(file)
                .map_err(|e| format!("Failed to parse schema {}: {}", path.display(), e))?;
            info!("Loaded schema from {}", path.display());
            Ok(schema)
        }
        None => Ok(default_schema(kind)),
    }
}

/// Write `value` as pretty-printed JSON; non-ASCII text is kept as is
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    create_parent_directory(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}
