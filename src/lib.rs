//! Crowd-annotation export to video dataset converter
//!
//! This library turns raw annotation task submissions (object chains, scene
//! slots and VQA slots) into normalized dataset records, and carries the
//! auxiliary tools around that conversion: label translation, frame
//! extraction, annotation task presets and scene description cleansing.

pub mod cleansing;
pub mod config;
pub mod error;
pub mod frames;
pub mod io;
pub mod object;
pub mod pipeline;
pub mod preset;
pub mod scene;
pub mod template;
pub mod translate;
pub mod types;
pub mod utils;
pub mod vqa;

// Re-export commonly used types and functions
pub use config::{AnnotationKind, Cli, Command, ConvertArgs, TemplatePolicy};
pub use error::{FrameError, ProcessError, TranslateError};
pub use object::{extract_object_annotations, filter_chain_data, process_valid_chain_items};
pub use pipeline::{process_record, process_records, run_conversion};
pub use template::initialize_template;
pub use translate::{run_translation, BatchTranslator, TranslationProvider};
pub use types::{Annotation, ChainItem, NormalizedRecord, ProcessingStats, RawRecord, SourceGroup};
