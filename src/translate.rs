//! Batch translation of annotation labels
//!
//! All labels of one record are sent in a single newline-joined request, so
//! newlines inside a label are flattened to spaces first. The primary provider is tried first; when it fails or echoes the input back,
//! the fallback provider gets one attempt. If both fail the labels are kept
//! untranslated.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::thread;
use std::time::Duration;

use crate::config::{AnnotationKind, TranslateArgs};
use crate::error::TranslateError;
use crate::io::{read_documents, write_json};
use crate::utils::create_progress_bar;

/// A remote service translating a batch of lines
pub trait TranslationProvider {
    fn name(&self) -> &str;

    /// Translate `texts`, returning one line per translated segment. The
    /// count may differ from the input; callers align it.
    fn translate_batch(&self, texts: &[String]) -> Result<Vec<String>, TranslateError>;
}

/// The keyless Google endpoint (`client=gtx`)
pub struct GoogleFreeProvider {
    client: reqwest::blocking::Client,
    url: String,
    source: String,
    target: String,
}

impl GoogleFreeProvider {
    pub fn new(url: &str, source: &str, target: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            url: url.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

impl TranslationProvider for GoogleFreeProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn translate_batch(&self, texts: &[String]) -> Result<Vec<String>, TranslateError> {
        let combined = texts.join("\n");
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("client", "gtx"),
                ("sl", self.source.as_str()),
                ("tl", self.target.as_str()),
                ("dt", "t"),
                ("q", combined.as_str()),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(TranslateError::Status(response.status().as_u16()));
        }
        let body: Value = response.json()?;
        split_google_response(&body)
    }
}

/// Rebuild lines from the sentence segments of a Google response.
/// A segment ending in a newline or a period closes a line.
pub fn split_google_response(body: &Value) -> Result<Vec<String>, TranslateError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::UnexpectedResponse(truncate(body)))?;

    let mut lines = Vec::new();
    let mut current = String::new();
    for sentence in sentences {
        let Some(segment) = sentence.get(0).and_then(Value::as_str) else {
            continue;
        };
        if segment.is_empty() {
            continue;
        }
        current.push_str(segment);
        if segment.ends_with('\n') || segment.ends_with('.') {
            lines.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.is_empty() {
        lines.push(current.trim().to_string());
    }
    Ok(lines)
}

/// A LibreTranslate compatible endpoint
pub struct LibreTranslateProvider {
    client: reqwest::blocking::Client,
    url: String,
    source: String,
    target: String,
}

#[derive(Serialize)]
struct LibreRequest<'a> {
    q: String,
    source: &'a str,
    target: &'a str,
}

#[derive(Deserialize)]
struct LibreResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl LibreTranslateProvider {
    pub fn new(url: &str, source: &str, target: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            url: url.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

impl TranslationProvider for LibreTranslateProvider {
    fn name(&self) -> &str {
        "libretranslate"
    }

    fn translate_batch(&self, texts: &[String]) -> Result<Vec<String>, TranslateError> {
        let request = LibreRequest {
            q: texts.join("\n"),
            source: &self.source,
            target: &self.target,
        };
        let response = self.client.post(&self.url).json(&request).send()?;

        if !response.status().is_success() {
            return Err(TranslateError::Status(response.status().as_u16()));
        }
        let body: LibreResponse = response.json()?;
        Ok(body
            .translated_text
            .split('\n')
            .map(|line| line.trim().to_string())
            .collect())
    }
}

/// Pad a short result with the originals and cut a long one to the input count
pub fn align_translations(mut translated: Vec<String>, originals: &[String]) -> Vec<String> {
    if translated.len() != originals.len() {
        warn!(
            "Translation count mismatch: {} sent, {} received",
            originals.len(),
            translated.len()
        );
    }
    while translated.len() < originals.len() {
        translated.push(originals[translated.len()].clone());
    }
    translated.truncate(originals.len());
    translated
}

pub struct BatchTranslator {
    primary: Box<dyn TranslationProvider>,
    fallback: Option<Box<dyn TranslationProvider>>,
    delay: Duration,
}

impl BatchTranslator {
    pub fn new(
        primary: Box<dyn TranslationProvider>,
        fallback: Option<Box<dyn TranslationProvider>>,
        delay: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            delay,
        }
    }

    pub fn from_args(args: &TranslateArgs) -> Self {
        Self::new(
            Box::new(GoogleFreeProvider::new(
                &args.primary_url,
                &args.source_lang,
                &args.target_lang,
            )),
            Some(Box::new(LibreTranslateProvider::new(
                &args.fallback_url,
                &args.source_lang,
                &args.target_lang,
            ))),
            args.delay(),
        )
    }

    /// Translate `texts`; untranslatable batches come back unchanged
    pub fn translate(&self, texts: &[String]) -> Vec<String> {
        if texts.is_empty() {
            return Vec::new();
        }

        let translated = self.attempt(self.primary.as_ref(), texts);
        if translated.as_deref() != Some(texts) {
            if let Some(translated) = translated {
                return translated;
            }
        }

        if let Some(fallback) = &self.fallback {
            info!("{} failed, trying {}", self.primary.name(), fallback.name());
            if let Some(translated) = self.attempt(fallback.as_ref(), texts) {
                return translated;
            }
        }
        texts.to_vec()
    }

    fn attempt(&self, provider: &dyn TranslationProvider, texts: &[String]) -> Option<Vec<String>> {
        match provider.translate_batch(texts) {
            Ok(lines) => {
                thread::sleep(self.delay);
                Some(align_translations(lines, texts))
            }
            Err(e) => {
                warn!("Batch translation with {} failed: {}", provider.name(), e);
                None
            }
        }
    }
}

/// Annotation list and the source/target fields translated for each kind
pub fn translation_fields(kind: AnnotationKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        AnnotationKind::Object => ("object_annotation", "object_name_kr", "object_name_en"),
        AnnotationKind::Scene => (
            "scene_annotation",
            "description_scene_kr",
            "description_scene_en",
        ),
        AnnotationKind::Vqa => ("VQA_annotation", "question_kr", "question_en"),
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TranslationSummary {
    pub sent: usize,
    pub translated: usize,
    pub unchanged: usize,
}

/// Translate the labels of one converted record in place
pub fn translate_document(
    document: &mut Value,
    kind: AnnotationKind,
    translator: &BatchTranslator,
) -> TranslationSummary {
    let (list_key, source_key, target_key) = translation_fields(kind);
    let mut summary = TranslationSummary::default();

    let Some(annotations) = document.get_mut(list_key).and_then(Value::as_array_mut) else {
        return summary;
    };

    let targets: Vec<usize> = annotations
        .iter()
        .enumerate()
        .filter(|(_, annotation)| {
            annotation
                .get(source_key)
                .and_then(Value::as_str)
                .is_some_and(|text| !text.is_empty())
        })
        .map(|(index, _)| index)
        .collect();
    if targets.is_empty() {
        info!("Nothing to translate");
        return summary;
    }

    let texts: Vec<String> = targets
        .iter()
        .filter_map(|&index| annotations[index].get(source_key).and_then(Value::as_str))
        .map(single_line)
        .collect();
    info!("Translating {} texts: {}", texts.len(), texts.join(", "));
    let translated = translator.translate(&texts);

    for ((&index, original), english) in targets.iter().zip(&texts).zip(translated) {
        if &english == original {
            warn!("Not translated: {}", original);
            summary.unchanged += 1;
        } else {
            info!("Translated: {} -> {}", original, english);
            summary.translated += 1;
        }
        if let Some(annotation) = annotations[index].as_object_mut() {
            annotation.insert(target_key.to_string(), Value::String(english));
        }
    }
    summary.sent = texts.len();
    summary
}

// Texts travel newline-joined, so a newline inside one would shift every later line
fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Translate every record of a converted result file
pub fn run_translation(args: &TranslateArgs) -> Result<TranslationSummary, Box<dyn Error>> {
    let mut documents = read_documents(&args.input)?;
    info!("Loaded {} records from {}", documents.len(), args.input.display());

    let translator = BatchTranslator::from_args(args);
    let pb = create_progress_bar(documents.len() as u64, "Translate");
    let mut total = TranslationSummary::default();

    for document in documents.iter_mut() {
        let summary = translate_document(document, args.kind, &translator);
        total.sent += summary.sent;
        total.translated += summary.translated;
        total.unchanged += summary.unchanged;
        pb.inc(1);
    }
    pb.finish_with_message("Translation complete");

    write_json(&args.output, &documents)?;
    info!(
        "Translated {} of {} texts ({} unchanged)",
        total.translated, total.sent, total.unchanged
    );
    Ok(total)
}

fn truncate(value: &Value) -> String {
    let text = value.to_string();
    text.chars().take(120).collect()
}
