use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_INPUT: &str = "data/raw_data/input.json";
pub const DEFAULT_OUTPUT: &str = "data/result/result.json";
pub const DEFAULT_TRANSLATED_OUTPUT: &str = "data/result/result_translated_batch.json";
pub const DEFAULT_FRAMES_DIR: &str = "frames_2s";
pub const DEFAULT_CLEANSING_DIR: &str = "data/cleansing_data";
pub const DEFAULT_PRESET_DIR: &str = "preset_data";

pub const GOOGLE_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";
pub const LIBRE_TRANSLATE_URL: &str = "https://libretranslate.de/translate";

/// Converts crowd-annotation exports into the normalized video dataset schema.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Cli {
    /// Also write the log to a timestamped file inside this directory
    #[arg(long = "log_dir", global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build object annotations from object chains
    Object(ConvertArgs),
    /// Build scene annotations from scene slots
    Scene(ConvertArgs),
    /// Build VQA annotations from question/answer slots
    Vqa(ConvertArgs),
    /// Translate Korean labels of a converted result to English
    Translate(TranslateArgs),
    /// Save one video frame every N seconds
    Frames(FramesArgs),
    /// Replace newlines in raw scene descriptions, in place
    Cleanse(CleanseArgs),
    /// Report which image files the VQA image selections refer to
    VqaImages(VqaImagesArgs),
    /// Prepare the object/VQA images and metadata an annotation task is seeded with
    Preset(PresetArgs),
}

/// Arguments shared by the object, scene and VQA conversions.
#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Raw export: newline-delimited JSON or a single JSON document
    #[arg(short = 'i', long = "input", default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Where the converted batch is written
    #[arg(short = 'o', long = "output", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Format document describing the output shape; a built-in one is used when absent
    #[arg(long = "schema")]
    pub schema: Option<PathBuf>,

    /// How empty leaves of the schema are initialized
    #[arg(long = "template_policy", value_enum)]
    pub template_policy: Option<TemplatePolicy>,
}

#[derive(Args, Debug, Clone)]
pub struct TranslateArgs {
    /// Converted result to translate
    #[arg(short = 'i', long = "input", default_value = DEFAULT_OUTPUT)]
    pub input: PathBuf,

    /// Where the translated result is written
    #[arg(short = 'o', long = "output", default_value = DEFAULT_TRANSLATED_OUTPUT)]
    pub output: PathBuf,

    /// Which annotation list of the result is translated
    #[arg(long = "kind", value_enum, default_value = "object")]
    pub kind: AnnotationKind,

    #[arg(long = "primary_url", default_value = GOOGLE_TRANSLATE_URL)]
    pub primary_url: String,

    #[arg(long = "fallback_url", default_value = LIBRE_TRANSLATE_URL)]
    pub fallback_url: String,

    #[arg(long = "source_lang", default_value = "ko")]
    pub source_lang: String,

    #[arg(long = "target_lang", default_value = "en")]
    pub target_lang: String,

    /// Pause after every successful request, in milliseconds
    #[arg(long = "delay_ms", default_value_t = 1000)]
    pub delay_ms: u64,
}

impl TranslateArgs {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct FramesArgs {
    /// Video file to sample
    pub video: PathBuf,

    /// Directory the frames are written to
    #[arg(short = 'o', long = "out", default_value = DEFAULT_FRAMES_DIR)]
    pub out_dir: PathBuf,

    /// Seconds between two saved frames
    #[arg(short = 't', long = "interval", default_value_t = 2.0, value_parser = validate_interval)]
    pub interval: f64,
}

#[derive(Args, Debug, Clone)]
pub struct CleanseArgs {
    /// Directory searched recursively for raw *.json exports
    #[arg(short = 'd', long = "dir", default_value = DEFAULT_CLEANSING_DIR)]
    pub dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct VqaImagesArgs {
    /// Raw export: newline-delimited JSON or a single JSON document
    #[arg(short = 'i', long = "input", default_value = DEFAULT_INPUT)]
    pub input: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct PresetArgs {
    /// Video files to prepare
    #[arg(required = true)]
    pub videos: Vec<PathBuf>,

    /// Each video gets a `<file name>/` directory below this one
    #[arg(short = 'o', long = "out", default_value = DEFAULT_PRESET_DIR)]
    pub out_dir: PathBuf,

    /// How candidate frames are picked from the video
    #[arg(long = "sampling", value_enum, default_value = "interval")]
    pub sampling: FrameSampling,

    /// Seconds between two candidate frames with `--sampling interval`
    #[arg(short = 't', long = "interval", default_value_t = 2.0, value_parser = validate_interval)]
    pub interval: f64,

    /// Upper bound on candidate frames
    #[arg(long = "frames", default_value_t = 45, value_parser = clap::value_parser!(u64).range(1..))]
    pub frames: u64,

    /// Longer videos are rejected, in seconds
    #[arg(long = "max_duration", default_value_t = 280.0, value_parser = validate_interval)]
    pub max_duration: f64,

    /// Seed for the VQA type draw; drawn from entropy when absent
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

// How preset candidate frames are spread over a video
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum FrameSampling {
    /// One frame every `--interval` seconds from the start
    Interval,
    /// `--frames` frames spread over the whole video
    Even,
}

/// The annotation list a conversion produces.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum AnnotationKind {
    Object,
    Scene,
    Vqa,
}

impl AnnotationKind {
    /// Key of the annotation list in the normalized record
    pub fn annotation_key(self) -> &'static str {
        match self {
            AnnotationKind::Object => "object_annotation",
            AnnotationKind::Scene => "scene_annotation",
            AnnotationKind::Vqa => "VQA_annotation",
        }
    }

    pub fn default_policy(self) -> TemplatePolicy {
        match self {
            AnnotationKind::Object => TemplatePolicy::Null,
            AnnotationKind::Scene | AnnotationKind::Vqa => TemplatePolicy::Blank,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AnnotationKind::Object => "object",
            AnnotationKind::Scene => "scene",
            AnnotationKind::Vqa => "vqa",
        }
    }
}

// How empty schema leaves are initialized
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum TemplatePolicy {
    /// Scalars become "" and sequences become []
    Blank,
    /// Scalars become null and sequence elements are initialized recursively
    Null,
}

impl ConvertArgs {
    pub fn policy_for(&self, kind: AnnotationKind) -> TemplatePolicy {
        self.template_policy.unwrap_or_else(|| kind.default_policy())
    }
}

// Intervals and durations have to be a positive, finite number of seconds
fn validate_interval(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() && val > 0.0 => Ok(val),
        _ => Err("must be a positive number of seconds".to_string()),
    }
}
