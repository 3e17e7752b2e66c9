//! Annotation task presets
//!
//! A preset turns one video into the material an annotation task starts
//! from: a set of candidate frames, 12 object images and 9 VQA images spread
//! over those frames, and a metadata document naming the images and three
//! VQA types drawn from a fixed pool. The `image_VQA_NN` keys of that
//! document are what `VQA_image_NN` selections of the export refer back to.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{FrameSampling, PresetArgs};
use crate::error::FrameError;
use crate::frames::{extract_numbered_frames, frame_step, probe_video, VideoProbe};
use crate::io::write_json;

pub const OBJECT_IMAGE_COUNT: usize = 12;
pub const VQA_IMAGE_COUNT: usize = 9;
pub const VQA_TYPES_PER_VIDEO: usize = 3;

pub const VQA_TYPE_POOL: [&str; 16] = [
    "행동 순서 (Action Sequence)",
    "행동 예측 (Action Prediction)",
    "상반되는 행동 (Action Antonym)",
    "세분화된 행동 (Fine-grained Action)",
    "예상치 못한 행동 (Unexpected Action)",
    "세분화된 자세 (Fine-grained Pose)",
    "객체 존재 유무 (Object Existence)",
    "객체 상호작용 (Object Interaction)",
    "물리적 상호관계 (Physical relationship)",
    "이동 방향 (Moving Direction)",
    "행동의 시간적 위치 (Action Localization)",
    "장면 전환 (Scene Transition)",
    "객체 수 세기 (Object counting)",
    "[인지추론] 인물 시점 공간 추론 (Egocentric Navigation)",
    "[인지추론] 상황 추론 (Episodic Reasoning)",
    "[인지추론] 가정법 추론 (Counterfactual Inference)",
];

const FRAMES_DIR: &str = "extracted_frames";

/// What one video's preset produced
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub frames: Vec<String>,
    pub object_images: Vec<String>,
    pub vqa_images: Vec<String>,
    pub metadata_path: PathBuf,
}

/// Frame step for the chosen sampling
pub fn sampling_step(
    probe: &VideoProbe,
    sampling: FrameSampling,
    interval: f64,
    frames: u64,
) -> Result<u64, FrameError> {
    match sampling {
        FrameSampling::Interval => frame_step(probe.fps, interval),
        FrameSampling::Even => {
            let total = probe
                .frame_count()
                .ok_or_else(|| FrameError::FrameRate("stream reports no frame count".to_string()))?;
            Ok((total / frames).max(1))
        }
    }
}

/// Pick `count` items spread from the front to the back of `items`.
/// Fewer items than `count` are all kept.
pub fn spread_evenly<T: Clone>(items: &[T], count: usize) -> Vec<T> {
    if count == 0 || items.len() < count {
        return items.to_vec();
    }
    let step = items.len() / count;
    (0..count).map(|i| items[i * step].clone()).collect()
}

/// Copy `selected` frames to `<stem>_<tag>_<i>.jpg`, numbered from 1
pub fn copy_as(
    frames_dir: &Path,
    selected: &[String],
    out_dir: &Path,
    stem: &str,
    tag: &str,
) -> std::io::Result<Vec<String>> {
    let mut names = Vec::with_capacity(selected.len());
    for (i, frame) in selected.iter().enumerate() {
        let name = format!("{}_{}_{}.jpg", stem, tag, i + 1);
        fs::copy(frames_dir.join(frame), out_dir.join(&name))?;
        info!("Copied {} -> {}", frame, name);
        names.push(name);
    }
    Ok(names)
}

pub fn sample_vqa_types<R: Rng + ?Sized>(rng: &mut R) -> Vec<&'static str> {
    VQA_TYPE_POOL
        .choose_multiple(rng, VQA_TYPES_PER_VIDEO)
        .copied()
        .collect()
}

/// The metadata document of one preset. `image_object` holds the object
/// image list as a JSON string; the task importer expects it that way.
pub fn build_metadata(
    video_file: &str,
    object_images: &[String],
    vqa_images: &[String],
    vqa_types: &[&str],
) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("video_file".to_string(), Value::from(video_file));
    metadata.insert("scene_summary".to_string(), Value::from(""));
    metadata.insert(
        "image_object".to_string(),
        Value::from(Value::from(object_images.to_vec()).to_string()),
    );
    for (i, image) in vqa_images.iter().enumerate() {
        metadata.insert(format!("image_VQA_{:02}", i + 1), Value::from(image.as_str()));
    }
    for (i, vqa_type) in vqa_types.iter().enumerate() {
        metadata.insert(format!("VQA_type_{:02}", i + 1), Value::from(*vqa_type));
    }
    metadata
}

/// Build the preset of one video below `<out_dir>/<video file name>/`
pub fn create_preset<R: Rng + ?Sized>(
    video: &Path,
    args: &PresetArgs,
    rng: &mut R,
) -> Result<Preset, Box<dyn Error>> {
    if !video.is_file() {
        return Err(FrameError::Open(video.display().to_string()).into());
    }
    let video_file = video
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| FrameError::Open(video.display().to_string()))?;
    let stem = video
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| video_file.clone());

    let probe = probe_video(video)?;
    if let Some(duration) = probe.duration_secs() {
        if duration > args.max_duration {
            return Err(FrameError::TooLong {
                duration,
                limit: args.max_duration,
            }
            .into());
        }
    } else {
        warn!("{}: duration unknown, skipping the length check", video_file);
    }

    let video_dir = args.out_dir.join(&video_file);
    let frames_dir = video_dir.join(FRAMES_DIR);
    let step = sampling_step(&probe, args.sampling, args.interval, args.frames)?;
    info!(
        "{}: {:.2} fps, up to {} frames every {} frames",
        video_file, probe.fps, args.frames, step
    );
    let frames = extract_numbered_frames(video, &frames_dir, &stem, step, args.frames)?;
    if frames.is_empty() {
        return Err(format!("no frames could be extracted from {}", video.display()).into());
    }

    let object_images = copy_as(
        &frames_dir,
        &spread_evenly(&frames, OBJECT_IMAGE_COUNT),
        &video_dir,
        &stem,
        "O",
    )?;
    let vqa_images = copy_as(
        &frames_dir,
        &spread_evenly(&frames, VQA_IMAGE_COUNT),
        &video_dir,
        &stem,
        "V",
    )?;

    let vqa_types = sample_vqa_types(rng);
    for (i, vqa_type) in vqa_types.iter().enumerate() {
        info!("VQA_type_{:02}: {}", i + 1, vqa_type);
    }

    let metadata = build_metadata(&video_file, &object_images, &vqa_images, &vqa_types);
    let metadata_path = video_dir.join(format!("{}_metadata.json", stem));
    write_json(&metadata_path, &metadata)?;

    Ok(Preset {
        frames,
        object_images,
        vqa_images,
        metadata_path,
    })
}

/// Build the presets of every video; a failing video is logged and skipped
pub fn run_preset(args: &PresetArgs) -> Result<Vec<Preset>, Box<dyn Error>> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut presets = Vec::with_capacity(args.videos.len());
    for video in &args.videos {
        match create_preset(video, args, &mut rng) {
            Ok(preset) => {
                info!(
                    "{}: {} frames, {} object images, {} VQA images",
                    video.display(),
                    preset.frames.len(),
                    preset.object_images.len(),
                    preset.vqa_images.len()
                );
                presets.push(preset);
            }
            Err(e) => log::error!("Preset for {} failed: {}", video.display(), e),
        }
    }

    if presets.is_empty() {
        return Err("no preset could be created".into());
    }
    Ok(presets)
}
