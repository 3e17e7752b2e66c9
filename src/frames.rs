use glob::{glob, Pattern};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::error::FrameError;

/// Stream properties reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProbe {
    pub fps: f64,
    pub total_frames: Option<u64>,
    pub duration: Option<f64>,
}

impl VideoProbe {
    /// Frame count, estimated from the duration when the container has none
    pub fn frame_count(&self) -> Option<u64> {
        self.total_frames
            .or_else(|| self.duration.map(|seconds| (seconds * self.fps).round() as u64))
    }

    /// Length in seconds, estimated from the frame count when the stream has none
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration
            .or_else(|| self.total_frames.map(|frames| frames as f64 / self.fps))
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Parse an ffprobe rate such as `30000/1001` or `25`
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Number of frames between two saved frames
pub fn frame_step(fps: f64, interval: f64) -> Result<u64, FrameError> {
    let step = (fps * interval).floor();
    if step < 1.0 {
        return Err(FrameError::StepTooSmall { fps, interval });
    }
    Ok(step as u64)
}

/// How many frames a video of `total_frames` yields, frame 0 included
pub fn expected_frame_count(total_frames: u64, step: u64) -> u64 {
    total_frames.div_ceil(step)
}

pub fn frame_file_name(index: u64) -> String {
    format!("frame_{:05}.jpg", index)
}

fn parse_probe_output(stdout: &[u8]) -> Result<VideoProbe, FrameError> {
    let output: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| FrameError::FrameRate(format!("unreadable ffprobe output: {}", e)))?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| FrameError::FrameRate("no video stream".to_string()))?;

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| FrameError::FrameRate("stream reports no frame rate".to_string()))?;
    let total_frames = stream.nb_frames.and_then(|n| n.parse().ok());
    let duration = stream
        .duration
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(VideoProbe {
        fps,
        total_frames,
        duration,
    })
}

pub fn probe_video(video: &Path) -> Result<VideoProbe, FrameError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=r_frame_rate,avg_frame_rate,nb_frames,duration"])
        .args(["-of", "json"])
        .arg(video)
        .output()?;

    if !output.status.success() {
        debug!("ffprobe: {}", String::from_utf8_lossy(&output.stderr));
        return Err(FrameError::Open(video.display().to_string()));
    }
    parse_probe_output(&output.stdout)
}

/// Save one frame every `interval` seconds as `frame_NNNNN.jpg` in `out_dir`.
/// Returns the number of frames written.
pub fn extract_frames(video: &Path, out_dir: &Path, interval: f64) -> Result<usize, FrameError> {
    if !video.is_file() {
        return Err(FrameError::Open(video.display().to_string()));
    }
    let probe = probe_video(video)?;
    let step = frame_step(probe.fps, interval)?;
    info!(
        "{}: {:.3} fps, saving every {} frames{}",
        video.display(),
        probe.fps,
        step,
        probe
            .total_frames
            .map(|total| format!(" (~{} images)", expected_frame_count(total, step)))
            .unwrap_or_default()
    );

    fs::create_dir_all(out_dir)?;
    let removed = remove_matching(out_dir, "frame_[0-9][0-9][0-9][0-9][0-9].jpg")?;
    if removed > 0 {
        info!("Removed {} frames of an earlier run", removed);
    }

    run_ffmpeg_select(video, &out_dir.join("frame_%05d.jpg"), step, None, 0)?;

    let saved = count_saved_frames(out_dir);
    info!("Saved {} frames -> {}", saved, out_dir.display());
    Ok(saved)
}

/// Save every `step`-th frame, at most `limit` of them, as
/// `<stem>_frame_NN.jpg` numbered from 1. Returns the file names in order.
pub fn extract_numbered_frames(
    video: &Path,
    out_dir: &Path,
    stem: &str,
    step: u64,
    limit: u64,
) -> Result<Vec<String>, FrameError> {
    fs::create_dir_all(out_dir)?;
    let stale = format!("{}_frame_[0-9]*.jpg", Pattern::escape(stem));
    remove_matching(out_dir, &stale)?;

    let pattern = out_dir.join(format!("{}_frame_%02d.jpg", stem));
    run_ffmpeg_select(video, &pattern, step, Some(limit), 1)?;

    let saved: Vec<String> = (1..=limit)
        .map(|index| numbered_frame_name(stem, index))
        .take_while(|name| out_dir.join(name).is_file())
        .collect();
    info!("Saved {} frames -> {}", saved.len(), out_dir.display());
    Ok(saved)
}

pub fn numbered_frame_name(stem: &str, index: u64) -> String {
    format!("{}_frame_{:02}.jpg", stem, index)
}

fn run_ffmpeg_select(
    video: &Path,
    pattern: &Path,
    step: u64,
    limit: Option<u64>,
    start_number: u64,
) -> Result<(), FrameError> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Extracting");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let mut command = Command::new("ffmpeg");
    command
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(video)
        .arg("-vf")
        .arg(format!("select=not(mod(n\\,{}))", step))
        .args(["-fps_mode", "vfr", "-q:v", "2"]);
    if let Some(limit) = limit {
        command.arg("-frames:v").arg(limit.to_string());
    }
    let output = command
        .arg("-start_number")
        .arg(start_number.to_string())
        .arg(pattern)
        .output()?;
    spinner.finish_and_clear();

    if !output.status.success() {
        return Err(FrameError::Tool {
            tool: "ffmpeg",
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Delete the files in `dir` whose names match `file_pattern`
fn remove_matching(dir: &Path, file_pattern: &str) -> Result<usize, FrameError> {
    let pattern = format!("{}/{}", Pattern::escape(&dir.to_string_lossy()), file_pattern);
    let mut removed = 0;
    for entry in glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => {
                fs::remove_file(&path)?;
                removed += 1;
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable path: {}", e),
        }
    }
    Ok(removed)
}

// Frames are numbered contiguously from zero
fn count_saved_frames(out_dir: &Path) -> usize {
    (0..)
        .take_while(|&index| out_dir.join(frame_file_name(index)).is_file())
        .count()
}
