//! Export module - renders the fixed-length clip and encodes it
//!
//! This module provides:
//! - The frame loop shared by the GUI and the headless command line
//! - A streaming ffmpeg encoder with atomic output
//! - A background worker with progress and cancellation

mod encoder;
mod job;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::render::{compose, FontBook};
use crate::settings::RenderSettings;

use encoder::{EncodeConfig, FfmpegEncoder};

pub use encoder::{with_mp4_extension, ExportError, VideoCodec};
pub use job::ExportJob;

/// Output frame rate
pub const EXPORT_FPS: u32 = 30;

/// Frames per clip (10 seconds at 30 fps)
pub const EXPORT_FRAMES: usize = 300;

/// Time in seconds at which frame `index` is sampled.
pub fn frame_time(index: usize) -> f64 {
    index as f64 / EXPORT_FPS as f64
}

/// What a successful export produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub frames: usize,
    pub fps: u32,
    pub codec: VideoCodec,
}

impl ExportSummary {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.fps as f64)
    }
}

/// Render the clip for `settings` and encode it to `path`.
///
/// `cancel` is checked before every frame. `on_frame` receives the number of
/// frames written so far.
pub fn export_video(
    path: &Path,
    settings: &RenderSettings,
    fonts: &FontBook,
    cancel: &AtomicBool,
    mut on_frame: impl FnMut(usize),
) -> Result<ExportSummary, ExportError> {
    settings.validate()?;

    let (width, height) = settings.resolution.size();
    let codec = VideoCodec::detect();
    log::info!(
        "Exporting {} frames at {}x{} ({}) to {}",
        EXPORT_FRAMES,
        width,
        height,
        codec,
        path.display()
    );

    let mut encoder = FfmpegEncoder::new(EncodeConfig {
        width,
        height,
        fps: EXPORT_FPS,
        codec,
        out_path: path.to_path_buf(),
    })?;

    for index in 0..EXPORT_FRAMES {
        if cancel.load(Ordering::Relaxed) {
            log::info!("Export cancelled after {} frames", index);
            return Err(ExportError::Cancelled);
        }
        let frame = compose(settings, fonts, frame_time(index));
        encoder.write_frame(&frame)?;
        on_frame(index + 1);
    }

    let frames = encoder.frames_written();
    let path = encoder.finish()?;
    log::info!("Export finished: {}", path.display());

    Ok(ExportSummary {
        path,
        frames,
        fps: EXPORT_FPS,
        codec,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};
    use std::process::Command;

    pub fn ffprobe_available() -> bool {
        Command::new("ffprobe")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Fresh scratch path under the system temp directory.
    pub fn scratch_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("text-flash-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    /// (decoded frame count, frame rate, width, height) of the first video stream.
    pub fn probe(path: &Path) -> (u64, String, u32, u32) {
        let out = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-count_frames",
                "-show_entries",
                "stream=nb_read_frames,r_frame_rate,width,height",
                "-of",
                "default=noprint_wrappers=1",
            ])
            .arg(path)
            .output()
            .unwrap();
        assert!(out.status.success(), "ffprobe failed");

        let text = String::from_utf8_lossy(&out.stdout).to_string();
        let field = |key: &str| {
            text.lines()
                .find_map(|l| l.strip_prefix(&format!("{key}=")))
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        (
            field("nb_read_frames").parse().unwrap(),
            field("r_frame_rate"),
            field("width").parse().unwrap(),
            field("height").parse().unwrap(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::encoder::is_ffmpeg_on_path;
    use super::test_support::*;
    use super::*;
    use crate::settings::{Resolution, SettingsError};

    #[test]
    fn test_frame_times() {
        assert_eq!(frame_time(0), 0.0);
        assert_eq!(frame_time(30), 1.0);
        assert!((frame_time(EXPORT_FRAMES - 1) - 299.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary_duration() {
        let summary = ExportSummary {
            path: PathBuf::from("x.mp4"),
            frames: EXPORT_FRAMES,
            fps: EXPORT_FPS,
            codec: VideoCodec::H264,
        };
        assert_eq!(summary.duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_speed_rejected_before_encoding() {
        let settings = RenderSettings {
            speed: 0.0,
            ..RenderSettings::default()
        };
        let path = scratch_file("never-written.mp4");
        let err = export_video(&path, &settings, &FontBook::builtin().unwrap(), &AtomicBool::new(false), |_| {})
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::Settings(SettingsError::SpeedOutOfRange { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_export_default_settings() {
        if !is_ffmpeg_on_path() || !ffprobe_available() {
            return;
        }
        let path = scratch_file("default.mp4");
        let settings = RenderSettings::default();
        let mut reported = Vec::new();

        let summary = export_video(
            &path,
            &settings,
            &FontBook::builtin().unwrap(),
            &AtomicBool::new(false),
            |n| reported.push(n),
        )
        .unwrap();

        assert_eq!(summary.path, path);
        assert_eq!(summary.frames, EXPORT_FRAMES);
        assert_eq!(reported.len(), EXPORT_FRAMES);
        assert_eq!(reported.last(), Some(&EXPORT_FRAMES));

        let (frames, rate, width, height) = probe(&path);
        assert_eq!(frames, EXPORT_FRAMES as u64);
        assert_eq!(rate, "30/1");
        assert_eq!((width, height), Resolution::P360.size());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_cancelled_export_leaves_nothing() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let path = scratch_file("cancelled.mp4");
        let cancel = AtomicBool::new(false);

        let err = export_video(
            &path,
            &RenderSettings::default(),
            &FontBook::builtin().unwrap(),
            &cancel,
            |n| {
                if n == 10 {
                    cancel.store(true, Ordering::Relaxed);
                }
            },
        )
        .unwrap_err();

        assert!(matches!(err, ExportError::Cancelled));
        assert!(!path.exists());
        assert!(!encoder::partial_path(&path).unwrap().exists());
    }
}
