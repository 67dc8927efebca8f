//! MP4 encoding through the system `ffmpeg` binary
//!
//! Raw RGB frames are piped to ffmpeg's stdin. Output goes to a hidden
//! sibling file that is renamed onto the destination only after ffmpeg
//! exits cleanly, so a failed or cancelled export never leaves a truncated
//! video behind.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use image::RgbImage;
use thiserror::Error;

use crate::settings::SettingsError;

/// Errors that can occur while exporting a video
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("ffmpeg not found. Please install ffmpeg and add it to your PATH.")]
    FfmpegNotFound,

    #[error("Invalid encoder config: {0}")]
    Config(String),

    #[error("Cannot write to {}: {source}", .path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start ffmpeg: {0}")]
    Spawn(#[source] io::Error),

    #[error("Frame is {got_width}x{got_height}, encoder expects {width}x{height}")]
    FrameSize {
        got_width: u32,
        got_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Failed to write frame {frame} to ffmpeg: {source}")]
    Write {
        frame: usize,
        #[source]
        source: io::Error,
    },

    #[error("ffmpeg exited with {status}: {stderr}")]
    Encoder { status: String, stderr: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("Export worker stopped unexpectedly")]
    WorkerPanicked,
}

/// Video codec handed to ffmpeg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// H.264 via libx264
    #[default]
    H264,
    /// MPEG-4 Part 2, for ffmpeg builds without libx264
    Mpeg4,
}

impl VideoCodec {
    pub fn encoder_name(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Mpeg4 => "mpeg4",
        }
    }

    /// Prefer H.264, fall back to MPEG-4 when this ffmpeg lacks libx264.
    pub fn detect() -> Self {
        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();
        match output {
            Ok(out) if !String::from_utf8_lossy(&out.stdout).contains(" libx264 ") => {
                log::warn!("ffmpeg has no libx264 encoder, falling back to mpeg4");
                Self::Mpeg4
            }
            _ => Self::H264,
        }
    }

    fn extra_args(&self) -> &'static [&'static str] {
        match self {
            Self::H264 => &["-preset", "medium", "-crf", "18"],
            Self::Mpeg4 => &["-q:v", "3"],
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder_name())
    }
}

/// Encoder parameters
#[derive(Debug, Clone)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: VideoCodec,
    pub out_path: PathBuf,
}

impl EncodeConfig {
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.width == 0 || self.height == 0 {
            return Err(ExportError::Config("width/height must be non-zero".into()));
        }
        if self.fps == 0 {
            return Err(ExportError::Config("fps must be non-zero".into()));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            // yuv420p subsamples chroma 2x2
            return Err(ExportError::Config(
                "width/height must be even for yuv420p output".into(),
            ));
        }
        Ok(())
    }
}

/// Check that `ffmpeg` can be run
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Add `.mp4` to paths that have no extension.
pub fn with_mp4_extension(path: impl Into<PathBuf>) -> PathBuf {
    let mut path = path.into();
    if path.extension().is_none() {
        path.set_extension("mp4");
    }
    path
}

/// Hidden sibling the encoder writes to before the final rename.
pub fn partial_path(out_path: &Path) -> Option<PathBuf> {
    let name = out_path.file_name()?.to_str()?;
    Some(out_path.with_file_name(format!(".{name}.part")))
}

/// Streaming ffmpeg encoder
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    part_path: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames_written: usize,
    finished: bool,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> Result<Self, ExportError> {
        cfg.validate()?;

        let part_path = partial_path(&cfg.out_path).ok_or_else(|| ExportError::Destination {
            path: cfg.out_path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a file path"),
        })?;

        if !is_ffmpeg_on_path() {
            return Err(ExportError::FfmpegNotFound);
        }

        // Surface bad destinations before any frame is rendered
        File::create(&part_path).map_err(|source| ExportError::Destination {
            path: cfg.out_path.clone(),
            source,
        })?;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{}x{}", cfg.width, cfg.height),
                "-r",
                &cfg.fps.to_string(),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                cfg.codec.encoder_name(),
            ])
            .args(cfg.codec.extra_args())
            .args(["-pix_fmt", "yuv420p", "-movflags", "+faststart", "-f", "mp4"])
            .arg(&part_path);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = fs::remove_file(&part_path);
                return Err(ExportError::Spawn(e));
            }
        };

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            let _ = fs::remove_file(&part_path);
            return Err(ExportError::Spawn(io::Error::other("ffmpeg stdin unavailable")));
        };

        log::debug!(
            "ffmpeg started: {}x{} @ {} fps, {} -> {}",
            cfg.width,
            cfg.height,
            cfg.fps,
            cfg.codec,
            part_path.display()
        );

        Ok(Self {
            cfg,
            part_path,
            child: Some(child),
            stdin: Some(stdin),
            frames_written: 0,
            finished: false,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Append one frame.
    pub fn write_frame(&mut self, frame: &RgbImage) -> Result<(), ExportError> {
        if frame.dimensions() != (self.cfg.width, self.cfg.height) {
            return Err(ExportError::FrameSize {
                got_width: frame.width(),
                got_height: frame.height(),
                width: self.cfg.width,
                height: self.cfg.height,
            });
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ExportError::Write {
                frame: self.frames_written,
                source: io::Error::new(io::ErrorKind::BrokenPipe, "encoder already closed"),
            });
        };

        if let Err(e) = stdin.write_all(frame.as_raw()) {
            return Err(self.failure(e));
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Close the stream, wait for ffmpeg and move the file into place.
    pub fn finish(mut self) -> Result<PathBuf, ExportError> {
        drop(self.stdin.take());

        let Some(child) = self.child.take() else {
            return Err(ExportError::Encoder {
                status: "unknown".into(),
                stderr: "ffmpeg process already reaped".into(),
            });
        };
        let output = child.wait_with_output().map_err(ExportError::Spawn)?;
        if !output.status.success() {
            return Err(ExportError::Encoder {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        fs::rename(&self.part_path, &self.cfg.out_path).map_err(|source| {
            ExportError::Destination {
                path: self.cfg.out_path.clone(),
                source,
            }
        })?;
        self.finished = true;

        Ok(self.cfg.out_path.clone())
    }

    /// Turn a pipe error into the most useful error available: ffmpeg's own
    /// complaint if it died, otherwise the I/O error.
    fn failure(&mut self, source: io::Error) -> ExportError {
        drop(self.stdin.take());
        if let Some(child) = self.child.take() {
            if let Ok(output) = child.wait_with_output() {
                if !output.status.success() {
                    return ExportError::Encoder {
                        status: output.status.to_string(),
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    };
                }
            }
        }
        ExportError::Write {
            frame: self.frames_written,
            source,
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if !self.finished {
            let _ = fs::remove_file(&self.part_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: u32, height: u32, fps: u32) -> EncodeConfig {
        EncodeConfig {
            width,
            height,
            fps,
            codec: VideoCodec::H264,
            out_path: PathBuf::from("out.mp4"),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("text-flash-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_config_validation() {
        assert!(config(640, 360, 30).validate().is_ok());
        assert!(config(854, 480, 30).validate().is_ok());
        assert!(config(0, 360, 30).validate().is_err());
        assert!(config(640, 360, 0).validate().is_err());
        assert!(config(641, 360, 30).validate().is_err());
    }

    #[test]
    fn test_mp4_extension() {
        assert_eq!(with_mp4_extension("clip"), PathBuf::from("clip.mp4"));
        assert_eq!(with_mp4_extension("clip.mp4"), PathBuf::from("clip.mp4"));
        assert_eq!(with_mp4_extension("clip.mov"), PathBuf::from("clip.mov"));
    }

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        assert_eq!(
            partial_path(Path::new("/tmp/videos/flash.mp4")),
            Some(PathBuf::from("/tmp/videos/.flash.mp4.part"))
        );
        assert_eq!(partial_path(Path::new("/")), None);
    }

    #[test]
    fn test_missing_directory_is_reported() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let out_path = scratch_dir("missing-dir").join("no/such/dir/out.mp4");
        let cfg = EncodeConfig {
            out_path: out_path.clone(),
            ..config(64, 36, 30)
        };
        match FfmpegEncoder::new(cfg) {
            Err(ExportError::Destination { path, .. }) => assert_eq!(path, out_path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("encoder opened in a missing directory"),
        }
    }

    #[test]
    fn test_frame_size_mismatch() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let out_path = scratch_dir("frame-size").join("mismatch.mp4");
        let cfg = EncodeConfig {
            out_path: out_path.clone(),
            codec: VideoCodec::detect(),
            ..config(64, 36, 30)
        };
        let mut encoder = FfmpegEncoder::new(cfg).unwrap();
        let err = encoder.write_frame(&RgbImage::new(32, 32)).unwrap_err();
        assert!(matches!(err, ExportError::FrameSize { .. }));
    }

    #[test]
    fn test_dropped_encoder_leaves_no_file() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let out_path = scratch_dir("dropped").join("abandoned.mp4");
        let cfg = EncodeConfig {
            out_path: out_path.clone(),
            codec: VideoCodec::detect(),
            ..config(64, 36, 30)
        };
        let mut encoder = FfmpegEncoder::new(cfg).unwrap();
        encoder.write_frame(&RgbImage::new(64, 36)).unwrap();
        let part = partial_path(&out_path).unwrap();
        assert!(part.exists());

        drop(encoder);
        assert!(!part.exists());
        assert!(!out_path.exists());
    }

    /// Start an encoder on a scratch file and kill its ffmpeg process.
    fn killed_encoder(name: &str) -> (FfmpegEncoder, PathBuf) {
        let out_path = scratch_dir(name).join("killed.mp4");
        let _ = fs::remove_file(&out_path);
        let cfg = EncodeConfig {
            out_path: out_path.clone(),
            codec: VideoCodec::detect(),
            ..config(64, 36, 30)
        };
        let mut encoder = FfmpegEncoder::new(cfg).unwrap();
        let child = encoder.child.as_mut().unwrap();
        child.kill().unwrap();
        child.wait().unwrap();
        (encoder, out_path)
    }

    #[test]
    fn test_dead_encoder_fails_write_and_cleans_up() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let (mut encoder, out_path) = killed_encoder("dead-write");
        let frame = RgbImage::new(64, 36);

        // The pipe may still take a few frames before reporting the closed end
        let err = (0..1000)
            .find_map(|_| encoder.write_frame(&frame).err())
            .expect("writes to a dead ffmpeg must fail");
        assert!(
            matches!(err, ExportError::Encoder { .. } | ExportError::Write { .. }),
            "unexpected error: {err}"
        );

        let part = partial_path(&out_path).unwrap();
        drop(encoder);
        assert!(!part.exists());
        assert!(!out_path.exists());
    }

    #[test]
    fn test_dead_encoder_fails_finish_and_cleans_up() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let (encoder, out_path) = killed_encoder("dead-finish");
        let part = partial_path(&out_path).unwrap();

        let err = encoder.finish().unwrap_err();
        assert!(matches!(err, ExportError::Encoder { .. }), "unexpected error: {err}");
        assert!(!part.exists());
        assert!(!out_path.exists());
    }

    #[test]
    fn test_finish_moves_file_into_place() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let out_path = scratch_dir("finish").join("short.mp4");
        let _ = fs::remove_file(&out_path);
        let cfg = EncodeConfig {
            out_path: out_path.clone(),
            codec: VideoCodec::detect(),
            ..config(64, 36, 30)
        };
        let mut encoder = FfmpegEncoder::new(cfg).unwrap();
        for _ in 0..5 {
            encoder.write_frame(&RgbImage::from_pixel(64, 36, image::Rgb([0, 255, 0]))).unwrap();
        }
        assert_eq!(encoder.frames_written(), 5);
        assert_eq!(encoder.finish().unwrap(), out_path);
        assert!(out_path.exists());
        assert!(!partial_path(&out_path).unwrap().exists());
        let _ = fs::remove_file(&out_path);
    }
}
