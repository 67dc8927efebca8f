use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use image::Rgb;
use thiserror::Error;

use crate::render::FontFace;

/// Allowed flash period, in seconds.
pub const SPEED_RANGE: RangeInclusive<f64> = 0.1..=5.0;

/// Slider step for the flash period.
pub const SPEED_STEP: f64 = 0.1;

/// Errors raised when render settings are rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("flash speed must be between {min} and {max} seconds, got {value}")]
    SpeedOutOfRange { value: f64, min: f64, max: f64 },

    #[error("unknown resolution '{0}' (expected 720p, 480p or 360p)")]
    UnknownResolution(String),

    #[error("invalid color '{0}' (expected #RRGGBB)")]
    InvalidColor(String),
}

/// Output size presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    P720,
    P480,
    #[default]
    P360,
}

impl Resolution {
    pub const ALL: &[Resolution] = &[Self::P720, Self::P480, Self::P360];

    pub fn label(&self) -> &'static str {
        match self {
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
        }
    }

    /// Pixel size as (width, height)
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::P720 => (1280, 720),
            Self::P480 => (854, 480),
            Self::P360 => (640, 360),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Resolution {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SettingsError::UnknownResolution(s.to_string()))
    }
}

/// Everything a frame depends on.
///
/// Owned by the UI and read at render time. The export worker gets its own
/// clone, so edits made while an export runs only affect the preview.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub text: String,
    pub font: FontFace,
    pub resolution: Resolution,
    /// Flash period in seconds
    pub speed: f64,
    pub color1: Rgb<u8>,
    pub color2: Rgb<u8>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            text: "TEXT-FLASH".to_string(),
            font: FontFace::default(),
            resolution: Resolution::default(),
            speed: 1.0,
            color1: Rgb([255, 0, 0]),
            color2: Rgb([0, 0, 255]),
        }
    }
}

impl RenderSettings {
    /// Reject settings the oscillator is not defined for.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_speed(self.speed).map(|_| ())
    }
}

/// Accept a speed only if it lies inside [`SPEED_RANGE`].
pub fn check_speed(value: f64) -> Result<f64, SettingsError> {
    if value.is_finite() && SPEED_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(SettingsError::SpeedOutOfRange {
            value,
            min: *SPEED_RANGE.start(),
            max: *SPEED_RANGE.end(),
        })
    }
}

/// Pull a speed into [`SPEED_RANGE`], snapping to the slider step.
/// Non-finite input resets to the default period.
pub fn clamp_speed(value: f64) -> f64 {
    if !value.is_finite() {
        return RenderSettings::default().speed;
    }
    let snapped = (value / SPEED_STEP).round() * SPEED_STEP;
    snapped.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end())
}

/// Parse `#RRGGBB` or `RRGGBB`.
pub fn parse_hex_color(s: &str) -> Result<Rgb<u8>, SettingsError> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(SettingsError::InvalidColor(s.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| SettingsError::InvalidColor(s.to_string()))
    };
    Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}
