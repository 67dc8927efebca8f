//! Command line options
//!
//! Every flag seeds the initial render settings. `--export` renders straight
//! to a file without opening a window.

use std::path::PathBuf;

use clap::Parser;
use image::Rgb;

use crate::render::FontFace;
use crate::settings::{check_speed, parse_hex_color, RenderSettings, Resolution};

#[derive(Parser, Debug)]
#[command(name = "text-flash")]
#[command(about = "Flashing color-cycling text on a green screen, with live preview and MP4 export")]
pub struct Args {
    /// Text to display
    #[arg(long)]
    pub text: Option<String>,

    /// Font style: SIMPLEX, COMPLEX, ITALIC or SCRIPT (anything else uses SIMPLEX)
    #[arg(long, value_parser = parse_font)]
    pub font: Option<FontFace>,

    /// Output resolution: 720p, 480p or 360p
    #[arg(long)]
    pub resolution: Option<Resolution>,

    /// Flash period in seconds (0.1 - 5.0)
    #[arg(long, value_parser = parse_speed)]
    pub speed: Option<f64>,

    /// First color (e.g. #FF0000)
    #[arg(long, value_parser = parse_color)]
    pub color1: Option<Rgb<u8>>,

    /// Second color (e.g. #0000FF)
    #[arg(long, value_parser = parse_color)]
    pub color2: Option<Rgb<u8>>,

    /// Export a 10 second MP4 to this path and exit instead of opening the window
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

impl Args {
    /// Defaults overridden by whatever was given on the command line.
    pub fn render_settings(&self) -> RenderSettings {
        let defaults = RenderSettings::default();
        RenderSettings {
            text: self.text.clone().unwrap_or(defaults.text),
            font: self.font.unwrap_or(defaults.font),
            resolution: self.resolution.unwrap_or(defaults.resolution),
            speed: self.speed.unwrap_or(defaults.speed),
            color1: self.color1.unwrap_or(defaults.color1),
            color2: self.color2.unwrap_or(defaults.color2),
        }
    }
}

fn parse_font(s: &str) -> Result<FontFace, String> {
    let face = FontFace::from_label(s);
    if !face.label().eq_ignore_ascii_case(s.trim()) {
        log::warn!("Unknown font '{}', using {}", s, face);
    }
    Ok(face)
}

fn parse_speed(s: &str) -> Result<f64, String> {
    let value: f64 = s.trim().parse().map_err(|_| format!("invalid number '{s}'"))?;
    check_speed(value).map_err(|e| e.to_string())
}

fn parse_color(s: &str) -> Result<Rgb<u8>, String> {
    parse_hex_color(s).map_err(|e| e.to_string())
}
