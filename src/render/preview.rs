//! Live preview widget
//!
//! Re-renders the frame on a fixed tick and shows it scaled to a fixed
//! display size. Rendering happens on the UI thread and never touches disk.

use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, ColorImage, TextureHandle, TextureOptions, Vec2};
use image::imageops::{self, FilterType};
use image::RgbImage;

use super::fonts::FontBook;
use super::frame::compose;
use crate::settings::RenderSettings;

/// Preview refresh interval (~30 fps)
pub const PREVIEW_TICK: Duration = Duration::from_millis(33);

/// Size the preview is shown at, whatever the output resolution.
pub const DISPLAY_SIZE: (u32, u32) = (640, 360);

/// Fixed-interval ticker.
///
/// When the UI falls behind, missed ticks collapse into one instead of
/// firing in a burst.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// True if a tick is due at `now`. The first poll always fires.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now < due => false,
            Some(due) => {
                let mut next = due + self.interval;
                if next <= now {
                    next = now + self.interval;
                }
                self.next_due = Some(next);
                true
            }
            None => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }

    /// Time left until the next tick.
    pub fn until_next(&self, now: Instant) -> Duration {
        self.next_due
            .map(|due| due.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}

/// Preview panel showing the composed frame
pub struct Preview {
    ticker: Ticker,
    started: Instant,
    texture: Option<TextureHandle>,
}

impl Default for Preview {
    fn default() -> Self {
        Self::new()
    }
}

impl Preview {
    pub fn new() -> Self {
        Self {
            ticker: Ticker::new(PREVIEW_TICK),
            started: Instant::now(),
            texture: None,
        }
    }

    /// Seconds since the preview started; drives the color oscillation.
    pub fn elapsed_secs(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.started).as_secs_f64()
    }

    /// Draw the preview, re-rendering it first if a tick is due.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        settings: &RenderSettings,
        fonts: &FontBook,
    ) -> egui::Response {
        let now = Instant::now();
        if self.ticker.poll(now) || self.texture.is_none() {
            let frame = compose(settings, fonts, self.elapsed_secs(now));
            let image = to_color_image(&downsample(&frame));
            if let Some(texture) = self.texture.as_mut() {
                texture.set(image, TextureOptions::LINEAR);
            } else {
                self.texture = Some(ui.ctx().load_texture("preview", image, TextureOptions::LINEAR));
            }
        }
        ui.ctx().request_repaint_after(self.ticker.until_next(now));

        let size = Vec2::new(DISPLAY_SIZE.0 as f32, DISPLAY_SIZE.1 as f32);
        match &self.texture {
            Some(texture) => ui.add(egui::Image::new((texture.id(), size))),
            None => {
                let (response, painter) = ui.allocate_painter(size, egui::Sense::hover());
                painter.rect_filled(response.rect, 0.0, Color32::BLACK);
                response
            }
        }
    }
}

/// Scale a rendered frame to the preview display size.
pub fn downsample(frame: &RgbImage) -> RgbImage {
    let (w, h) = DISPLAY_SIZE;
    if frame.dimensions() == (w, h) {
        return frame.clone();
    }
    imageops::resize(frame, w, h, FilterType::Triangle)
}

fn to_color_image(frame: &RgbImage) -> ColorImage {
    let size = [frame.width() as usize, frame.height() as usize];
    ColorImage::from_rgb(size, frame.as_raw())
}
