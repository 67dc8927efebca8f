//! text-flash - flashing text on a green screen
//!
//! Renders text whose color swings between two picks on a chroma-key
//! background, shows it live, and exports a 10 second MP4 clip.
//!
//! Run without arguments for the desktop window, or pass `--export PATH` to
//! render headless.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use eframe::egui::{self, Color32};
use image::Rgb;
use indicatif::{ProgressBar, ProgressStyle};

mod cli;
mod export;
mod render;
mod settings;

use cli::Args;
use export::{export_video, with_mp4_extension, ExportError, ExportJob, ExportSummary, EXPORT_FRAMES};
use render::{measure_text, FontBook, FontFace, Preview};
use settings::{clamp_speed, RenderSettings, Resolution, SPEED_RANGE, SPEED_STEP};

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let settings = args.render_settings();

    let fonts = match FontBook::load() {
        Ok(fonts) => Arc::new(fonts),
        Err(e) => {
            log::error!("{e}");
            eprintln!("Cannot load fonts: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = args.export {
        return match run_headless(with_mp4_extension(path), &settings, &fonts) {
            Ok(summary) => {
                println!(
                    "Done: {} ({} frames, {:.1}s, {})",
                    summary.path.display(),
                    summary.frames,
                    summary.duration().as_secs_f64(),
                    summary.codec
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Export failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    log::info!("Starting text-flash");
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 480.0])
            .with_min_inner_size([900.0, 450.0])
            .with_title("Text-Flash"),
        ..Default::default()
    };

    let result = eframe::run_native(
        "Text-Flash",
        options,
        Box::new(move |_cc| Ok(Box::new(TextFlashApp::new(settings, fonts)))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Window error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Export on the calling thread with a terminal progress bar.
fn run_headless(
    path: PathBuf,
    settings: &RenderSettings,
    fonts: &FontBook,
) -> Result<ExportSummary, ExportError> {
    let pb = ProgressBar::new(EXPORT_FRAMES as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let result = export_video(&path, settings, fonts, &AtomicBool::new(false), |n| {
        pb.set_position(n as u64)
    });
    match &result {
        Ok(_) => pb.finish_with_message("Export done"),
        Err(_) => pb.abandon(),
    }
    result
}

/// Which color a picker dialog edits
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColorSlot {
    First,
    Second,
}

impl ColorSlot {
    fn title(&self) -> &'static str {
        match self {
            Self::First => "Choose Color 1",
            Self::Second => "Choose Color 2",
        }
    }
}

/// Modal-ish color picker. The edit stays a draft until OK.
struct ColorDialog {
    slot: ColorSlot,
    draft: Color32,
}

/// What the user answered in the color dialog
enum DialogAnswer {
    Pending,
    Accept(Rgb<u8>),
    Cancel,
}

impl ColorDialog {
    fn open(slot: ColorSlot, current: Rgb<u8>) -> Self {
        let [r, g, b] = current.0;
        Self {
            slot,
            draft: Color32::from_rgb(r, g, b),
        }
    }

    fn show(&mut self, ctx: &egui::Context) -> DialogAnswer {
        let mut answer = DialogAnswer::Pending;
        let mut open = true;
        egui::Window::new(self.slot.title())
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                egui::color_picker::color_picker_color32(
                    ui,
                    &mut self.draft,
                    egui::color_picker::Alpha::Opaque,
                );
                ui.horizontal(|ui| {
                    if ui.button("OK").clicked() {
                        answer = DialogAnswer::Accept(Rgb([
                            self.draft.r(),
                            self.draft.g(),
                            self.draft.b(),
                        ]));
                    }
                    if ui.button("Cancel").clicked() {
                        answer = DialogAnswer::Cancel;
                    }
                });
            });
        if !open {
            answer = DialogAnswer::Cancel;
        }
        answer
    }
}

/// Outcome message shown after an export
struct Notice {
    title: &'static str,
    message: String,
}

impl Notice {
    fn from_result(result: Result<ExportSummary, ExportError>) -> Self {
        match result {
            Ok(summary) => Self {
                title: "Success",
                message: format!("Video Exported!\n{}", summary.path.display()),
            },
            Err(ExportError::Cancelled) => Self {
                title: "Export",
                message: "Export cancelled".to_string(),
            },
            Err(e) => Self {
                title: "Error",
                message: format!("Export failed: {e}"),
            },
        }
    }
}

struct TextFlashApp {
    settings: RenderSettings,
    fonts: Arc<FontBook>,
    preview: Preview,
    color_dialog: Option<ColorDialog>,
    export: Option<ExportJob>,
    notice: Option<Notice>,
}

impl TextFlashApp {
    fn new(settings: RenderSettings, fonts: Arc<FontBook>) -> Self {
        Self {
            settings,
            fonts,
            preview: Preview::new(),
            color_dialog: None,
            export: None,
            notice: None,
        }
    }

    fn start_export(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_title("Export MP4")
            .set_file_name("text-flash.mp4")
            .add_filter("MP4 Video", &["mp4"])
            .save_file()
        else {
            log::debug!("Export aborted in save dialog");
            return;
        };

        let path = with_mp4_extension(path);
        log::info!("Export requested: {}", path.display());
        self.export = Some(ExportJob::start(
            path,
            self.settings.clone(),
            Arc::clone(&self.fonts),
        ));
    }

    fn poll_export(&mut self) {
        let Some(job) = self.export.as_mut() else {
            return;
        };
        if let Some(result) = job.poll() {
            self.notice = Some(Notice::from_result(result));
            self.export = None;
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Text Content:").strong());
        ui.add(egui::TextEdit::singleline(&mut self.settings.text).desired_width(200.0));
        let (width, height) = self.settings.resolution.size();
        let extent = measure_text(self.fonts.font(self.settings.font), &self.settings.text, height);
        if extent.width > width as i32 {
            ui.label(
                egui::RichText::new("Text is wider than the frame and will be clipped")
                    .small()
                    .color(Color32::from_rgb(230, 160, 60)),
            );
        }
        ui.add_space(12.0);

        ui.label(egui::RichText::new("Font Style:").strong());
        egui::ComboBox::from_id_salt("font")
            .selected_text(self.settings.font.label())
            .show_ui(ui, |ui| {
                for face in FontFace::ALL {
                    ui.selectable_value(&mut self.settings.font, *face, face.label());
                }
            });
        ui.add_space(12.0);

        ui.label(egui::RichText::new("Video Resolution:").strong());
        egui::ComboBox::from_id_salt("resolution")
            .selected_text(self.settings.resolution.label())
            .show_ui(ui, |ui| {
                for res in Resolution::ALL {
                    ui.selectable_value(&mut self.settings.resolution, *res, res.label());
                }
            });
        ui.add_space(12.0);

        ui.label(egui::RichText::new("Flash Speed (Seconds):").strong());
        if ui
            .add(egui::Slider::new(&mut self.settings.speed, SPEED_RANGE).step_by(SPEED_STEP))
            .changed()
        {
            self.settings.speed = clamp_speed(self.settings.speed);
        }
        ui.add_space(12.0);

        for slot in [ColorSlot::First, ColorSlot::Second] {
            let current = match slot {
                ColorSlot::First => self.settings.color1,
                ColorSlot::Second => self.settings.color2,
            };
            ui.horizontal(|ui| {
                let [r, g, b] = current.0;
                let (rect, _) = ui.allocate_exact_size(egui::vec2(16.0, 16.0), egui::Sense::hover());
                ui.painter().rect_filled(rect, 2.0, Color32::from_rgb(r, g, b));
                let label = match slot {
                    ColorSlot::First => "Set Color 1",
                    ColorSlot::Second => "Set Color 2",
                };
                if ui
                    .add_enabled(self.color_dialog.is_none(), egui::Button::new(label))
                    .clicked()
                {
                    self.color_dialog = Some(ColorDialog::open(slot, current));
                }
            });
        }
        ui.add_space(20.0);

        let mut start_export = false;
        match &self.export {
            Some(job) => {
                ui.add(
                    egui::ProgressBar::new(job.progress())
                        .show_percentage()
                        .text(format!("{}/{} frames", job.frames_done(), EXPORT_FRAMES)),
                );
                ui.small(job.path().display().to_string());
                let cancel = egui::Button::new(if job.is_cancelling() {
                    "Cancelling..."
                } else {
                    "Cancel"
                });
                if ui.add_enabled(!job.is_cancelling(), cancel).clicked() {
                    job.cancel();
                }
            }
            None => {
                let export = egui::Button::new(
                    egui::RichText::new("EXPORT MP4")
                        .strong()
                        .color(Color32::WHITE),
                )
                .fill(Color32::from_rgb(0x2e, 0xcc, 0x71))
                .min_size(egui::vec2(ui.available_width(), 40.0));
                start_export = ui.add(export).clicked();
            }
        }

        if start_export {
            self.start_export();
        }
    }
}

impl eframe::App for TextFlashApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_export();

        egui::SidePanel::left("controls")
            .resizable(false)
            .exact_width(250.0)
            .show(ctx, |ui| {
                ui.add_space(8.0);
                self.controls(ui);
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(Color32::from_gray(0x22)))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(5.0);
                    ui.label(egui::RichText::new("Live Preview (Green Screen)").color(Color32::WHITE));
                    ui.add_space(10.0);
                    self.preview.show(ui, &self.settings, &self.fonts);
                });
            });

        if let Some(dialog) = self.color_dialog.as_mut() {
            match dialog.show(ctx) {
                DialogAnswer::Pending => {}
                DialogAnswer::Accept(color) => {
                    match dialog.slot {
                        ColorSlot::First => self.settings.color1 = color,
                        ColorSlot::Second => self.settings.color2 = color,
                    }
                    self.color_dialog = None;
                }
                DialogAnswer::Cancel => self.color_dialog = None,
            }
        }

        let mut dismissed = false;
        if let Some(notice) = &self.notice {
            egui::Window::new(notice.title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.label(&notice.message);
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
        }
        if dismissed {
            self.notice = None;
        }

        if self.export.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_messages() {
        let ok = Notice::from_result(Ok(ExportSummary {
            path: PathBuf::from("/tmp/clip.mp4"),
            frames: EXPORT_FRAMES,
            fps: export::EXPORT_FPS,
            codec: export::VideoCodec::H264,
        }));
        assert_eq!(ok.title, "Success");
        assert!(ok.message.starts_with("Video Exported!"));

        let cancelled = Notice::from_result(Err(ExportError::Cancelled));
        assert_eq!(cancelled.message, "Export cancelled");

        let failed = Notice::from_result(Err(ExportError::FfmpegNotFound));
        assert_eq!(failed.title, "Error");
        assert!(failed.message.contains("ffmpeg not found"));
    }

    #[test]
    fn test_color_dialog_starts_from_current_color() {
        let dialog = ColorDialog::open(ColorSlot::Second, Rgb([1, 2, 3]));
        assert_eq!(dialog.slot, ColorSlot::Second);
        assert_eq!(dialog.draft, Color32::from_rgb(1, 2, 3));
    }
}
