//! Render module - color oscillation, frame compositing and the live preview

mod fonts;
mod frame;
mod oscillator;
mod preview;

pub use fonts::{FontBook, FontFace};
pub use frame::{compose, measure_text};
pub use preview::Preview;
