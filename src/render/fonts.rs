//! Font faces
//!
//! The user picks one of four named faces. At startup each face is resolved
//! to a real typeface from the system font database; anything that cannot be
//! found falls back to the sans face bundled with egui.

use std::fmt;

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use rusttype::Font;
use thiserror::Error;

/// Selectable font faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontFace {
    /// Plain sans-serif
    #[default]
    Simplex,
    /// Serif
    Complex,
    /// Sans-serif, italic style
    Italic,
    /// Cursive / handwriting
    Script,
}

impl FontFace {
    pub const ALL: &[FontFace] = &[Self::Simplex, Self::Complex, Self::Italic, Self::Script];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Simplex => "SIMPLEX",
            Self::Complex => "COMPLEX",
            Self::Italic => "ITALIC",
            Self::Script => "SCRIPT",
        }
    }

    /// Look a face up by its label. Unknown labels give the default face.
    pub fn from_label(label: &str) -> Self {
        let wanted = label.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.label().eq_ignore_ascii_case(wanted))
            .unwrap_or_default()
    }

    fn index(&self) -> usize {
        match self {
            Self::Simplex => 0,
            Self::Complex => 1,
            Self::Italic => 2,
            Self::Script => 3,
        }
    }

    /// Generic family first, then concrete names commonly installed on
    /// Linux, macOS and Windows.
    fn families(&self) -> &'static [Family<'static>] {
        match self {
            Self::Simplex | Self::Italic => &[
                Family::SansSerif,
                Family::Name("DejaVu Sans"),
                Family::Name("Liberation Sans"),
                Family::Name("Noto Sans"),
                Family::Name("Helvetica"),
                Family::Name("Arial"),
            ],
            Self::Complex => &[
                Family::Serif,
                Family::Name("DejaVu Serif"),
                Family::Name("Liberation Serif"),
                Family::Name("Noto Serif"),
                Family::Name("Times"),
                Family::Name("Times New Roman"),
            ],
            Self::Script => &[
                Family::Cursive,
                Family::Name("Z003"),
                Family::Name("URW Chancery L"),
                Family::Name("TeX Gyre Chorus"),
                Family::Name("Apple Chancery"),
                Family::Name("Brush Script MT"),
                Family::Name("Comic Neue"),
            ],
        }
    }

    fn style(&self) -> Style {
        match self {
            Self::Italic => Style::Italic,
            _ => Style::Normal,
        }
    }
}

impl fmt::Display for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a resolved face came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceSource {
    System { family: String, style: Style },
    Bundled,
}

struct LoadedFace {
    font: Font<'static>,
    source: FaceSource,
}

/// Font loading errors
#[derive(Error, Debug)]
pub enum FontError {
    #[error("Bundled fallback font could not be parsed")]
    InvalidBundledFont,
}

/// The four faces, resolved once and shared between preview and export.
pub struct FontBook {
    faces: [LoadedFace; 4],
}

impl FontBook {
    /// Resolve every face against the system font database.
    pub fn load() -> Result<Self, FontError> {
        let mut db = Database::new();
        db.load_system_fonts();
        log::info!("Font database: {} faces", db.len());
        Self::from_database(&db)
    }

    /// Use only the bundled face, without touching system fonts.
    pub fn builtin() -> Result<Self, FontError> {
        let font = bundled_font()?;
        Ok(Self {
            faces: std::array::from_fn(|_| bundled_face(&font)),
        })
    }

    pub fn from_database(db: &Database) -> Result<Self, FontError> {
        let fallback = bundled_font()?;
        let faces = std::array::from_fn(|i| {
            let face = FontFace::ALL[i];
            match resolve(db, face) {
                Some(loaded) => {
                    log::info!("{} -> {:?}", face, loaded.source);
                    loaded
                }
                None => {
                    log::warn!("No system font for {}, using bundled face", face);
                    bundled_face(&fallback)
                }
            }
        });

        let book = Self { faces };
        if !book.italic_is_distinct() {
            log::warn!("No italic system face found, ITALIC renders upright");
        }
        Ok(book)
    }

    pub fn font(&self, face: FontFace) -> &Font<'static> {
        &self.faces[face.index()].font
    }

    pub fn source(&self, face: FontFace) -> &FaceSource {
        &self.faces[face.index()].source
    }

    /// Whether ITALIC resolved to a slanted face rather than the upright one.
    pub fn italic_is_distinct(&self) -> bool {
        matches!(
            self.source(FontFace::Italic),
            FaceSource::System {
                style: Style::Italic | Style::Oblique,
                ..
            }
        )
    }
}

fn resolve(db: &Database, face: FontFace) -> Option<LoadedFace> {
    let query = Query {
        families: face.families(),
        weight: Weight::NORMAL,
        stretch: Stretch::Normal,
        style: face.style(),
    };
    let id = db.query(&query)?;
    let info = db.face(id)?;
    let family = info
        .families
        .first()
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| info.post_script_name.clone());
    let style = info.style;

    let font = db.with_face_data(id, |data, index| {
        Font::try_from_vec_and_index(data.to_vec(), index)
    })??;

    Some(LoadedFace {
        font,
        source: FaceSource::System { family, style },
    })
}

fn bundled_font() -> Result<Font<'static>, FontError> {
    Font::try_from_bytes(epaint_default_fonts::UBUNTU_LIGHT).ok_or(FontError::InvalidBundledFont)
}

fn bundled_face(font: &Font<'static>) -> LoadedFace {
    LoadedFace {
        font: font.clone(),
        source: FaceSource::Bundled,
    }
}
