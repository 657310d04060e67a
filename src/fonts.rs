use ab_glyph::{Font, FontArc, FontVec, PxScale, ScaleFont};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Average advance (in em) used when no face is available.
const FALLBACK_ADVANCE_EM: f32 = 0.55;
const MAX_SCAN_DEPTH: usize = 4;

static BUNDLED_REGULAR: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
static BUNDLED_BOLD: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

const REGULAR_CANDIDATES: &[&str] = &[
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "NotoSans-Regular.ttf",
    "Arial.ttf",
    "arial.ttf",
    "FreeSans.ttf",
];

const BOLD_CANDIDATES: &[&str] = &[
    "DejaVuSans-Bold.ttf",
    "LiberationSans-Bold.ttf",
    "NotoSans-Bold.ttf",
    "Arial Bold.ttf",
    "arialbd.ttf",
    "FreeSansBold.ttf",
];

/// Measures text the same way the rasterizer paints it.
pub trait TextMeasure {
    fn text_width(&self, text: &str, size: f32, bold: bool) -> f32;
}

/// Regular and bold faces used for painting report text.
pub struct FontBook {
    regular: Option<FontArc>,
    bold: Option<FontArc>,
}

impl FontBook {
    #[cfg(test)]
    pub fn empty() -> Self {
        FontBook {
            regular: None,
            bold: None,
        }
    }

    /// The DejaVu Sans faces compiled into the binary.
    pub fn bundled() -> Self {
        FontBook {
            regular: bundled_face(BUNDLED_REGULAR),
            bold: bundled_face(BUNDLED_BOLD),
        }
    }

    /// Look for a sans-serif face in `extra_dir` first, then the system font
    /// directories. Faces that are not found come from the bundled set.
    pub fn discover(extra_dir: Option<&Path>) -> Self {
        let mut dirs: Vec<PathBuf> = extra_dir.map(Path::to_path_buf).into_iter().collect();
        dirs.extend(system_font_dirs());

        let bundled = FontBook::bundled();
        let regular = find_face(&dirs, REGULAR_CANDIDATES).or_else(|| {
            info!("No system regular font found; using bundled DejaVu Sans");
            bundled.regular.clone()
        });
        let bold = find_face(&dirs, BOLD_CANDIDATES).or_else(|| {
            info!("No system bold font found; using bundled DejaVu Sans Bold");
            bundled.bold.clone()
        });

        if regular.is_none() && bold.is_none() {
            warn!("No usable TrueType font; documents with text cannot be rendered");
        }
        FontBook { regular, bold }
    }

    pub fn face(&self, bold: bool) -> Option<&FontArc> {
        if bold {
            self.bold.as_ref().or(self.regular.as_ref())
        } else {
            self.regular.as_ref().or(self.bold.as_ref())
        }
    }
}

fn bundled_face(bytes: &'static [u8]) -> Option<FontArc> {
    match FontArc::try_from_slice(bytes) {
        Ok(face) => Some(face),
        Err(e) => {
            warn!("Bundled font is unreadable: {}", e);
            None
        }
    }
}

impl TextMeasure for FontBook {
    fn text_width(&self, text: &str, size: f32, bold: bool) -> f32 {
        let Some(face) = self.face(bold) else {
            return text.chars().count() as f32 * size * FALLBACK_ADVANCE_EM;
        };

        let scaled = face.as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut previous = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }
        width
    }
}

fn find_face(dirs: &[PathBuf], candidates: &[&str]) -> Option<FontArc> {
    for name in candidates {
        for dir in dirs {
            let Some(path) = find_file(dir, name, 0) else {
                continue;
            };
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            match FontVec::try_from_vec(bytes) {
                Ok(face) => {
                    debug!("Using font {}", path.display());
                    return Some(FontArc::new(face));
                }
                Err(e) => debug!("Skipping font {}: {}", path.display(), e),
            }
        }
    }
    None
}

fn find_file(dir: &Path, name: &str, depth: usize) -> Option<PathBuf> {
    let direct = dir.join(name);
    if direct.is_file() {
        return Some(direct);
    }
    if depth >= MAX_SCAN_DEPTH {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .find_map(|sub| find_file(&sub, name, depth + 1))
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
    }

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
    }

    dirs
}
