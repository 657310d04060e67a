use ab_glyph::PxScale;
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::assets::{decode_data_url, AssetError};
use crate::fonts::{FontBook, TextMeasure};
use crate::layout::{Color, NodeType, RenderableDocument, TextAlign};
use crate::layout_box::{layout_document, LayoutBox};

pub const MIN_SCALE: f32 = 2.0;
pub const MAX_SCALE: f32 = 3.0;
pub const DEFAULT_MAX_HEIGHT_PX: u32 = 32_760;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("raster surface {width}x{height} exceeds the {max} px height limit")]
    SurfaceTooLarge { width: u32, height: u32, max: u32 },
    #[error("embedded image could not be read: {0}")]
    Asset(#[from] AssetError),
    #[error("embedded image could not be decoded: {0}")]
    Image(#[from] image::ImageError),
    #[error("no font available to paint document text")]
    NoFont,
}

#[derive(Debug, Clone, Copy)]
pub struct RasterOptions {
    /// Requested magnification; clamped to `[MIN_SCALE, MAX_SCALE]`
    pub scale: f32,
    pub max_height_px: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        RasterOptions {
            scale: MIN_SCALE,
            max_height_px: DEFAULT_MAX_HEIGHT_PX,
        }
    }
}

impl RasterOptions {
    pub fn effective_scale(&self) -> f32 {
        if self.scale.is_nan() {
            return MIN_SCALE;
        }
        self.scale.clamp(MIN_SCALE, MAX_SCALE)
    }
}

/// One tall bitmap holding the whole document.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub pixels: RgbaImage,
}

impl RasterImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

// ============================================================================
// RENDER SURFACES
// ============================================================================

/// Tracks live render surfaces. Every surface handed out is returned when
/// its guard drops, on success and failure alike.
#[derive(Debug, Clone, Default)]
pub struct SurfaceRegistry {
    active: Arc<AtomicUsize>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, width: u32, height: u32) -> RenderSurface {
        let live = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Acquired {}x{} render surface ({} live)", width, height, live);
        RenderSurface {
            pixels: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
            active: Arc::clone(&self.active),
        }
    }

    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

pub struct RenderSurface {
    pixels: RgbaImage,
    active: Arc<AtomicUsize>,
}

impl RenderSurface {
    /// Take the painted pixels; the surface itself is released on drop.
    fn into_pixels(mut self) -> RgbaImage {
        std::mem::replace(&mut self.pixels, RgbaImage::new(0, 0))
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Lay out and paint `document` into one bitmap of width
/// `round(document.width * scale)` and the full natural content height.
pub fn rasterize(
    document: &RenderableDocument,
    fonts: &FontBook,
    options: &RasterOptions,
    surfaces: &SurfaceRegistry,
) -> Result<RasterImage, RasterError> {
    let scale = options.effective_scale();
    let root = layout_document(document, fonts);

    let width = (document.width * scale).round() as u32;
    let height = (root.outer_height() * scale).ceil() as u32;
    if height > options.max_height_px {
        return Err(RasterError::SurfaceTooLarge {
            width,
            height,
            max: options.max_height_px,
        });
    }

    let mut surface = surfaces.acquire(width, height);
    Painter {
        canvas: &mut surface.pixels,
        fonts,
        scale,
    }
    .paint(&root)?;

    debug!("Rasterized document to {}x{} at {}x", width, height, scale);
    Ok(RasterImage {
        pixels: surface.into_pixels(),
    })
}

// ============================================================================
// PAINTING
// ============================================================================

struct Painter<'a> {
    canvas: &'a mut RgbaImage,
    fonts: &'a FontBook,
    scale: f32,
}

impl Painter<'_> {
    fn paint(&mut self, layout: &LayoutBox) -> Result<(), RasterError> {
        self.paint_background(layout);
        self.paint_border(layout);

        match layout.node.node_type {
            NodeType::Text => self.paint_text(layout)?,
            NodeType::Image => self.paint_image(layout)?,
            _ => {
                for child in &layout.children {
                    self.paint(child)?;
                }
            }
        }
        Ok(())
    }

    fn paint_background(&mut self, layout: &LayoutBox) {
        if let Some(color) = layout.node.style.background_color {
            self.fill(layout.x, layout.y, layout.width, layout.height, color);
        }
    }

    fn paint_border(&mut self, layout: &LayoutBox) {
        let style = &layout.node.style;
        let (x, y, w, h) = (layout.x, layout.y, layout.width, layout.height);

        if let Some(border) = style.border.filter(|b| b.width > 0.0) {
            let bw = border.width;
            self.fill(x, y, w, bw, border.color);
            self.fill(x, y, bw, h, border.color);
            self.fill(x + w - bw, y, bw, h, border.color);
            if style.border_bottom.is_none() {
                self.fill(x, y + h - bw, w, bw, border.color);
            }
        }

        if let Some(bottom) = style.border_bottom.filter(|b| b.width > 0.0) {
            self.fill(x, y + h - bottom.width, w, bottom.width, bottom.color);
        }
    }

    fn paint_text(&mut self, layout: &LayoutBox) -> Result<(), RasterError> {
        if layout.lines.iter().all(|line| line.trim().is_empty()) {
            return Ok(());
        }
        let bold = layout.is_bold();
        let face = self.fonts.face(bold).ok_or(RasterError::NoFont)?;

        let size = layout.font_size();
        let line_height = layout.line_height();
        let color = rgba(layout.node.style.color.unwrap_or(Color::black()));
        let px_scale = PxScale::from(size * self.scale);

        for (i, line) in layout.lines.iter().enumerate() {
            let line_width = self.fonts.text_width(line, size, bold);
            let x = match layout.text_align() {
                TextAlign::Left => layout.x,
                TextAlign::Center => layout.x + (layout.width - line_width) / 2.0,
            };
            let y = layout.y + i as f32 * line_height + (line_height - size) / 2.0;

            draw_text_mut(
                self.canvas,
                color,
                (x * self.scale).round() as i32,
                (y * self.scale).round() as i32,
                px_scale,
                face,
                line,
            );
        }
        Ok(())
    }

    /// Only embedded images are painted; other sources never reach the surface.
    fn paint_image(&mut self, layout: &LayoutBox) -> Result<(), RasterError> {
        let Some(src) = layout.node.src.as_deref() else {
            return Ok(());
        };
        if !src.starts_with("data:") {
            debug!(
                "Skipping non-embedded image {}",
                layout.node.key.unwrap_or("(unkeyed)")
            );
            return Ok(());
        }

        let bytes = decode_data_url(src)?;
        let decoded = image::load_from_memory(&bytes)?.to_rgba8();

        let w = (layout.width * self.scale).round() as u32;
        let h = (layout.height * self.scale).round() as u32;
        if w == 0 || h == 0 {
            return Ok(());
        }

        let resized = imageops::resize(&decoded, w, h, imageops::FilterType::Triangle);
        imageops::overlay(
            self.canvas,
            &resized,
            (layout.x * self.scale).round() as i64,
            (layout.y * self.scale).round() as i64,
        );
        Ok(())
    }

    fn fill(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let x0 = (x * self.scale).round() as i32;
        let y0 = (y * self.scale).round() as i32;
        let x1 = ((x + w) * self.scale).round() as i32;
        let y1 = ((y + h) * self.scale).round() as i32;
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let rect = Rect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32);
        draw_filled_rect_mut(self.canvas, rect, rgba(color));
    }
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 255])
}
