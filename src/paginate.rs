//! Slices one tall raster into page-height bands.
//!
//! The pixels-per-millimetre ratio is fixed once by matching the raster
//! width to the printable width, so every band shares the same scale. Bands
//! are copied onto a white canvas and JPEG encoded; the last band keeps its
//! own (shorter) height instead of being padded to a full page.

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use thiserror::Error;
use tracing::debug;

use crate::raster::RasterImage;

pub const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Error)]
pub enum PaginateError {
    #[error("raster has no width")]
    EmptyWidth,
    #[error("page band would be less than one pixel tall")]
    BandTooSmall,
    #[error("failed to encode page band: {0}")]
    Encode(#[from] image::ImageError),
}

/// Output page size and uniform margin, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
}

impl PageGeometry {
    pub const A4: PageGeometry = PageGeometry {
        width_mm: 210.0,
        height_mm: 297.0,
        margin_mm: 10.0,
    };

    pub fn content_width_mm(&self) -> f32 {
        self.width_mm - 2.0 * self.margin_mm
    }

    pub fn content_height_mm(&self) -> f32 {
        self.height_mm - 2.0 * self.margin_mm
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        PageGeometry::A4
    }
}

#[derive(Debug, Clone)]
pub struct PageBand {
    /// First source row copied into this band
    pub source_y: u32,
    pub source_height: u32,
    pub width_px: u32,
    pub jpeg: Vec<u8>,
    /// Placed size on the page
    pub width_mm: f32,
    pub height_mm: f32,
}

/// Pixel height of a full band for a raster `raster_width` pixels wide.
pub fn band_height_px(raster_width: u32, geometry: &PageGeometry) -> Result<u32, PaginateError> {
    if raster_width == 0 {
        return Err(PaginateError::EmptyWidth);
    }
    let px_per_mm = raster_width as f32 / geometry.content_width_mm();
    let height = (geometry.content_height_mm() * px_per_mm).floor() as u32;
    if height == 0 {
        return Err(PaginateError::BandTooSmall);
    }
    Ok(height)
}

/// Split `raster` into bands. A zero-height raster yields no bands.
pub fn paginate(raster: &RasterImage, geometry: &PageGeometry) -> Result<Vec<PageBand>, PaginateError> {
    let total = raster.height();
    if total == 0 {
        return Ok(Vec::new());
    }

    let width = raster.width();
    let page_px = band_height_px(width, geometry)?;
    let px_per_mm = width as f32 / geometry.content_width_mm();

    let mut bands = Vec::with_capacity(total.div_ceil(page_px) as usize);
    let mut consumed = 0;
    while consumed < total {
        let slice_height = page_px.min(total - consumed);
        let jpeg = encode_band(raster, consumed, slice_height)?;

        bands.push(PageBand {
            source_y: consumed,
            source_height: slice_height,
            width_px: width,
            jpeg,
            width_mm: geometry.content_width_mm(),
            height_mm: round2(slice_height as f32 / px_per_mm),
        });
        consumed += slice_height;
    }

    debug!(
        "Paginated {}x{} raster into {} band(s) of up to {} px",
        width,
        total,
        bands.len(),
        page_px
    );
    Ok(bands)
}

fn encode_band(raster: &RasterImage, y: u32, height: u32) -> Result<Vec<u8>, PaginateError> {
    let width = raster.width();
    let slice = imageops::crop_imm(&raster.pixels, 0, y, width, height).to_image();

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &slice, 0, 0);
    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(jpeg)
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
