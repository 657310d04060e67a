use chrono::{DateTime, SecondsFormat, Utc};
use printpdf::*;
use std::io::{BufWriter, Cursor};
use thiserror::Error;
use tracing::debug;

use crate::paginate::{PageBand, PageGeometry};

const MM_PER_INCH: f32 = 25.4;
const PLACEHOLDER_ENTITY: &str = "registration";

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to write PDF: {0}")]
    Save(String),
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Assemble page bands into a PDF, one band per page. No bands yields a
/// single blank page.
pub fn assemble(bands: &[PageBand], geometry: &PageGeometry, title: &str) -> Result<Vec<u8>, PdfError> {
    let page_w = Mm(geometry.width_mm);
    let page_h = Mm(geometry.height_mm);

    // 1) First page comes with the document
    let (doc, page1, layer1) = PdfDocument::new(title, page_w, page_h, "Layer 1");

    // 2) Place each band, appending a page for every band after the first
    for (i, band) in bands.iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(page1).get_layer(layer1)
        } else {
            let (new_page, new_layer) = doc.add_page(page_w, page_h, "Layer 1");
            doc.get_page(new_page).get_layer(new_layer)
        };

        debug!(
            "Page {}: rows {}..{} at {} mm",
            i + 1,
            band.source_y,
            band.source_y + band.source_height,
            band.height_mm
        );
        place_band(band, geometry, &layer);
    }

    // 3) Export to bytes
    let mut buf = Vec::new();
    {
        let cursor = Cursor::new(&mut buf);
        let mut writer = BufWriter::new(cursor);
        doc.save(&mut writer)
            .map_err(|e| PdfError::Save(e.to_string()))?;
    }

    Ok(buf)
}

/// `<prefix>-<entity>-<timestamp>.pdf` with every character outside
/// `[A-Za-z0-9]` in the prefix and entity replaced by `-`.
pub fn derive_filename(prefix: &str, entity: Option<&str>, now: DateTime<Utc>) -> String {
    let entity = entity
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(PLACEHOLDER_ENTITY);
    format!(
        "{}-{}-{}.pdf",
        sanitize(prefix),
        sanitize(entity),
        file_timestamp(now)
    )
}

/// ISO-8601 timestamp with `:` and `.` replaced, safe for object paths.
pub fn file_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

// ============================================================================
// BAND PLACEMENT
// ============================================================================

fn place_band(band: &PageBand, geometry: &PageGeometry, layer: &PdfLayerReference) {
    let source_h = band.source_height as f32;
    let image = Image::from(ImageXObject {
        width: Px(band.width_px as usize),
        height: Px(band.source_height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: band.jpeg.clone(),
        image_filter: Some(ImageFilter::DCT),
        clipping_bbox: None,
        smask: None,
    });

    // dpi that makes the band exactly the printable width
    let dpi = band.width_px as f32 * MM_PER_INCH / band.width_mm;
    let natural_h_mm = source_h * MM_PER_INCH / dpi;
    let scale_y = if natural_h_mm > 0.0 {
        band.height_mm / natural_h_mm
    } else {
        1.0
    };

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(geometry.margin_mm)),
            translate_y: Some(Mm(geometry.height_mm - geometry.margin_mm - band.height_mm)),
            rotate: None,
            scale_x: Some(1.0),
            scale_y: Some(scale_y),
            dpi: Some(dpi),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paginate::paginate;
    use crate::raster::RasterImage;
    use chrono::TimeZone;
    use ::image::{Rgba, RgbaImage};

    fn page_count(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn one_page_per_band() {
        let raster = RasterImage {
            pixels: RgbaImage::from_pixel(190, 831, Rgba([200, 10, 10, 255])),
        };
        let bands = paginate(&raster, &PageGeometry::A4).unwrap();
        let bytes = assemble(&bands, &PageGeometry::A4, "ACP Registration").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(page_count(&bytes), 3);
    }

    #[test]
    fn no_bands_is_one_blank_page() {
        let bytes = assemble(&[], &PageGeometry::A4, "empty").unwrap();
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn filename_uses_prefix_entity_and_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 5).unwrap();
        assert_eq!(
            derive_filename("ACP-Registration", Some("PT TEST COMPANY"), now),
            "ACP-Registration-PT-TEST-COMPANY-2026-10-19T08-30-05-000Z.pdf"
        );
        assert_eq!(
            derive_filename("ACP-Registration", Some("  "), now),
            "ACP-Registration-registration-2026-10-19T08-30-05-000Z.pdf"
        );
        assert_eq!(
            derive_filename("ACP-Registration", None, now),
            "ACP-Registration-registration-2026-10-19T08-30-05-000Z.pdf"
        );
    }

    #[test]
    fn filenames_only_contain_safe_characters() {
        let now = Utc::now();
        let nasty = [
            "PT. Maju/Jaya & Sons",
            "Toko \"Sejahtera\" <CV>",
            "Ünïcödé Ñame",
            "../../etc/passwd",
            "tab\tnewline\n",
            "😀 emoji",
        ];
        for name in nasty {
            let filename = derive_filename("ACP Registration!", Some(name), now);
            assert!(
                filename
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.'),
                "unsafe filename {}",
                filename
            );
            assert!(filename.ends_with(".pdf"));
        }
    }
}
