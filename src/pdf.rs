//! PDF signature embedding
//!
//! The single PDF operation this crate owns: place an enrolled signature
//! (a raster image or the first page of a signature PDF) onto one page of
//! a target document. The requested rectangle is clamped so it always
//! lands fully inside the page; an out-of-bounds request is repositioned,
//! never rejected. The raster path honors the requested width and height
//! exactly (non-uniform scale allowed); the PDF-page path scales uniformly
//! and preserves the aspect ratio. The mutated document overwrites the
//! original file in place.

use image::ImageFormat;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{ConformaError, ConformaResult};
use crate::logger::{LogLevel, LOGGER};

/// What an enrolled signature blob decodes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureKind {
    RasterImage,
    EmbeddedPdfPage,
}

impl SignatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureKind::RasterImage => "raster-image",
            SignatureKind::EmbeddedPdfPage => "embedded-pdf-page",
        }
    }

    pub fn parse(s: &str) -> Option<SignatureKind> {
        match s {
            "raster-image" => Some(SignatureKind::RasterImage),
            "embedded-pdf-page" => Some(SignatureKind::EmbeddedPdfPage),
            _ => None,
        }
    }
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where on the target page the signature goes
///
/// Coordinates are PDF points from the lower-left corner; `page` is
/// 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignRegion {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SignRegion {
    /// Clamp the requested origin so the rectangle stays inside the page
    fn clamped_origin(&self, page_width: f64, page_height: f64) -> (f64, f64) {
        let max_x = (page_width - self.width).max(0.0);
        let max_y = (page_height - self.height).max(0.0);
        (self.x.clamp(0.0, max_x), self.y.clamp(0.0, max_y))
    }
}

const IMAGE_XOBJECT_NAME: &str = "ImSig";
const FORM_XOBJECT_NAME: &str = "FmSig";

/// Burns a signature artifact into one page of a target PDF
pub struct PdfSignatureEmbedder;

impl PdfSignatureEmbedder {
    pub fn new() -> Self {
        Self
    }

    /// Embed `signature_bytes` onto the page named by `region`
    pub fn embed(
        &self,
        target_pdf: &Path,
        signature_bytes: &[u8],
        kind: SignatureKind,
        region: SignRegion,
    ) -> ConformaResult<()> {
        let mut doc = Document::load(target_pdf)
            .map_err(|e| ConformaError::PdfLoadFailed(format!("{}: {}", target_pdf.display(), e)))?;

        let pages = doc.get_pages();
        let page_id = *pages.get(&region.page).ok_or_else(|| {
            ConformaError::PageOutOfRange(format!("page {} of {}", region.page, pages.len()))
        })?;

        let (px0, py0, px1, py1) = media_box(&doc, page_id);
        let (x, y) = region.clamped_origin(px1 - px0, py1 - py0);

        match kind {
            SignatureKind::RasterImage => {
                self.stamp_raster(&mut doc, page_id, signature_bytes, x, y, region)?
            }
            SignatureKind::EmbeddedPdfPage => {
                self.stamp_pdf_page(&mut doc, page_id, signature_bytes, x, y, region)?
            }
        }

        // Overwrite in place; no temp-file swap (known inconsistency window)
        doc.save(target_pdf)
            .map_err(|e| ConformaError::PdfSaveFailed(format!("{}: {}", target_pdf.display(), e)))?;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Embedded {} signature on page {} of {} at ({:.1}, {:.1})",
                kind,
                region.page,
                target_pdf.display(),
                x,
                y
            ),
            "pdf",
        );
        Ok(())
    }

    /// Draw a PNG or JPEG at the clamped origin, exactly `width` x `height`
    fn stamp_raster(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        bytes: &[u8],
        x: f64,
        y: f64,
        region: SignRegion,
    ) -> ConformaResult<()> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .or_else(|_| image::load_from_memory_with_format(bytes, ImageFormat::Jpeg))
            .map_err(|e| ConformaError::ImageDecodeFailed(e.to_string()))?
            .to_rgba8();

        let (img_w, img_h) = img.dimensions();
        let mut rgb = Vec::with_capacity((img_w * img_h * 3) as usize);
        let mut alpha = Vec::with_capacity((img_w * img_h) as usize);
        for pixel in img.pixels() {
            rgb.push(pixel[0]);
            rgb.push(pixel[1]);
            rgb.push(pixel[2]);
            alpha.push(pixel[3]);
        }

        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => img_w as i64,
                "Height" => img_h as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => img_w as i64,
                "Height" => img_h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "SMask" => smask_id,
            },
            rgb,
        ));

        add_page_xobject(doc, page_id, IMAGE_XOBJECT_NAME, image_id)?;

        // Non-uniform scale: the drawn size is exactly the requested size
        let content = format!(
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /{} Do Q",
            region.width, region.height, x, y, IMAGE_XOBJECT_NAME
        );
        doc.add_page_contents(page_id, content.into_bytes())
            .map_err(|e| ConformaError::PdfSaveFailed(format!("content append: {}", e)))?;
        Ok(())
    }

    /// Draw the first page of a signature PDF as a Form XObject
    ///
    /// Uses one uniform scale factor so the signature keeps its aspect
    /// ratio inside the requested box.
    fn stamp_pdf_page(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        bytes: &[u8],
        x: f64,
        y: f64,
        region: SignRegion,
    ) -> ConformaResult<()> {
        let mut sig_doc = Document::load_mem(bytes)
            .map_err(|e| ConformaError::PdfLoadFailed(format!("signature pdf: {}", e)))?;

        // Bring every signature object into the target's id space, then
        // copy them across so resource references keep resolving
        sig_doc.renumber_objects_with(doc.max_id + 1);
        let sig_pages = sig_doc.get_pages();
        let sig_page_id = *sig_pages
            .values()
            .next()
            .ok_or_else(|| ConformaError::EmptySignaturePdf("no pages".to_string()))?;

        let (sx0, sy0, sx1, sy1) = media_box(&sig_doc, sig_page_id);
        let (orig_w, orig_h) = (sx1 - sx0, sy1 - sy0);

        let content = sig_doc
            .get_page_content(sig_page_id)
            .map_err(|e| ConformaError::PdfLoadFailed(format!("signature content: {}", e)))?;
        let resources = sig_doc
            .get_object(sig_page_id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .and_then(|d| d.get(b"Resources").ok().cloned())
            .unwrap_or_else(|| Object::Dictionary(dictionary! {}));

        doc.objects
            .extend(sig_doc.objects.iter().map(|(id, obj)| (*id, obj.clone())));
        doc.max_id = doc.max_id.max(sig_doc.max_id);

        let form_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![
                    Object::Real(sx0 as f32),
                    Object::Real(sy0 as f32),
                    Object::Real(sx1 as f32),
                    Object::Real(sy1 as f32),
                ],
                "Matrix" => vec![
                    Object::Real(1.0),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(1.0),
                    Object::Real(-sx0 as f32),
                    Object::Real(-sy0 as f32),
                ],
                "Resources" => resources,
            },
            content,
        ));

        add_page_xobject(doc, page_id, FORM_XOBJECT_NAME, form_id)?;

        // Uniform scale preserves the signature's aspect ratio
        let scale = if orig_w > 0.0 && orig_h > 0.0 {
            (region.width / orig_w).min(region.height / orig_h)
        } else {
            1.0
        };
        let content = format!(
            "q {:.4} 0 0 {:.4} {:.2} {:.2} cm /{} Do Q",
            scale, scale, x, y, FORM_XOBJECT_NAME
        );
        doc.add_page_contents(page_id, content.into_bytes())
            .map_err(|e| ConformaError::PdfSaveFailed(format!("content append: {}", e)))?;
        Ok(())
    }
}

impl Default for PdfSignatureEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

/// Register an XObject under the page's resource dictionary
fn add_page_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    object_id: ObjectId,
) -> ConformaResult<()> {
    let mut resources_obj = {
        let page_dict = doc
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| ConformaError::PdfLoadFailed(format!("page dictionary: {}", e)))?;
        page_dict
            .remove(b"Resources")
            .unwrap_or_else(|| Object::Dictionary(dictionary! {}))
    };

    match &mut resources_obj {
        Object::Reference(id) => {
            let res_dict = doc
                .get_object_mut(*id)
                .and_then(|o| o.as_dict_mut())
                .map_err(|e| ConformaError::PdfLoadFailed(format!("resources: {}", e)))?;
            ensure_xobject_dict(res_dict)?.set(name, object_id);
        }
        Object::Dictionary(dict) => {
            ensure_xobject_dict(dict)?.set(name, object_id);
        }
        _ => {
            return Err(ConformaError::PdfLoadFailed(
                "page resources are not a dictionary".to_string(),
            ))
        }
    }

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| ConformaError::PdfLoadFailed(format!("page dictionary: {}", e)))?;
    page_dict.set("Resources", resources_obj);
    Ok(())
}

fn ensure_xobject_dict(
    res_dict: &mut lopdf::Dictionary,
) -> ConformaResult<&mut lopdf::Dictionary> {
    let xobj_owned = res_dict
        .remove(b"XObject")
        .unwrap_or_else(|| Object::Dictionary(dictionary! {}));

    let sanitized = match xobj_owned {
        Object::Dictionary(dict) => Object::Dictionary(dict),
        // An indirect XObject dictionary is replaced with a fresh direct one
        Object::Reference(_) => Object::Dictionary(dictionary! {}),
        _ => {
            return Err(ConformaError::PdfLoadFailed(
                "page XObject entry is not a dictionary".to_string(),
            ))
        }
    };

    res_dict.set("XObject", sanitized);
    match res_dict.get_mut(b"XObject") {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(ConformaError::PdfLoadFailed(
            "page XObject entry is not a dictionary".to_string(),
        )),
    }
}

/// Media box of a page, walking up the page tree when inherited
///
/// Falls back to US Letter when the document carries no media box at all.
fn media_box(doc: &Document, page_id: ObjectId) -> (f64, f64, f64, f64) {
    let mut current = Some(page_id);
    for _ in 0..8 {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
            break;
        };
        if let Some(rect) = extract_media_box(doc, dict) {
            return rect;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|o| o.as_reference().ok());
    }
    (0.0, 0.0, 612.0, 792.0)
}

fn extract_media_box(doc: &Document, dict: &lopdf::Dictionary) -> Option<(f64, f64, f64, f64)> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut nums = [0.0f64; 4];
    for (i, obj) in arr.iter().enumerate() {
        nums[i] = as_number(obj)?;
    }
    Some((nums[0], nums[1], nums[2], nums[3]))
}

fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    /// Minimal one-page document with the given media box
    fn test_pdf(width: f64, height: f64) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ],
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn png_bytes() -> Vec<u8> {
        use image::{ImageBuffer, Rgba};
        let img = ImageBuffer::from_pixel(40, 16, Rgba([10u8, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn pdf_bytes(width: f64, height: f64) -> Vec<u8> {
        let mut doc = test_pdf(width, height);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_clamped_origin() {
        let region = SignRegion {
            page: 1,
            x: 1000.0,
            y: 1000.0,
            width: 150.0,
            height: 60.0,
        };
        // Scenario from the treasury flow: 612x792 page
        assert_eq!(region.clamped_origin(612.0, 792.0), (462.0, 732.0));

        let inside = SignRegion {
            page: 1,
            x: 50.0,
            y: 80.0,
            width: 150.0,
            height: 60.0,
        };
        assert_eq!(inside.clamped_origin(612.0, 792.0), (50.0, 80.0));

        // Negative origins clamp to zero
        let negative = SignRegion {
            page: 1,
            x: -30.0,
            y: -5.0,
            width: 150.0,
            height: 60.0,
        };
        assert_eq!(negative.clamped_origin(612.0, 792.0), (0.0, 0.0));

        // A box wider than the page lands at the left edge
        let oversized = SignRegion {
            page: 1,
            x: 100.0,
            y: 100.0,
            width: 700.0,
            height: 60.0,
        };
        assert_eq!(oversized.clamped_origin(612.0, 792.0), (0.0, 100.0));
    }

    #[test]
    fn test_raster_embed_clamps_and_draws_exact_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("target.pdf");
        std::fs::write(&path, pdf_bytes(612.0, 792.0)).unwrap();

        let region = SignRegion {
            page: 1,
            x: 1000.0,
            y: 1000.0,
            width: 150.0,
            height: 60.0,
        };
        PdfSignatureEmbedder::new()
            .embed(&path, &png_bytes(), SignatureKind::RasterImage, region)
            .unwrap();

        let doc = Document::load(&path).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        let content = String::from_utf8_lossy(&content);
        // Requested size exactly, clamped origin
        assert!(content.contains("150.00 0 0 60.00 462.00 732.00 cm /ImSig Do"));
    }

    #[test]
    fn test_pdf_page_embed_preserves_aspect() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("target.pdf");
        std::fs::write(&path, pdf_bytes(612.0, 792.0)).unwrap();

        // Signature page 200x100, box 150x60 -> scale = min(0.75, 0.6)
        let region = SignRegion {
            page: 1,
            x: 40.0,
            y: 40.0,
            width: 150.0,
            height: 60.0,
        };
        PdfSignatureEmbedder::new()
            .embed(
                &path,
                &pdf_bytes(200.0, 100.0),
                SignatureKind::EmbeddedPdfPage,
                region,
            )
            .unwrap();

        let doc = Document::load(&path).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        let content = String::from_utf8_lossy(&content);
        assert!(content.contains("0.6000 0 0 0.6000 40.00 40.00 cm /FmSig Do"));
    }

    #[test]
    fn test_page_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("target.pdf");
        std::fs::write(&path, pdf_bytes(612.0, 792.0)).unwrap();

        let region = SignRegion {
            page: 9,
            x: 0.0,
            y: 0.0,
            width: 150.0,
            height: 60.0,
        };
        let err = PdfSignatureEmbedder::new()
            .embed(&path, &png_bytes(), SignatureKind::RasterImage, region)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_undecodable_raster_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("target.pdf");
        std::fs::write(&path, pdf_bytes(612.0, 792.0)).unwrap();

        let region = SignRegion {
            page: 1,
            x: 0.0,
            y: 0.0,
            width: 150.0,
            height: 60.0,
        };
        let err = PdfSignatureEmbedder::new()
            .embed(&path, b"not an image at all", SignatureKind::RasterImage, region)
            .unwrap_err();
        assert!(matches!(err, ConformaError::ImageDecodeFailed(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_signature_kind_roundtrip() {
        assert_eq!(
            SignatureKind::parse("raster-image"),
            Some(SignatureKind::RasterImage)
        );
        assert_eq!(
            SignatureKind::parse("embedded-pdf-page"),
            Some(SignatureKind::EmbeddedPdfPage)
        );
        assert_eq!(SignatureKind::parse("vector"), None);
    }
}
