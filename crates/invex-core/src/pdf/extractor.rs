//! Capped extraction of embedded raster images using lopdf.

use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use lopdf::{Document, Object, ObjectId, Stream};
use std::io::Cursor;
use tracing::{debug, trace, warn};

use super::{ExtractedImage, ExtractionBatch, ImageEncoding, PdfBuffer};
use crate::error::PdfError;

/// Extract embedded raster images from a set of PDF buffers.
///
/// Buffers are walked in order, pages in document order, and image
/// XObjects in their listed order. Collection stops immediately once
/// `max_images` images have been gathered; remaining buffers are not
/// resumed. A buffer that fails to open or carries no raster images
/// contributes zero images and a warning, never an error.
pub fn extract_images(buffers: &[PdfBuffer], max_images: usize) -> ExtractionBatch {
    let mut batch = ExtractionBatch::default();

    for buffer in buffers {
        if batch.images.len() >= max_images {
            debug!("image cap reached, skipping remaining PDFs");
            break;
        }

        let doc = match load_document(&buffer.data) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("could not open {}: {}", buffer.file_name, e);
                batch
                    .warnings
                    .push(format!("Could not open {}: {}", buffer.file_name, e));
                continue;
            }
        };

        let found = collect_document_images(&doc, buffer, max_images, &mut batch.images);
        debug!("{}: {} image(s) extracted", buffer.file_name, found);

        if found == 0 && batch.images.len() < max_images {
            batch
                .warnings
                .push(format!("No images found in {}", buffer.file_name));
        }
    }

    batch
}

fn load_document(data: &[u8]) -> Result<Document, PdfError> {
    let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

    // Handle PDFs with empty password encryption
    if doc.is_encrypted() {
        if doc.decrypt("").is_err() {
            return Err(PdfError::Encrypted);
        }
        debug!("decrypted PDF with empty password");
    }

    if doc.get_pages().is_empty() {
        return Err(PdfError::NoPages);
    }

    Ok(doc)
}

/// Walk pages and their XObject dictionaries, appending decoded images
/// until the cap is hit. Returns how many images this document added.
fn collect_document_images(
    doc: &Document,
    buffer: &PdfBuffer,
    max_images: usize,
    images: &mut Vec<ExtractedImage>,
) -> usize {
    let mut found = 0;

    for (page_num, page_id) in doc.get_pages() {
        if images.len() >= max_images {
            break;
        }

        let Some(resources) = page_resources(doc, page_id) else {
            continue;
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            continue;
        };
        let Ok((_, Object::Dictionary(xobjects))) = doc.dereference(xobjects) else {
            continue;
        };

        for (name, entry) in xobjects.iter() {
            if images.len() >= max_images {
                debug!(
                    "per-session image cap reached at page {} of {}",
                    page_num, buffer.file_name
                );
                return found;
            }

            let Ok((_, Object::Stream(stream))) = doc.dereference(entry) else {
                continue;
            };

            match decode_image_stream(doc, stream) {
                Some(decoded) => {
                    trace!(
                        "page {} XObject {}: {}x{} ({:?})",
                        page_num,
                        String::from_utf8_lossy(name),
                        decoded.width,
                        decoded.height,
                        decoded.encoding
                    );
                    images.push(ExtractedImage {
                        source_file: buffer.file_name.clone(),
                        index: found,
                        data: decoded.data,
                        encoding: decoded.encoding,
                        width: decoded.width,
                        height: decoded.height,
                    });
                    found += 1;
                }
                None => {
                    trace!(
                        "page {} XObject {}: not a decodable image",
                        page_num,
                        String::from_utf8_lossy(name)
                    );
                }
            }
        }
    }

    found
}

struct DecodedImage {
    data: Vec<u8>,
    encoding: ImageEncoding,
    width: u32,
    height: u32,
}

fn decode_image_stream(doc: &Document, stream: &Stream) -> Option<DecodedImage> {
    let dict = &stream.dict;

    let subtype = dict.get(b"Subtype").ok()?;
    if subtype.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

    let filter_name = dict.get(b"Filter").ok().and_then(|filter| match filter {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
        _ => None,
    });

    match filter_name {
        Some(b"DCTDecode") => {
            // Validate, then keep the original JPEG bytes so the declared
            // MIME type matches the payload exactly.
            image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .ok()?;
            Some(DecodedImage {
                data: stream.content.clone(),
                encoding: ImageEncoding::Jpeg,
                width,
                height,
            })
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("unsupported image filter, skipping");
            None
        }
        _ => {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            let img = image_from_raw(doc, dict, &data, width, height)?;
            match encode_png(&img) {
                Ok(png) => Some(DecodedImage {
                    data: png,
                    encoding: ImageEncoding::Png,
                    width,
                    height,
                }),
                Err(e) => {
                    debug!("skipping raw image: {}", e);
                    None
                }
            }
        }
    }
}

fn image_from_raw(
    doc: &Document,
    dict: &lopdf::Dictionary,
    data: &[u8],
    width: u32,
    height: u32,
) -> Option<DynamicImage> {
    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        trace!("unsupported bits per component: {}", bits);
        return None;
    }

    match color_space {
        b"DeviceRGB" | b"RGB" | b"CalRGB" => {
            let expected = (width * height * 3) as usize;
            if data.len() < expected {
                return None;
            }
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data[..expected].to_vec())
                .map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" | b"CalGray" => {
            let expected = (width * height) as usize;
            if data.len() < expected {
                return None;
            }
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data[..expected].to_vec())
                .map(DynamicImage::ImageLuma8)
        }
        other => {
            trace!(
                "unsupported color space: {}",
                String::from_utf8_lossy(other)
            );
            None
        }
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, PdfError> {
    let mut data = Vec::new();
    img.write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .map_err(|e| PdfError::ImageDecode(e.to_string()))?;
    Ok(data)
}

/// Resources dictionary for a page, following Parent inheritance.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<lopdf::Dictionary> {
    let page = doc.get_object(page_id).ok()?;
    if let Object::Dictionary(dict) = page {
        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        if let Ok(parent_ref) = dict.get(b"Parent") {
            if let Object::Reference(parent_id) = parent_ref {
                return inherited_resources(doc, *parent_id);
            }
        }
    }
    None
}

fn inherited_resources(doc: &Document, node_id: ObjectId) -> Option<lopdf::Dictionary> {
    let node = doc.get_object(node_id).ok()?;
    if let Object::Dictionary(dict) = node {
        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        if let Ok(parent_ref) = dict.get(b"Parent") {
            if let Object::Reference(parent_id) = parent_ref {
                return inherited_resources(doc, *parent_id);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::{pdf_with_embedded_jpegs, pdf_without_images};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extracts_embedded_jpegs_in_order() {
        let buffers = vec![PdfBuffer::new("a.pdf", pdf_with_embedded_jpegs(3))];
        let batch = extract_images(&buffers, 10);

        assert_eq!(batch.images.len(), 3);
        assert!(batch.warnings.is_empty());
        for (i, image) in batch.images.iter().enumerate() {
            assert_eq!(image.source_file, "a.pdf");
            assert_eq!(image.index, i);
            assert_eq!(image.encoding, ImageEncoding::Jpeg);
            assert_eq!((image.width, image.height), (4, 4));
        }
    }

    #[test]
    fn test_cap_stops_across_buffers() {
        let buffers = vec![
            PdfBuffer::new("a.pdf", pdf_with_embedded_jpegs(3)),
            PdfBuffer::new("b.pdf", pdf_with_embedded_jpegs(3)),
        ];
        let batch = extract_images(&buffers, 4);

        assert_eq!(batch.images.len(), 4);
        assert_eq!(batch.images[2].source_file, "a.pdf");
        assert_eq!(batch.images[3].source_file, "b.pdf");
        assert_eq!(batch.images[3].index, 0);
    }

    #[test]
    fn test_zero_image_pdf_warns_and_continues() {
        let buffers = vec![
            PdfBuffer::new("empty.pdf", pdf_without_images()),
            PdfBuffer::new("full.pdf", pdf_with_embedded_jpegs(1)),
        ];
        let batch = extract_images(&buffers, 10);

        assert_eq!(batch.images.len(), 1);
        assert_eq!(batch.images[0].source_file, "full.pdf");
        assert_eq!(batch.warnings.len(), 1);
        assert!(batch.warnings[0].contains("empty.pdf"));
    }

    #[test]
    fn test_unreadable_pdf_is_not_fatal() {
        let buffers = vec![
            PdfBuffer::new("garbage.pdf", b"not a pdf at all".to_vec()),
            PdfBuffer::new("good.pdf", pdf_with_embedded_jpegs(2)),
        ];
        let batch = extract_images(&buffers, 10);

        assert_eq!(batch.images.len(), 2);
        assert_eq!(batch.warnings.len(), 1);
        assert!(batch.warnings[0].contains("garbage.pdf"));
    }

    #[test]
    fn test_zero_cap_extracts_nothing() {
        let buffers = vec![PdfBuffer::new("a.pdf", pdf_with_embedded_jpegs(2))];
        let batch = extract_images(&buffers, 0);
        assert!(batch.images.is_empty());
    }

    #[test]
    fn test_jpeg_bytes_survive_round_trip() {
        let buffers = vec![PdfBuffer::new("a.pdf", pdf_with_embedded_jpegs(1))];
        let batch = extract_images(&buffers, 1);

        let image = &batch.images[0];
        // The payload must decode as the format it declares.
        image::load_from_memory_with_format(&image.data, image::ImageFormat::Jpeg).unwrap();
    }
}
