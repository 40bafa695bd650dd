//! Embedded raster image extraction from PDF byte buffers.

mod extractor;

pub use extractor::extract_images;

/// An uploaded PDF: opaque bytes plus the originating file name.
///
/// Inputs are borrowed slices of owned byte vectors, so re-reading a
/// buffer on retry is structurally repeatable.
#[derive(Debug, Clone)]
pub struct PdfBuffer {
    /// Originating file name, carried through to the extracted records.
    pub file_name: String,
    /// Raw PDF bytes.
    pub data: Vec<u8>,
}

impl PdfBuffer {
    /// Create a buffer from a file name and its bytes.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }
}

/// Binary encoding of an extracted image's bytes.
///
/// The declared MIME type sent to the model always matches this encoding
/// exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Original JPEG bytes from a DCTDecode stream.
    Jpeg,
    /// PNG re-encoding of a raw raster stream.
    Png,
}

impl ImageEncoding {
    /// MIME type matching the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
        }
    }
}

/// A raster image pulled out of a PDF, tagged with its source document.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// File name of the PDF this image came from.
    pub source_file: String,
    /// Ordinal of this image within its source PDF (0-based).
    pub index: usize,
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// Encoding of `data`.
    pub encoding: ImageEncoding,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Result of one extraction pass over a set of buffers.
#[derive(Debug, Clone, Default)]
pub struct ExtractionBatch {
    /// Extracted images, capped and order-preserving.
    pub images: Vec<ExtractedImage>,
    /// Per-file warnings for buffers that contributed nothing.
    pub warnings: Vec<String>,
}
