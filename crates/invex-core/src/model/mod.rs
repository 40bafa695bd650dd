//! Vision model client for per-image invoice field extraction.

mod gemini;

pub use gemini::GeminiClient;

use crate::pdf::ExtractedImage;

/// Prefix carried by responses that encode a transport or API failure.
///
/// The backend contract is "always returns text": failed calls come back
/// as this marker plus the error detail, and flow into the parser like
/// any other response.
pub const ERROR_MARKER: &str = "Error: ";

/// Instruction sent with every image.
pub const EXTRACTION_PROMPT: &str = "\
Extract the following information from this invoice image:
1. Invoice Number
2. Invoice Date
3. Vendor/Company Name
4. Total Amount
5. Items with their quantities and prices (if visible)

Format the output as a JSON with these fields.";

/// A vision-capable model that answers one image with free-form text.
///
/// Implementations make a single blocking attempt per image, no retries.
/// Callers must treat every return value as text to parse; nothing about
/// its shape is guaranteed.
pub trait VisionBackend {
    /// Send one image plus the fixed instruction, returning the raw
    /// response verbatim. Failures are returned as text starting with
    /// [`ERROR_MARKER`], never raised.
    fn extract(&self, image: &ExtractedImage) -> String;
}
