//! Core library for quota-gated invoice extraction from PDF-embedded images.
//!
//! This crate provides:
//! - Embedded raster image extraction from PDF byte buffers (capped)
//! - A Gemini vision client returning free-form text per image
//! - JSON recovery from model output (fenced block first, brace fallback)
//! - A rolling 7-day usage ledger and the quota-gated session pipeline
//! - CSV and XLSX export of the extracted records

pub mod error;
pub mod export;
pub mod invoice;
pub mod ledger;
pub mod model;
pub mod models;
pub mod pdf;
pub mod pipeline;

pub use error::{InvexError, Result};
pub use invoice::parse_model_response;
pub use ledger::{FileLedger, UsageStore};
pub use model::{ERROR_MARKER, EXTRACTION_PROMPT, GeminiClient, VisionBackend};
pub use models::config::InvexConfig;
pub use models::record::InvoiceRecord;
pub use pdf::{ExtractedImage, ExtractionBatch, ImageEncoding, PdfBuffer, extract_images};
pub use pipeline::{ImageOutcome, Pipeline, RunReport};
