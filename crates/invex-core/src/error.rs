//! Error types for the invex-core library.

use thiserror::Error;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Vision model error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Usage ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// CSV export error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// XLSX export error.
    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF processing.
///
/// These never escape a pipeline run; the extractor downgrades them to
/// per-file warnings and keeps going with the remaining buffers.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF buffer.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// An embedded image stream could not be decoded or re-encoded.
    #[error("failed to decode embedded image: {0}")]
    ImageDecode(String),
}

/// Errors related to the vision model endpoint.
///
/// The client converts all of these into `Error: `-prefixed response text;
/// they only surface as typed errors from the constructor.
#[derive(Error, Debug)]
pub enum ModelError {
    /// No API key in the environment. Constructor-time failure; there is
    /// no built-in fallback key.
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    /// Transport-level failure (connect, TLS, body read).
    #[error("request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// The endpoint answered successfully but with no text candidates.
    #[error("model returned an empty response")]
    EmptyResponse,
}

/// Errors related to the persisted usage ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Ledger file could not be read or written.
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger file exists but does not hold valid timestamp JSON.
    #[error("ledger file is corrupt: {0}")]
    Corrupt(String),
}

/// Errors related to configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read or written.
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for the expected schema.
    #[error("invalid config file: {0}")]
    Parse(String),
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
