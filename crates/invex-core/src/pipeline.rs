//! Session pipeline: capped extraction, quota gate, sequential model calls.

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::invoice::parse_model_response;
use crate::ledger::UsageStore;
use crate::model::VisionBackend;
use crate::models::record::InvoiceRecord;
use crate::pdf::{PdfBuffer, extract_images};

/// What happened to one extracted image, with the raw model text kept
/// around so callers can display it.
#[derive(Debug, Clone)]
pub struct ImageOutcome {
    /// File name of the source PDF.
    pub source_file: String,
    /// Ordinal of the image within its source PDF (0-based).
    pub index: usize,
    /// The model's response, verbatim.
    pub raw_response: String,
    /// Whether a record was recovered from the response.
    pub parsed: bool,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Successfully extracted records, in processing order.
    pub records: Vec<InvoiceRecord>,
    /// Per-image outcomes for every image that reached the model.
    pub outcomes: Vec<ImageOutcome>,
    /// Non-fatal warnings accumulated across the run.
    pub warnings: Vec<String>,
    /// Images collected by the extractor, after the per-session cap.
    pub images_extracted: usize,
    /// Images that reached the model, after the weekly cap.
    pub images_processed: usize,
    /// Images dropped by the weekly cap.
    pub truncated_by_quota: usize,
    /// Approximate weekly usage after this run.
    pub weekly_used_after: usize,
    /// Wall-clock processing time.
    pub processing_time_ms: u64,
}

/// The orchestrator: extraction, two-tier quota gate, per-image model
/// calls, ledger finalization.
///
/// Strictly sequential and one-directional; no retry, no resume, and no
/// error fatal to the caller. Both collaborators are injected so tests
/// can stub the model and the store.
pub struct Pipeline<'a> {
    backend: &'a dyn VisionBackend,
    ledger: &'a dyn UsageStore,
    max_images_per_run: usize,
    weekly_limit: usize,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline with explicit caps.
    pub fn new(
        backend: &'a dyn VisionBackend,
        ledger: &'a dyn UsageStore,
        max_images_per_run: usize,
        weekly_limit: usize,
    ) -> Self {
        Self {
            backend,
            ledger,
            max_images_per_run,
            weekly_limit,
        }
    }

    /// Run the pipeline over a set of PDF buffers.
    pub fn run(&self, buffers: &[PdfBuffer]) -> RunReport {
        self.run_with_progress(buffers, |_, _| {})
    }

    /// Run the pipeline, reporting `(done, total)` around each model call.
    pub fn run_with_progress<F>(&self, buffers: &[PdfBuffer], mut progress: F) -> RunReport
    where
        F: FnMut(usize, usize),
    {
        let start = Instant::now();
        let mut report = RunReport::default();

        // Capped by session
        let mut batch = extract_images(buffers, self.max_images_per_run);
        report.images_extracted = batch.images.len();
        report.warnings.append(&mut batch.warnings);
        let mut images = batch.images;

        // Capped by week
        let used = match self.ledger.weekly_count() {
            Ok(count) => count,
            Err(e) => {
                warn!("usage ledger unreadable: {}", e);
                report
                    .warnings
                    .push(format!("Usage ledger unreadable, treating as empty: {}", e));
                0
            }
        };

        let remaining = self.weekly_limit.saturating_sub(used);
        if remaining == 0 && !images.is_empty() {
            report.warnings.push(format!(
                "Weekly limit of {} invoices reached; no images will be processed",
                self.weekly_limit
            ));
            report.truncated_by_quota = images.len();
            images.clear();
        } else if images.len() > remaining {
            let dropped = images.len() - remaining;
            report.warnings.push(format!(
                "Weekly limit of {} invoices almost reached; processing only {} of {} image(s)",
                self.weekly_limit,
                remaining,
                images.len()
            ));
            report.truncated_by_quota = dropped;
            images.truncate(remaining);
        }
        report.images_processed = images.len();
        debug!(
            "quota gate: {} used of {}, processing {} image(s)",
            used, self.weekly_limit, report.images_processed
        );

        // Processing: one blocking model call per image, in order
        let total = images.len();
        for (done, image) in images.iter().enumerate() {
            progress(done, total);
            let raw = self.backend.extract(image);

            match parse_model_response(&raw) {
                Some(fields) => {
                    report
                        .records
                        .push(InvoiceRecord::from_fields(&image.source_file, &fields));
                    report.outcomes.push(ImageOutcome {
                        source_file: image.source_file.clone(),
                        index: image.index,
                        raw_response: raw,
                        parsed: true,
                    });
                }
                None => {
                    report.warnings.push(format!(
                        "Could not parse invoice data from image {} of {}",
                        image.index + 1,
                        image.source_file
                    ));
                    report.outcomes.push(ImageOutcome {
                        source_file: image.source_file.clone(),
                        index: image.index,
                        raw_response: raw,
                        parsed: false,
                    });
                }
            }
        }
        progress(total, total);

        // Finalize: record only what was actually kept, even when zero
        let parsed = report.records.len();
        if let Err(e) = self.ledger.record_usage(parsed) {
            warn!("failed to record usage: {}", e);
            report
                .warnings
                .push(format!("Failed to record usage: {}", e));
        }
        report.weekly_used_after = used + parsed;
        report.processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "run complete: {} record(s) from {} image(s) in {}ms",
            parsed, report.images_processed, report.processing_time_ms
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::ledger::FileLedger;
    use crate::model::ERROR_MARKER;
    use crate::pdf::ExtractedImage;
    use crate::pdf::testing::{pdf_with_embedded_jpegs, pdf_without_images};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    struct StubBackend {
        response: String,
        calls: Cell<usize>,
    }

    impl StubBackend {
        fn returning(response: &str) -> Self {
            Self {
                response: response.to_string(),
                calls: Cell::new(0),
            }
        }
    }

    impl VisionBackend for StubBackend {
        fn extract(&self, _image: &ExtractedImage) -> String {
            self.calls.set(self.calls.get() + 1);
            self.response.clone()
        }
    }

    #[derive(Default)]
    struct MemoryLedger {
        used: Cell<usize>,
        recorded: Cell<Option<usize>>,
    }

    impl MemoryLedger {
        fn with_used(used: usize) -> Self {
            Self {
                used: Cell::new(used),
                recorded: Cell::new(None),
            }
        }
    }

    impl UsageStore for MemoryLedger {
        fn weekly_count(&self) -> Result<usize, LedgerError> {
            Ok(self.used.get())
        }

        fn record_usage(&self, n: usize) -> Result<(), LedgerError> {
            self.recorded.set(Some(n));
            self.used.set(self.used.get() + n);
            Ok(())
        }
    }

    struct BrokenLedger;

    impl UsageStore for BrokenLedger {
        fn weekly_count(&self) -> Result<usize, LedgerError> {
            Err(LedgerError::Corrupt("bad file".to_string()))
        }

        fn record_usage(&self, _n: usize) -> Result<(), LedgerError> {
            Err(LedgerError::Corrupt("bad file".to_string()))
        }
    }

    const VALID_RESPONSE: &str =
        "```json\n{\"Invoice Number\": \"INV-1\", \"Total Amount\": \"100\"}\n```";

    #[test]
    fn test_end_to_end_single_image() {
        let backend = StubBackend::returning(VALID_RESPONSE);
        let ledger = MemoryLedger::default();
        let pipeline = Pipeline::new(&backend, &ledger, 10, 50);

        let buffers = vec![PdfBuffer::new("inv.pdf", pdf_with_embedded_jpegs(1))];
        let report = pipeline.run(&buffers);

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].pdf_file, "inv.pdf");
        assert_eq!(report.records[0].invoice_number, "INV-1");
        assert_eq!(report.records[0].total_amount, "100");
        assert_eq!(report.records[0].items_summary, "");
        assert_eq!(ledger.recorded.get(), Some(1));
        assert_eq!(report.weekly_used_after, 1);
    }

    #[test]
    fn test_zero_image_pdf_never_calls_model() {
        let backend = StubBackend::returning(VALID_RESPONSE);
        let ledger = MemoryLedger::default();
        let pipeline = Pipeline::new(&backend, &ledger, 10, 50);

        let buffers = vec![PdfBuffer::new("empty.pdf", pdf_without_images())];
        let report = pipeline.run(&buffers);

        assert_eq!(backend.calls.get(), 0);
        assert!(report.records.is_empty());
        assert_eq!(report.images_extracted, 0);
        // Finalize still runs and records zero usage.
        assert_eq!(ledger.recorded.get(), Some(0));
        assert!(report.warnings.iter().any(|w| w.contains("empty.pdf")));
    }

    #[test]
    fn test_session_cap_limits_extraction() {
        let backend = StubBackend::returning(VALID_RESPONSE);
        let ledger = MemoryLedger::default();
        let pipeline = Pipeline::new(&backend, &ledger, 2, 50);

        let buffers = vec![PdfBuffer::new("many.pdf", pdf_with_embedded_jpegs(5))];
        let report = pipeline.run(&buffers);

        assert_eq!(report.images_extracted, 2);
        assert_eq!(backend.calls.get(), 2);
        assert_eq!(report.records.len(), 2);
    }

    #[test]
    fn test_weekly_cap_truncates_batch() {
        // 13 used with a cap of 15 leaves room for exactly 2 of 5.
        let backend = StubBackend::returning(VALID_RESPONSE);
        let ledger = MemoryLedger::with_used(13);
        let pipeline = Pipeline::new(&backend, &ledger, 10, 15);

        let buffers = vec![PdfBuffer::new("batch.pdf", pdf_with_embedded_jpegs(5))];
        let report = pipeline.run(&buffers);

        assert_eq!(report.images_processed, 2);
        assert_eq!(report.truncated_by_quota, 3);
        assert_eq!(backend.calls.get(), 2);
        assert_eq!(ledger.recorded.get(), Some(2));
        assert_eq!(ledger.weekly_count().unwrap(), 15);
        assert_eq!(report.weekly_used_after, 15);
        assert!(report.warnings.iter().any(|w| w.contains("Weekly limit")));
    }

    #[test]
    fn test_exhausted_quota_rejects_before_any_model_call() {
        let backend = StubBackend::returning(VALID_RESPONSE);
        let ledger = MemoryLedger::with_used(50);
        let pipeline = Pipeline::new(&backend, &ledger, 10, 50);

        let buffers = vec![PdfBuffer::new("inv.pdf", pdf_with_embedded_jpegs(3))];
        let report = pipeline.run(&buffers);

        assert_eq!(backend.calls.get(), 0);
        assert!(report.records.is_empty());
        assert_eq!(report.truncated_by_quota, 3);
        assert_eq!(ledger.recorded.get(), Some(0));
        assert_eq!(report.weekly_used_after, 50);
    }

    #[test]
    fn test_unparseable_response_warns_and_continues() {
        let backend = StubBackend::returning("I see an invoice but cannot read it.");
        let ledger = MemoryLedger::default();
        let pipeline = Pipeline::new(&backend, &ledger, 10, 50);

        let buffers = vec![PdfBuffer::new("inv.pdf", pdf_with_embedded_jpegs(2))];
        let report = pipeline.run(&buffers);

        assert!(report.records.is_empty());
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| !o.parsed));
        assert_eq!(
            report
                .warnings
                .iter()
                .filter(|w| w.contains("Could not parse"))
                .count(),
            2
        );
        // Only parsed records count against the budget.
        assert_eq!(ledger.recorded.get(), Some(0));
    }

    #[test]
    fn test_error_marker_response_flows_into_parser() {
        let backend =
            StubBackend::returning(&format!("{}request failed: connection refused", ERROR_MARKER));
        let ledger = MemoryLedger::default();
        let pipeline = Pipeline::new(&backend, &ledger, 10, 50);

        let buffers = vec![PdfBuffer::new("inv.pdf", pdf_with_embedded_jpegs(1))];
        let report = pipeline.run(&buffers);

        assert!(report.records.is_empty());
        assert!(report.outcomes[0].raw_response.starts_with(ERROR_MARKER));
        assert!(report.warnings.iter().any(|w| w.contains("Could not parse")));
    }

    #[test]
    fn test_broken_ledger_is_treated_as_empty() {
        let backend = StubBackend::returning(VALID_RESPONSE);
        let pipeline = Pipeline::new(&backend, &BrokenLedger, 10, 50);

        let buffers = vec![PdfBuffer::new("inv.pdf", pdf_with_embedded_jpegs(1))];
        let report = pipeline.run(&buffers);

        // Processing proceeds; both ledger failures surface as warnings.
        assert_eq!(report.records.len(), 1);
        assert!(report.warnings.iter().any(|w| w.contains("ledger unreadable")));
        assert!(report.warnings.iter().any(|w| w.contains("record usage")));
    }

    #[test]
    fn test_weekly_cap_against_file_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let timestamps: Vec<_> = (0..13).map(|_| Utc::now() - Duration::days(1)).collect();
        std::fs::write(
            &path,
            serde_json::to_string(&serde_json::json!({ "timestamps": timestamps })).unwrap(),
        )
        .unwrap();

        let backend = StubBackend::returning(VALID_RESPONSE);
        let ledger = FileLedger::new(&path);
        let pipeline = Pipeline::new(&backend, &ledger, 10, 15);

        let buffers = vec![PdfBuffer::new("batch.pdf", pdf_with_embedded_jpegs(5))];
        let report = pipeline.run(&buffers);

        assert_eq!(report.images_processed, 2);
        assert_eq!(ledger.weekly_count().unwrap(), 15);
    }

    #[test]
    fn test_progress_callback_reports_totals() {
        let backend = StubBackend::returning(VALID_RESPONSE);
        let ledger = MemoryLedger::default();
        let pipeline = Pipeline::new(&backend, &ledger, 10, 50);

        let buffers = vec![PdfBuffer::new("inv.pdf", pdf_with_embedded_jpegs(3))];
        let mut seen = Vec::new();
        pipeline.run_with_progress(&buffers, |done, total| seen.push((done, total)));

        assert_eq!(seen, vec![(0, 3), (1, 3), (2, 3), (3, 3)]);
    }
}
