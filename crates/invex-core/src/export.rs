//! Tabular export of extracted records: CSV text and XLSX workbooks.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

use crate::error::Result;
use crate::models::record::InvoiceRecord;

/// Render records as CSV with a header row matching the record fields.
///
/// An empty record set still yields the header row.
pub fn records_to_csv(records: &[InvoiceRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    if records.is_empty() {
        writer.write_record(InvoiceRecord::COLUMNS)?;
    }
    for record in records {
        writer.serialize(record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let csv = String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(csv)
}

/// Write records as an XLSX workbook with a bold header row on a single
/// "Invoices" sheet.
pub fn write_xlsx(records: &[InvoiceRecord], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Invoices")?;

    let header_format = Format::new().set_bold();
    for (col, name) in InvoiceRecord::COLUMNS.iter().enumerate() {
        worksheet.write_with_format(0, col as u16, *name, &header_format)?;
    }

    for (row, record) in records.iter().enumerate() {
        let row = row as u32 + 1;
        worksheet.write(row, 0, &record.pdf_file)?;
        worksheet.write(row, 1, &record.invoice_number)?;
        worksheet.write(row, 2, &record.invoice_date)?;
        worksheet.write(row, 3, &record.vendor_name)?;
        worksheet.write(row, 4, &record.total_amount)?;
        worksheet.write(row, 5, &record.items_summary)?;
    }

    workbook.save(path)?;
    debug!("wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}
