//! The per-image extraction result exposed to callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A structured invoice record recovered from one extracted image.
///
/// All fields are strings; anything the model did not report stays empty.
/// Records live only for the processing run and are exported on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// File name of the source PDF.
    #[serde(rename = "PDF_File")]
    pub pdf_file: String,

    /// Invoice number/identifier.
    #[serde(rename = "Invoice_Number")]
    pub invoice_number: String,

    /// Date the invoice was issued, as reported by the model.
    #[serde(rename = "Invoice_Date")]
    pub invoice_date: String,

    /// Vendor or company name.
    #[serde(rename = "Vendor_Name")]
    pub vendor_name: String,

    /// Total amount, as reported by the model.
    #[serde(rename = "Total_Amount")]
    pub total_amount: String,

    /// Flattened line items, one segment per item.
    #[serde(rename = "Items_Summary")]
    pub items_summary: String,
}

impl InvoiceRecord {
    /// Export column names, in field order. Matches the serialized names.
    pub const COLUMNS: [&'static str; 6] = [
        "PDF_File",
        "Invoice_Number",
        "Invoice_Date",
        "Vendor_Name",
        "Total_Amount",
        "Items_Summary",
    ];

    /// Build a record from the field map recovered out of model output.
    ///
    /// Field values may arrive as strings or numbers; both are accepted
    /// and stringified. Missing or null fields become empty strings.
    pub fn from_fields(source_file: &str, fields: &Map<String, Value>) -> Self {
        Self {
            pdf_file: source_file.to_string(),
            invoice_number: field_string(fields, "Invoice Number"),
            invoice_date: field_string(fields, "Invoice Date"),
            vendor_name: field_string(fields, "Vendor/Company Name"),
            total_amount: field_string(fields, "Total Amount"),
            items_summary: flatten_items(fields.get("Items")),
        }
    }
}

fn field_string(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::Null) | None => String::new(),
        Some(value) => value_string(value),
    }
}

fn value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten a line-item list into a single summary string.
///
/// One segment per item, `Item {n}: key: value, key: value`, segments
/// joined by `"; "`. A bare (non-object) entry becomes its own segment;
/// a non-array `Items` value flattens to an empty summary.
fn flatten_items(items: Option<&Value>) -> String {
    let Some(Value::Array(items)) = items else {
        return String::new();
    };

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let details = match item {
                Value::Object(map) => map
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value_string(value)))
                    .collect::<Vec<_>>()
                    .join(", "),
                other => value_string(other),
            };
            format!("Item {}: {}", idx + 1, details)
        })
        .collect::<Vec<_>>()
        .join("; ")
}
