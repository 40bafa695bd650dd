//! Process command - run the extraction pipeline over PDF files.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invex_core::export::{records_to_csv, write_xlsx};
use invex_core::{FileLedger, GeminiClient, InvoiceRecord, PdfBuffer, Pipeline, RunReport};

use super::config::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Also write an XLSX workbook
    #[arg(long)]
    xlsx: Option<PathBuf>,

    /// Print each raw model response
    #[arg(long)]
    show_raw: bool,

    /// Override the per-run image cap
    #[arg(long)]
    max_images: Option<usize>,

    /// Override the weekly invoice limit
    #[arg(long)]
    weekly_limit: Option<usize>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// CSV output
    Csv,
    /// JSON output
    Json,
    /// Plain text table
    Table,
}

pub fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    // Expand glob patterns into PDF paths
    let mut files: Vec<PathBuf> = Vec::new();
    for pattern in &args.inputs {
        for entry in glob(pattern)? {
            let path = entry?;
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext.eq_ignore_ascii_case("pdf") {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        anyhow::bail!("No matching PDF files found for: {}", args.inputs.join(" "));
    }

    info!("processing {} PDF file(s)", files.len());

    let buffers = files
        .iter()
        .map(|path| {
            let data = fs::read(path)?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unknown.pdf")
                .to_string();
            Ok(PdfBuffer::new(file_name, data))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let max_images = args.max_images.unwrap_or(config.pdf.max_images_per_run);
    let weekly_limit = args.weekly_limit.unwrap_or(config.quota.weekly_limit);

    // Fail closed before touching the ledger or the network
    let client = GeminiClient::from_env(&config.model).map_err(|e| {
        anyhow::anyhow!("{}. Set GEMINI_API_KEY in the environment or a .env file.", e)
    })?;
    let ledger = FileLedger::new(&config.quota.ledger_path);
    let pipeline = Pipeline::new(&client, &ledger, max_images, weekly_limit);

    let pb = ProgressBar::new(buffers.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-"),
    );
    pb.set_message("querying model");

    let report = pipeline.run_with_progress(&buffers, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    });
    pb.finish_and_clear();

    print_report(&args, &report, weekly_limit)?;

    debug!("total processing time: {}ms", report.processing_time_ms);
    Ok(())
}

fn print_report(args: &ProcessArgs, report: &RunReport, weekly_limit: usize) -> anyhow::Result<()> {
    for warning in &report.warnings {
        eprintln!("{} {}", style("⚠").yellow(), warning);
    }

    if args.show_raw {
        for outcome in &report.outcomes {
            println!(
                "{}",
                style(format!(
                    "--- image {} from {} ---",
                    outcome.index + 1,
                    outcome.source_file
                ))
                .dim()
            );
            println!("{}", outcome.raw_response);
        }
    }

    let output = match args.format {
        OutputFormat::Csv => records_to_csv(&report.records)?,
        OutputFormat::Json => serde_json::to_string_pretty(&report.records)?,
        OutputFormat::Table => format_table(&report.records),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if let Some(xlsx_path) = &args.xlsx {
        write_xlsx(&report.records, xlsx_path)?;
        println!(
            "{} Workbook written to {}",
            style("✓").green(),
            xlsx_path.display()
        );
    }

    println!();
    println!(
        "{} {} of {} image(s) parsed, {} / {} used this week",
        style("ℹ").blue(),
        report.records.len(),
        report.images_processed,
        report.weekly_used_after,
        weekly_limit
    );

    Ok(())
}

fn format_table(records: &[InvoiceRecord]) -> String {
    if records.is_empty() {
        return "No records extracted.".to_string();
    }

    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. {} | {} | {} | {} | {}\n",
            i + 1,
            record.pdf_file,
            record.invoice_number,
            record.invoice_date,
            record.vendor_name,
            record.total_amount
        ));
        if !record.items_summary.is_empty() {
            out.push_str(&format!("     {}\n", record.items_summary));
        }
    }
    out
}
