//! # sheet2csv
//!
//! Extracts worksheets of an `.xlsx` workbook as CSV, optionally driven by a
//! JSON configuration file.
use anyhow::{Context, Result};
use clap::Parser;
use sheet_rows::config::file::load_config;
use sheet_rows::{GlobalConfig, SheetParser, SheetSelector, SheetStream};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Convert spreadsheet tables to CSV
#[derive(Parser)]
#[command(name = "sheet2csv")]
#[command(author, version, about = "Extract configured tables from Excel workbooks as CSV", long_about = None)]
struct Cli {
    /// Workbook to read (.xlsx, .xlsm)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// JSON configuration describing the sheets
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Sheet to extract: name, zero-based index or glob pattern. An exact
    /// sheet name takes precedence.
    #[arg(short, long, value_name = "SHEET")]
    sheet: Option<String>,

    /// Write to this file instead of standard output
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,

    /// Extract every sheet, prefixing each record with the sheet name
    #[arg(short, long, conflicts_with = "sheet")]
    all: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = match &cli.config {
        Some(path) => load_config(path).context("Failed to load configuration")?,
        None => GlobalConfig::new(),
    };
    let parser = SheetParser::new(config);
    let mut workbook = parser
        .open_workbook(cli.file.clone())
        .with_context(|| format!("Failed to open workbook: {}", cli.file.display()))?;
    info!(
        workbook = workbook.workbook_name(),
        sheets = workbook.sheets().len(),
        "workbook opened"
    );

    let output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(output);

    if cli.all {
        while let Some(sheet) = workbook.next_sheet() {
            write_sheet(&mut writer, sheet?, true)?;
        }
    } else {
        let selector = match &cli.sheet {
            Some(text) => SheetSelector::parse_for(text, workbook.sheets())
                .with_context(|| format!("Invalid sheet pattern: {text}"))?,
            None => SheetSelector::First,
        };
        let sheet = workbook
            .find_sheet(&selector)?
            .with_context(|| format!("No {selector} in {}", cli.file.display()))?;
        write_sheet(&mut writer, sheet, false)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the output rows of one sheet; `None` values become empty fields.
fn write_sheet<W: Write>(writer: &mut csv::Writer<W>, sheet: SheetStream<'_>, with_sheet_name: bool) -> Result<()> {
    let sheet_name = sheet.sheet_name.clone();
    let mut written = 0usize;
    for row in sheet {
        let row = row.with_context(|| format!("Failed to read sheet \"{sheet_name}\""))?;
        let values = row.iter().map(|value| value.as_deref().unwrap_or(""));
        if with_sheet_name {
            writer.write_record(std::iter::once(sheet_name.as_str()).chain(values))?;
        } else {
            writer.write_record(values)?;
        }
        written += 1;
    }
    info!(sheet = %sheet_name, rows = written, "sheet written");
    Ok(())
}
