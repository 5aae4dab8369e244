//! Output document assembly and persistence.
//!
//! A record job accumulates per-item results into an [`Assembled`] document
//! and writes it once, as CSV (tabular mode) or a pretty-printed JSON array
//! (nested mode), to `{label}_{YYYYmmdd_HHMMSS}.{csv|json}` inside the job's
//! destination directory. Tabular exports can carry a companion
//! `{stem}_filters.json` describing the dashboard filter that was active.

use crate::config::OutputConfig;
use crate::error::{Error, Result};
use crate::transform::{Row, Transformed};
use crate::types::{EXTERNAL_ID_FIELD, FilterSpec, OutputMode};
use crate::utils::{companion_metadata_path, get_unique_path, timestamped_file_name};
use chrono::{Local, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Results accumulated over a record job
#[derive(Clone, Debug, PartialEq)]
pub enum Assembled {
    /// Flat rows for CSV output
    Rows(Vec<Row>),
    /// Pruned objects for JSON output
    Objects(Vec<Map<String, Value>>),
}

impl Assembled {
    /// Empty accumulator for the given mode
    pub fn new(mode: OutputMode) -> Self {
        match mode {
            OutputMode::Tabular => Assembled::Rows(Vec::new()),
            OutputMode::Nested => Assembled::Objects(Vec::new()),
        }
    }

    /// Append one item's output
    ///
    /// Output of the other shape is ignored; a worker only produces the
    /// shape its mode asks for.
    pub fn push(&mut self, item: Transformed) {
        match (self, item) {
            (Assembled::Rows(rows), Transformed::Rows(new)) => rows.extend(new),
            (Assembled::Objects(objects), Transformed::Object(obj)) => objects.push(obj),
            (Assembled::Rows(_), Transformed::Object(_))
            | (Assembled::Objects(_), Transformed::Rows(_)) => {
                tracing::warn!("Dropping item output of mismatched shape");
            }
        }
    }

    /// Number of rows or objects
    pub fn len(&self) -> usize {
        match self {
            Assembled::Rows(rows) => rows.len(),
            Assembled::Objects(objects) => objects.len(),
        }
    }

    /// Whether nothing was produced
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Output mode this document is written in
    pub fn mode(&self) -> OutputMode {
        match self {
            Assembled::Rows(_) => OutputMode::Tabular,
            Assembled::Objects(_) => OutputMode::Nested,
        }
    }

    /// Serialize the document
    ///
    /// `columns` are the selection's leaf paths; tabular output puts
    /// `External_ID` first and leaves absent cells empty.
    pub fn render(&self, columns: &[String], delimiter: u8) -> Result<Vec<u8>> {
        match self {
            Assembled::Rows(rows) => render_csv(rows, columns, delimiter),
            Assembled::Objects(objects) => Ok(serde_json::to_vec_pretty(objects)?),
        }
    }
}

/// Text of one CSV cell
///
/// Strings are written raw, numbers and booleans in their JSON form, null as
/// an empty cell, and nested values as compact JSON.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn render_csv(rows: &[Row], columns: &[String], delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    let header: Vec<&str> = std::iter::once(EXTERNAL_ID_FIELD)
        .chain(columns.iter().map(String::as_str).filter(|c| *c != EXTERNAL_ID_FIELD))
        .collect();
    writer.write_record(&header)?;

    for row in rows {
        let record: Vec<String> = header
            .iter()
            .map(|column| row.get(*column).map(render_cell).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Companion metadata written next to a filtered tabular export
#[derive(Debug, Serialize)]
pub struct FilterMetadata<'a> {
    /// Field list of the export, as requested
    pub fields: &'a [String],
    /// Active thresholds
    pub thresholds: &'a [crate::types::FieldThreshold],
    /// How thresholds are combined
    pub logic: crate::types::LogicOperator,
    /// When the export was written
    pub timestamp: String,
    /// File name of the export this describes
    pub output: String,
    /// Number of rows exported
    pub rows: usize,
}

/// Where and how a finished record job is written
#[derive(Debug)]
pub struct ExportPlan<'a> {
    /// Destination directory; created if missing
    pub directory: &'a Path,
    /// Sanitized label for the file name
    pub label: &'a str,
    /// Tabular columns after `External_ID`
    pub columns: &'a [String],
    /// Field list as requested
    pub fields: &'a [String],
    /// Filter to record in a companion file
    pub filter: Option<&'a FilterSpec>,
}

/// Write the document and, when applicable, its filter metadata
///
/// Returns the path of the document.
pub async fn write_export(
    document: &Assembled,
    plan: &ExportPlan<'_>,
    config: &OutputConfig,
) -> Result<PathBuf> {
    let delimiter = u8::try_from(config.delimiter).unwrap_or(b',');
    let bytes = document.render(plan.columns, delimiter)?;

    tokio::fs::create_dir_all(plan.directory).await?;

    let name = timestamped_file_name(plan.label, Local::now(), document.mode().extension());
    let path = get_unique_path(&plan.directory.join(name), config.file_collision)?;
    write_document(&path, &bytes, document, plan, config).await?;

    Ok(path)
}

/// Write the document at `path`, then its companion metadata.
///
/// A failed companion write removes the document again so that a failed
/// export leaves no output behind.
async fn write_document(
    path: &Path,
    bytes: &[u8],
    document: &Assembled,
    plan: &ExportPlan<'_>,
    config: &OutputConfig,
) -> Result<()> {
    tokio::fs::write(path, bytes).await?;

    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        entries = document.len(),
        "Export written"
    );

    if let Some(filter) = plan.filter
        && config.write_filter_metadata
        && document.mode() == OutputMode::Tabular
        && let Err(e) = write_filter_metadata(path, document.len(), plan.fields, filter).await
    {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Filter metadata write failed, removing export"
        );
        if let Err(remove_err) = tokio::fs::remove_file(path).await {
            tracing::warn!(
                path = %path.display(),
                error = %remove_err,
                "Failed to remove export"
            );
        }
        return Err(e);
    }

    Ok(())
}

async fn write_filter_metadata(
    output: &Path,
    rows: usize,
    fields: &[String],
    filter: &FilterSpec,
) -> Result<PathBuf> {
    let metadata = FilterMetadata {
        fields,
        thresholds: &filter.thresholds,
        logic: filter.logic,
        timestamp: Utc::now().to_rfc3339(),
        output: output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        rows,
    };

    let path = companion_metadata_path(output);
    tokio::fs::write(&path, serde_json::to_vec_pretty(&metadata)?).await?;
    Ok(path)
}
