//! Record jobs: concurrent fetch, per-item transform, single output document.
//!
//! One unit per identifier is spawned into a `JoinSet`; each waits for a slot
//! in the shared [`FetchPool`], fetches, extracts the `data` field and
//! transforms it. Results are consumed in completion order. A failing unit
//! is logged and counted but never aborts its siblings; the job only fails
//! as a whole when nothing usable came back, when it was cancelled, or when
//! the output cannot be written.

use super::JobRegistry;
use super::pool::FetchPool;
use super::reporter::JobReporter;
use crate::client::{HwdbClient, extract_data, fetch_record};
use crate::config::Config;
use crate::error::{ItemError, JobError, Result, SubmissionError};
use crate::output::{Assembled, ExportPlan, write_export};
use crate::selection::FieldSelection;
use crate::transform::{Transformed, to_object, to_rows};
use crate::types::{FilterSpec, JobId, JobKind, OutputMode, RecordJobRequest, RecordSource};
use crate::utils::{dedup_identifiers, sanitize_label};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Everything a record worker needs, moved into its task
struct RecordJob {
    identifiers: Vec<String>,
    selection: Arc<FieldSelection>,
    mode: OutputMode,
    source: Arc<RecordSource>,
    label: String,
    destination: PathBuf,
    filter: Option<FilterSpec>,
    client: Arc<dyn HwdbClient>,
    pool: FetchPool,
    config: Arc<Config>,
    cancel: CancellationToken,
    reporter: JobReporter,
}

impl JobRegistry {
    /// Submit a record job
    ///
    /// Identifiers are trimmed and deduplicated (first occurrence wins) and
    /// the field list is compiled before the job is created. Returns as soon
    /// as the job is registered; the work runs in the background.
    ///
    /// # Errors
    /// [`SubmissionError::NoIdentifiers`] if nothing is left after
    /// deduplication, `ShuttingDown` after [`shutdown`](Self::shutdown).
    pub fn submit(&self, request: RecordJobRequest) -> Result<JobId> {
        self.ensure_accepting()?;

        let identifiers = dedup_identifiers(request.identifiers);
        if identifiers.is_empty() {
            return Err(SubmissionError::NoIdentifiers.into());
        }

        let selection = FieldSelection::compile(&request.fields);
        let label = sanitize_label(&request.label);
        let destination = request
            .destination
            .unwrap_or_else(|| self.config.output.output_dir.clone());

        let (reporter, cancel) = self.register(
            JobKind::Records { mode: request.mode },
            label.clone(),
            identifiers.len() as u64,
        );
        let id = reporter.id().clone();

        tracing::info!(
            job_id = %id,
            identifiers = identifiers.len(),
            fields = selection.requested.len(),
            mode = ?request.mode,
            "Record job submitted"
        );

        let job = RecordJob {
            identifiers,
            selection: Arc::new(selection),
            mode: request.mode,
            source: Arc::new(request.source),
            label,
            destination,
            filter: request.filter,
            client: Arc::clone(&self.client),
            pool: self.pool.clone(),
            config: Arc::clone(&self.config),
            cancel,
            reporter,
        };
        tokio::spawn(run_record_job(job));

        Ok(id)
    }
}

async fn run_record_job(job: RecordJob) {
    let RecordJob {
        identifiers,
        selection,
        mode,
        source,
        label,
        destination,
        filter,
        client,
        pool,
        config,
        cancel,
        reporter,
    } = job;

    let job_id = reporter.id().clone();
    let total = identifiers.len() as u64;
    reporter.start(total, format!("Fetching {} records", total));

    let mut units = JoinSet::new();
    for part_id in identifiers {
        let client = Arc::clone(&client);
        let pool = pool.clone();
        let config = Arc::clone(&config);
        let cancel = cancel.clone();
        let selection = Arc::clone(&selection);
        let source = Arc::clone(&source);

        units.spawn(async move {
            let result = fetch_and_transform(
                client.as_ref(),
                &pool,
                &config,
                &cancel,
                &source,
                &selection,
                mode,
                &part_id,
            )
            .await;
            (part_id, result)
        });
    }

    let mut document = Assembled::new(mode);
    let mut skipped = 0u64;

    while let Some(joined) = units.join_next().await {
        match joined {
            Ok((_, Err(ItemError::Cancelled))) => skipped += 1,
            Ok((part_id, Ok(output))) => {
                document.push(output);
                reporter.item_succeeded();
                tracing::trace!(job_id = %job_id, part_id = %part_id, "Record processed");
            }
            Ok((part_id, Err(e))) => {
                tracing::warn!(job_id = %job_id, part_id = %part_id, error = %e, "Record failed, skipping");
                reporter.item_failed(&part_id, &e);
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Record unit panicked");
                reporter.item_failed("unknown", &e);
            }
        }
    }

    let progress = reporter.current();

    if cancel.is_cancelled() {
        tracing::info!(job_id = %job_id, processed = progress.processed, skipped, "Record job cancelled");
        reporter.finish_error(JobError::Cancelled {
            processed: progress.processed,
            total,
            skipped,
        });
        return;
    }

    if document.is_empty() {
        tracing::warn!(job_id = %job_id, failed = progress.failed, "Record job produced no usable data");
        reporter.finish_error(JobError::NoUsableData {
            attempted: progress.processed,
            failed: progress.failed,
        });
        return;
    }

    let columns = selection.columns();
    let plan = ExportPlan {
        directory: &destination,
        label: &label,
        columns: &columns,
        fields: &selection.requested,
        filter: filter.as_ref(),
    };

    match write_export(&document, &plan, &config.output).await {
        Ok(path) => {
            let unit = match mode {
                OutputMode::Tabular => "rows",
                OutputMode::Nested => "records",
            };
            let message = format!(
                "Wrote {} {} ({} of {} items failed)",
                document.len(),
                unit,
                progress.failed,
                total
            );
            tracing::info!(
                job_id = %job_id,
                path = %path.display(),
                entries = document.len(),
                failed = progress.failed,
                "Record job completed"
            );
            reporter.finish_done(path, message);
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to write record job output");
            reporter.finish_error(JobError::Persistence {
                path: destination.clone(),
                reason: e.to_string(),
            });
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn fetch_and_transform(
    client: &dyn HwdbClient,
    pool: &FetchPool,
    config: &Config,
    cancel: &CancellationToken,
    source: &RecordSource,
    selection: &FieldSelection,
    mode: OutputMode,
    part_id: &str,
) -> std::result::Result<Transformed, ItemError> {
    let response = pool
        .run(&config.fetch, cancel, || fetch_record(client, source, part_id))
        .await?;
    let record = extract_data(response)?;

    match mode {
        OutputMode::Tabular => to_rows(&record, part_id, selection).map(Transformed::Rows),
        OutputMode::Nested => to_object(&record, part_id, &selection.tree).map(Transformed::Object),
    }
}
