//! Image jobs: list every item's images, then download them one by one.
//!
//! Unlike record jobs, the first failure is fatal: a listing error, an
//! image record without usable metadata, a failed fetch or a failed write
//! stops the job with an error and the remaining images are not attempted.

use super::JobRegistry;
use super::pool::FetchPool;
use super::reporter::JobReporter;
use crate::client::{HwdbClient, extract_data};
use crate::config::{Config, FileCollisionAction};
use crate::error::{ItemError, JobError, Result, SubmissionError};
use crate::types::{ImageJobRequest, JobId, JobKind};
use crate::utils::{dedup_identifiers, get_unique_path, sanitize_file_name, sanitize_label};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One image to download
#[derive(Clone, Debug)]
struct ImageRef {
    part_id: String,
    record: Value,
}

struct ImageJob {
    part_ids: Vec<String>,
    destination: PathBuf,
    client: Arc<dyn HwdbClient>,
    pool: FetchPool,
    config: Arc<Config>,
    cancel: CancellationToken,
    reporter: JobReporter,
}

impl JobRegistry {
    /// Submit an image download job
    ///
    /// Images land in `request.destination`, or `<output_dir>/<label>_images`
    /// when none is given.
    ///
    /// # Errors
    /// [`SubmissionError::NoPartIds`] for an empty part list, `ShuttingDown`
    /// after [`shutdown`](Self::shutdown).
    pub fn submit_images(&self, request: ImageJobRequest) -> Result<JobId> {
        self.ensure_accepting()?;

        let part_ids = dedup_identifiers(request.part_ids);
        if part_ids.is_empty() {
            return Err(SubmissionError::NoPartIds.into());
        }

        let label = sanitize_label(&request.label);
        let destination = request.destination.unwrap_or_else(|| {
            self.config
                .output
                .output_dir
                .join(format!("{}_images", label))
        });

        let (reporter, cancel) = self.register(JobKind::Images, label, part_ids.len() as u64);
        let id = reporter.id().clone();

        tracing::info!(
            job_id = %id,
            parts = part_ids.len(),
            destination = %destination.display(),
            "Image job submitted"
        );

        tokio::spawn(run_image_job(ImageJob {
            part_ids,
            destination,
            client: Arc::clone(&self.client),
            pool: self.pool.clone(),
            config: Arc::clone(&self.config),
            cancel,
            reporter,
        }));

        Ok(id)
    }
}

async fn run_image_job(job: ImageJob) {
    let ImageJob {
        part_ids,
        destination,
        client,
        pool,
        config,
        cancel,
        reporter,
    } = job;
    let job_id = reporter.id().clone();

    reporter.start(0, format!("Listing images for {} items", part_ids.len()));

    // Phase 1: collect image records
    let mut images = Vec::new();
    for part_id in &part_ids {
        match list_part_images(client.as_ref(), &pool, &config, &cancel, part_id).await {
            Ok(records) => {
                tracing::debug!(job_id = %job_id, part_id = %part_id, count = records.len(), "Images listed");
                images.extend(records.into_iter().map(|record| ImageRef {
                    part_id: part_id.clone(),
                    record,
                }));
            }
            Err(ItemError::Cancelled) => {
                reporter.finish_error(JobError::Cancelled {
                    processed: 0,
                    total: 0,
                    skipped: 0,
                });
                return;
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, part_id = %part_id, error = %e, "Image listing failed");
                reporter.finish_error(JobError::ImageListing {
                    part_id: part_id.clone(),
                    reason: e.to_string(),
                });
                return;
            }
        }
    }

    let total = images.len() as u64;
    if total == 0 {
        reporter.finish_error(JobError::NoImages {
            items: part_ids.len() as u64,
        });
        return;
    }

    if let Err(e) = tokio::fs::create_dir_all(&destination).await {
        reporter.finish_error(JobError::Persistence {
            path: destination.clone(),
            reason: e.to_string(),
        });
        return;
    }

    reporter.set_total(total, format!("Downloading {} images", total));

    // Phase 2: sequential download, first failure is fatal
    for (index, image) in images.iter().enumerate() {
        if cancel.is_cancelled() {
            reporter.finish_error(JobError::Cancelled {
                processed: index as u64,
                total,
                skipped: total - index as u64,
            });
            return;
        }

        let result = download_image(
            client.as_ref(),
            &pool,
            &config,
            &cancel,
            &destination,
            config.output.file_collision,
            &image.record,
        )
        .await;

        match result {
            Ok(path) => {
                tracing::debug!(job_id = %job_id, part_id = %image.part_id, path = %path.display(), "Image saved");
                reporter.item_succeeded();
            }
            Err(ItemError::Cancelled) => {
                reporter.finish_error(JobError::Cancelled {
                    processed: index as u64,
                    total,
                    skipped: total - index as u64,
                });
                return;
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    part_id = %image.part_id,
                    position = index + 1,
                    total,
                    error = %e,
                    "Image download failed, stopping job"
                );
                reporter.item_failed(&image.part_id, &e);
                reporter.finish_error(JobError::ImageDownload {
                    position: index as u64 + 1,
                    total,
                    reason: e.to_string(),
                });
                return;
            }
        }
    }

    tracing::info!(job_id = %job_id, total, destination = %destination.display(), "Image job completed");
    reporter.finish_done(destination, format!("Downloaded {} images", total));
}

async fn list_part_images(
    client: &dyn HwdbClient,
    pool: &FetchPool,
    config: &Config,
    cancel: &CancellationToken,
    part_id: &str,
) -> std::result::Result<Vec<Value>, ItemError> {
    let response = pool
        .run(&config.fetch, cancel, || client.list_images(part_id))
        .await?;

    match extract_data(response)? {
        Value::Array(records) => Ok(records),
        Value::Null => Ok(Vec::new()),
        other => Err(ItemError::MissingMetadata(format!(
            "image list for {} is not an array: {}",
            part_id, other
        ))),
    }
}

/// Fetch one image and write it into `destination`
///
/// The image record must carry `image_id` and `image_name`.
#[allow(clippy::too_many_arguments)]
async fn download_image(
    client: &dyn HwdbClient,
    pool: &FetchPool,
    config: &Config,
    cancel: &CancellationToken,
    destination: &Path,
    collision: FileCollisionAction,
    record: &Value,
) -> std::result::Result<PathBuf, ItemError> {
    let image_id = metadata_field(record, "image_id")?;
    let name = metadata_field(record, "image_name")?;
    let file_name = sanitize_file_name(&name);
    if file_name.is_empty() {
        return Err(ItemError::MissingMetadata(format!(
            "image {} has an unusable name '{}'",
            image_id, name
        )));
    }

    let bytes = pool
        .run(&config.fetch, cancel, || client.fetch_image(&image_id))
        .await?;

    let target = destination.join(file_name);
    let path = get_unique_path(&target, collision).map_err(|source| ItemError::Write {
        path: target.clone(),
        source,
    })?;

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|source| ItemError::Write {
            path: path.clone(),
            source,
        })?;

    Ok(path)
}

fn metadata_field(record: &Value, field: &str) -> std::result::Result<String, ItemError> {
    match record.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ItemError::MissingMetadata(format!(
            "image record has no '{}'",
            field
        ))),
    }
}
