use crate::{actor::recorder::ProgressRecorder, error::ReconcileError, reconcile::ReconcileContext};
use chrono::Utc;
use engine_processing::import::RecordImporter;
use futures::stream::{self, StreamExt};
use model::job::{ErrorDetail, ReconciliationJob};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Imports every missing record with bounded concurrency and returns the job
/// once all reported outcomes are stored.
///
/// Records not yet started when `cancel` trips are skipped. Records already
/// in flight finish and are counted.
pub async fn import_missing(
    ctx: &ReconcileContext,
    job_id: &str,
    missing: Vec<String>,
    cancel: &CancellationToken,
) -> Result<ReconciliationJob, ReconcileError> {
    let importer = RecordImporter::new(
        ctx.remote.clone(),
        ctx.local.clone(),
        ctx.registry.clone(),
        ctx.settings.retry.clone(),
        ctx.settings.call_timeout,
    );
    let (recorder, join) = ProgressRecorder::new(
        job_id,
        ctx.store.clone(),
        cancel.clone(),
        ctx.settings.heartbeat_every,
        ctx.settings.max_error_details,
    )
    .with_heartbeat_interval(ctx.settings.heartbeat_interval())
    .spawn();

    let total = missing.len();
    let concurrency = ctx.settings.import_concurrency.max(1);
    info!(job_id, total, concurrency, "Importing missing records");

    stream::iter(missing)
        .for_each_concurrent(concurrency, |record_id| {
            let importer = &importer;
            let recorder = &recorder;
            async move {
                if cancel.is_cancelled() {
                    return;
                }
                let reported = match importer.import(&record_id).await {
                    Ok(summary) => {
                        debug!(
                            record_id,
                            fields = summary.fields_written,
                            field_errors = summary.field_errors,
                            "Imported record"
                        );
                        recorder.synced(record_id).await
                    }
                    Err(e) => {
                        warn!(record_id, error = %e, "Record import failed");
                        let detail = ErrorDetail::new(record_id, e.to_string(), Utc::now());
                        recorder.failed(detail).await
                    }
                };
                if let Err(e) = reported {
                    error!(error = %e, "Could not report import outcome");
                }
            }
        })
        .await;

    let job = recorder.flush().await;
    drop(recorder);
    if let Err(e) = join.await {
        error!(job_id, error = %e, "Progress recorder task failed");
    }
    job
}
