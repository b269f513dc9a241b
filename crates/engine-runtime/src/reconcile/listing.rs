use crate::{error::ReconcileError, reconcile::ReconcileContext};
use chrono::Utc;
use engine_core::connectors::call_with_retry;
use model::job::JobFilters;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pages through the remote ids matching `filters`.
///
/// Returns unique ids in first-seen order, or `None` if the run was
/// cancelled between pages. `scanned_count` counts every id received,
/// duplicates included; `bitrix_total` is the unique count. A page token
/// handed out twice fails the listing.
pub async fn list_remote_ids(
    ctx: &ReconcileContext,
    job_id: &str,
    filters: &JobFilters,
    cancel: &CancellationToken,
) -> Result<Option<Vec<String>>, ReconcileError> {
    let remote = ctx.remote.as_ref();
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut scanned = 0u64;
    let mut token: Option<String> = None;
    let mut requested: HashSet<String> = HashSet::new();
    let mut pages = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let current = token.as_deref();
        let page = call_with_retry(
            &ctx.settings.retry,
            ctx.settings.call_timeout,
            "remote.list_ids",
            move || remote.list_ids(filters, current),
        )
        .await
        .map_err(ReconcileError::RemoteListing)?;

        pages += 1;
        scanned += page.ids.len() as u64;
        for id in page.ids {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        ctx.store.record_scanned(job_id, scanned, Utc::now()).await?;
        debug!(job_id, pages, scanned, unique = ids.len(), "Listed remote page");

        match page.next {
            None => break,
            Some(next) if !requested.insert(next.clone()) => {
                return Err(ReconcileError::PaginationLoop(next));
            }
            Some(next) => token = Some(next),
        }
    }

    ctx.store.set_remote_total(job_id, ids.len() as u64).await?;
    Ok(Some(ids))
}
