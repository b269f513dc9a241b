use crate::{error::ReconcileError, reconcile::ReconcileContext};
use engine_core::connectors::call_with_retry;
use model::job::JobFilters;
use std::collections::HashSet;

pub async fn list_local_ids(
    ctx: &ReconcileContext,
    filters: &JobFilters,
) -> Result<Vec<String>, ReconcileError> {
    let local = ctx.local.as_ref();
    call_with_retry(
        &ctx.settings.retry,
        ctx.settings.call_timeout,
        "local.list_ids",
        move || local.list_ids(filters),
    )
    .await
    .map_err(ReconcileError::LocalListing)
}

/// Remote ids absent locally, in remote order.
pub fn missing_ids(remote: &[String], local: &[String]) -> Vec<String> {
    let local: HashSet<&str> = local.iter().map(String::as_str).collect();
    remote
        .iter()
        .filter(|id| !local.contains(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keeps_remote_order() {
        let missing = missing_ids(&ids(&["5", "1", "9", "3"]), &ids(&["1", "3", "42"]));
        assert_eq!(missing, ids(&["5", "9"]));
    }

    #[test]
    fn nothing_missing_when_local_covers_remote() {
        assert!(missing_ids(&ids(&["1", "2"]), &ids(&["2", "1"])).is_empty());
        assert!(missing_ids(&[], &ids(&["1"])).is_empty());
    }
}
