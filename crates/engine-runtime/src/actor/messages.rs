use engine_core::error::StateStoreError;
use model::job::{ErrorDetail, ReconciliationJob};
use tokio::sync::oneshot;

/// Messages for the progress recorder actor.
///
/// Import workers never write counters themselves; they report outcomes
/// here and the recorder applies them to the job store in arrival order.
#[derive(Debug)]
pub enum RecorderMsg {
    /// A record was imported.
    Synced { record_id: String },

    /// A record failed.
    Failed { detail: ErrorDetail },

    /// Write out buffered counters and reply with the job as stored.
    Flush {
        reply: oneshot::Sender<Result<ReconciliationJob, StateStoreError>>,
    },
}
