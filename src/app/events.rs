//! Background worker messages and async network tasks.

use crate::api::{ApiError, CommentsApi};
use crate::session::{perform_fetch, perform_mutation};
use crate::sync::{FetchPayload, FetchRequest, MutationId, MutationOutcome, MutationRequest};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Message sent from background workers to the event loop.
#[derive(Debug)]
pub enum WorkerMessage {
    FetchCompleted {
        request: FetchRequest,
        result: Result<FetchPayload, ApiError>,
    },
    MutationCompleted {
        id: MutationId,
        result: Result<MutationOutcome, ApiError>,
    },
}

/// Spawns a page or reply fetch; the result comes back as [`WorkerMessage::FetchCompleted`].
pub fn spawn_fetch(
    tx: UnboundedSender<WorkerMessage>,
    api: Arc<dyn CommentsApi>,
    request: FetchRequest,
) {
    tokio::spawn(async move {
        let result = perform_fetch(api.as_ref(), &request).await;
        let _ = tx.send(WorkerMessage::FetchCompleted { request, result });
    });
}

/// Spawns a create, edit, or delete call.
pub fn spawn_mutation(
    tx: UnboundedSender<WorkerMessage>,
    api: Arc<dyn CommentsApi>,
    id: MutationId,
    request: MutationRequest,
) {
    tokio::spawn(async move {
        let result = perform_mutation(api.as_ref(), &request).await;
        let _ = tx.send(WorkerMessage::MutationCompleted { id, result });
    });
}
