use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::payload::{generate_random_payload, Payload};
use crate::uploader::{Upload, UploadTimings};

/// Upper bound on payloads generated at once for a run phase.
pub const PAYLOAD_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub tag: String,
    pub timings: UploadTimings,
}

pub async fn batched_upload<U: Upload + ?Sized>(
    upload: &U,
    n_batches: usize,
    n_exposures: usize,
) -> Result<Vec<BatchResult>> {
    let mut tags = Vec::new();
    batched_upload_tracked(upload, n_batches, n_exposures, &mut tags).await
}

/// Like [`batched_upload`], but pushes each tag onto `tags` as soon as its
/// upload succeeds, so the caller still knows what to clean up if a later
/// batch fails.
///
/// Uploads are issued one at a time to bound the load on the server under test.
pub async fn batched_upload_tracked<U: Upload + ?Sized>(
    upload: &U,
    n_batches: usize,
    n_exposures: usize,
    tags: &mut Vec<String>,
) -> Result<Vec<BatchResult>> {
    let batches: Vec<Payload> = stream::iter(0..n_batches)
        .map(|_| generate_random_payload(n_exposures))
        .buffer_unordered(PAYLOAD_CONCURRENCY)
        .collect()
        .await;

    let mut results = Vec::with_capacity(batches.len());
    for batch in &batches {
        let tag = Uuid::new_v4().to_string();
        let Some(timings) = upload.upload(&tag, batch).await? else {
            debug!(batch_tag = %tag, "Skipped empty batch");
            continue;
        };

        tags.push(tag.clone());
        results.push(BatchResult { tag, timings });
    }

    Ok(results)
}
