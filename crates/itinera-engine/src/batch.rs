//! Batch coordinator: concurrent per-video fetches with ordered results.
//!
//! Fetches run concurrently up to the configured limit, but results are
//! returned in submission order regardless of completion order. Per-video
//! failures are carried inside the results; the batch itself never fails.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info};

use itinera_models::{FetchResult, VideoReference};

use crate::fetch::FetchOrchestrator;

/// Runs a batch of fetches through the orchestrator.
pub struct BatchCoordinator {
    orchestrator: Arc<FetchOrchestrator>,
}

impl BatchCoordinator {
    pub fn new(orchestrator: Arc<FetchOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Fetch every reference, at most `batch_concurrency` in flight.
    ///
    /// `on_item_done` fires once per finished video with the count of
    /// finished videos so far, letting callers publish progress while the
    /// batch runs.
    pub async fn process_batch<F>(
        &self,
        references: &[VideoReference],
        mut on_item_done: F,
    ) -> Vec<FetchResult>
    where
        F: FnMut(usize, &FetchResult),
    {
        if references.is_empty() {
            return Vec::new();
        }

        let limit = self.orchestrator.config().batch_concurrency.max(1);
        let mut slots: Vec<Option<FetchResult>> = (0..references.len()).map(|_| None).collect();
        let mut in_flight = FuturesUnordered::new();
        let mut next_index = 0usize;
        let mut done = 0usize;

        info!(
            batch_size = references.len(),
            concurrency = limit,
            "Starting batch fetch"
        );

        while next_index < references.len() && in_flight.len() < limit {
            in_flight.push(self.fetch_indexed(next_index, &references[next_index]));
            next_index += 1;
        }

        while let Some((index, result)) = in_flight.next().await {
            done += 1;
            debug!(
                index,
                done,
                total = references.len(),
                usable = result.is_usable(),
                "Batch item finished"
            );
            on_item_done(done, &result);
            slots[index] = Some(result);

            if next_index < references.len() {
                in_flight.push(self.fetch_indexed(next_index, &references[next_index]));
                next_index += 1;
            }
        }

        // Every slot was filled exactly once above.
        slots.into_iter().flatten().collect()
    }

    async fn fetch_indexed(
        &self,
        index: usize,
        reference: &VideoReference,
    ) -> (usize, FetchResult) {
        (index, self.orchestrator.fetch_with_fallback(reference).await)
    }
}
