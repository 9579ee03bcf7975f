//! Worker loops.
//!
//! A worker pulls one message at a time from its lane, drives the job to a
//! terminal state through the pipeline, and only then acknowledges the
//! message. A worker that dies mid-job leaves its lease un-acked, so the job
//! stays eligible for redelivery.

use crate::pipeline::IngestionPipeline;
use crate::queue::{Lane, TaskQueue};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spawn a single worker task for a lane.
pub fn spawn_worker(
    worker_id: usize,
    lane: Lane,
    queue: Arc<TaskQueue>,
    pipeline: Arc<IngestionPipeline>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        worker_loop(worker_id, lane, queue, pipeline).await;
    })
}

async fn worker_loop(
    worker_id: usize,
    lane: Lane,
    queue: Arc<TaskQueue>,
    pipeline: Arc<IngestionPipeline>,
) {
    info!("Worker {}/{} started", lane, worker_id);

    while let Some(message) = queue.dequeue(lane).await {
        let job_id = message.job_id;
        if let Err(e) = pipeline.run(job_id).await {
            // The pipeline records stage failures on the job itself; an error
            // here means the job store was unreachable. Ack anyway so the
            // message does not spin; the job stays visible as incomplete.
            error!("Worker {}/{}: job {} not recorded: {}", lane, worker_id, job_id, e);
        }
        queue.ack(job_id);
    }

    info!("Worker {}/{} stopped", lane, worker_id);
}
