//! Task router and work queue.
//!
//! Work is distributed over two logically separate lanes by resource class:
//! video and image processing goes to the accelerator lane, audio-only work to
//! the general-purpose lane. Messages reference a job by ID and never carry
//! media bytes.
//!
//! Delivery is at-least-once: a dequeued message is leased to exactly one
//! worker and must be acknowledged after the job reaches a terminal state.
//! Leases held by a crashed worker can be requeued with
//! [`TaskQueue::recover_inflight`], so every pipeline stage must be safe to
//! re-run.

use crate::job::Modality;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

/// Resource class a job is processed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// CPU-bound work (audio transcription).
    General,
    /// GPU-class work (video frame and image processing).
    Accelerator,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::General => "general",
            Lane::Accelerator => "accelerator",
        }
    }
}

impl std::str::FromStr for Lane {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "general" => Ok(Lane::General),
            "accelerator" => Ok(Lane::Accelerator),
            _ => Err(format!("Unknown lane: {}", s)),
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a modality to the lane that processes it.
///
/// Pure and deterministic: video and image work needs accelerator-class
/// resources for frame and embedding stages even where the transcription step
/// itself is CPU-bound; routing on the declared modality keeps the contract
/// statically auditable.
pub fn route(modality: Modality) -> Lane {
    match modality {
        Modality::Video | Modality::Image => Lane::Accelerator,
        Modality::Audio => Lane::General,
    }
}

/// A unit of work published to a lane. A reference, not a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub job_id: Uuid,
    pub modality: Modality,
}

struct LaneQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    notify: Notify,
}

impl LaneQueue {
    fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

/// In-process broker with explicit acknowledgment.
pub struct TaskQueue {
    general: LaneQueue,
    accelerator: LaneQueue,
    in_flight: Mutex<HashMap<Uuid, QueueMessage>>,
    closed: AtomicBool,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            general: LaneQueue::new(),
            accelerator: LaneQueue::new(),
            in_flight: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn lane(&self, lane: Lane) -> &LaneQueue {
        match lane {
            Lane::General => &self.general,
            Lane::Accelerator => &self.accelerator,
        }
    }

    /// Publish a message to the lane selected by [`route`].
    pub fn enqueue(&self, message: QueueMessage) {
        let lane = self.lane(route(message.modality));
        lane.pending
            .lock()
            .expect("lane queue lock poisoned")
            .push_back(message);
        lane.notify.notify_one();
    }

    /// Pull the next message from a lane, waiting if none is pending.
    ///
    /// The message is leased to the caller until [`TaskQueue::ack`] is called.
    /// Returns `None` once the queue has been closed and drained.
    pub async fn dequeue(&self, lane: Lane) -> Option<QueueMessage> {
        let lane_queue = self.lane(lane);
        loop {
            {
                let mut pending = lane_queue
                    .pending
                    .lock()
                    .expect("lane queue lock poisoned");
                if let Some(message) = pending.pop_front() {
                    // Wake another waiter if work remains.
                    if !pending.is_empty() {
                        lane_queue.notify.notify_one();
                    }
                    drop(pending);
                    self.in_flight
                        .lock()
                        .expect("in-flight lock poisoned")
                        .insert(message.job_id, message.clone());
                    return Some(message);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            lane_queue.notify.notified().await;
            if self.closed.load(Ordering::Acquire) {
                // Drain anything still pending before shutting down.
                let empty = lane_queue
                    .pending
                    .lock()
                    .expect("lane queue lock poisoned")
                    .is_empty();
                if empty {
                    return None;
                }
            }
        }
    }

    /// Acknowledge a leased message. Safe to call more than once.
    pub fn ack(&self, job_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .remove(&job_id)
            .is_some()
    }

    /// Requeue every un-acked lease for redelivery.
    ///
    /// Called on startup after an unclean shutdown: any job a worker leased
    /// but never acknowledged becomes eligible again.
    pub fn recover_inflight(&self) -> usize {
        let leases: Vec<QueueMessage> = self
            .in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .drain()
            .map(|(_, msg)| msg)
            .collect();
        let count = leases.len();
        for message in leases {
            self.enqueue(message);
        }
        count
    }

    /// Close the queue; workers drain remaining messages and then stop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.general.notify.notify_waiters();
        self.accelerator.notify.notify_waiters();
    }

    /// Number of pending (unleased) messages in a lane.
    pub fn pending_len(&self, lane: Lane) -> usize {
        self.lane(lane)
            .pending
            .lock()
            .expect("lane queue lock poisoned")
            .len()
    }

    /// Number of leased, un-acked messages.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .len()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(modality: Modality) -> QueueMessage {
        QueueMessage {
            job_id: Uuid::new_v4(),
            modality,
        }
    }

    #[test]
    fn test_route_is_deterministic() {
        assert_eq!(route(Modality::Video), Lane::Accelerator);
        assert_eq!(route(Modality::Image), Lane::Accelerator);
        assert_eq!(route(Modality::Audio), Lane::General);
    }

    #[tokio::test]
    async fn test_enqueue_dequeue_ack() {
        let queue = TaskQueue::new();
        let msg = message(Modality::Audio);
        queue.enqueue(msg.clone());

        assert_eq!(queue.pending_len(Lane::General), 1);
        assert_eq!(queue.pending_len(Lane::Accelerator), 0);

        let leased = queue.dequeue(Lane::General).await.unwrap();
        assert_eq!(leased, msg);
        assert_eq!(queue.in_flight_len(), 1);

        assert!(queue.ack(msg.job_id));
        assert_eq!(queue.in_flight_len(), 0);
        // Acks are idempotent.
        assert!(!queue.ack(msg.job_id));
    }

    #[tokio::test]
    async fn test_lanes_are_separate() {
        let queue = TaskQueue::new();
        queue.enqueue(message(Modality::Video));
        queue.enqueue(message(Modality::Audio));

        let video = queue.dequeue(Lane::Accelerator).await.unwrap();
        assert_eq!(video.modality, Modality::Video);
        let audio = queue.dequeue(Lane::General).await.unwrap();
        assert_eq!(audio.modality, Modality::Audio);
    }

    #[tokio::test]
    async fn test_unacked_lease_is_recoverable() {
        let queue = TaskQueue::new();
        let msg = message(Modality::Audio);
        queue.enqueue(msg.clone());

        // Worker takes the lease and "crashes" without acking.
        let _ = queue.dequeue(Lane::General).await.unwrap();
        assert_eq!(queue.pending_len(Lane::General), 0);
        assert_eq!(queue.in_flight_len(), 1);

        let recovered = queue.recover_inflight();
        assert_eq!(recovered, 1);
        assert_eq!(queue.pending_len(Lane::General), 1);

        // Redelivered to the next worker.
        let redelivered = queue.dequeue(Lane::General).await.unwrap();
        assert_eq!(redelivered, msg);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_workers() {
        let queue = std::sync::Arc::new(TaskQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue(Lane::General).await })
        };

        tokio::task::yield_now().await;
        queue.close();

        let result = waiter.await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_close_drains_pending_first() {
        let queue = TaskQueue::new();
        queue.enqueue(message(Modality::Audio));
        queue.close();

        // Pending work is still handed out after close...
        assert!(queue.dequeue(Lane::General).await.is_some());
        // ...and only then do workers see the shutdown.
        assert!(queue.dequeue(Lane::General).await.is_none());
    }
}
