//! Commit positions for partitioned logs
//!
//! Deliveries from one partition can settle in any order when the consumer
//! processes them concurrently. A committed position covers every offset
//! below it, so the only safe position is the oldest delivery that is still
//! unsettled, or one past the highest settled offset when nothing is in
//! flight.

use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
struct PartitionState {
    in_flight: BTreeSet<i64>,
    /// One past the highest settled offset
    next: i64,
    committed: Option<i64>,
}

impl PartitionState {
    fn position(&self) -> i64 {
        self.in_flight.first().copied().unwrap_or(self.next)
    }
}

/// Per-partition low watermark of settled deliveries
#[derive(Debug, Default)]
pub struct OffsetTracker {
    partitions: HashMap<(String, i32), PartitionState>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delivery handed to the consumer.
    pub fn track(&mut self, topic: &str, partition: i32, offset: i64) {
        self.partitions
            .entry((topic.to_string(), partition))
            .or_default()
            .in_flight
            .insert(offset);
    }

    /// Mark a delivery as settled. Returns the position to commit when it
    /// moved forward.
    ///
    /// A delivery that was handed back for redelivery is not settled: it
    /// stays in flight and holds the position until it is read again and
    /// settled.
    pub fn settle(&mut self, topic: &str, partition: i32, offset: i64) -> Option<i64> {
        let state = self
            .partitions
            .entry((topic.to_string(), partition))
            .or_default();

        state.in_flight.remove(&offset);
        state.next = state.next.max(offset + 1);

        let position = state.position();
        if state.committed.map_or(true, |committed| position > committed) {
            state.committed = Some(position);
            Some(position)
        } else {
            None
        }
    }

    /// Deliveries still unsettled on a partition
    pub fn in_flight(&self, topic: &str, partition: i32) -> usize {
        self.partitions
            .get(&(topic.to_string(), partition))
            .map_or(0, |state| state.in_flight.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "payment.paid";

    #[test]
    fn test_in_order_settlement_commits_each_offset() {
        let mut offsets = OffsetTracker::new();
        offsets.track(TOPIC, 0, 10);
        offsets.track(TOPIC, 0, 11);

        assert_eq!(offsets.settle(TOPIC, 0, 10), Some(11));
        assert_eq!(offsets.settle(TOPIC, 0, 11), Some(12));
        assert_eq!(offsets.in_flight(TOPIC, 0), 0);
    }

    #[test]
    fn test_later_ack_does_not_pass_unsettled_delivery() {
        let mut offsets = OffsetTracker::new();
        for offset in 10..=12 {
            offsets.track(TOPIC, 0, offset);
        }

        // 11 and 12 finish while 10 is still being processed
        assert_eq!(offsets.settle(TOPIC, 0, 11), Some(10));
        assert_eq!(offsets.settle(TOPIC, 0, 12), None);

        // Once 10 settles the watermark jumps past everything
        assert_eq!(offsets.settle(TOPIC, 0, 10), Some(13));
    }

    #[test]
    fn test_requeued_delivery_holds_position_until_read_again() {
        let mut offsets = OffsetTracker::new();
        offsets.track(TOPIC, 0, 10);
        offsets.track(TOPIC, 0, 11);

        // 10 is handed back (never settled), 11 is acked
        assert_eq!(offsets.settle(TOPIC, 0, 11), Some(10));
        assert_eq!(offsets.in_flight(TOPIC, 0), 1);

        // The partition is rewound: 10 and 11 are read again
        offsets.track(TOPIC, 0, 10);
        offsets.track(TOPIC, 0, 11);
        assert_eq!(offsets.settle(TOPIC, 0, 10), Some(11));
        assert_eq!(offsets.settle(TOPIC, 0, 11), Some(12));
    }

    #[test]
    fn test_partitions_are_independent() {
        let mut offsets = OffsetTracker::new();
        offsets.track(TOPIC, 0, 5);
        offsets.track(TOPIC, 1, 7);
        offsets.track("payment.failed", 0, 3);

        assert_eq!(offsets.settle(TOPIC, 1, 7), Some(8));
        assert_eq!(offsets.settle("payment.failed", 0, 3), Some(4));
        assert_eq!(offsets.in_flight(TOPIC, 0), 1);
    }
}
