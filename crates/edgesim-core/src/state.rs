use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::component::Id;
use crate::event::{Event, EventData, EventId};

/// Tolerance used when comparing simulation times.
pub const EPSILON: f64 = 1e-12;

// Queue entry ordered by delivery time, then by scheduling order.
struct Pending {
    seq: EventId,
    event: Event,
}

impl Pending {
    fn key(&self) -> (f64, EventId) {
        (self.event.time, self.seq)
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        let (time, seq) = self.key();
        let (other_time, other_seq) = other.key();
        time.total_cmp(&other_time).then(seq.cmp(&other_seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Clock and pending events, shared by the simulation and all contexts.
#[derive(Default)]
pub struct SimulationState {
    clock: f64,
    queue: BinaryHeap<Reverse<Pending>>,
    next_seq: EventId,
}

impl SimulationState {
    pub fn time(&self) -> f64 {
        self.clock
    }

    /// Schedules `data` for delivery to `dest` at `time() + delay`.
    ///
    /// Delays within [`EPSILON`] below zero are treated as zero, anything smaller is a bug in the caller.
    pub fn schedule<T>(&mut self, data: T, src: Id, dest: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        assert!(delay >= -EPSILON, "can't schedule event {} time units in the past", -delay);
        let seq = self.next_seq;
        self.next_seq += 1;
        let event = Event {
            time: self.clock + delay.max(0.),
            src,
            dest,
            data: Box::new(data),
        };
        self.queue.push(Reverse(Pending { seq, event }));
        seq
    }

    /// Removes the earliest event and moves the clock to its time.
    pub fn pop(&mut self) -> Option<Event> {
        let Reverse(Pending { event, .. }) = self.queue.pop()?;
        self.clock = event.time;
        Some(event)
    }

    pub fn next_time(&self) -> Option<f64> {
        self.queue.peek().map(|Reverse(entry)| entry.event.time)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
