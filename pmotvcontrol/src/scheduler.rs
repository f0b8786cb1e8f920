//! Deferred tasks drained once per tick.
//!
//! A task is due once the tick counter reached its frame *and* the clock
//! reached its time. Due tasks come out ordered by fire time, then frame,
//! then scheduling order. There is no cancellation: tasks carry whatever they
//! need to decide at fire time whether they are still relevant.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Delay {
    /// Run after that many ticks (0 = next drain).
    Frames(u64),
    /// Run once the clock advanced by that many seconds (never in the
    /// scheduling tick).
    Seconds(f64),
}

struct Entry<T> {
    time: f64,
    frame: u64,
    seq: u64,
    task: T,
}

impl<T> Entry<T> {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.frame.cmp(&other.frame))
            .then(self.seq.cmp(&other.seq))
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed: BinaryHeap is a max-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key_cmp(self)
    }
}

pub struct Scheduler<T> {
    heap: BinaryHeap<Entry<T>>,
    frame: u64,
    seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            frame: 0,
            seq: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn advance_frame(&mut self) {
        self.frame += 1;
    }

    pub fn schedule(&mut self, now: f64, delay: Delay, task: T) {
        let (time, frame) = match delay {
            Delay::Frames(n) => (now, self.frame + n),
            Delay::Seconds(s) => (now + s.max(0.0), self.frame + 1),
        };
        self.seq += 1;
        self.heap.push(Entry {
            time,
            frame,
            seq: self.seq,
            task,
        });
    }

    /// Removes and returns every task due at `now`, in firing order.
    pub fn drain_due(&mut self, now: f64) -> Vec<T> {
        let mut due = Vec::new();
        let mut later = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.time > now {
                break;
            }
            let Some(entry) = self.heap.pop() else { break };
            if entry.frame <= self.frame {
                due.push(entry.task);
            } else {
                later.push(entry);
            }
        }
        self.heap.extend(later);
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
