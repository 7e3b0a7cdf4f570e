//! # Event Queue / Virtual Clock
//!
//! A time-ordered priority queue of pending simulation events, the sole
//! source of "what happens next".
//!
//! The heap is a hand-rolled array-backed binary min-heap keyed by
//! `(timestamp, sequence)`. The sequence number is assigned at push time in
//! strictly increasing order and exists purely to break timestamp ties
//! deterministically. `std`'s heap makes no FIFO guarantee for equal keys,
//! and an unordered tie-break would let two runs with identical configuration
//! diverge.

use lsmsim_core::types::SimTime;

/// Payload of a scheduled event.
///
/// `Flush` and `Compaction` are scheduled at their *completion* time; their
/// duration was already charged to the resource budget at scheduling time, so
/// processing them is pure bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Recurring client-write generation tick.
    Write,
    /// A sealed memtable buffer finished flushing into a new L0 file.
    Flush { buffer_bytes: u64 },
    /// A background compaction finished moving data one level down.
    Compaction {
        source_level: u32,
        /// Ids of the source files consumed; they stay visible in the level
        /// until completion.
        input_files: Vec<u64>,
        input_bytes: u64,
        output_bytes: u64,
    },
}

/// A scheduled event. Owned by the queue until popped, then by the simulator
/// for the duration of processing.
#[derive(Debug, Clone)]
pub struct Event {
    /// Scheduled virtual timestamp in microseconds.
    pub at: SimTime,
    /// Push-order tie-break; strictly increasing within a queue generation.
    pub seq: u64,
    pub kind: EventKind,
}

impl Event {
    #[inline]
    fn key(&self) -> (SimTime, u64) {
        (self.at, self.seq)
    }
}

/// Min-heap of events ordered by `(timestamp, sequence)` ascending.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: Vec<Event>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self { heap: Vec::new(), next_seq: 0 }
    }

    /// Inserts an event scheduled at `at`, returning its sequence number.
    pub fn push(&mut self, at: SimTime, kind: EventKind) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Event { at, seq, kind });
        self.sift_up(self.heap.len() - 1);
        seq
    }

    /// Removes and returns the event with the smallest `(timestamp, seq)`.
    pub fn pop(&mut self) -> Option<Event> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let event = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        event
    }

    /// Non-destructive view of the next event.
    pub fn peek(&self) -> Option<&Event> {
        self.heap.first()
    }

    /// Timestamp of the next event, if any.
    pub fn next_time(&self) -> Option<SimTime> {
        self.peek().map(|e| e.at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops all pending events and restarts the sequence counter.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }

    /// Number of pending flush-completion events. Lets the scheduler assert
    /// it never double-schedules a flush for the same sealed buffer.
    pub fn pending_flushes(&self) -> usize {
        self.heap.iter().filter(|e| matches!(e.kind, EventKind::Flush { .. })).count()
    }

    /// Number of pending write-generation events (0 or 1 in a healthy run).
    pub fn pending_writes(&self) -> usize {
        self.heap.iter().filter(|e| matches!(e.kind, EventKind::Write)).count()
    }

    /// Completion time of the earliest pending flush, if any.
    pub fn earliest_flush(&self) -> Option<SimTime> {
        self.heap
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Flush { .. }))
            .map(|e| e.at)
            .min()
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.heap[idx].key() < self.heap[parent].key() {
                self.heap.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;
            if left < len && self.heap[left].key() < self.heap[smallest].key() {
                smallest = left;
            }
            if right < len && self.heap[right].key() < self.heap[smallest].key() {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.heap.swap(idx, smallest);
            idx = smallest;
        }
    }
}
