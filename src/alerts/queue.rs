//! Bounded outbound queue for one subscriber connection.
//!
//! Enqueue never blocks. Two lanes share one FIFO so delivery order is
//! preserved:
//!
//! - **data** (alerts): bounded by `capacity`. When full, the oldest pending
//!   alert is dropped and counted, so a slow consumer sees the freshest alerts
//!   rather than a growing backlog.
//! - **control** (ack, ping, pong, error): bounded separately and never
//!   evicts an alert. On overflow the oldest control message is discarded
//!   without counting as a drop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Pending control messages kept per connection.
pub const CONTROL_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Lane was full; the oldest pending message of the same lane was discarded.
    DroppedOldest,
    /// Queue is closed; the message was discarded.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    Data,
    Control,
}

struct Buffer<T> {
    items: VecDeque<(Lane, T)>,
    data: usize,
    control: usize,
}

impl<T> Buffer<T> {
    fn count_mut(&mut self, lane: Lane) -> &mut usize {
        match lane {
            Lane::Data => &mut self.data,
            Lane::Control => &mut self.control,
        }
    }

    fn evict_oldest(&mut self, lane: Lane) {
        if let Some(pos) = self.items.iter().position(|(l, _)| *l == lane) {
            self.items.remove(pos);
            *self.count_mut(lane) -= 1;
        }
    }

    fn pop_front(&mut self) -> Option<T> {
        let (lane, item) = self.items.pop_front()?;
        *self.count_mut(lane) -= 1;
        Some(item)
    }

    fn clear(&mut self) {
        self.items.clear();
        self.data = 0;
        self.control = 0;
    }
}

pub struct OutboundQueue<T> {
    capacity: usize,
    buffer: Mutex<Buffer<T>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl<T> OutboundQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Mutex::new(Buffer {
                items: VecDeque::with_capacity(capacity + CONTROL_CAPACITY),
                data: 0,
                control: 0,
            }),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue an alert, evicting the oldest pending alert when full.
    pub fn push(&self, item: T) -> PushOutcome {
        let outcome = self.push_lane(Lane::Data, self.capacity, item);
        if outcome == PushOutcome::DroppedOldest {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    /// Enqueue a control message. Never displaces a pending alert.
    pub fn push_control(&self, item: T) -> PushOutcome {
        self.push_lane(Lane::Control, CONTROL_CAPACITY, item)
    }

    fn push_lane(&self, lane: Lane, limit: usize, item: T) -> PushOutcome {
        if self.is_closed() {
            return PushOutcome::Closed;
        }

        let outcome = {
            let mut buffer = self.buffer.lock();
            let outcome = if *buffer.count_mut(lane) >= limit {
                buffer.evict_oldest(lane);
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Enqueued
            };
            buffer.items.push_back((lane, item));
            *buffer.count_mut(lane) += 1;
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Wait for the next message. Returns `None` once the queue is closed.
    pub async fn recv(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            if self.is_closed() {
                return None;
            }
            let next = self.buffer.lock().pop_front();
            if let Some(item) = next {
                return Some(item);
            }
            notified.await;
        }
    }

    pub fn try_recv(&self) -> Option<T> {
        if self.is_closed() {
            return None;
        }
        self.buffer.lock().pop_front()
    }

    /// Close the queue, discard pending messages and wake the consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.buffer.lock().clear();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alerts discarded to make room for newer alerts.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
