use std::collections::VecDeque;
use std::sync::Mutex;

use wirelink_frame::Message;

/// Default intake capacity, in messages.
pub const DEFAULT_INTAKE_CAPACITY: usize = 16;

/// Fixed-capacity FIFO between the receiving session and the drain thread.
///
/// When the buffer is full the incoming message is the one discarded; the
/// existing contents are preserved. `try_push` only reports the outcome —
/// logging and metrics stay with the caller. One lock guards the queue and
/// its counters; no backpressure signal reaches the sender.
pub struct IntakeBuffer {
    inner: Mutex<Inner>,
}

struct Inner {
    slots: VecDeque<Message>,
    capacity: usize,
    received: u64,
    processed: u64,
    dropped: u64,
}

/// Cumulative intake counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeStats {
    pub received: u64,
    pub processed: u64,
    pub dropped: u64,
}

impl IntakeStats {
    /// Fraction of received messages not (yet) processed.
    pub fn loss_ratio(&self) -> f64 {
        if self.received == 0 {
            return 0.0;
        }
        (self.received - self.processed) as f64 / self.received as f64
    }
}

impl IntakeBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INTAKE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: VecDeque::with_capacity(capacity),
                capacity,
                received: 0,
                processed: 0,
                dropped: 0,
            }),
        }
    }

    /// Append a message, or drop it if the buffer is full.
    ///
    /// Returns `false` when the message was dropped. Every arrival counts
    /// as received, dropped or not.
    pub fn try_push(&self, msg: Message) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.received += 1;
        if inner.slots.len() < inner.capacity {
            inner.slots.push_back(msg);
            true
        } else {
            inner.dropped += 1;
            false
        }
    }

    /// Remove and return the oldest message, if any.
    pub fn pop(&self) -> Option<Message> {
        let mut inner = self.inner.lock().unwrap();
        let msg = inner.slots.pop_front()?;
        inner.processed += 1;
        Some(msg)
    }

    /// Snapshot of the cumulative counters.
    pub fn stats(&self) -> IntakeStats {
        let inner = self.inner.lock().unwrap();
        IntakeStats {
            received: inner.received,
            processed: inner.processed,
            dropped: inner.dropped,
        }
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IntakeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(sequence: u32) -> Message {
        Message::new(sequence, 0, vec![sequence as u16])
    }

    #[test]
    fn pop_returns_oldest_first() {
        let buf = IntakeBuffer::with_capacity(4);
        for i in 1..=3 {
            assert!(buf.try_push(msg(i)));
        }

        assert_eq!(buf.pop().unwrap().sequence, 1);
        assert_eq!(buf.pop().unwrap().sequence, 2);
        assert_eq!(buf.pop().unwrap().sequence, 3);
        assert!(buf.pop().is_none());
    }

    #[test]
    fn overflow_drops_incoming_and_preserves_contents() {
        let capacity = 4;
        let buf = IntakeBuffer::with_capacity(capacity);

        for i in 1..=capacity as u32 {
            assert!(buf.try_push(msg(i)));
        }
        // One past capacity: the new arrival is the one discarded.
        assert!(!buf.try_push(msg(capacity as u32 + 1)));

        let stats = buf.stats();
        assert_eq!(stats.received, capacity as u64 + 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(buf.len(), capacity);

        for i in 1..=capacity as u32 {
            assert_eq!(buf.pop().unwrap().sequence, i);
        }
    }

    #[test]
    fn loss_ratio_after_drain() {
        let capacity = 4;
        let buf = IntakeBuffer::with_capacity(capacity);
        for i in 0..=capacity as u32 {
            buf.try_push(msg(i));
        }
        while buf.pop().is_some() {}

        let stats = buf.stats();
        assert_eq!(stats.processed, capacity as u64);
        let expected = 1.0 / (capacity as f64 + 1.0);
        assert!((stats.loss_ratio() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn loss_ratio_is_zero_when_idle() {
        let buf = IntakeBuffer::new();
        assert_eq!(buf.stats().loss_ratio(), 0.0);
    }

    #[test]
    fn pop_on_empty_counts_nothing() {
        let buf = IntakeBuffer::new();
        assert!(buf.pop().is_none());
        let stats = buf.stats();
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.received, 0);
    }

    #[test]
    fn drained_slots_are_reusable() {
        let buf = IntakeBuffer::with_capacity(2);
        assert!(buf.try_push(msg(1)));
        assert!(buf.try_push(msg(2)));
        assert!(!buf.try_push(msg(3)));

        buf.pop().unwrap();
        assert!(buf.try_push(msg(4)));
        assert_eq!(buf.pop().unwrap().sequence, 2);
        assert_eq!(buf.pop().unwrap().sequence, 4);
    }

    #[test]
    fn shared_across_threads() {
        let buf = std::sync::Arc::new(IntakeBuffer::with_capacity(1024));

        let pusher = {
            let buf = std::sync::Arc::clone(&buf);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    buf.try_push(msg(i));
                }
            })
        };

        let mut popped = 0u64;
        while popped < 1000 {
            if buf.pop().is_some() {
                popped += 1;
            } else {
                std::thread::yield_now();
            }
        }

        pusher.join().unwrap();
        let stats = buf.stats();
        assert_eq!(stats.received, 1000);
        assert_eq!(stats.processed, 1000);
        assert_eq!(stats.dropped, 0);
    }
}
