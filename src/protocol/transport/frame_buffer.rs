//! Queue of received frames shared between a listener and the protocol engine.
//!
//! Blocking readers park on a condition variable; asynchronous readers wait on
//! an embassy [`Signal`] raised on every arrival.
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

use crate::protocol::can::can_frame::CanFrame;

pub struct FrameBuffer {
    frames: Mutex<VecDeque<CanFrame>>,
    available: Condvar,
    arrival: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            arrival: Signal::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<CanFrame>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.available.notify_all();
        self.arrival.signal(());
    }

    /// Append a newly observed frame.
    pub fn push(&self, frame: CanFrame) {
        self.lock().push_back(frame);
        self.notify();
    }

    /// Put a frame back at the head of the queue.
    pub fn requeue(&self, frame: CanFrame) {
        self.lock().push_front(frame);
        self.notify();
    }

    pub fn pop(&self) -> Option<CanFrame> {
        self.lock().pop_front()
    }

    /// Block until a frame is available or `timeout` elapses (`None` waits forever).
    ///
    /// A timeout too large to be represented as an instant waits forever.
    pub fn pop_timeout(&self, timeout: Option<Duration>) -> Option<CanFrame> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut frames = self.lock();
        loop {
            if let Some(frame) = frames.pop_front() {
                return Some(frame);
            }
            frames = match deadline {
                None => self
                    .available
                    .wait(frames)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let remaining = deadline.checked_duration_since(Instant::now())?;
                    self.available
                        .wait_timeout(frames, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Wait asynchronously for the next frame.
    ///
    /// Dropping the future before it completes leaves the queue untouched.
    pub async fn pop_async(&self) -> CanFrame {
        loop {
            if let Some(frame) = self.pop() {
                return frame;
            }
            self.arrival.wait().await;
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.arrival.reset();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::can::can_id::CanId;
    use std::sync::Arc;
    use std::thread;

    fn frame(first_byte: u8) -> CanFrame {
        CanFrame::new(CanId(0x7E8), &[first_byte, 0xCC]).unwrap()
    }

    #[test]
    fn test_requeue_goes_first() {
        let buffer = FrameBuffer::new();
        buffer.push(frame(1));
        buffer.push(frame(2));
        let first = buffer.pop().unwrap();
        buffer.requeue(first);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.pop().unwrap().data()[0], 1);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_pop_timeout() {
        let buffer = Arc::new(FrameBuffer::new());
        let start = Instant::now();
        assert!(buffer.pop_timeout(Some(Duration::from_millis(30))).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));

        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                buffer.push(frame(7));
            })
        };
        let received = buffer.pop_timeout(Some(Duration::from_secs(2)));
        producer.join().unwrap();
        assert_eq!(received.unwrap().data()[0], 7);
    }

    #[test]
    /// A timeout past the end of the clock behaves like no timeout.
    fn test_pop_timeout_unbounded() {
        let buffer = Arc::new(FrameBuffer::new());
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                buffer.push(frame(9));
            })
        };
        let received = buffer.pop_timeout(Some(Duration::MAX));
        producer.join().unwrap();
        assert_eq!(received.unwrap().data()[0], 9);
    }

    #[tokio::test]
    async fn test_pop_async_wakes_on_push() {
        let buffer = Arc::new(FrameBuffer::new());
        let producer = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                buffer.push(frame(3));
            })
        };
        let received = buffer.pop_async().await;
        producer.await.unwrap();
        assert_eq!(received.data()[0], 3);
    }
}
