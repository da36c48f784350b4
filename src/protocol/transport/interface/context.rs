//! Execution contexts the protocol engine runs in.
//!
//! The engine is written once, against [`ExecutionContext`]. The blocking
//! context waits synchronously (its futures are always ready on first poll)
//! and is driven with `futures_executor::block_on`; the concurrent context
//! waits on the frame buffer signal and the caller's [`KorriTimer`].
use core::fmt::Debug;
use core::time::Duration;
use std::time::Instant;

use futures_util::{future::select, future::Either, pin_mut, Future};

use crate::protocol::can::can_frame::CanFrame;
use crate::protocol::transport::frame_buffer::FrameBuffer;
use crate::protocol::transport::traits::{
    blocking_bus::BlockingCanBus, can_bus::CanBus, korri_timer::KorriTimer,
};

pub(crate) trait ExecutionContext {
    type Error: Debug;

    fn send_frame<'a>(
        &'a self,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;

    /// Next buffered frame, or `None` once `timeout` elapses (`None` waits forever).
    fn next_frame(&self, timeout: Option<Duration>) -> impl Future<Output = Option<CanFrame>> + '_;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + '_;

    fn now(&self) -> Duration;

    fn clear_buffer(&self);

    fn requeue(&self, frame: CanFrame);
}

//==================================================================================BLOCKING
pub(crate) struct BlockingContext<'a, B> {
    pub(crate) bus: &'a B,
    pub(crate) buffer: &'a FrameBuffer,
    pub(crate) epoch: Instant,
}

impl<B: BlockingCanBus> ExecutionContext for BlockingContext<'_, B> {
    type Error = B::Error;

    fn send_frame<'a>(
        &'a self,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a {
        async move { BlockingCanBus::send(self.bus, frame) }
    }

    fn next_frame(&self, timeout: Option<Duration>) -> impl Future<Output = Option<CanFrame>> + '_ {
        async move { self.buffer.pop_timeout(timeout) }
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + '_ {
        async move { std::thread::sleep(duration) }
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn clear_buffer(&self) {
        self.buffer.clear();
    }

    fn requeue(&self, frame: CanFrame) {
        self.buffer.requeue(frame);
    }
}

//==================================================================================CONCURRENT
pub(crate) struct ConcurrentContext<'a, B, T> {
    pub(crate) bus: &'a B,
    pub(crate) timer: &'a T,
    pub(crate) buffer: &'a FrameBuffer,
}

impl<B: CanBus, T: KorriTimer> ExecutionContext for ConcurrentContext<'_, B, T> {
    type Error = B::Error;

    fn send_frame<'a>(
        &'a self,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a {
        CanBus::send(self.bus, frame)
    }

    fn next_frame(&self, timeout: Option<Duration>) -> impl Future<Output = Option<CanFrame>> + '_ {
        async move {
            let Some(timeout) = timeout else {
                return Some(self.buffer.pop_async().await);
            };
            let frame_future = self.buffer.pop_async();
            let timer_future = self.timer.delay(timeout);
            pin_mut!(frame_future);
            pin_mut!(timer_future);
            match select(frame_future, timer_future).await {
                Either::Left((frame, _)) => Some(frame),
                Either::Right(_) => None,
            }
        }
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + '_ {
        self.timer.delay(duration)
    }

    fn now(&self) -> Duration {
        self.timer.now()
    }

    fn clear_buffer(&self) {
        self.buffer.clear();
    }

    fn requeue(&self, frame: CanFrame) {
        self.buffer.requeue(frame);
    }
}
