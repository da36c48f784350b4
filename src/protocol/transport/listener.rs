//! Frame listeners feeding a [`FrameBuffer`] from the bus.
//!
//! * [`BlockingListener`] owns a thread polling a
//!   [`BlockingCanBus`](super::traits::blocking_bus::BlockingCanBus).
//! * [`ConcurrentListener`] is a runner future the application drives next to
//!   its own tasks, reading a [`CanBus`](super::traits::can_bus::CanBus).
use core::time::Duration;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use futures_util::{future::select, future::Either, pin_mut};

use crate::protocol::transport::frame_buffer::FrameBuffer;
use crate::protocol::transport::traits::{blocking_bus::BlockingCanBus, can_bus::CanBus};
use crate::protocol::transport::warning::{TransportWarning, WarningSink};

//==================================================================================BLOCKING
/// Thread forwarding every frame observed on a blocking bus to a buffer.
pub struct BlockingListener {
    stop: Arc<AtomicBool>,
    delivered: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl BlockingListener {
    pub fn spawn<B: BlockingCanBus>(
        bus: Arc<B>,
        buffer: Arc<FrameBuffer>,
        warnings: Arc<WarningSink>,
        poll_interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let delivered = Arc::new(AtomicUsize::new(0));
        let handle = {
            let stop = Arc::clone(&stop);
            let delivered = Arc::clone(&delivered);
            thread::spawn(move || {
                debug!("Blocking listener started");
                while !stop.load(Ordering::Acquire) {
                    match bus.recv(poll_interval) {
                        Ok(Some(frame)) => {
                            delivered.fetch_add(1, Ordering::AcqRel);
                            buffer.push(frame);
                        }
                        Ok(None) => {}
                        Err(error) => {
                            warnings.emit(TransportWarning::BusError {
                                description: format!("{error:?}"),
                            });
                            thread::sleep(poll_interval);
                        }
                    }
                }
                debug!("Blocking listener stopped");
            })
        };
        Self {
            stop,
            delivered,
            handle: Some(handle),
        }
    }

    /// Frames pushed to the buffer so far.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Acquire)
    }

    /// Stop polling and wait for the thread; returns the delivered frame count.
    pub fn stop(mut self) -> usize {
        self.shutdown();
        self.delivered()
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Blocking listener thread panicked");
            }
        }
    }
}

impl Drop for BlockingListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//==================================================================================CONCURRENT
/// State shared between a [`ConcurrentListener`] and the interface that created it.
pub(crate) struct ListenerControl {
    stop: Signal<CriticalSectionRawMutex, ()>,
    active: AtomicBool,
    delivered: AtomicUsize,
}

impl ListenerControl {
    pub(crate) fn new() -> Self {
        Self {
            stop: Signal::new(),
            active: AtomicBool::new(true),
            delivered: AtomicUsize::new(0),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Ask the runner to return; returns the delivered frame count.
    pub(crate) fn stop(&self) -> usize {
        self.active.store(false, Ordering::Release);
        self.stop.signal(());
        self.delivered.load(Ordering::Acquire)
    }
}

/// Runner forwarding every frame observed on an asynchronous bus to a buffer.
///
/// Must be driven (`run().await`) concurrently with the asynchronous
/// operations of the interface that created it.
pub struct ConcurrentListener<B: CanBus> {
    bus: Arc<B>,
    buffer: Arc<FrameBuffer>,
    warnings: Arc<WarningSink>,
    control: Arc<ListenerControl>,
}

impl<B: CanBus> ConcurrentListener<B> {
    pub(crate) fn new(
        bus: Arc<B>,
        buffer: Arc<FrameBuffer>,
        warnings: Arc<WarningSink>,
        control: Arc<ListenerControl>,
    ) -> Self {
        Self {
            bus,
            buffer,
            warnings,
            control,
        }
    }

    /// Forward frames until the listener is stopped.
    ///
    /// Returns `Ok(())` once stopped by the interface, or the first bus
    /// receive error (the listener is then inactive).
    pub async fn run(self) -> Result<(), B::Error> {
        debug!("Concurrent listener started");
        let result = loop {
            if !self.control.is_active() {
                break Ok(());
            }
            let outcome = {
                let recv_future = self.bus.recv();
                let stop_future = self.control.stop.wait();
                pin_mut!(recv_future);
                pin_mut!(stop_future);
                match select(recv_future, stop_future).await {
                    Either::Left((result, _)) => Some(result),
                    Either::Right(_) => None,
                }
            };
            match outcome {
                Some(Ok(frame)) => {
                    self.control.delivered.fetch_add(1, Ordering::AcqRel);
                    self.buffer.push(frame);
                }
                Some(Err(error)) => {
                    self.warnings.emit(TransportWarning::BusError {
                        description: format!("{error:?}"),
                    });
                    self.control.active.store(false, Ordering::Release);
                    break Err(error);
                }
                None => break Ok(()),
            }
        };
        debug!("Concurrent listener stopped");
        result
    }
}
