//! Transport interface over a CAN bus: sends and receives packets and
//! segmented messages with flow control, under either execution model.
//!
//! * Blocking operations (`send_message`, `receive_message`, ...) need a
//!   [`BlockingCanBus`]. They start a [`BlockingListener`] thread on first use.
//! * Asynchronous operations (`async_send_message`, ...) need a [`CanBus`] and
//!   a [`KorriTimer`]. The caller must drive the [`ConcurrentListener`]
//!   returned by [`CanTransportInterface::start_concurrent_listener`] alongside
//!   them.
//!
//! Starting one listener stops the other, so a single interface never has two
//! readers feeding its frame buffer.
use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use futures_executor::block_on;

use crate::error::{ConfigError, TransportError};
use crate::protocol::addressing::node::NodeAddressing;
use crate::protocol::message::{UdsMessage, UdsMessageRecord};
use crate::protocol::packet::{CanPacket, CanPacketRecord};
use crate::protocol::transport::config::{
    DefaultFlowControlGenerator, FlowControlGenerator, TransportConfig,
};
use crate::protocol::transport::frame_buffer::FrameBuffer;
use crate::protocol::transport::listener::{BlockingListener, ConcurrentListener, ListenerControl};
use crate::protocol::transport::segmentation::builder::CanSegmenter;
use crate::protocol::transport::traits::{
    blocking_bus::BlockingCanBus, can_bus::CanBus, korri_timer::KorriTimer,
};
use crate::protocol::transport::warning::{ListenerKind, TransportWarning, WarningSink};

mod context;
mod engine;

use context::{BlockingContext, ConcurrentContext};
use engine::Engine;

//==================================================================================TIMING
/// Last observed value of each measurable timing parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingMeasurements {
    /// Confirmation delay of the last packet sent as sender.
    pub n_as: Option<Duration>,
    /// Confirmation delay of the last Flow Control sent.
    pub n_ar: Option<Duration>,
    /// Delay between a First Frame (or block) and its Flow Control.
    pub n_bs: Option<Duration>,
    /// Delay before the last Consecutive Frame received.
    pub n_cr: Option<Duration>,
}

impl TimingMeasurements {
    /// Largest N_Br keeping the peer within its N_Bs timeout.
    pub fn n_br_max(&self, config: &TransportConfig) -> Duration {
        config
            .n_bs_timeout
            .mul_f64(0.9)
            .saturating_sub(self.n_ar.unwrap_or_default())
    }

    /// Largest N_Cs keeping the peer within its N_Cr timeout.
    pub fn n_cs_max(&self, config: &TransportConfig) -> Duration {
        config
            .n_cr_timeout
            .mul_f64(0.9)
            .saturating_sub(self.n_as.unwrap_or_default())
    }
}

//==================================================================================INTERFACE
/// ISO-TP transport interface bound to one bus and one node addressing.
///
/// `T` is the timer used by the asynchronous operations; blocking-only
/// interfaces use `()` (see [`CanTransportInterface::blocking`]).
pub struct CanTransportInterface<B, T = ()> {
    bus: Arc<B>,
    timer: T,
    segmenter: CanSegmenter,
    config: TransportConfig,
    flow_control: Box<dyn FlowControlGenerator + Send>,
    buffer: Arc<FrameBuffer>,
    warnings: Arc<WarningSink>,
    measurements: TimingMeasurements,
    blocking_listener: Option<BlockingListener>,
    concurrent_listener: Option<Arc<ListenerControl>>,
    epoch: Instant,
}

fn segmenter(addressing: NodeAddressing, config: &TransportConfig) -> Result<CanSegmenter, ConfigError> {
    config.validate()?;
    CanSegmenter::new(
        addressing,
        config.dlc,
        config.use_data_optimization,
        config.filler_byte,
    )
    .map_err(|_| ConfigError::DlcTooSmall { dlc: config.dlc })
}

impl<B> CanTransportInterface<B, ()> {
    /// Interface limited to the blocking operations.
    pub fn blocking(
        bus: B,
        addressing: NodeAddressing,
        config: TransportConfig,
    ) -> Result<Self, ConfigError> {
        Self::new(bus, (), addressing, config)
    }
}

impl<B, T> CanTransportInterface<B, T> {
    pub fn new(
        bus: B,
        timer: T,
        addressing: NodeAddressing,
        config: TransportConfig,
    ) -> Result<Self, ConfigError> {
        let segmenter = segmenter(addressing, &config)?;
        Ok(Self {
            bus: Arc::new(bus),
            timer,
            segmenter,
            config,
            flow_control: Box::new(DefaultFlowControlGenerator::default()),
            buffer: Arc::new(FrameBuffer::new()),
            warnings: Arc::new(WarningSink::new()),
            measurements: TimingMeasurements::default(),
            blocking_listener: None,
            concurrent_listener: None,
            epoch: Instant::now(),
        })
    }

    /// Replace the generator of the Flow Controls sent while receiving.
    pub fn with_flow_control_generator(
        mut self,
        generator: impl FlowControlGenerator + Send + 'static,
    ) -> Self {
        self.flow_control = Box::new(generator);
        self
    }

    /// Hand every warning to `observer` in addition to logging it.
    ///
    /// Applies to listeners started afterwards.
    pub fn with_warning_observer(
        mut self,
        observer: impl Fn(&TransportWarning) + Send + Sync + 'static,
    ) -> Self {
        self.warnings = Arc::new(WarningSink::with_observer(observer));
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn addressing(&self) -> &NodeAddressing {
        self.segmenter.addressing()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Replace the configuration after validating it.
    pub fn set_config(&mut self, config: TransportConfig) -> Result<(), ConfigError> {
        self.segmenter = segmenter(*self.segmenter.addressing(), &config)?;
        self.config = config;
        Ok(())
    }

    pub fn set_n_br(&mut self, n_br: Duration) {
        self.config.n_br = n_br;
    }

    pub fn set_n_cs(&mut self, n_cs: Option<Duration>) {
        self.config.n_cs = n_cs;
    }

    pub fn measurements(&self) -> &TimingMeasurements {
        &self.measurements
    }

    pub fn n_as_measured(&self) -> Option<Duration> {
        self.measurements.n_as
    }

    pub fn n_ar_measured(&self) -> Option<Duration> {
        self.measurements.n_ar
    }

    pub fn n_bs_measured(&self) -> Option<Duration> {
        self.measurements.n_bs
    }

    pub fn n_cr_measured(&self) -> Option<Duration> {
        self.measurements.n_cr
    }

    pub fn n_br_max(&self) -> Duration {
        self.measurements.n_br_max(&self.config)
    }

    pub fn n_cs_max(&self) -> Duration {
        self.measurements.n_cs_max(&self.config)
    }

    /// Drop every frame received but not yet consumed.
    pub fn clear_frames_buffer(&self) {
        self.buffer.clear();
    }

    /// Stop the blocking listener, if running.
    pub fn stop_blocking_listener(&mut self) {
        if let Some(listener) = self.blocking_listener.take() {
            let delivered = listener.stop();
            if delivered > 0 {
                self.warnings.emit(TransportWarning::ListenerSwitched {
                    stopped: ListenerKind::Blocking,
                    delivered,
                });
            }
        }
    }

    /// Stop the concurrent listener, if running. Its `run` future then returns.
    pub fn stop_concurrent_listener(&mut self) {
        if let Some(control) = self.concurrent_listener.take() {
            let delivered = control.stop();
            if delivered > 0 {
                self.warnings.emit(TransportWarning::ListenerSwitched {
                    stopped: ListenerKind::Concurrent,
                    delivered,
                });
            }
        }
    }

    fn blocking_engine(&mut self) -> Engine<'_, BlockingContext<'_, B>> {
        Engine {
            ctx: BlockingContext {
                bus: &self.bus,
                buffer: &self.buffer,
                epoch: self.epoch,
            },
            segmenter: &self.segmenter,
            config: &self.config,
            flow_control: self.flow_control.as_mut(),
            warnings: &self.warnings,
            measurements: &mut self.measurements,
        }
    }

    fn concurrent_engine(&mut self) -> Engine<'_, ConcurrentContext<'_, B, T>> {
        Engine {
            ctx: ConcurrentContext {
                bus: &self.bus,
                timer: &self.timer,
                buffer: &self.buffer,
            },
            segmenter: &self.segmenter,
            config: &self.config,
            flow_control: self.flow_control.as_mut(),
            warnings: &self.warnings,
            measurements: &mut self.measurements,
        }
    }
}

//==================================================================================BLOCKING
impl<B: BlockingCanBus, T> CanTransportInterface<B, T> {
    /// Start the listener thread, stopping the concurrent listener if any.
    ///
    /// Blocking operations call this themselves.
    pub fn start_blocking_listener(&mut self) {
        if self.blocking_listener.is_some() {
            return;
        }
        self.stop_concurrent_listener();
        self.blocking_listener = Some(BlockingListener::spawn(
            Arc::clone(&self.bus),
            Arc::clone(&self.buffer),
            Arc::clone(&self.warnings),
            self.config.listener_poll_interval,
        ));
    }

    /// Send one packet and wait for its transmission confirmation.
    pub fn send_packet(
        &mut self,
        packet: &CanPacket,
    ) -> Result<CanPacketRecord, TransportError<<B as BlockingCanBus>::Error>> {
        self.start_blocking_listener();
        block_on(self.blocking_engine().send_packet(packet))
    }

    /// Next packet addressed to this node; `None` waits forever.
    pub fn receive_packet(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<CanPacketRecord, TransportError<<B as BlockingCanBus>::Error>> {
        self.start_blocking_listener();
        block_on(self.blocking_engine().receive_packet(timeout))
    }

    /// Segment and send a message, following the receiver's flow control.
    pub fn send_message(
        &mut self,
        message: &UdsMessage,
    ) -> Result<UdsMessageRecord, TransportError<<B as BlockingCanBus>::Error>> {
        self.start_blocking_listener();
        block_on(self.blocking_engine().send_message(message))
    }

    /// Receive one message.
    ///
    /// `start_timeout` bounds the wait for its first packet, `end_timeout`
    /// the whole reception; both count from the call.
    pub fn receive_message(
        &mut self,
        start_timeout: Option<Duration>,
        end_timeout: Option<Duration>,
    ) -> Result<UdsMessageRecord, TransportError<<B as BlockingCanBus>::Error>> {
        self.start_blocking_listener();
        block_on(
            self.blocking_engine()
                .receive_message(start_timeout, end_timeout),
        )
    }
}

//==================================================================================CONCURRENT
impl<B: CanBus, T: KorriTimer> CanTransportInterface<B, T> {
    /// Create the runner feeding the asynchronous operations, stopping the
    /// blocking listener if any.
    ///
    /// A previously returned runner is stopped.
    pub fn start_concurrent_listener(&mut self) -> ConcurrentListener<B> {
        if let Some(previous) = self.concurrent_listener.take() {
            previous.stop();
        }
        self.stop_blocking_listener();
        let control = Arc::new(ListenerControl::new());
        self.concurrent_listener = Some(Arc::clone(&control));
        ConcurrentListener::new(
            Arc::clone(&self.bus),
            Arc::clone(&self.buffer),
            Arc::clone(&self.warnings),
            control,
        )
    }

    fn ensure_concurrent_listener(&self) -> Result<(), TransportError<<B as CanBus>::Error>> {
        match &self.concurrent_listener {
            Some(control) if control.is_active() => Ok(()),
            _ => Err(TransportError::ListenerInactive),
        }
    }

    pub async fn async_send_packet(
        &mut self,
        packet: &CanPacket,
    ) -> Result<CanPacketRecord, TransportError<<B as CanBus>::Error>> {
        self.ensure_concurrent_listener()?;
        self.concurrent_engine().send_packet(packet).await
    }

    pub async fn async_receive_packet(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<CanPacketRecord, TransportError<<B as CanBus>::Error>> {
        self.ensure_concurrent_listener()?;
        self.concurrent_engine().receive_packet(timeout).await
    }

    pub async fn async_send_message(
        &mut self,
        message: &UdsMessage,
    ) -> Result<UdsMessageRecord, TransportError<<B as CanBus>::Error>> {
        self.ensure_concurrent_listener()?;
        self.concurrent_engine().send_message(message).await
    }

    pub async fn async_receive_message(
        &mut self,
        start_timeout: Option<Duration>,
        end_timeout: Option<Duration>,
    ) -> Result<UdsMessageRecord, TransportError<<B as CanBus>::Error>> {
        self.ensure_concurrent_listener()?;
        self.concurrent_engine()
            .receive_message(start_timeout, end_timeout)
            .await
    }
}

impl<B, T> Drop for CanTransportInterface<B, T> {
    fn drop(&mut self) {
        if let Some(control) = self.concurrent_listener.take() {
            control.stop();
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
