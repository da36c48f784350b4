//! Transport configuration: timing parameters, frame layout, and the
//! generator deciding which Flow Control to answer a First Frame with.
use core::time::Duration;

use crate::error::ConfigError;
use crate::protocol::can::dlc::{self, DEFAULT_FILLER_BYTE, MAX_CLASSIC_DLC};
use crate::protocol::packet::FlowControlParameters;

/// Default N_As, N_Ar, N_Bs and N_Cr timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);
/// Default period at which the blocking listener polls the bus.
pub const DEFAULT_LISTENER_POLL_INTERVAL: Duration = Duration::from_millis(10);

//==================================================================================TRANSPORT_CONFIG
/// Timing and frame layout used by a transport interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Transmission confirmation timeout for packets sent by the sender.
    pub n_as_timeout: Duration,
    /// Transmission confirmation timeout for packets sent by the receiver.
    pub n_ar_timeout: Duration,
    /// Flow Control reception timeout.
    pub n_bs_timeout: Duration,
    /// Delay before each Flow Control sent while receiving.
    pub n_br: Duration,
    /// Gap between Consecutive Frames; `None` defers to the peer's STmin.
    pub n_cs: Option<Duration>,
    /// Consecutive Frame reception timeout.
    pub n_cr_timeout: Duration,
    /// Base DLC of outgoing frames (at least 8).
    pub dlc: u8,
    /// Send the smallest frame holding the data instead of padding to `dlc`.
    pub use_data_optimization: bool,
    /// Padding byte.
    pub filler_byte: u8,
    /// Poll period of the blocking listener thread.
    pub listener_poll_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            n_as_timeout: DEFAULT_TIMEOUT,
            n_ar_timeout: DEFAULT_TIMEOUT,
            n_bs_timeout: DEFAULT_TIMEOUT,
            n_br: Duration::ZERO,
            n_cs: None,
            n_cr_timeout: DEFAULT_TIMEOUT,
            dlc: MAX_CLASSIC_DLC,
            use_data_optimization: false,
            filler_byte: DEFAULT_FILLER_BYTE,
            listener_poll_interval: DEFAULT_LISTENER_POLL_INTERVAL,
        }
    }
}

impl TransportConfig {
    pub fn with_n_as_timeout(mut self, timeout: Duration) -> Self {
        self.n_as_timeout = timeout;
        self
    }

    pub fn with_n_ar_timeout(mut self, timeout: Duration) -> Self {
        self.n_ar_timeout = timeout;
        self
    }

    pub fn with_n_bs_timeout(mut self, timeout: Duration) -> Self {
        self.n_bs_timeout = timeout;
        self
    }

    pub fn with_n_br(mut self, delay: Duration) -> Self {
        self.n_br = delay;
        self
    }

    pub fn with_n_cs(mut self, delay: Option<Duration>) -> Self {
        self.n_cs = delay;
        self
    }

    pub fn with_n_cr_timeout(mut self, timeout: Duration) -> Self {
        self.n_cr_timeout = timeout;
        self
    }

    pub fn with_dlc(mut self, dlc: u8) -> Self {
        self.dlc = dlc;
        self
    }

    pub fn with_data_optimization(mut self, enabled: bool) -> Self {
        self.use_data_optimization = enabled;
        self
    }

    pub fn with_filler_byte(mut self, filler_byte: u8) -> Self {
        self.filler_byte = filler_byte;
        self
    }

    pub fn with_listener_poll_interval(mut self, interval: Duration) -> Self {
        self.listener_poll_interval = interval;
        self
    }

    /// Reject zero timeouts and DLCs unable to carry segmented messages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (parameter, timeout) in [
            ("N_As", self.n_as_timeout),
            ("N_Ar", self.n_ar_timeout),
            ("N_Bs", self.n_bs_timeout),
            ("N_Cr", self.n_cr_timeout),
            ("listener poll", self.listener_poll_interval),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::ZeroTimeout { parameter });
            }
        }
        dlc::validate_dlc(self.dlc)?;
        if self.dlc < MAX_CLASSIC_DLC {
            return Err(ConfigError::DlcTooSmall { dlc: self.dlc });
        }
        Ok(())
    }

    /// DLC for packets that may be shorter than the base frame.
    pub fn frame_dlc(&self) -> Option<u8> {
        if self.use_data_optimization {
            None
        } else {
            Some(self.dlc)
        }
    }
}

//==================================================================================FLOW_CONTROL_GENERATOR
/// Source of the Flow Controls sent while receiving a segmented message.
pub trait FlowControlGenerator {
    /// Called when a new First Frame is received.
    fn reset(&mut self);
    /// Parameters of the next Flow Control to send.
    fn next_parameters(&mut self) -> FlowControlParameters;
}

/// Answers with `wait_count` Wait Flow Controls, then ContinueToSend.
///
/// With `repeat_wait` the Waits are sent again before every block,
/// otherwise only before the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultFlowControlGenerator {
    pub block_size: u8,
    pub st_min: u8,
    pub wait_count: usize,
    pub repeat_wait: bool,
    waits_left: usize,
}

impl Default for DefaultFlowControlGenerator {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl DefaultFlowControlGenerator {
    pub const fn new(block_size: u8, st_min: u8) -> Self {
        Self {
            block_size,
            st_min,
            wait_count: 0,
            repeat_wait: false,
            waits_left: 0,
        }
    }

    pub fn with_waits(mut self, wait_count: usize, repeat_wait: bool) -> Self {
        self.wait_count = wait_count;
        self.repeat_wait = repeat_wait;
        self.waits_left = wait_count;
        self
    }
}

impl FlowControlGenerator for DefaultFlowControlGenerator {
    fn reset(&mut self) {
        self.waits_left = self.wait_count;
    }

    fn next_parameters(&mut self) -> FlowControlParameters {
        if self.waits_left > 0 {
            self.waits_left -= 1;
            return FlowControlParameters::wait();
        }
        if self.repeat_wait {
            self.waits_left = self.wait_count;
        }
        FlowControlParameters::continue_to_send(self.block_size, self.st_min)
    }
}
