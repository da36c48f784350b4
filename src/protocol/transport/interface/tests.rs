//! Interface tests against single-node buses; two-node exchanges live in
//! the integration tests.
use super::*;
use crate::error::TimeoutParameter;
use crate::protocol::can::{can_frame::CanFrame, can_id::CanId};
use crate::protocol::packet::{
    CanPacketType, CanPacketView, FrameOptions, PacketContent, TransmissionDirection,
};
use std::collections::VecDeque;
use std::sync::Mutex;

fn addressing() -> NodeAddressing {
    NodeAddressing::normal_11bit(0x7E8, 0x7E0, 0x7DF, 0x7DF).unwrap()
}

fn fast_config() -> TransportConfig {
    TransportConfig::default()
        .with_n_as_timeout(Duration::from_millis(100))
        .with_n_bs_timeout(Duration::from_millis(60))
        .with_listener_poll_interval(Duration::from_millis(2))
}

/// Bus where every transmitted frame comes back as its own echo.
#[derive(Default)]
struct EchoBus {
    observed: Mutex<VecDeque<CanFrame>>,
    silent: bool,
}

impl BlockingCanBus for EchoBus {
    type Error = ();

    fn send(&self, frame: &CanFrame) -> Result<(), ()> {
        if !self.silent {
            self.observed
                .lock()
                .unwrap()
                .push_back(frame.clone().with_echo(true));
        }
        Ok(())
    }

    fn recv(&self, timeout: Duration) -> Result<Option<CanFrame>, ()> {
        if let Some(frame) = self.observed.lock().unwrap().pop_front() {
            return Ok(Some(frame));
        }
        std::thread::sleep(timeout.min(Duration::from_millis(1)));
        Ok(None)
    }
}

/// Asynchronous bus that never delivers anything.
struct IdleBus;

impl CanBus for IdleBus {
    type Error = ();

    async fn send<'a>(&'a self, _frame: &'a CanFrame) -> Result<(), ()> {
        Ok(())
    }

    async fn recv(&self) -> Result<CanFrame, ()> {
        futures_util::future::pending().await
    }
}

struct IdleTimer;

impl KorriTimer for IdleTimer {
    async fn delay(&self, _duration: Duration) {}

    fn now(&self) -> Duration {
        Duration::ZERO
    }
}

#[test]
fn test_new_rejects_invalid_config() {
    assert_eq!(
        CanTransportInterface::blocking(
            EchoBus::default(),
            addressing(),
            TransportConfig::default().with_dlc(6)
        )
        .err(),
        Some(ConfigError::DlcTooSmall { dlc: 6 })
    );

    let mut interface =
        CanTransportInterface::blocking(EchoBus::default(), addressing(), fast_config()).unwrap();
    assert!(interface
        .set_config(fast_config().with_n_cr_timeout(Duration::ZERO))
        .is_err());
    assert_eq!(interface.config(), &fast_config());
    interface.set_config(fast_config().with_dlc(0xF)).unwrap();
    assert_eq!(interface.config().dlc, 0xF);
}

#[test]
fn test_timing_limits() {
    let config = TransportConfig::default();
    let mut measurements = TimingMeasurements::default();
    assert_eq!(measurements.n_br_max(&config), Duration::from_millis(900));
    assert_eq!(measurements.n_cs_max(&config), Duration::from_millis(900));

    measurements.n_ar = Some(Duration::from_millis(100));
    measurements.n_as = Some(Duration::from_millis(950));
    assert_eq!(measurements.n_br_max(&config), Duration::from_millis(800));
    assert_eq!(measurements.n_cs_max(&config), Duration::ZERO);
}

#[test]
/// Single Frames are confirmed by their echo; the confirmation delay is measured.
fn test_single_frame_confirmed_by_echo() {
    let mut interface =
        CanTransportInterface::blocking(EchoBus::default(), addressing(), fast_config()).unwrap();
    assert_eq!(interface.n_as_measured(), None);

    let record = interface
        .send_message(&UdsMessage::physical(vec![0x22, 0xF1, 0x90]))
        .unwrap();
    assert_eq!(record.payload(), &[0x22, 0xF1, 0x90]);
    assert_eq!(record.direction(), TransmissionDirection::Transmitted);
    assert_eq!(record.packets()[0].can_id(), 0x7E0);
    assert_eq!(
        record.packets()[0].raw_frame_data(),
        &[0x03, 0x22, 0xF1, 0x90, 0xCC, 0xCC, 0xCC, 0xCC]
    );
    assert!(interface.n_as_measured().is_some());
}

#[test]
fn test_send_packet_without_echo_times_out() {
    let bus = EchoBus {
        silent: true,
        ..EchoBus::default()
    };
    let mut interface = CanTransportInterface::blocking(bus, addressing(), fast_config()).unwrap();
    let packet = CanPacket::new(
        *addressing().tx_physical(),
        PacketContent::SingleFrame { payload: &[0x3E, 0x00] },
        FrameOptions::with_dlc(8),
    )
    .unwrap();
    let error = interface.send_packet(&packet).unwrap_err();
    assert!(matches!(
        error,
        TransportError::Timeout {
            parameter: TimeoutParameter::NAs,
            ..
        }
    ));
}

#[test]
/// The First Frame is confirmed, then no Flow Control arrives within N_Bs.
fn test_segmented_send_without_flow_control() {
    let mut interface =
        CanTransportInterface::blocking(EchoBus::default(), addressing(), fast_config()).unwrap();
    let error = interface
        .send_message(&UdsMessage::physical(vec![0x36; 20]))
        .unwrap_err();
    assert!(matches!(
        error,
        TransportError::Timeout {
            parameter: TimeoutParameter::NBs,
            ..
        }
    ));
    assert!(interface.n_as_measured().is_some());
    assert_eq!(interface.n_bs_measured(), None);
}

#[test]
fn test_receive_packet_timeout() {
    let mut interface =
        CanTransportInterface::blocking(EchoBus::default(), addressing(), fast_config()).unwrap();
    let started = Instant::now();
    let error = interface
        .receive_packet(Some(Duration::from_millis(30)))
        .unwrap_err();
    assert!(matches!(
        error,
        TransportError::Timeout {
            parameter: TimeoutParameter::ReceiveStart,
            ..
        }
    ));
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[test]
/// Packets are decoded from frames sent to the node's receive addresses only.
fn test_receive_packet_filters_foreign_frames() {
    let bus = EchoBus::default();
    {
        let mut observed = bus.observed.lock().unwrap();
        observed.push_back(CanFrame::new(CanId(0x123), &[0x02, 0x10, 0x01]).unwrap());
        observed.push_back(CanFrame::new(CanId(0x7E8), &[0x02, 0x50, 0x01]).unwrap());
    }
    let mut interface = CanTransportInterface::blocking(bus, addressing(), fast_config()).unwrap();
    interface.start_blocking_listener();
    std::thread::sleep(Duration::from_millis(20));

    let record = interface
        .receive_packet(Some(Duration::from_millis(200)))
        .unwrap();
    assert_eq!(record.packet_type(), CanPacketType::SingleFrame);
    assert_eq!(record.payload(), Some(&[0x50, 0x01][..]));
    assert_eq!(record.direction(), TransmissionDirection::Received);
}

#[test]
/// Timeouts and timing parameters as large as `Duration::MAX` never overflow.
fn test_unbounded_timeouts() {
    let bus = EchoBus::default();
    bus.observed
        .lock()
        .unwrap()
        .push_back(CanFrame::new(CanId(0x7E8), &[0x02, 0x50, 0x01]).unwrap());
    let config = fast_config()
        .with_n_as_timeout(Duration::MAX)
        .with_n_bs_timeout(Duration::MAX)
        .with_n_cr_timeout(Duration::MAX);
    let mut interface = CanTransportInterface::blocking(bus, addressing(), config).unwrap();

    let record = interface.receive_packet(Some(Duration::MAX)).unwrap();
    assert_eq!(record.payload(), Some(&[0x50, 0x01][..]));

    let record = interface
        .send_message(&UdsMessage::physical(vec![0x3E, 0x00]))
        .unwrap();
    assert_eq!(record.payload(), &[0x3E, 0x00]);
    assert!(interface.n_as_measured().is_some());
}

#[test]
fn test_async_operations_require_concurrent_listener() {
    let mut interface =
        CanTransportInterface::new(IdleBus, IdleTimer, addressing(), fast_config()).unwrap();
    let result = futures_executor::block_on(
        interface.async_send_message(&UdsMessage::physical(vec![0x3E, 0x00])),
    );
    assert!(matches!(result, Err(TransportError::ListenerInactive)));

    let _listener = interface.start_concurrent_listener();
    interface.stop_concurrent_listener();
    let result = futures_executor::block_on(interface.async_receive_packet(None));
    assert!(matches!(result, Err(TransportError::ListenerInactive)));
}

