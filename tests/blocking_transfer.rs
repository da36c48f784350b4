//! Message exchanges between two blocking transport interfaces, each running
//! on its own thread.
mod helpers;

use helpers::{client_addressing, client_frame, server_addressing, MockCanBus};
use korri_isotp::{
    error::{TimeoutParameter, TransportError},
    protocol::{
        addressing::AddressingType,
        message::UdsMessage,
        packet::{CanPacketType, CanPacketView, PacketContent, TransmissionDirection},
        transport::{
            config::{DefaultFlowControlGenerator, TransportConfig},
            interface::CanTransportInterface,
            traits::blocking_bus::BlockingCanBus,
        },
    },
};
use std::thread;
use std::time::{Duration, Instant};

fn config() -> TransportConfig {
    TransportConfig::default()
        .with_n_as_timeout(Duration::from_millis(200))
        .with_n_ar_timeout(Duration::from_millis(200))
        .with_n_bs_timeout(Duration::from_millis(300))
        .with_n_cr_timeout(Duration::from_millis(300))
        .with_listener_poll_interval(Duration::from_millis(2))
}

#[test]
/// 100 bytes cross the bus in blocks of four Consecutive Frames.
fn test_segmented_round_trip() {
    let (client_bus, server_bus) = MockCanBus::create_pair();
    let payload: Vec<u8> = (0..100u8).collect();

    let server = thread::spawn(move || {
        let mut server = CanTransportInterface::blocking(server_bus, server_addressing(), config())
            .unwrap()
            .with_flow_control_generator(DefaultFlowControlGenerator::new(4, 0x02));
        let record = server
            .receive_message(Some(Duration::from_secs(2)), None)
            .unwrap();
        (record, server.n_ar_measured(), server.n_cr_measured())
    });

    thread::sleep(Duration::from_millis(50));
    let mut client =
        CanTransportInterface::blocking(client_bus, client_addressing(), config()).unwrap();
    let sent = client.send_message(&UdsMessage::physical(payload.clone())).unwrap();
    let (received, n_ar, n_cr) = server.join().unwrap();

    assert_eq!(sent.payload(), payload.as_slice());
    assert_eq!(received.payload(), payload.as_slice());
    // First Frame (6 bytes) + 14 Consecutive Frames (7 bytes, the last one 3).
    assert_eq!(sent.packets().len(), 15);
    assert_eq!(received.packets().len(), 15);
    assert_eq!(sent.direction(), TransmissionDirection::Transmitted);
    assert_eq!(received.direction(), TransmissionDirection::Received);
    assert_eq!(received.packets()[0].packet_type(), CanPacketType::FirstFrame);
    assert_eq!(received.packets()[0].data_length(), Some(100));
    assert_eq!(received.packets()[14].sequence_number(), Some(14));
    assert!(received.transmission_start() <= received.transmission_end());

    assert!(client.n_as_measured().is_some());
    assert!(client.n_bs_measured().is_some());
    assert!(n_ar.is_some());
    assert!(n_cr.is_some());
}

#[test]
fn test_functional_single_frame() {
    let (client_bus, server_bus) = MockCanBus::create_pair();

    let server = thread::spawn(move || {
        let mut server =
            CanTransportInterface::blocking(server_bus, server_addressing(), config()).unwrap();
        server.receive_message(Some(Duration::from_secs(2)), None)
    });

    thread::sleep(Duration::from_millis(50));
    let mut client =
        CanTransportInterface::blocking(client_bus, client_addressing(), config()).unwrap();
    let sent = client
        .send_message(&UdsMessage::functional(vec![0x3E, 0x80]))
        .unwrap();
    let received = server.join().unwrap().unwrap();

    assert_eq!(sent.packets()[0].can_id(), 0x7DF);
    assert_eq!(received.payload(), &[0x3E, 0x80]);
    assert_eq!(received.addressing_type(), AddressingType::Functional);
}

#[test]
fn test_receive_start_timeout() {
    let (_client_bus, server_bus) = MockCanBus::create_pair();
    let mut server =
        CanTransportInterface::blocking(server_bus, server_addressing(), config()).unwrap();

    let started = Instant::now();
    let error = server
        .receive_message(Some(Duration::from_millis(50)), None)
        .unwrap_err();
    assert!(matches!(
        error,
        TransportError::Timeout {
            parameter: TimeoutParameter::ReceiveStart,
            ..
        }
    ));
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
/// The whole-message deadline fires before N_Cr when it is shorter.
fn test_receive_end_timeout() {
    let (client_bus, server_bus) = MockCanBus::create_pair();

    let server = thread::spawn(move || {
        let mut server =
            CanTransportInterface::blocking(server_bus, server_addressing(), config()).unwrap();
        server.receive_message(None, Some(Duration::from_millis(150)))
    });

    thread::sleep(Duration::from_millis(50));
    BlockingCanBus::send(
        &client_bus,
        &client_frame(PacketContent::FirstFrame {
            data_length: 20,
            payload: &[1, 2, 3, 4, 5, 6],
        }),
    )
    .unwrap();
    let flow_control = client_bus
        .next_peer_frame(Duration::from_secs(1))
        .expect("Flow Control after the First Frame");
    assert_eq!(flow_control.data()[0], 0x30);

    let error = server.join().unwrap().unwrap_err();
    assert!(matches!(
        error,
        TransportError::Timeout {
            parameter: TimeoutParameter::ReceiveEnd,
            ..
        }
    ));
}

#[test]
/// A sender that stops after the First Frame is caught by N_Cr.
fn test_consecutive_frame_timeout() {
    let (client_bus, server_bus) = MockCanBus::create_pair();

    let server = thread::spawn(move || {
        let mut server = CanTransportInterface::blocking(
            server_bus,
            server_addressing(),
            config().with_n_cr_timeout(Duration::from_millis(80)),
        )
        .unwrap();
        server.receive_message(Some(Duration::from_secs(2)), None)
    });

    thread::sleep(Duration::from_millis(50));
    BlockingCanBus::send(
        &client_bus,
        &client_frame(PacketContent::FirstFrame {
            data_length: 20,
            payload: &[1, 2, 3, 4, 5, 6],
        }),
    )
    .unwrap();

    let error = server.join().unwrap().unwrap_err();
    assert!(matches!(
        error,
        TransportError::Timeout {
            parameter: TimeoutParameter::NCr,
            ..
        }
    ));
}
