/// Test doubles to simulate a two-node CAN bus and a timer during integration tests.
use korri_isotp::protocol::{
    addressing::node::NodeAddressing,
    can::{can_frame::CanFrame, can_id::CanId},
    packet::{CanPacket, FlowControlParameters, FrameOptions, PacketContent},
    transport::traits::{blocking_bus::BlockingCanBus, can_bus::CanBus, korri_timer::KorriTimer},
};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum MockBusError {
    Disconnected,
}

#[allow(dead_code)]
/// One endpoint of an in-memory CAN bus shared by two nodes.
///
/// Every frame sent is delivered to the other endpoint and echoed back to
/// the sender with `is_echo` set, like a controller with loopback enabled.
pub struct MockCanBus {
    peer: mpsc::UnboundedSender<CanFrame>,
    own: mpsc::UnboundedSender<CanFrame>,
    rx: Mutex<mpsc::UnboundedReceiver<CanFrame>>,
}

#[allow(dead_code)]
impl MockCanBus {
    /// Construct a pair of interconnected endpoints (client ↔ server).
    pub fn create_pair() -> (Self, Self) {
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        let client_bus = Self {
            peer: server_tx.clone(),
            own: client_tx.clone(),
            rx: Mutex::new(client_rx),
        };
        let server_bus = Self {
            peer: client_tx,
            own: server_tx,
            rx: Mutex::new(server_rx),
        };
        (client_bus, server_bus)
    }

    fn transmit(&self, frame: &CanFrame) -> Result<(), MockBusError> {
        self.peer
            .send(frame.clone())
            .map_err(|_| MockBusError::Disconnected)?;
        self.own
            .send(frame.clone().with_echo(true))
            .map_err(|_| MockBusError::Disconnected)
    }

    /// Next frame sent by the other endpoint, skipping echoes.
    pub fn next_peer_frame(&self, timeout: Duration) -> Option<CanFrame> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            match BlockingCanBus::recv(self, remaining) {
                Ok(Some(frame)) if !frame.is_echo => return Some(frame),
                Ok(_) => {}
                Err(_) => return None,
            }
        }
    }
}

impl BlockingCanBus for MockCanBus {
    type Error = MockBusError;

    fn send(&self, frame: &CanFrame) -> Result<(), Self::Error> {
        self.transmit(frame)
    }

    fn recv(&self, timeout: Duration) -> Result<Option<CanFrame>, Self::Error> {
        let deadline = Instant::now() + timeout;
        let mut rx = self.rx.blocking_lock();
        loop {
            match rx.try_recv() {
                Ok(frame) => return Ok(Some(frame)),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return Err(MockBusError::Disconnected),
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl CanBus for MockCanBus {
    type Error = MockBusError;

    async fn send<'a>(&'a self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        self.transmit(frame)
    }

    async fn recv(&self) -> Result<CanFrame, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(MockBusError::Disconnected)
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time` to drive delays in tests.
pub struct MockTimer {
    epoch: tokio::time::Instant,
}

#[allow(dead_code)]
impl MockTimer {
    pub fn new() -> Self {
        Self {
            epoch: tokio::time::Instant::now(),
        }
    }
}

impl KorriTimer for MockTimer {
    async fn delay(&self, duration: Duration) {
        sleep(duration).await;
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

//==================================================================================ADDRESSING
#[allow(dead_code)]
/// Tester side: requests on 0x7E0, responses on 0x7E8, broadcasts on 0x7DF.
pub fn client_addressing() -> NodeAddressing {
    NodeAddressing::normal_11bit(0x7E8, 0x7E0, 0x7DE, 0x7DF).unwrap()
}

#[allow(dead_code)]
/// ECU side of [`client_addressing`].
pub fn server_addressing() -> NodeAddressing {
    client_addressing().mirrored()
}

//==================================================================================RAW FRAMES
#[allow(dead_code)]
/// Frame a remote tester would send to the server.
pub fn client_frame(content: PacketContent<'_>) -> CanFrame {
    let options = match content {
        PacketContent::FirstFrame { .. } => FrameOptions::with_dlc(8),
        _ => FrameOptions::default(),
    };
    CanPacket::new(*client_addressing().tx_physical(), content, options)
        .unwrap()
        .to_frame()
        .unwrap()
}

#[allow(dead_code)]
/// Frame a remote ECU would send to the client.
pub fn server_frame(content: PacketContent<'_>) -> CanFrame {
    CanPacket::new(
        *server_addressing().tx_physical(),
        content,
        FrameOptions::default(),
    )
    .unwrap()
    .to_frame()
    .unwrap()
}

#[allow(dead_code)]
/// Flow Control a remote ECU would send to the client.
pub fn server_flow_control(parameters: FlowControlParameters) -> CanFrame {
    CanPacket::new(
        *server_addressing().tx_physical(),
        parameters.into(),
        FrameOptions::with_dlc(8),
    )
    .unwrap()
    .to_frame()
    .unwrap()
}

#[allow(dead_code)]
pub fn is_from(frame: &CanFrame, can_id: u32) -> bool {
    frame.id == CanId(can_id)
}
