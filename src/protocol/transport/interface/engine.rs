//! Protocol engine: packet confirmation, message transmission with flow
//! control, and message reception, independent of the execution model.
use core::time::Duration;

use crate::error::{PacketError, TimeoutParameter, TransportError};
use crate::protocol::addressing::AddressingType;
use crate::protocol::can::can_frame::CanFrame;
use crate::protocol::message::{UdsMessage, UdsMessageRecord};
use crate::protocol::packet::{
    CanPacket, CanPacketRecord, CanPacketType, CanPacketView, FlowControlParameters, FlowStatus,
    FrameOptions, StMin, TransmissionDirection,
};
use crate::protocol::transport::config::{FlowControlGenerator, TransportConfig};
use crate::protocol::transport::interface::context::ExecutionContext;
use crate::protocol::transport::interface::TimingMeasurements;
use crate::protocol::transport::segmentation::{
    assembler::{MessageAssembler, ProcessResult},
    builder::CanSegmenter,
};
use crate::protocol::transport::warning::{TransportWarning, WarningSink};

type EngineResult<T, C> = Result<T, TransportError<<C as ExecutionContext>::Error>>;

//==================================================================================DEADLINE
/// Instant (on the context clock) at which a wait fails, and why.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Duration,
    parameter: TimeoutParameter,
    timeout: Duration,
}

impl Deadline {
    fn after(now: Duration, parameter: TimeoutParameter, timeout: Duration) -> Self {
        Self {
            at: now.saturating_add(timeout),
            parameter,
            timeout,
        }
    }

    fn earliest(first: Option<Deadline>, second: Option<Deadline>) -> Option<Deadline> {
        match (first, second) {
            (Some(first), Some(second)) if second.at < first.at => Some(second),
            (Some(first), _) => Some(first),
            (None, second) => second,
        }
    }

    fn expired<E: core::fmt::Debug>(&self) -> TransportError<E> {
        TransportError::Timeout {
            parameter: self.parameter,
            timeout: self.timeout,
        }
    }
}

/// Outcome of waiting for the next Consecutive Frame.
enum Step {
    Fragment(CanPacketRecord),
    Complete(CanPacketRecord),
    Restart(CanPacketRecord),
}

//==================================================================================ENGINE
pub(crate) struct Engine<'a, C> {
    pub(crate) ctx: C,
    pub(crate) segmenter: &'a CanSegmenter,
    pub(crate) config: &'a TransportConfig,
    pub(crate) flow_control: &'a mut (dyn FlowControlGenerator + Send),
    pub(crate) warnings: &'a WarningSink,
    pub(crate) measurements: &'a mut TimingMeasurements,
}

impl<C: ExecutionContext> Engine<'_, C> {
    fn remaining(&self, deadline: &Deadline) -> Option<Duration> {
        deadline
            .at
            .checked_sub(self.ctx.now())
            .filter(|remaining| !remaining.is_zero())
    }

    /// Record of a frame addressed to this node; echoes and foreign frames yield `None`.
    fn decode(&self, frame: &CanFrame) -> Option<CanPacketRecord> {
        if frame.is_echo {
            return None;
        }
        let addressing = self.segmenter.addressing();
        let addressing_type = addressing.is_input_packet(frame.id.raw(), frame.data())?;
        match CanPacketRecord::new(
            frame,
            TransmissionDirection::Received,
            addressing_type,
            addressing.format(),
            self.ctx.now(),
        ) {
            Ok(record) => Some(record),
            Err(error) => {
                self.warnings.emit(TransportWarning::MalformedFrame {
                    can_id: frame.id.raw(),
                    error,
                });
                None
            }
        }
    }

    fn unexpected(&self, record: &CanPacketRecord, during: &'static str) {
        self.warnings.emit(TransportWarning::UnexpectedPacket {
            packet_type: record.packet_type(),
            during,
        });
    }

    /// Next packet addressed to this node.
    async fn next_input(&self, deadline: Option<Deadline>) -> EngineResult<CanPacketRecord, C> {
        loop {
            let timeout = match &deadline {
                Some(deadline) => Some(
                    self.remaining(deadline)
                        .ok_or_else(|| deadline.expired())?,
                ),
                None => None,
            };
            if let Some(frame) = self.ctx.next_frame(timeout).await {
                if let Some(record) = self.decode(&frame) {
                    return Ok(record);
                }
            }
        }
    }

    //==================================================================================PACKETS
    /// Transmit one packet and wait for its echo on the bus.
    ///
    /// Flow Controls are confirmed within N_Ar, every other packet within
    /// N_As. Unrelated frames observed meanwhile stay queued.
    pub(crate) async fn send_packet(&mut self, packet: &CanPacket) -> EngineResult<CanPacketRecord, C> {
        let frame = packet.to_frame()?;
        let (parameter, timeout) = if packet.packet_type() == CanPacketType::FlowControl {
            (TimeoutParameter::NAr, self.config.n_ar_timeout)
        } else {
            (TimeoutParameter::NAs, self.config.n_as_timeout)
        };

        let started = self.ctx.now();
        self.ctx
            .send_frame(&frame)
            .await
            .map_err(TransportError::Bus)?;
        let deadline = Deadline::after(started, parameter, timeout);

        let mut skipped = Vec::new();
        let confirmed = loop {
            let Some(remaining) = self.remaining(&deadline) else {
                break Err(deadline.expired());
            };
            match self.ctx.next_frame(Some(remaining)).await {
                Some(observed) if observed.is_echo && observed.same_content(&frame) => {
                    break Ok(self.ctx.now());
                }
                Some(other) => skipped.push(other),
                None => {}
            }
        };
        for frame in skipped.into_iter().rev() {
            self.ctx.requeue(frame);
        }

        let confirmed_at = confirmed?;
        let elapsed = confirmed_at.saturating_sub(started);
        match parameter {
            TimeoutParameter::NAr => self.measurements.n_ar = Some(elapsed),
            _ => self.measurements.n_as = Some(elapsed),
        }
        trace!(
            "{:?} confirmed after {} us",
            packet.packet_type(),
            elapsed.as_micros() as u64
        );
        Ok(CanPacketRecord::from_packet(
            packet,
            TransmissionDirection::Transmitted,
            confirmed_at,
        ))
    }

    /// Next packet addressed to this node, within `timeout` if given.
    pub(crate) async fn receive_packet(
        &mut self,
        timeout: Option<Duration>,
    ) -> EngineResult<CanPacketRecord, C> {
        let now = self.ctx.now();
        let deadline =
            timeout.map(|timeout| Deadline::after(now, TimeoutParameter::ReceiveStart, timeout));
        self.next_input(deadline).await
    }

    //==================================================================================SENDING
    pub(crate) async fn send_message(&mut self, message: &UdsMessage) -> EngineResult<UdsMessageRecord, C> {
        self.ctx.clear_buffer();
        let segmenter = self.segmenter;
        let mut packets = segmenter.segment(message)?.peekable();
        let first = packets.next().ok_or(PacketError::Inconsistent {
            reason: "message produced no packets",
        })??;

        let mut records = vec![self.send_packet(&first).await?];
        if first.packet_type() == CanPacketType::SingleFrame {
            debug!("Message of {} bytes sent in a Single Frame", message.payload().len());
            return Ok(UdsMessageRecord::new(records)?);
        }

        while packets.peek().is_some() {
            let flow_control = self.wait_for_flow_control().await?;
            let block_size = flow_control.block_size().unwrap_or(0) as usize;
            let gap = self.consecutive_frame_gap(flow_control.st_min().unwrap_or(0));

            let mut sent_in_block = 0;
            for packet in packets.by_ref() {
                let packet = packet?;
                if sent_in_block > 0 {
                    self.observe_gap(gap).await?;
                }
                records.push(self.send_packet(&packet).await?);
                sent_in_block += 1;
                if sent_in_block == block_size {
                    break;
                }
            }
        }

        debug!(
            "Message of {} bytes sent in {} packets",
            message.payload().len(),
            records.len()
        );
        Ok(UdsMessageRecord::new(records)?)
    }

    /// Wait for a ContinueToSend Flow Control, restarting N_Bs after each Wait.
    async fn wait_for_flow_control(&mut self) -> EngineResult<CanPacketRecord, C> {
        let mut waiting_since = self.ctx.now();
        let mut deadline =
            Deadline::after(waiting_since, TimeoutParameter::NBs, self.config.n_bs_timeout);
        loop {
            let record = self.next_input(Some(deadline)).await?;
            match record.packet_type() {
                CanPacketType::FlowControl
                    if record.addressing_type() == AddressingType::Physical =>
                {
                    let now = self.ctx.now();
                    self.measurements.n_bs = Some(now.saturating_sub(waiting_since));
                    match record.flow_status() {
                        Some(FlowStatus::ContinueToSend) => return Ok(record),
                        Some(FlowStatus::Wait) => {
                            trace!("Flow Control Wait received");
                            waiting_since = now;
                            deadline = Deadline::after(
                                now,
                                TimeoutParameter::NBs,
                                self.config.n_bs_timeout,
                            );
                        }
                        Some(FlowStatus::Overflow) => return Err(TransportError::Overflow),
                        None => self.unexpected(&record, "waiting for a Flow Control"),
                    }
                }
                packet_type if packet_type.is_initial() => {
                    self.ctx.requeue(record.frame());
                    return Err(TransportError::Interrupted);
                }
                _ => self.unexpected(&record, "waiting for a Flow Control"),
            }
        }
    }

    /// Gap between two Consecutive Frames of a block.
    fn consecutive_frame_gap(&self, st_min: u8) -> Duration {
        let st_min = StMin::to_duration(st_min);
        let Some(n_cs) = self.config.n_cs else {
            return st_min;
        };
        let max = self.measurements.n_cs_max(self.config);
        if n_cs > max {
            self.warnings.emit(TransportWarning::TargetDelayExceeded {
                parameter: "N_Cs",
                delay: n_cs,
                max,
            });
        }
        n_cs.max(st_min)
    }

    /// Let `gap` elapse while watching incoming traffic.
    async fn observe_gap(&self, gap: Duration) -> EngineResult<(), C> {
        if gap.is_zero() {
            return Ok(());
        }
        let until = self.ctx.now().saturating_add(gap);
        loop {
            let Some(remaining) = until
                .checked_sub(self.ctx.now())
                .filter(|remaining| !remaining.is_zero())
            else {
                return Ok(());
            };
            let Some(frame) = self.ctx.next_frame(Some(remaining)).await else {
                continue;
            };
            let Some(record) = self.decode(&frame) else {
                continue;
            };
            if record.packet_type().is_initial() {
                self.ctx.requeue(frame);
                return Err(TransportError::Interrupted);
            }
            self.unexpected(&record, "sending Consecutive Frames");
        }
    }

    //==================================================================================RECEIVING
    pub(crate) async fn receive_message(
        &mut self,
        start_timeout: Option<Duration>,
        end_timeout: Option<Duration>,
    ) -> EngineResult<UdsMessageRecord, C> {
        self.ctx.clear_buffer();
        let started = self.ctx.now();
        let start_deadline = start_timeout
            .map(|timeout| Deadline::after(started, TimeoutParameter::ReceiveStart, timeout));
        let end_deadline = end_timeout
            .map(|timeout| Deadline::after(started, TimeoutParameter::ReceiveEnd, timeout));

        let mut initial = self
            .wait_for_initial(Deadline::earliest(start_deadline, end_deadline))
            .await?;
        loop {
            if initial.packet_type() == CanPacketType::SingleFrame {
                return Ok(UdsMessageRecord::new(vec![initial])?);
            }
            match self.receive_segmented(initial, end_deadline).await? {
                Ok(records) => {
                    debug!("Segmented message received in {} packets", records.len());
                    return Ok(UdsMessageRecord::new(records)?);
                }
                Err(restart) => {
                    self.warnings.emit(TransportWarning::ReceptionInterrupted {
                        by: restart.packet_type(),
                    });
                    initial = restart;
                }
            }
        }
    }

    /// First packet of a message: a Single Frame, or a physical First Frame.
    async fn wait_for_initial(&mut self, deadline: Option<Deadline>) -> EngineResult<CanPacketRecord, C> {
        loop {
            let record = self.next_input(deadline).await?;
            if starts_message(&record) {
                return Ok(record);
            }
            self.unexpected(&record, "waiting for a new message");
        }
    }

    /// Receive the rest of a segmented message.
    ///
    /// `Ok(Err(record))` carries the Single or First Frame that interrupted it.
    async fn receive_segmented(
        &mut self,
        first_frame: CanPacketRecord,
        end_deadline: Option<Deadline>,
    ) -> EngineResult<Result<Vec<CanPacketRecord>, CanPacketRecord>, C> {
        self.flow_control.reset();
        let mut assembler = MessageAssembler::new();
        assembler.process(&first_frame);
        let mut records = vec![first_frame];

        loop {
            let parameters = loop {
                self.delay_flow_control().await;
                let parameters = self.flow_control.next_parameters();
                self.send_flow_control(parameters).await?;
                match parameters.flow_status {
                    FlowStatus::ContinueToSend => break parameters,
                    FlowStatus::Wait => {}
                    FlowStatus::Overflow => return Err(TransportError::Overflow),
                }
            };

            let block_size = parameters.block_size.unwrap_or(0) as usize;
            let mut received_in_block = 0;
            loop {
                match self
                    .next_consecutive_frame(&mut assembler, end_deadline)
                    .await?
                {
                    Step::Complete(record) => {
                        records.push(record);
                        return Ok(Ok(records));
                    }
                    Step::Fragment(record) => records.push(record),
                    Step::Restart(record) => return Ok(Err(record)),
                }
                received_in_block += 1;
                if received_in_block == block_size {
                    break;
                }
            }
        }
    }

    async fn next_consecutive_frame(
        &mut self,
        assembler: &mut MessageAssembler,
        end_deadline: Option<Deadline>,
    ) -> EngineResult<Step, C> {
        let waiting_since = self.ctx.now();
        let n_cr = Deadline::after(waiting_since, TimeoutParameter::NCr, self.config.n_cr_timeout);
        let deadline = Deadline::earliest(Some(n_cr), end_deadline);
        loop {
            let record = self.next_input(deadline).await?;
            match record.packet_type() {
                CanPacketType::ConsecutiveFrame => {
                    let step = match assembler.process(&record) {
                        ProcessResult::FragmentConsumed => Step::Fragment(record),
                        ProcessResult::MessageComplete(_) => Step::Complete(record),
                        ProcessResult::UnexpectedSequenceNumber { expected, received } => {
                            self.warnings
                                .emit(TransportWarning::UnexpectedSequenceNumber { expected, received });
                            continue;
                        }
                        ProcessResult::Ignored => {
                            self.unexpected(&record, "receiving Consecutive Frames");
                            continue;
                        }
                    };
                    self.measurements.n_cr = Some(self.ctx.now().saturating_sub(waiting_since));
                    return Ok(step);
                }
                _ if starts_message(&record) => return Ok(Step::Restart(record)),
                _ => self.unexpected(&record, "receiving Consecutive Frames"),
            }
        }
    }

    /// Apply N_Br before a Flow Control.
    async fn delay_flow_control(&self) {
        let n_br = self.config.n_br;
        let max = self.measurements.n_br_max(self.config);
        if n_br > max {
            self.warnings.emit(TransportWarning::TargetDelayExceeded {
                parameter: "N_Br",
                delay: n_br,
                max,
            });
        }
        if !n_br.is_zero() {
            self.ctx.sleep(n_br).await;
        }
    }

    async fn send_flow_control(&mut self, parameters: FlowControlParameters) -> EngineResult<(), C> {
        let packet = CanPacket::new(
            *self.segmenter.addressing().tx_physical(),
            parameters.into(),
            FrameOptions {
                dlc: self.config.frame_dlc(),
                filler_byte: self.config.filler_byte,
            },
        )?;
        self.send_packet(&packet).await?;
        Ok(())
    }
}

/// Single Frames of any addressing type and physical First Frames start a message.
fn starts_message(record: &CanPacketRecord) -> bool {
    match record.packet_type() {
        CanPacketType::SingleFrame => true,
        CanPacketType::FirstFrame => record.addressing_type() == AddressingType::Physical,
        _ => false,
    }
}
