//! Addressing of one node: the four directions (rx/tx × physical/functional)
//! a transport interface listens to and transmits with.
use super::{AddressingFormat, AddressingInformation, AddressingType};
use crate::error::AddressingError;

/// Addressing used by a node, validated as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAddressing {
    rx_physical: AddressingInformation,
    tx_physical: AddressingInformation,
    rx_functional: AddressingInformation,
    tx_functional: AddressingInformation,
}

impl NodeAddressing {
    /// Combine the four directions.
    ///
    /// All entries must share one addressing format, carry the addressing type
    /// of their slot, and the physical rx/tx pair must be distinguishable on the bus.
    pub fn new(
        rx_physical: AddressingInformation,
        tx_physical: AddressingInformation,
        rx_functional: AddressingInformation,
        tx_functional: AddressingInformation,
    ) -> Result<Self, AddressingError> {
        let format = rx_physical.format();
        if [tx_physical, rx_functional, tx_functional]
            .iter()
            .any(|info| info.format() != format)
        {
            return Err(AddressingError::Inconsistent {
                reason: "all node addressing entries must use the same addressing format",
            });
        }
        if rx_physical.addressing_type() != AddressingType::Physical
            || tx_physical.addressing_type() != AddressingType::Physical
        {
            return Err(AddressingError::Inconsistent {
                reason: "physical entries must use physical addressing",
            });
        }
        if rx_functional.addressing_type() != AddressingType::Functional
            || tx_functional.addressing_type() != AddressingType::Functional
        {
            return Err(AddressingError::Inconsistent {
                reason: "functional entries must use functional addressing",
            });
        }
        if rx_physical.can_id() == tx_physical.can_id()
            && rx_physical.ai_data_bytes() == tx_physical.ai_data_bytes()
        {
            return Err(AddressingError::Inconsistent {
                reason: "rx and tx physical addressing must differ",
            });
        }
        if format.uses_fixed_can_id()
            && (rx_physical.target_address() != tx_physical.source_address()
                || rx_physical.source_address() != tx_physical.target_address())
        {
            return Err(AddressingError::Inconsistent {
                reason: "tx physical addresses must mirror rx physical addresses",
            });
        }
        Ok(Self {
            rx_physical,
            tx_physical,
            rx_functional,
            tx_functional,
        })
    }

    /// Normal 11-bit node from its four identifiers.
    pub fn normal_11bit(
        rx_physical_id: u32,
        tx_physical_id: u32,
        rx_functional_id: u32,
        tx_functional_id: u32,
    ) -> Result<Self, AddressingError> {
        Self::new(
            AddressingInformation::normal_11bit(AddressingType::Physical, rx_physical_id)?,
            AddressingInformation::normal_11bit(AddressingType::Physical, tx_physical_id)?,
            AddressingInformation::normal_11bit(AddressingType::Functional, rx_functional_id)?,
            AddressingInformation::normal_11bit(AddressingType::Functional, tx_functional_id)?,
        )
    }

    /// Addressing of the opposite node (rx and tx swapped).
    ///
    /// Functional entries are swapped as well; they are only meaningful
    /// when both sides use the same broadcast identifiers.
    pub fn mirrored(&self) -> Self {
        Self {
            rx_physical: self.tx_physical,
            tx_physical: self.rx_physical,
            rx_functional: self.tx_functional,
            tx_functional: self.rx_functional,
        }
    }

    pub fn format(&self) -> AddressingFormat {
        self.rx_physical.format()
    }

    pub fn rx_physical(&self) -> &AddressingInformation {
        &self.rx_physical
    }

    pub fn tx_physical(&self) -> &AddressingInformation {
        &self.tx_physical
    }

    pub fn rx_functional(&self) -> &AddressingInformation {
        &self.rx_functional
    }

    pub fn tx_functional(&self) -> &AddressingInformation {
        &self.tx_functional
    }

    /// Transmission addressing for an addressing type.
    pub fn tx_for(&self, addressing_type: AddressingType) -> &AddressingInformation {
        match addressing_type {
            AddressingType::Physical => &self.tx_physical,
            AddressingType::Functional => &self.tx_functional,
        }
    }

    /// Addressing type of an incoming frame, or `None` when the frame is not addressed to this node.
    pub fn is_input_packet(&self, can_id: u32, data: &[u8]) -> Option<AddressingType> {
        if self.rx_physical.matches(can_id, data) {
            Some(AddressingType::Physical)
        } else if self.rx_functional.matches(can_id, data) {
            Some(AddressingType::Functional)
        } else {
            None
        }
    }
}
