//! Addressing information (N_AI) for the five CAN addressing formats.
//!
//! Depending on the format, addressing information lives in the CAN
//! identifier, in the first byte of the data field, or in both. This module
//! validates combinations of {addressing type, CAN ID, target address, source
//! address, address extension} and encodes/decodes the leading data byte.
use crate::error::AddressingError;
use crate::protocol::can::can_id::{CanId, CanIdInfo};

pub mod node;

//==================================================================================ENUMS
/// CAN addressing format; fixed for the lifetime of a communication channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressingFormat {
    /// 11-bit identifier, addressing carried by the identifier only.
    Normal11bit,
    /// 29-bit identifier with target/source addresses embedded (0x18DA/0x18DB).
    NormalFixed,
    /// Any identifier plus a target address in the first data byte.
    Extended,
    /// 11-bit identifier plus an address extension in the first data byte.
    Mixed11bit,
    /// 29-bit identifier (0x18CE/0x18CD) plus an address extension in the first data byte.
    Mixed29bit,
}

impl AddressingFormat {
    /// Every supported format.
    pub const ALL: [AddressingFormat; 5] = [
        AddressingFormat::Normal11bit,
        AddressingFormat::NormalFixed,
        AddressingFormat::Extended,
        AddressingFormat::Mixed11bit,
        AddressingFormat::Mixed29bit,
    ];

    /// Number of leading data bytes devoted to addressing information.
    pub const fn ai_data_bytes(self) -> usize {
        match self {
            AddressingFormat::Normal11bit | AddressingFormat::NormalFixed => 0,
            AddressingFormat::Extended
            | AddressingFormat::Mixed11bit
            | AddressingFormat::Mixed29bit => 1,
        }
    }

    /// Whether target and source addresses are embedded in the CAN identifier.
    pub const fn uses_fixed_can_id(self) -> bool {
        matches!(
            self,
            AddressingFormat::NormalFixed | AddressingFormat::Mixed29bit
        )
    }
}

/// Addressing type of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressingType {
    /// 1-to-1 communication.
    Physical,
    /// 1-to-many communication (broadcast).
    Functional,
}

//==================================================================================DECODE
/// Addressing information recovered from a CAN ID and its data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodedAddressing {
    pub addressing_type: Option<AddressingType>,
    pub target_address: Option<u8>,
    pub source_address: Option<u8>,
    pub address_extension: Option<u8>,
}

/// Encode the addressing information carried in the data field.
///
/// Extended addressing emits `[target_address]`, both Mixed formats emit
/// `[address_extension]`, Normal formats emit nothing. Target addresses of
/// formats that carry them in the CAN ID are accepted and ignored.
pub fn encode_ai_data_bytes(
    format: AddressingFormat,
    target_address: Option<u8>,
    address_extension: Option<u8>,
) -> Result<Vec<u8>, AddressingError> {
    match format {
        AddressingFormat::Normal11bit => {
            reject_unused(format, "target_address", target_address)?;
            reject_unused(format, "address_extension", address_extension)?;
            Ok(Vec::new())
        }
        AddressingFormat::NormalFixed => {
            reject_unused(format, "address_extension", address_extension)?;
            Ok(Vec::new())
        }
        AddressingFormat::Extended => {
            reject_unused(format, "address_extension", address_extension)?;
            let target = target_address.ok_or(AddressingError::Inconsistent {
                reason: "Extended addressing requires a target address",
            })?;
            Ok([target].to_vec())
        }
        AddressingFormat::Mixed11bit => {
            reject_unused(format, "target_address", target_address)?;
            let ae = address_extension.ok_or(AddressingError::Inconsistent {
                reason: "Mixed addressing requires an address extension",
            })?;
            Ok([ae].to_vec())
        }
        AddressingFormat::Mixed29bit => {
            let ae = address_extension.ok_or(AddressingError::Inconsistent {
                reason: "Mixed addressing requires an address extension",
            })?;
            Ok([ae].to_vec())
        }
    }
}

/// Decode addressing information from a CAN ID and the addressing data bytes.
///
/// `ai_data_bytes` must hold exactly [`AddressingFormat::ai_data_bytes`] bytes.
/// Values recovered from the data byte take precedence over the identifier.
pub fn decode_ai(
    format: AddressingFormat,
    can_id: u32,
    ai_data_bytes: &[u8],
) -> Result<DecodedAddressing, AddressingError> {
    if ai_data_bytes.len() != format.ai_data_bytes() {
        return Err(AddressingError::Inconsistent {
            reason: "number of addressing data bytes does not match the addressing format",
        });
    }
    let CanIdInfo {
        addressing_type,
        target_address,
        source_address,
    } = CanId::new(can_id)?.decode(format)?;

    let mut decoded = DecodedAddressing {
        addressing_type,
        target_address,
        source_address,
        address_extension: None,
    };
    match format {
        AddressingFormat::Extended => decoded.target_address = Some(ai_data_bytes[0]),
        AddressingFormat::Mixed11bit | AddressingFormat::Mixed29bit => {
            decoded.address_extension = Some(ai_data_bytes[0])
        }
        AddressingFormat::Normal11bit | AddressingFormat::NormalFixed => {}
    }
    Ok(decoded)
}

//==================================================================================VALIDATE
/// Full consistency check of addressing parameters for a format.
///
/// Distinguishes fields that the format never uses
/// ([`AddressingError::UnusedArgument`]) from values that contradict each
/// other ([`AddressingError::Inconsistent`]).
pub fn validate(
    format: AddressingFormat,
    addressing_type: AddressingType,
    can_id: Option<u32>,
    target_address: Option<u8>,
    source_address: Option<u8>,
    address_extension: Option<u8>,
) -> Result<(), AddressingError> {
    match format {
        AddressingFormat::Normal11bit => {
            reject_unused(format, "target_address", target_address)?;
            reject_unused(format, "source_address", source_address)?;
            reject_unused(format, "address_extension", address_extension)?;
            let can_id = require_can_id(can_id)?;
            CanId::new(can_id)?.validate_for(format, Some(addressing_type))?;
        }
        AddressingFormat::NormalFixed => {
            reject_unused(format, "address_extension", address_extension)?;
            validate_fixed(
                format,
                addressing_type,
                can_id,
                target_address,
                source_address,
            )?;
        }
        AddressingFormat::Extended => {
            reject_unused(format, "source_address", source_address)?;
            reject_unused(format, "address_extension", address_extension)?;
            let can_id = require_can_id(can_id)?;
            CanId::new(can_id)?.validate_for(format, Some(addressing_type))?;
            if target_address.is_none() {
                return Err(AddressingError::Inconsistent {
                    reason: "Extended addressing requires a target address",
                });
            }
        }
        AddressingFormat::Mixed11bit => {
            reject_unused(format, "target_address", target_address)?;
            reject_unused(format, "source_address", source_address)?;
            let can_id = require_can_id(can_id)?;
            CanId::new(can_id)?.validate_for(format, Some(addressing_type))?;
            require_address_extension(address_extension)?;
        }
        AddressingFormat::Mixed29bit => {
            require_address_extension(address_extension)?;
            validate_fixed(
                format,
                addressing_type,
                can_id,
                target_address,
                source_address,
            )?;
        }
    }
    Ok(())
}

/// Either-identifier-or-explicit-pair rule shared by Normal Fixed and Mixed 29-bit.
fn validate_fixed(
    format: AddressingFormat,
    addressing_type: AddressingType,
    can_id: Option<u32>,
    target_address: Option<u8>,
    source_address: Option<u8>,
) -> Result<(), AddressingError> {
    match can_id {
        Some(can_id) => {
            let info = CanId::new(can_id)?.decode(format)?;
            if info.addressing_type != Some(addressing_type) {
                return Err(AddressingError::Inconsistent {
                    reason: "addressing type does not match the CAN ID",
                });
            }
            if target_address.is_some() && target_address != info.target_address {
                return Err(AddressingError::Inconsistent {
                    reason: "target address does not match the CAN ID",
                });
            }
            if source_address.is_some() && source_address != info.source_address {
                return Err(AddressingError::Inconsistent {
                    reason: "source address does not match the CAN ID",
                });
            }
        }
        None => {
            if target_address.is_none() || source_address.is_none() {
                return Err(AddressingError::Inconsistent {
                    reason: "target and source addresses are required when no CAN ID is given",
                });
            }
        }
    }
    Ok(())
}

fn reject_unused(
    format: AddressingFormat,
    argument: &'static str,
    value: Option<u8>,
) -> Result<(), AddressingError> {
    match value {
        Some(_) => Err(AddressingError::UnusedArgument { argument, format }),
        None => Ok(()),
    }
}

fn require_can_id(can_id: Option<u32>) -> Result<u32, AddressingError> {
    can_id.ok_or(AddressingError::Inconsistent {
        reason: "CAN ID is required by this addressing format",
    })
}

fn require_address_extension(address_extension: Option<u8>) -> Result<u8, AddressingError> {
    address_extension.ok_or(AddressingError::Inconsistent {
        reason: "Mixed addressing requires an address extension",
    })
}

//==================================================================================ADDRESSING_INFORMATION
/// Validated addressing information of a single packet or message direction.
///
/// Immutable once built: every constructor runs [`validate`] and fills the
/// values derivable from the others (CAN ID from target/source for fixed
/// formats, target/source from the CAN ID otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressingInformation {
    format: AddressingFormat,
    addressing_type: AddressingType,
    can_id: u32,
    target_address: Option<u8>,
    source_address: Option<u8>,
    address_extension: Option<u8>,
}

impl AddressingInformation {
    /// Validate and complete addressing parameters.
    pub fn new(
        format: AddressingFormat,
        addressing_type: AddressingType,
        can_id: Option<u32>,
        target_address: Option<u8>,
        source_address: Option<u8>,
        address_extension: Option<u8>,
    ) -> Result<Self, AddressingError> {
        validate(
            format,
            addressing_type,
            can_id,
            target_address,
            source_address,
            address_extension,
        )?;

        let (can_id, target_address, source_address) = if format.uses_fixed_can_id() {
            match (can_id, target_address, source_address) {
                (Some(can_id), _, _) => {
                    let info = CanId::new(can_id)?.decode(format)?;
                    (can_id, info.target_address, info.source_address)
                }
                (None, Some(target), Some(source)) => {
                    let can_id = CanId::builder(format)
                        .with_addressing_type(addressing_type)
                        .to_target(target)
                        .from_source(source)
                        .build()?;
                    (can_id.raw(), Some(target), Some(source))
                }
                _ => {
                    return Err(AddressingError::Inconsistent {
                        reason: "target and source addresses are required when no CAN ID is given",
                    })
                }
            }
        } else {
            (require_can_id(can_id)?, target_address, source_address)
        };

        Ok(Self {
            format,
            addressing_type,
            can_id,
            target_address,
            source_address,
            address_extension,
        })
    }

    /// Normal 11-bit addressing: the identifier is the whole addressing.
    pub fn normal_11bit(
        addressing_type: AddressingType,
        can_id: u32,
    ) -> Result<Self, AddressingError> {
        Self::new(
            AddressingFormat::Normal11bit,
            addressing_type,
            Some(can_id),
            None,
            None,
            None,
        )
    }

    /// Normal Fixed addressing built from target and source addresses.
    pub fn normal_fixed(
        addressing_type: AddressingType,
        target_address: u8,
        source_address: u8,
    ) -> Result<Self, AddressingError> {
        Self::new(
            AddressingFormat::NormalFixed,
            addressing_type,
            None,
            Some(target_address),
            Some(source_address),
            None,
        )
    }

    /// Extended addressing: any identifier plus the target address data byte.
    pub fn extended(
        addressing_type: AddressingType,
        can_id: u32,
        target_address: u8,
    ) -> Result<Self, AddressingError> {
        Self::new(
            AddressingFormat::Extended,
            addressing_type,
            Some(can_id),
            Some(target_address),
            None,
            None,
        )
    }

    /// Mixed 11-bit addressing: 11-bit identifier plus address extension.
    pub fn mixed_11bit(
        addressing_type: AddressingType,
        can_id: u32,
        address_extension: u8,
    ) -> Result<Self, AddressingError> {
        Self::new(
            AddressingFormat::Mixed11bit,
            addressing_type,
            Some(can_id),
            None,
            None,
            Some(address_extension),
        )
    }

    /// Mixed 29-bit addressing built from target/source addresses and address extension.
    pub fn mixed_29bit(
        addressing_type: AddressingType,
        target_address: u8,
        source_address: u8,
        address_extension: u8,
    ) -> Result<Self, AddressingError> {
        Self::new(
            AddressingFormat::Mixed29bit,
            addressing_type,
            None,
            Some(target_address),
            Some(source_address),
            Some(address_extension),
        )
    }

    pub fn format(&self) -> AddressingFormat {
        self.format
    }

    pub fn addressing_type(&self) -> AddressingType {
        self.addressing_type
    }

    pub fn can_id(&self) -> u32 {
        self.can_id
    }

    pub fn target_address(&self) -> Option<u8> {
        self.target_address
    }

    pub fn source_address(&self) -> Option<u8> {
        self.source_address
    }

    pub fn address_extension(&self) -> Option<u8> {
        self.address_extension
    }

    /// Leading data bytes carrying this addressing information.
    pub fn ai_data_bytes(&self) -> Vec<u8> {
        match self.format {
            AddressingFormat::Normal11bit | AddressingFormat::NormalFixed => Vec::new(),
            AddressingFormat::Extended => self.target_address.into_iter().collect(),
            AddressingFormat::Mixed11bit | AddressingFormat::Mixed29bit => {
                self.address_extension.into_iter().collect()
            }
        }
    }

    /// Whether a frame (identifier + data field) is addressed with this information.
    pub fn matches(&self, can_id: u32, data: &[u8]) -> bool {
        let ai = self.ai_data_bytes();
        can_id == self.can_id && data.len() > ai.len() && data[..ai.len()] == ai[..]
    }

    /// Whether the CAN frame carrying this addressing must use a 29-bit identifier.
    pub fn is_extended_can_id(&self) -> bool {
        CanId(self.can_id).is_extended()
    }
}
