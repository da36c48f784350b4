//! Validation, classification, encoding and decoding of CAN identifiers
//! for the ISO 15765-2 addressing formats.
use crate::error::CanIdError;
use crate::protocol::addressing::{AddressingFormat, AddressingType};

//==================================================================================CONSTANTS
/// Highest 11-bit (standard) identifier.
pub const MAX_STANDARD_CAN_ID: u32 = 0x7FF;
/// Lowest identifier that requires the 29-bit (extended) format.
pub const MIN_EXTENDED_CAN_ID: u32 = 0x800;
/// Highest 29-bit (extended) identifier.
pub const MAX_EXTENDED_CAN_ID: u32 = 0x1FFF_FFFF;

/// Normal Fixed, physically addressed: `0x18DA_TA_SA`.
pub const NORMAL_FIXED_PHYSICAL_OFFSET: u32 = 0x18DA_0000;
/// Normal Fixed, functionally addressed: `0x18DB_TA_SA`.
pub const NORMAL_FIXED_FUNCTIONAL_OFFSET: u32 = 0x18DB_0000;
/// Mixed 29-bit, physically addressed: `0x18CE_TA_SA`.
pub const MIXED_29BIT_PHYSICAL_OFFSET: u32 = 0x18CE_0000;
/// Mixed 29-bit, functionally addressed: `0x18CD_TA_SA`.
pub const MIXED_29BIT_FUNCTIONAL_OFFSET: u32 = 0x18CD_0000;

/// Every offset window spans the 16 bits holding target and source addresses.
const OFFSET_WINDOW: u32 = 0x1_0000;

/// Offset of the identifier window for a fixed format and addressing type.
const fn fixed_offset(format: AddressingFormat, addressing_type: AddressingType) -> Option<u32> {
    match (format, addressing_type) {
        (AddressingFormat::NormalFixed, AddressingType::Physical) => {
            Some(NORMAL_FIXED_PHYSICAL_OFFSET)
        }
        (AddressingFormat::NormalFixed, AddressingType::Functional) => {
            Some(NORMAL_FIXED_FUNCTIONAL_OFFSET)
        }
        (AddressingFormat::Mixed29bit, AddressingType::Physical) => {
            Some(MIXED_29BIT_PHYSICAL_OFFSET)
        }
        (AddressingFormat::Mixed29bit, AddressingType::Functional) => {
            Some(MIXED_29BIT_FUNCTIONAL_OFFSET)
        }
        _ => None,
    }
}

//==================================================================================CAN_ID
/// Addressing information recovered from a CAN identifier alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanIdInfo {
    pub addressing_type: Option<AddressingType>,
    pub target_address: Option<u8>,
    pub source_address: Option<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// CAN identifier (11 or 29 bits) stored inside a `u32`.
pub struct CanId(pub u32);

impl CanId {
    /// Wrap a raw value after checking that it fits in 29 bits.
    pub fn new(raw: u32) -> Result<Self, CanIdError> {
        if raw > MAX_EXTENDED_CAN_ID {
            return Err(CanIdError::NotCanId { can_id: raw });
        }
        Ok(Self(raw))
    }

    // Builder entry point
    /// Creates a `CanIdBuilder` for a fixed addressing format.
    pub fn builder(format: AddressingFormat) -> CanIdBuilder {
        CanIdBuilder::new(format)
    }

    /// Raw identifier value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Identifier in the 11-bit range.
    pub const fn is_standard(self) -> bool {
        self.0 <= MAX_STANDARD_CAN_ID
    }

    /// Identifier in the 29-bit range (above the 11-bit range).
    pub const fn is_extended(self) -> bool {
        self.0 >= MIN_EXTENDED_CAN_ID && self.0 <= MAX_EXTENDED_CAN_ID
    }

    /// Target address slot of a fixed-format identifier (bits 8-15).
    pub const fn target_address(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    /// Source address slot of a fixed-format identifier (bits 0-7).
    pub const fn source_address(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Decode the addressing information embedded in the identifier.
    ///
    /// Normal 11-bit, Extended and Mixed 11-bit only check the identifier
    /// width and return an empty [`CanIdInfo`]. Normal Fixed and Mixed 29-bit
    /// return addressing type, target and source addresses, or
    /// [`CanIdError::NotImplemented`] when the identifier is a valid 29-bit
    /// value outside both known offset windows.
    pub fn decode(self, format: AddressingFormat) -> Result<CanIdInfo, CanIdError> {
        match format {
            AddressingFormat::Normal11bit | AddressingFormat::Mixed11bit => {
                self.require_standard()?;
                Ok(CanIdInfo::default())
            }
            AddressingFormat::Extended => {
                if self.is_standard() || self.is_extended() {
                    Ok(CanIdInfo::default())
                } else {
                    Err(CanIdError::NotCanId { can_id: self.0 })
                }
            }
            AddressingFormat::NormalFixed | AddressingFormat::Mixed29bit => {
                self.require_extended()?;
                let addressing_type = [AddressingType::Physical, AddressingType::Functional]
                    .into_iter()
                    .find(|addressing_type| {
                        fixed_offset(format, *addressing_type).is_some_and(|offset| {
                            self.0 >= offset && self.0 < offset + OFFSET_WINDOW
                        })
                    })
                    .ok_or(CanIdError::NotImplemented {
                        can_id: self.0,
                        format,
                    })?;
                Ok(CanIdInfo {
                    addressing_type: Some(addressing_type),
                    target_address: Some(self.target_address()),
                    source_address: Some(self.source_address()),
                })
            }
        }
    }

    /// Check that the identifier is usable with a format (and addressing type, when given).
    pub fn validate_for(
        self,
        format: AddressingFormat,
        addressing_type: Option<AddressingType>,
    ) -> Result<(), CanIdError> {
        let info = self.decode(format)?;
        match (info.addressing_type, addressing_type) {
            (Some(decoded), Some(expected)) if decoded != expected => {
                Err(CanIdError::AddressingTypeMismatch {
                    can_id: self.0,
                    addressing_type: expected,
                })
            }
            _ => Ok(()),
        }
    }

    /// Boolean form of [`CanId::validate_for`].
    pub fn is_compatible(
        self,
        format: AddressingFormat,
        addressing_type: Option<AddressingType>,
    ) -> bool {
        self.validate_for(format, addressing_type).is_ok()
    }

    fn require_standard(self) -> Result<(), CanIdError> {
        if self.is_standard() {
            Ok(())
        } else {
            Err(CanIdError::WrongWidth {
                can_id: self.0,
                expected: "11-bit",
            })
        }
    }

    fn require_extended(self) -> Result<(), CanIdError> {
        if self.is_extended() {
            Ok(())
        } else {
            Err(CanIdError::WrongWidth {
                can_id: self.0,
                expected: "29-bit",
            })
        }
    }
}

//==================================================================================CAN_ID_BUILDER
#[derive(Debug)]
/// Fluent builder for identifiers of the fixed formats (Normal Fixed, Mixed 29-bit).
pub struct CanIdBuilder {
    pub format: AddressingFormat,
    pub addressing_type: AddressingType,
    pub target_address: u8,
    pub source_address: u8,
}

impl CanIdBuilder {
    /// Initializes a physically addressed builder for the given format.
    pub fn new(format: AddressingFormat) -> Self {
        Self {
            format,
            addressing_type: AddressingType::Physical,
            target_address: 0,
            source_address: 0,
        }
    }

    /// Selects the offset window (physical or functional).
    pub fn with_addressing_type(mut self, addressing_type: AddressingType) -> Self {
        self.addressing_type = addressing_type;
        self
    }

    /// Target address stored in bits 8-15.
    pub fn to_target(mut self, target_address: u8) -> Self {
        self.target_address = target_address;
        self
    }

    /// Source address stored in bits 0-7.
    pub fn from_source(mut self, source_address: u8) -> Self {
        self.source_address = source_address;
        self
    }

    /// Computes `offset(addressing_type) + (target << 8) + source`.
    ///
    /// Fails for formats that do not embed addresses in the identifier.
    pub fn build(self) -> Result<CanId, CanIdError> {
        let offset = fixed_offset(self.format, self.addressing_type).ok_or(
            CanIdError::UnsupportedFormat {
                format: self.format,
            },
        )?;
        Ok(CanId(
            offset + ((self.target_address as u32) << 8) + self.source_address as u32,
        ))
    }
}
