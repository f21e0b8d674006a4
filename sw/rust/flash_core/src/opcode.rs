use core::convert::TryFrom;

/// SPI flash op codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    ////////////////////////////////////////////////////////////
    // Status commands

    /// Sets the write-enable latch. Required before every erase or program.
    WriteEnable = 0x06,
    /// Clears the write-enable latch.
    WriteDisable = 0x04,
    ReadStatus = 0x05,
    WriteStatus = 0x01,

    ////////////////////////////////////////////////////////////
    // Read commands

    ReadData = 0x03,
    /// Like ReadData with one dummy byte between address and data.
    ReadDataFast = 0x0B,
    ReadDataFastDual = 0x3B,

    ////////////////////////////////////////////////////////////
    // Erase and program commands

    /// Programs up to one page. Writes past the page end wrap to its start.
    ProgramPage = 0x02,
    /// Resets one erase block to 0xFF.
    EraseSector = 0x20,
    /// Large (typically 64KB) block erase.
    EraseBlock = 0xD8,
    EraseChip = 0xC7,
    EraseChipAlt = 0x60,

    ////////////////////////////////////////////////////////////
    // Power and ID commands

    PowerDown = 0xB9,
    PowerUp = 0xAB,
    ReadJedecId = 0x9F,
}

impl OpCode {
    /// Returns true iff the op code is followed by a 3-byte address.
    pub fn has_address(&self) -> bool {
        matches!(
            self,
            Self::ReadData
                | Self::ReadDataFast
                | Self::ReadDataFastDual
                | Self::ProgramPage
                | Self::EraseSector
                | Self::EraseBlock
        )
    }

    /// Returns true iff the op code clears the write-enable latch on completion.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::ProgramPage
                | Self::EraseSector
                | Self::EraseBlock
                | Self::EraseChip
                | Self::EraseChipAlt
                | Self::WriteStatus
        )
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 { op as u8 }
}

/// Error for an unknown op code byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownOpCode(pub u8);

impl TryFrom<u8> for OpCode {
    type Error = UnknownOpCode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0x06 => Self::WriteEnable,
            0x04 => Self::WriteDisable,
            0x05 => Self::ReadStatus,
            0x01 => Self::WriteStatus,
            0x03 => Self::ReadData,
            0x0B => Self::ReadDataFast,
            0x3B => Self::ReadDataFastDual,
            0x02 => Self::ProgramPage,
            0x20 => Self::EraseSector,
            0xD8 => Self::EraseBlock,
            0xC7 => Self::EraseChip,
            0x60 => Self::EraseChipAlt,
            0xB9 => Self::PowerDown,
            0xAB => Self::PowerUp,
            0x9F => Self::ReadJedecId,
            other => return Err(UnknownOpCode(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_conversion_is_consistent() {
        for byte in 0..=u8::MAX {
            if let Ok(op) = OpCode::try_from(byte) {
                assert_eq!(u8::from(op), byte);
            }
        }
        assert_eq!(OpCode::try_from(0x00), Err(UnknownOpCode(0x00)));
    }

    #[test]
    fn addressed_commands() {
        assert!(OpCode::ReadData.has_address());
        assert!(OpCode::ProgramPage.has_address());
        assert!(OpCode::EraseSector.has_address());
        assert!(!OpCode::EraseChip.has_address());
        assert!(!OpCode::ReadJedecId.has_address());
        assert!(!OpCode::WriteEnable.has_address());
    }
}
