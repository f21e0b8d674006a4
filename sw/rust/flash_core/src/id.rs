use core::fmt;

/// JEDEC identity record.
///
/// Byte 0 is reserved and always zero; bytes 1..=3 hold the manufacturer,
/// device and capacity codes as returned by `READ_JEDEC_ID`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct JedecId {
    bytes: [u8; 4],
}

impl JedecId {
    /// Bytes returned on the wire.
    pub const WIRE_LEN: usize = 3;

    pub fn from_payload(payload: [u8; Self::WIRE_LEN]) -> Self {
        Self { bytes: [0, payload[0], payload[1], payload[2]] }
    }

    pub fn manufacturer(&self) -> u8 { self.bytes[1] }
    pub fn device(&self) -> u8 { self.bytes[2] }
    pub fn capacity(&self) -> u8 { self.bytes[3] }

    pub fn to_bytes(&self) -> [u8; 4] { self.bytes }

    /// 0x00 and 0xFF are what a floating or unpowered bus reads back, and
    /// neither is assigned as a JEDEC code.
    pub fn is_plausible(&self) -> bool {
        self.bytes[1..].iter().all(|&b| b != 0x00 && b != 0xFF)
    }
}

impl fmt::Display for JedecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "manufacturer=0x{:02X}, dev=0x{:02X}, size=0x{:02X}",
            self.manufacturer(),
            self.device(),
            self.capacity()
        )
    }
}
