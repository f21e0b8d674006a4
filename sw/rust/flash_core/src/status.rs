use bitflags::bitflags;

bitflags! {
    /// Status register snapshot.
    ///
    /// Only `WIP` drives driver behaviour; the remaining bits are carried
    /// through unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusRegister: u8 {
        /// Write in progress (busy)
        const WIP = 1 << 0;
        /// Write-enable latch
        const WEL = 1 << 1;
        const BP0 = 1 << 2;
        const BP1 = 1 << 3;
        const BP2 = 1 << 4;
        const BP3 = 1 << 5;
        /// Reserved / vendor specific
        const RESERVED = 1 << 6;
        /// Status register protect
        const SRP = 1 << 7;
    }
}

impl StatusRegister {
    pub fn is_busy(self) -> bool { self.contains(Self::WIP) }

    pub fn write_enabled(self) -> bool { self.contains(Self::WEL) }

    /// Block-protect field (bits 2..=5).
    pub fn block_protect(self) -> u8 { (self.bits() >> 2) & 0x0F }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bits() {
        let st = StatusRegister::from_bits_retain(0b1011_0111);
        assert!(st.is_busy());
        assert!(st.write_enabled());
        assert_eq!(st.block_protect(), 0b1101);
        assert!(st.contains(StatusRegister::SRP));
        assert!(!st.contains(StatusRegister::RESERVED));
        assert_eq!(st.bits(), 0b1011_0111);
    }

    #[test]
    fn idle_register() {
        let st = StatusRegister::from_bits_retain(0x00);
        assert!(!st.is_busy());
        assert!(!st.write_enabled());
        assert_eq!(st.block_protect(), 0);
    }
}
