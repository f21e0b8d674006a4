use crate::ConfigError;

/// Page / erase-block / capacity layout of one flash device.
///
/// Only constructible through [`FlashGeometry::new`] and immutable afterwards,
/// so the derived quantities always agree with the configured sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashGeometry {
    page_size: u32,
    erase_block_size: u32,
    total_size: u32,
    pages_per_block: u32,
    block_count: u32,
}

impl FlashGeometry {
    /// Largest device reachable with a 3-byte wire address.
    pub const MAX_TOTAL_SIZE: u32 = 1 << 24;

    pub fn new(page_size: u32, erase_block_size: u32, total_size: u32) -> Result<Self, ConfigError> {
        if page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if page_size > erase_block_size {
            return Err(ConfigError::PageExceedsBlock { page_size, erase_block_size });
        }
        if erase_block_size > total_size {
            return Err(ConfigError::BlockExceedsDevice { erase_block_size, total_size });
        }
        if total_size > Self::MAX_TOTAL_SIZE {
            return Err(ConfigError::AddressSpaceExceeded { total_size });
        }
        Ok(Self {
            page_size,
            erase_block_size,
            total_size,
            pages_per_block: erase_block_size / page_size,
            block_count: total_size / erase_block_size,
        })
    }

    pub fn page_size(&self) -> u32 { self.page_size }
    pub fn erase_block_size(&self) -> u32 { self.erase_block_size }
    pub fn total_size(&self) -> u32 { self.total_size }
    pub fn pages_per_block(&self) -> u32 { self.pages_per_block }
    pub fn block_count(&self) -> u32 { self.block_count }

    /// One past the last addressable byte. Equal to `total_size` unless the
    /// sizes do not divide evenly, in which case the tail is unreachable.
    pub fn end_address(&self) -> u32 {
        self.page_size * self.pages_per_block * self.block_count
    }

    /// Start address of erase block `index`, if the device has one.
    pub fn block_address(&self, index: u32) -> Option<u32> {
        (index < self.block_count).then(|| index * self.erase_block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_page() {
        assert_eq!(FlashGeometry::new(0, 0x1000, 0x10000), Err(ConfigError::ZeroPageSize));
        assert_eq!(FlashGeometry::new(0, 0, 0), Err(ConfigError::ZeroPageSize));
    }

    #[test]
    fn rejects_page_larger_than_block() {
        assert_eq!(
            FlashGeometry::new(512, 256, 0x10000),
            Err(ConfigError::PageExceedsBlock { page_size: 512, erase_block_size: 256 })
        );
    }

    #[test]
    fn rejects_block_larger_than_device() {
        assert_eq!(
            FlashGeometry::new(256, 0x10000, 0x8000),
            Err(ConfigError::BlockExceedsDevice { erase_block_size: 0x10000, total_size: 0x8000 })
        );
    }

    #[test]
    fn rejects_device_beyond_24_bit_addressing() {
        assert_eq!(
            FlashGeometry::new(256, 0x10000, 0x200_0000),
            Err(ConfigError::AddressSpaceExceeded { total_size: 0x200_0000 })
        );
        assert!(FlashGeometry::new(256, 0x10000, FlashGeometry::MAX_TOTAL_SIZE).is_ok());
    }

    #[test]
    fn derives_board_geometry() {
        let g = FlashGeometry::new(0x100, 0x8000, 0x80000).unwrap();
        assert_eq!(g.pages_per_block(), 128);
        assert_eq!(g.block_count(), 16);
        assert_eq!(g.end_address(), 0x80000);
    }

    #[test]
    fn end_address_matches_derivation() {
        let sizes = [1u32, 3, 16, 100, 256, 4096];
        for &page in &sizes {
            for &block in &[page, page * 2, page * 7 + 1, 4096, 0x8000] {
                for &total in &[block, block * 3 + 5, 0x80000] {
                    let Ok(g) = FlashGeometry::new(page, block, total) else { continue };
                    assert_eq!(g.end_address(), page * (block / page) * (total / block));
                    assert!(g.end_address() <= total);
                }
            }
        }
    }

    #[test]
    fn block_address_stops_at_block_count() {
        let g = FlashGeometry::new(256, 0x1000, 0x4000).unwrap();
        assert_eq!(g.block_address(0), Some(0));
        assert_eq!(g.block_address(3), Some(0x3000));
        assert_eq!(g.block_address(4), None);
    }
}
