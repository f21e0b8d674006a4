//! Request-shape checks. All of them run before the bus is touched.

use flash_core::{FlashError, FlashGeometry};

fn out_of_range(geometry: &FlashGeometry, address: u32, len: usize) -> FlashError {
    FlashError::OutOfRange { address, len, end_address: geometry.end_address() }
}

/// The request must end strictly below `end_address`.
pub fn check_read(geometry: &FlashGeometry, address: u32, len: usize) -> Result<(), FlashError> {
    let end = u64::from(geometry.end_address());
    if u64::from(address) >= end || u64::from(address).saturating_add(len as u64) >= end {
        return Err(out_of_range(geometry, address, len));
    }
    Ok(())
}

pub fn check_erase_block(geometry: &FlashGeometry, address: u32) -> Result<(), FlashError> {
    let alignment = geometry.erase_block_size();
    if address & (alignment - 1) != 0 {
        return Err(FlashError::Misaligned { address, alignment });
    }
    if address >= geometry.end_address() {
        return Err(out_of_range(geometry, address, 0));
    }
    Ok(())
}

/// The device wraps writes at the page end instead of rejecting them, so a
/// program request may never cross into the next page.
pub fn check_program(geometry: &FlashGeometry, address: u32, len: usize) -> Result<(), FlashError> {
    let end = geometry.end_address();
    if address >= end {
        return Err(out_of_range(geometry, address, len));
    }
    let page_size = geometry.page_size();
    let page_offset = address & (page_size - 1);
    if len as u64 > u64::from(page_size - page_offset) {
        return Err(FlashError::PageBoundaryCrossed { address, len, page_size });
    }
    // only reachable when the sizes are not powers of two
    if u64::from(address).saturating_add(len as u64) > u64::from(end) {
        return Err(out_of_range(geometry, address, len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> FlashGeometry {
        FlashGeometry::new(0x100, 0x8000, 0x80000).unwrap()
    }

    #[test]
    fn read_must_end_below_end_address() {
        let g = board();
        assert!(check_read(&g, 0, 0x100).is_ok());
        assert!(check_read(&g, 0x7FF00, 0xFF).is_ok());
        assert!(check_read(&g, 0x7FF00, 0x100).is_err());
        assert!(check_read(&g, 0x80000, 0).is_err());
        assert!(check_read(&g, u32::MAX, usize::MAX).is_err());
    }

    #[test]
    fn erase_reports_misalignment_before_range() {
        let g = board();
        assert!(check_erase_block(&g, 3 * 0x8000).is_ok());
        assert_eq!(
            check_erase_block(&g, 0x8001),
            Err(FlashError::Misaligned { address: 0x8001, alignment: 0x8000 })
        );
        assert!(matches!(check_erase_block(&g, 0x80001), Err(FlashError::Misaligned { .. })));
        assert!(matches!(check_erase_block(&g, 0x80000), Err(FlashError::OutOfRange { .. })));
    }

    #[test]
    fn program_stays_inside_one_page() {
        let g = board();
        assert!(check_program(&g, 0x1000, 0x100).is_ok());
        assert!(check_program(&g, 0x10F0, 0x10).is_ok());
        assert_eq!(
            check_program(&g, 0x10F0, 0x11),
            Err(FlashError::PageBoundaryCrossed { address: 0x10F0, len: 0x11, page_size: 0x100 })
        );
        assert!(check_program(&g, 0x1000, 0x101).is_err());
        assert!(matches!(check_program(&g, 0x80000, 1), Err(FlashError::OutOfRange { .. })));
    }
}
