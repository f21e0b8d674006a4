use thiserror::Error;

use crate::OpCode;

/// Rejected geometry. Detected once, when the driver is configured.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("page size must be non-zero")]
    ZeroPageSize,
    #[error("page size {page_size} exceeds erase block size {erase_block_size}")]
    PageExceedsBlock { page_size: u32, erase_block_size: u32 },
    #[error("erase block size {erase_block_size} exceeds device size {total_size}")]
    BlockExceedsDevice { erase_block_size: u32, total_size: u32 },
    #[error("device size {total_size} does not fit a 3-byte address")]
    AddressSpaceExceeded { total_size: u32 },
    #[error("geometry is already configured")]
    AlreadyConfigured,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    #[error("flash is not configured")]
    Unconfigured,
    #[error("{len} bytes at 0x{address:06X} fall outside 0x000000..0x{end_address:06X}")]
    OutOfRange { address: u32, len: usize, end_address: u32 },
    #[error("address 0x{address:06X} is not aligned to {alignment} bytes")]
    Misaligned { address: u32, alignment: u32 },
    #[error("{len} bytes at 0x{address:06X} cross a {page_size}-byte page boundary")]
    PageBoundaryCrossed { address: u32, len: usize, page_size: u32 },
    #[error("short transfer during {opcode:?}: {actual} of {expected} bytes")]
    Transport { opcode: OpCode, expected: usize, actual: usize },
    #[error("device is busy")]
    DeviceBusy,
    #[error("implausible JEDEC ID {0:02X?}")]
    InvalidJedecId([u8; 3]),
}
