//! Vocabulary shared by the SPI NOR flash driver, its substitute transports
//! and generic callers: device geometry, error types, the command opcode
//! table, and the two seams (`Transport` below the driver, `Flash` above it).

use anyhow::Result;

mod error;
mod geometry;
mod id;
mod opcode;
mod status;

pub use error::{ConfigError, FlashError};
pub use geometry::FlashGeometry;
pub use id::JedecId;
pub use opcode::{OpCode, UnknownOpCode};
pub use status::StatusRegister;

/// Synchronous byte exchange with chip-select control.
///
/// Every call blocks until the exchange is complete and reports how many
/// bytes were actually transferred.
pub trait Transport {
    /// Flush stale receive state and assert chip-select.
    fn begin_transaction(&mut self);
    /// Deassert chip-select.
    fn end_transaction(&mut self);
    fn write(&mut self, bytes: &[u8]) -> usize;
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn begin_transaction(&mut self) { (**self).begin_transaction() }
    fn end_transaction(&mut self) { (**self).end_transaction() }
    fn write(&mut self, bytes: &[u8]) -> usize { (**self).write(bytes) }
    fn read(&mut self, buf: &mut [u8]) -> usize { (**self).read(buf) }
}

pub trait Flash {
    /// `None` until the device has been configured.
    fn geometry(&self) -> Option<FlashGeometry>;
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;
    fn program(&mut self, addr: u32, data: &[u8]) -> Result<()>;
    fn sector_erase(&mut self, addr: u32) -> Result<()>;
    fn rdsr(&mut self) -> Result<u8> { Ok(0) }
}
