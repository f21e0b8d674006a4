use flash_core::{
    ConfigError, Flash, FlashError, FlashGeometry, JedecId, OpCode, StatusRegister, Transport,
};
use log::{debug, trace, warn};

pub mod bounds;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Unconfigured,
    Ready,
}

enum Payload<'a> {
    None,
    Write(&'a [u8]),
    Read(&'a mut [u8]),
}

/// SPI NOR flash driver.
///
/// Owns the transport (and with it the chip-select line) for its whole
/// lifetime. Every operation is one self-contained transaction; the driver
/// never waits for an erase or program to finish, so callers poll
/// [`Driver::is_busy`] themselves.
pub struct Driver<T: Transport> {
    transport: T,
    geometry: Option<FlashGeometry>,
}

impl<T: Transport> Driver<T> {
    /// Unconfigured driver; call [`Driver::configure`] before anything else.
    pub fn new(transport: T) -> Self {
        Self { transport, geometry: None }
    }

    pub fn with_geometry(transport: T, geometry: FlashGeometry) -> Self {
        Self { transport, geometry: Some(geometry) }
    }

    /// One-way transition to `Ready`. A rejected geometry leaves the driver
    /// unconfigured.
    pub fn configure(
        &mut self,
        page_size: u32,
        erase_block_size: u32,
        total_size: u32,
    ) -> Result<FlashGeometry, ConfigError> {
        if self.geometry.is_some() {
            return Err(ConfigError::AlreadyConfigured);
        }
        let geometry = FlashGeometry::new(page_size, erase_block_size, total_size)?;
        debug!(
            "flash: page {} B, erase block {} B, {} blocks, end 0x{:06X}",
            geometry.page_size(),
            geometry.erase_block_size(),
            geometry.block_count(),
            geometry.end_address()
        );
        self.geometry = Some(geometry);
        Ok(geometry)
    }

    pub fn state(&self) -> DriverState {
        match self.geometry {
            Some(_) => DriverState::Ready,
            None => DriverState::Unconfigured,
        }
    }

    pub fn geometry(&self) -> Option<FlashGeometry> { self.geometry }

    pub fn transport(&self) -> &T { &self.transport }
    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    /// Give the transport back.
    pub fn release(self) -> T { self.transport }

    fn ready(&self) -> Result<FlashGeometry, FlashError> {
        self.geometry.ok_or(FlashError::Unconfigured)
    }

    /// Start address of erase block `index`.
    pub fn block_address(&self, index: u32) -> Result<u32, FlashError> {
        let geometry = self.ready()?;
        geometry.block_address(index).ok_or(FlashError::OutOfRange {
            address: index.saturating_mul(geometry.erase_block_size()),
            len: 0,
            end_address: geometry.end_address(),
        })
    }

    // =========================================================================
    // Status / write-enable gate
    // =========================================================================

    pub fn read_status(&mut self) -> Result<StatusRegister, FlashError> {
        self.ready()?;
        let mut status = [0u8; 1];
        self.transaction(OpCode::ReadStatus, None, Payload::Read(&mut status))?;
        Ok(StatusRegister::from_bits_retain(status[0]))
    }

    /// A failed status read counts as busy, never as idle.
    pub fn is_busy(&mut self) -> bool {
        match self.read_status() {
            Ok(status) => status.is_busy(),
            Err(e) => {
                warn!("flash: status read failed ({}), assuming busy", e);
                true
            }
        }
    }

    /// Set the write-enable latch. The device clears it after every erase
    /// or program, so this precedes each mutating command.
    pub fn write_enable(&mut self) -> Result<(), FlashError> {
        self.simple_command(OpCode::WriteEnable)
    }

    pub fn write_disable(&mut self) -> Result<(), FlashError> {
        self.simple_command(OpCode::WriteDisable)
    }

    /// Enter deep power-down. Only `power_up` is answered afterwards.
    pub fn power_down(&mut self) -> Result<(), FlashError> {
        self.simple_command(OpCode::PowerDown)
    }

    pub fn power_up(&mut self) -> Result<(), FlashError> {
        self.simple_command(OpCode::PowerUp)
    }

    fn simple_command(&mut self, opcode: OpCode) -> Result<(), FlashError> {
        self.ready()?;
        self.transaction(opcode, None, Payload::None)
    }

    /// Refuse when busy, then set the write-enable latch.
    fn prepare_write(&mut self) -> Result<(), FlashError> {
        if self.is_busy() {
            warn!("flash: device busy, refusing mutating command");
            return Err(FlashError::DeviceBusy);
        }
        self.write_enable()
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Read the JEDEC ID. A fresh record is returned on every call.
    pub fn identify(&mut self) -> Result<JedecId, FlashError> {
        self.ready()?;
        let mut payload = [0u8; JedecId::WIRE_LEN];
        self.transaction(OpCode::ReadJedecId, None, Payload::Read(&mut payload))?;
        let id = JedecId::from_payload(payload);
        if !id.is_plausible() {
            warn!("flash: implausible JEDEC ID {:02X?}, check wiring", payload);
            return Err(FlashError::InvalidJedecId(payload));
        }
        Ok(id)
    }

    pub fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let geometry = self.ready()?;
        bounds::check_read(&geometry, address, buf.len())?;
        self.transaction(OpCode::ReadData, Some(address), Payload::Read(buf))
    }

    /// Erase the block starting at `address`, which must be block aligned.
    pub fn erase_block(&mut self, address: u32) -> Result<(), FlashError> {
        let geometry = self.ready()?;
        bounds::check_erase_block(&geometry, address)?;
        self.prepare_write()?;
        self.transaction(OpCode::EraseSector, Some(address), Payload::None)
    }

    pub fn erase_all(&mut self) -> Result<(), FlashError> {
        self.ready()?;
        self.prepare_write()?;
        self.transaction(OpCode::EraseChip, None, Payload::None)
    }

    /// Program previously erased memory. No alignment is required, but the
    /// data must not run past the end of the page containing `address`.
    pub fn program(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        let geometry = self.ready()?;
        bounds::check_program(&geometry, address, data.len())?;
        self.prepare_write()?;
        self.transaction(OpCode::ProgramPage, Some(address), Payload::Write(data))
    }

    // =========================================================================
    // Bus transaction
    // =========================================================================

    /// One chip-select cycle: header, optional payload. Chip-select is
    /// released on every path.
    fn transaction(
        &mut self,
        opcode: OpCode,
        address: Option<u32>,
        payload: Payload<'_>,
    ) -> Result<(), FlashError> {
        let mut header = [u8::from(opcode), 0, 0, 0];
        let header_len = match address {
            Some(address) => {
                header[1..].copy_from_slice(&address.to_be_bytes()[1..]);
                debug!("flash: {:?} @ 0x{:06X}", opcode, address);
                4
            }
            None => {
                debug!("flash: {:?}", opcode);
                1
            }
        };

        self.transport.begin_transaction();
        let result = self.exchange(opcode, &header[..header_len], payload);
        self.transport.end_transaction();
        result
    }

    fn exchange(&mut self, opcode: OpCode, header: &[u8], payload: Payload<'_>) -> Result<(), FlashError> {
        let written = self.transport.write(header);
        check_count(opcode, header.len(), written)?;
        match payload {
            Payload::None => Ok(()),
            Payload::Write(data) => {
                if data.is_empty() {
                    return Ok(());
                }
                let written = self.transport.write(data);
                check_count(opcode, data.len(), written)
            }
            Payload::Read(buf) => {
                if buf.is_empty() {
                    return Ok(());
                }
                let read = self.transport.read(buf);
                check_count(opcode, buf.len(), read)
            }
        }
    }
}

fn check_count(opcode: OpCode, expected: usize, actual: usize) -> Result<(), FlashError> {
    trace!("flash: {:?} transferred {}/{}", opcode, actual, expected);
    if actual != expected {
        warn!("flash: short transfer during {:?}: {} of {} bytes", opcode, actual, expected);
        return Err(FlashError::Transport { opcode, expected, actual });
    }
    Ok(())
}

impl<T: Transport> Flash for Driver<T> {
    fn geometry(&self) -> Option<FlashGeometry> { self.geometry }
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> anyhow::Result<()> { Ok(self.read(addr, buf)?) }
    fn program(&mut self, addr: u32, data: &[u8]) -> anyhow::Result<()> { Ok(self.program(addr, data)?) }
    fn sector_erase(&mut self, addr: u32) -> anyhow::Result<()> { Ok(self.erase_block(addr)?) }
    fn rdsr(&mut self) -> anyhow::Result<u8> { Ok(self.read_status()?.bits()) }
}

#[cfg(feature = "sim")]
pub mod sim {
    use super::*;
    pub use flash_mock::{SimConfig, SimNorFlash};

    /// Driver wired to a freshly erased simulated device.
    pub fn driver_with_sim(config: SimConfig) -> Driver<SimNorFlash> {
        Driver::with_geometry(SimNorFlash::new(config), config.geometry)
    }
}
