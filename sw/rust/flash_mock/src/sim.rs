use flash_core::{FlashGeometry, OpCode, StatusRegister, Transport};
use log::trace;

use crate::DEFAULT_JEDEC_ID;

/// Size erased by the large-block `ERASE_BLOCK` (0xD8) command.
const LARGE_BLOCK_SIZE: usize = 0x10000;

#[derive(Clone, Copy, Debug)]
pub struct SimConfig {
    pub geometry: FlashGeometry,
    pub jedec_id: [u8; 3],
    /// Number of status reads that report WIP after each erase or program.
    pub busy_polls: u32,
}

impl SimConfig {
    pub fn new(geometry: FlashGeometry) -> Self {
        Self { geometry, jedec_id: DEFAULT_JEDEC_ID, busy_polls: 2 }
    }
}

/// Behavioural model of a 25-series SPI NOR device.
///
/// Commands are decoded from the bytes written while chip-select is
/// asserted and take effect when it is released. Erase, program and status
/// writes require the write-enable latch and clear it again. While WIP is
/// reported only `READ_STATUS` is answered.
#[derive(Debug)]
pub struct SimNorFlash {
    config: SimConfig,
    mem: Vec<u8>,
    wel: bool,
    busy: u32,
    powered_down: bool,
    command: Option<Vec<u8>>,
    read_offset: usize,
    executed: Vec<OpCode>,
}

impl SimNorFlash {
    pub fn new(config: SimConfig) -> Self {
        let mem = vec![0xFF; config.geometry.total_size() as usize];
        Self {
            config,
            mem,
            wel: false,
            busy: 0,
            powered_down: false,
            command: None,
            read_offset: 0,
            executed: Vec::new(),
        }
    }

    pub fn geometry(&self) -> FlashGeometry { self.config.geometry }
    pub fn memory(&self) -> &[u8] { &self.mem }
    pub fn is_write_enabled(&self) -> bool { self.wel }
    pub fn is_powered_down(&self) -> bool { self.powered_down }
    pub fn is_busy(&self) -> bool { self.busy > 0 }

    /// Report WIP for the next `polls` status reads.
    pub fn force_busy(&mut self, polls: u32) { self.busy = polls; }

    /// Commands the device has acted on, oldest first.
    pub fn executed(&self) -> &[OpCode] { &self.executed }

    pub fn status(&self) -> StatusRegister {
        let mut st = StatusRegister::empty();
        st.set(StatusRegister::WIP, self.busy > 0);
        st.set(StatusRegister::WEL, self.wel);
        st
    }

    fn response(&mut self, header: &[u8], buf: &mut [u8]) {
        let start = self.read_offset;
        let opcode = match header.first().map(|&b| OpCode::try_from(b)) {
            Some(Ok(op)) if !self.powered_down => op,
            _ => {
                buf.fill(0xFF);
                return;
            }
        };
        match opcode {
            OpCode::ReadStatus => {
                for b in buf.iter_mut() {
                    *b = self.status().bits();
                    self.busy = self.busy.saturating_sub(1);
                }
            }
            _ if self.busy > 0 => buf.fill(0xFF),
            OpCode::ReadJedecId => {
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = self.config.jedec_id.get(start + i).copied().unwrap_or(0xFF);
                }
            }
            OpCode::ReadData | OpCode::ReadDataFast | OpCode::ReadDataFastDual => {
                let dummy = usize::from(opcode != OpCode::ReadData);
                match decode_address(header) {
                    Some(address) if header.len() >= 4 + dummy => {
                        let base = address as usize + start;
                        for (i, b) in buf.iter_mut().enumerate() {
                            *b = self.mem[(base + i) % self.mem.len()];
                        }
                    }
                    _ => buf.fill(0xFF),
                }
            }
            _ => buf.fill(0xFF),
        }
    }

    fn execute(&mut self, cmd: &[u8]) {
        let Some(Ok(opcode)) = cmd.first().map(|&b| OpCode::try_from(b)) else { return };
        if self.powered_down {
            if opcode == OpCode::PowerUp {
                self.powered_down = false;
                self.executed.push(opcode);
            }
            return;
        }
        if self.busy > 0 {
            trace!("sim: ignoring {:?} while busy", opcode);
            return;
        }
        if opcode.is_mutating() && !self.wel {
            trace!("sim: ignoring {:?} without write enable", opcode);
            return;
        }
        let address = decode_address(cmd);
        if opcode.has_address() && address.is_none() {
            return;
        }
        let address = address.unwrap_or(0);
        match opcode {
            OpCode::WriteEnable => self.wel = true,
            OpCode::WriteDisable => self.wel = false,
            OpCode::ProgramPage => self.program(address, &cmd[4..]),
            OpCode::EraseSector => {
                let size = self.config.geometry.erase_block_size() as usize;
                self.erase(address, size);
            }
            OpCode::EraseBlock => self.erase(address, LARGE_BLOCK_SIZE),
            OpCode::EraseChip | OpCode::EraseChipAlt => self.mem.fill(0xFF),
            OpCode::PowerDown => self.powered_down = true,
            OpCode::WriteStatus => {}
            // answered while selected; nothing left to do on release
            OpCode::ReadStatus
            | OpCode::ReadJedecId
            | OpCode::ReadData
            | OpCode::ReadDataFast
            | OpCode::ReadDataFastDual
            | OpCode::PowerUp => return,
        }
        if opcode.is_mutating() {
            self.wel = false;
            self.busy = self.config.busy_polls;
        }
        trace!("sim: executed {:?}", opcode);
        self.executed.push(opcode);
    }

    /// Programming can only clear bits, and wraps inside the addressed page.
    fn program(&mut self, address: u32, data: &[u8]) {
        let page = self.config.geometry.page_size() as usize;
        let address = address as usize % self.mem.len();
        let page_base = address - address % page;
        let offset = address % page;
        for (i, &b) in data.iter().enumerate() {
            if let Some(cell) = self.mem.get_mut(page_base + (offset + i) % page) {
                *cell &= b;
            }
        }
    }

    fn erase(&mut self, address: u32, size: usize) {
        let address = address as usize % self.mem.len();
        let base = address - address % size;
        let end = (base + size).min(self.mem.len());
        self.mem[base..end].fill(0xFF);
    }
}

fn decode_address(cmd: &[u8]) -> Option<u32> {
    match cmd {
        [_, a2, a1, a0, ..] => Some(u32::from_be_bytes([0, *a2, *a1, *a0])),
        _ => None,
    }
}

impl Transport for SimNorFlash {
    fn begin_transaction(&mut self) {
        self.command = Some(Vec::new());
        self.read_offset = 0;
    }

    fn end_transaction(&mut self) {
        if let Some(cmd) = self.command.take() {
            self.execute(&cmd);
        }
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        if let Some(cmd) = self.command.as_mut() {
            cmd.extend_from_slice(bytes);
        }
        bytes.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let header: Vec<u8> = self.command.as_deref().unwrap_or(&[]).iter().take(5).copied().collect();
        self.response(&header, buf);
        self.read_offset += buf.len();
        buf.len()
    }
}
