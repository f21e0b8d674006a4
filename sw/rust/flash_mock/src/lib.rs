use flash_core::{OpCode, Transport};

mod sim;

pub use sim::{SimConfig, SimNorFlash};

/// Default JEDEC ID answered by the substitute transports (Adesto AT25SF041).
pub const DEFAULT_JEDEC_ID: [u8; 3] = [0x1F, 0x84, 0x01];

/// Scripted transport. Answers `READ_STATUS` with a fixed status byte,
/// `READ_JEDEC_ID` with a fixed ID and every other read with a fill byte.
/// Records the bytes written in each transaction and can be told to
/// report short transfers.
#[derive(Debug)]
pub struct MockTransport {
    transactions: Vec<Vec<u8>>,
    open: Option<Vec<u8>>,
    read_offset: usize,
    status: u8,
    jedec_id: [u8; 3],
    fill: u8,
    write_limit: Option<usize>,
    read_limit: Option<usize>,
    begins: usize,
    ends: usize,
}

impl Default for MockTransport {
    fn default() -> Self { Self::new() }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
            open: None,
            read_offset: 0,
            status: 0,
            jedec_id: DEFAULT_JEDEC_ID,
            fill: 0xFF,
            write_limit: None,
            read_limit: None,
            begins: 0,
            ends: 0,
        }
    }

    pub fn with_status(mut self, status: u8) -> Self { self.status = status; self }
    pub fn with_fill(mut self, fill: u8) -> Self { self.fill = fill; self }
    pub fn with_jedec_id(mut self, id: [u8; 3]) -> Self { self.jedec_id = id; self }

    /// Report at most `max` bytes per write call.
    pub fn with_write_limit(mut self, max: usize) -> Self { self.write_limit = Some(max); self }
    /// Report at most `max` bytes per read call.
    pub fn with_read_limit(mut self, max: usize) -> Self { self.read_limit = Some(max); self }

    pub fn set_status(&mut self, status: u8) { self.status = status; }

    /// Bytes written during each completed transaction, oldest first.
    pub fn transactions(&self) -> &[Vec<u8>] { &self.transactions }

    /// First byte of each completed transaction.
    pub fn opcodes(&self) -> Vec<u8> {
        self.transactions.iter().filter_map(|t| t.first().copied()).collect()
    }

    pub fn clear(&mut self) { self.transactions.clear(); }

    pub fn is_selected(&self) -> bool { self.open.is_some() }
    pub fn begin_count(&self) -> usize { self.begins }
    pub fn end_count(&self) -> usize { self.ends }

    fn response_byte(&self, opcode: Option<u8>, pos: usize) -> u8 {
        match opcode.map(OpCode::try_from) {
            Some(Ok(OpCode::ReadStatus)) => self.status,
            Some(Ok(OpCode::ReadJedecId)) => self.jedec_id.get(pos).copied().unwrap_or(self.fill),
            _ => self.fill,
        }
    }
}

impl Transport for MockTransport {
    fn begin_transaction(&mut self) {
        self.begins += 1;
        self.open = Some(Vec::new());
        self.read_offset = 0;
    }

    fn end_transaction(&mut self) {
        self.ends += 1;
        if let Some(t) = self.open.take() {
            self.transactions.push(t);
        }
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        let n = self.write_limit.map_or(bytes.len(), |max| max.min(bytes.len()));
        if let Some(t) = self.open.as_mut() {
            t.extend_from_slice(&bytes[..n]);
        }
        n
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.read_limit.map_or(buf.len(), |max| max.min(buf.len()));
        let opcode = self.open.as_ref().and_then(|t| t.first().copied());
        for (i, b) in buf[..n].iter_mut().enumerate() {
            *b = self.response_byte(opcode, self.read_offset + i);
        }
        self.read_offset += n;
        n
    }
}
