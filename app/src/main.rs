use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use flash_core::{Flash, FlashGeometry};
use flash_ll::sim::{driver_with_sim, SimConfig, SimNorFlash};
use flash_ll::Driver;
use log::{debug, warn};
use std::io::{self, Write};
use std::num::ParseIntError;

const DEFAULT_PAGE_SIZE: u32 = 0x100;
const DEFAULT_ERASE_BLOCK_SIZE: u32 = 0x8000;
const DEFAULT_TOTAL_SIZE: u32 = 0x80000;

// Board demo layout
const DEMO_BLOCK: u32 = 3;
const HELLO_WORLD: &[u8] = b"Hello World!";
const READBACK_LEN: usize = 100;

const IDENTIFY_ATTEMPTS: u32 = 3;
const MAX_BUSY_POLLS: u32 = 10_000;

type SimDriver = Driver<SimNorFlash>;

#[derive(Parser, Debug)]
#[command(name = "spi_flash_demo", version, about = "SPI NOR flash driver demo on a simulated device", disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// Programmable page size (bytes)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = parse_u32)]
    page_size: u32,
    /// Erase block size (bytes), the unit of command 0x20
    #[arg(long, default_value_t = DEFAULT_ERASE_BLOCK_SIZE, value_parser = parse_u32)]
    erase_block_size: u32,
    /// Total device size (bytes)
    #[arg(long, default_value_t = DEFAULT_TOTAL_SIZE, value_parser = parse_u32)]
    total_size: u32,
    /// JEDEC ID answered by the simulated device (3 hex bytes)
    #[arg(long, default_value = "1F8401")]
    jedec_id: String,
    /// Status polls the simulated device stays busy after erase/program
    #[arg(long, default_value_t = 2)]
    busy_polls: u32,
    /// Log every flash command
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print geometry
    Info,
    /// Read and check the JEDEC ID
    Id,
    /// Read the status register
    Status,
    /// Identify, erase a block, verify, program "Hello World!" and read it back
    Demo,
    /// Read bytes at address
    Read {
        #[arg(value_parser = parse_u32)]
        addr: u32,
        #[arg(value_parser = parse_u32)]
        len: u32,
    },
    /// Erase the block at address
    Erase {
        #[arg(value_parser = parse_u32)]
        addr: u32,
    },
    /// Erase the whole device
    EraseAll,
    /// Program bytes at address (must stay inside one page)
    Program(ProgramArgs),
    /// Dump a region in hex
    Dump {
        #[arg(value_parser = parse_u32)]
        offset: Option<u32>,
        #[arg(value_parser = parse_u32)]
        len: Option<u32>,
    },
    /// Interactive shell on one simulated device
    Repl,
}

#[derive(Args, Debug)]
struct ProgramArgs {
    #[arg(value_parser = parse_u32)]
    addr: u32,
    #[arg(long, conflicts_with = "str")] hex: Option<String>,
    #[arg(long, conflicts_with = "hex")] str: Option<String>,
}

/// A REPL line is parsed with the same command set as the CLI.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, name = "flash")]
struct ReplLine {
    #[command(subcommand)]
    cmd: Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run_cli(cli)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn new_driver(cli: &Cli) -> Result<SimDriver> {
    let geometry = FlashGeometry::new(cli.page_size, cli.erase_block_size, cli.total_size)
        .context("invalid flash geometry")?;
    let jedec_id: [u8; 3] = decode_hex(&cli.jedec_id)?
        .try_into()
        .map_err(|_| anyhow!("JEDEC ID must be exactly 3 bytes"))?;
    debug!("simulated device: {:?}, JEDEC {:02X?}", geometry, jedec_id);
    Ok(driver_with_sim(SimConfig { geometry, jedec_id, busy_polls: cli.busy_polls }))
}

fn run_cli(cli: Cli) -> Result<()> {
    let mut drv = new_driver(&cli)?;
    match cli.cmd {
        Command::Repl => repl(&mut drv),
        cmd => execute(&mut drv, cmd),
    }
}

fn execute(drv: &mut SimDriver, cmd: Command) -> Result<()> {
    match cmd {
        Command::Info => print_info(&*drv)?,
        Command::Id => {
            let id = drv.identify()?;
            println!("SPI Flash: {}", id);
        }
        Command::Status => {
            let st = drv.read_status()?;
            println!(
                "status=0x{:02X} busy={} wel={} bp=0x{:X}",
                st.bits(),
                st.is_busy(),
                st.write_enabled(),
                st.block_protect()
            );
        }
        Command::Demo => run_demo(drv)?,
        Command::Read { addr, len } => {
            let mut buf = vec![0u8; len as usize];
            drv.read(addr, &mut buf)?;
            println!("{}", hex::encode(buf));
        }
        Command::Erase { addr } => {
            drv.erase_block(addr)?;
            wait_idle(drv)?;
            println!("Erased block at 0x{:06X}", addr);
        }
        Command::EraseAll => {
            drv.erase_all()?;
            wait_idle(drv)?;
            println!("Erased device");
        }
        Command::Program(p) => {
            let data = if let Some(h) = p.hex { decode_hex(&h)? } else if let Some(s) = p.str { s.into_bytes() } else { bail!("Provide --hex or --str"); };
            drv.program(p.addr, &data)?;
            wait_idle(drv)?;
            println!("Programmed {} bytes at 0x{:06X}", data.len(), p.addr);
        }
        Command::Dump { offset, len } => dump(drv, offset.unwrap_or(0), len)?,
        Command::Repl => bail!("already in the shell"),
    }
    Ok(())
}

/// The driver never waits on its own; poll until the last erase/program is done.
fn wait_idle(drv: &mut SimDriver) -> Result<()> {
    for _ in 0..MAX_BUSY_POLLS {
        if !drv.is_busy() {
            return Ok(());
        }
    }
    bail!("flash still busy after {} status polls", MAX_BUSY_POLLS)
}

fn run_demo(drv: &mut SimDriver) -> Result<()> {
    println!("SPI Flash: starting demo..");

    // Step 0: check communication with the flash IC
    let mut detected = None;
    for attempt in 1..=IDENTIFY_ATTEMPTS {
        match drv.identify() {
            Ok(id) => {
                detected = Some(id);
                break;
            }
            Err(e) => warn!("SPI Flash: failed to detect (attempt {}): {}", attempt, e),
        }
    }
    let id = detected.ok_or_else(|| anyhow!("SPI Flash: failed to detect!"))?;
    println!("SPI Flash: {}", id);

    // Step 1: erase a block
    let offset = drv.block_address(DEMO_BLOCK)?;
    drv.erase_block(offset)?;
    wait_idle(drv)?;
    println!("SPI Flash: erased a block..");

    // Step 2: verify it reads back as 0xFF
    let page_size = drv.geometry().map_or(DEFAULT_PAGE_SIZE, |g| g.page_size());
    let mut first_page = vec![0x33u8; page_size as usize];
    drv.read(offset, &mut first_page)?;
    if let Some(n) = first_page.iter().position(|&b| b != 0xFF) {
        bail!("SPI Flash: byte {} of erased block is 0x{:02X}", n, first_page[n]);
    }
    println!("SPI Flash: first page is indeed 0xFF..");

    // Step 3: program a string into the erased block
    drv.program(offset, HELLO_WORLD)?;
    wait_idle(drv)?;
    println!("SPI Flash: programmed hello_world string..");

    // Step 4: read back up to the first erased byte
    let mut from_flash = [0x33u8; READBACK_LEN];
    drv.read(offset, &mut from_flash)?;
    let len = from_flash.iter().position(|&b| b == 0xFF).unwrap_or(from_flash.len());
    if len == 0 {
        bail!("SPI Flash: readback failed!");
    }
    println!("SPI Flash: read '{}' from flash!", String::from_utf8_lossy(&from_flash[..len]));

    println!("SPI Flash: demo finished!");
    Ok(())
}

fn print_info<F: Flash>(flash: &F) -> Result<()> {
    let g = flash.geometry().ok_or_else(|| anyhow!("flash is not configured"))?;
    println!("Geometry:");
    println!("- page_size:        {}", g.page_size());
    println!("- erase_block_size: {}", g.erase_block_size());
    println!("- total_size:       {}", g.total_size());
    println!("- pages_per_block:  {}", g.pages_per_block());
    println!("- block_count:      {}", g.block_count());
    println!("- end_address:      0x{:06X}", g.end_address());
    Ok(())
}

fn dump<F: Flash>(flash: &mut F, offset: u32, len: Option<u32>) -> Result<()> {
    let g = flash.geometry().ok_or_else(|| anyhow!("flash is not configured"))?;
    let len = len.unwrap_or(g.page_size());
    let mut buf = vec![0u8; len as usize];
    flash.read(offset, &mut buf)?;
    hexdump(offset as usize, &buf);
    Ok(())
}

fn repl(drv: &mut SimDriver) -> Result<()> {
    let mut rl = rustyline::Editor::<(), _>::new()?;
    println!("Simulated SPI flash shell. Type 'help' or 'quit'.");
    loop {
        let line = match rl.readline("flash> ") {
            Ok(s) => s,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() { continue; }
        rl.add_history_entry(line).ok();
        if matches!(line, "quit" | "exit") { break; }
        match ReplLine::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => {
                if let Err(e) = execute(drv, parsed.cmd) {
                    eprintln!("error: {:#}", e);
                }
            }
            Err(e) => { e.print().ok(); }
        }
        io::stdout().flush().ok();
    }
    Ok(())
}

fn parse_u32(s: &str) -> Result<u32, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(rest) => u32::from_str_radix(rest, 16),
        None => s.parse::<u32>(),
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let s = s.replace(' ', "").replace('_', "");
    if s.len() % 2 != 0 { bail!("hex must have even length"); }
    hex::decode(s).map_err(|e| anyhow!("{}", e))
}

fn hexdump(start: usize, data: &[u8]) {
    for (n, line) in data.chunks(16).enumerate() {
        print!("{:08X}: ", start + n * 16);
        for i in 0..16 {
            match line.get(i) {
                Some(b) => print!("{:02X} ", b),
                None => print!("   "),
            }
        }
        print!(" | ");
        for &b in line { let c = if (0x20..=0x7E).contains(&b) { b as char } else { '.' }; print!("{}", c); }
        println!();
    }
}
