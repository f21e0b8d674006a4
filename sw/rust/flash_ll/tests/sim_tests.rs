use flash_core::{FlashError, FlashGeometry, OpCode, Transport};
use flash_ll::Driver;
use flash_mock::{SimConfig, SimNorFlash, DEFAULT_JEDEC_ID};

const BLOCK: u32 = 0x8000;

fn board_sim() -> Driver<SimNorFlash> {
    let geometry = FlashGeometry::new(0x100, BLOCK, 0x80000).unwrap();
    Driver::with_geometry(SimNorFlash::new(SimConfig::new(geometry)), geometry)
}

fn wait_idle<T: Transport>(drv: &mut Driver<T>) {
    for _ in 0..16 {
        if !drv.is_busy() {
            return;
        }
    }
    panic!("device stayed busy");
}

#[test]
fn board_demo_round_trip() {
    let mut drv = board_sim();
    let id = drv.identify().unwrap();
    assert_eq!(
        [id.manufacturer(), id.device(), id.capacity()],
        DEFAULT_JEDEC_ID
    );

    let offset = 3 * BLOCK;
    drv.erase_block(offset).unwrap();
    wait_idle(&mut drv);

    let mut first_page = [0x33u8; 256];
    drv.read(offset, &mut first_page).unwrap();
    assert!(first_page.iter().all(|&b| b == 0xFF));

    drv.program(offset, b"Hello World!").unwrap();
    wait_idle(&mut drv);

    let mut from_flash = [0x33u8; 12];
    drv.read(offset, &mut from_flash).unwrap();
    assert_eq!(&from_flash, b"Hello World!");

    let mut tail = [0u8; 4];
    drv.read(offset + 12, &mut tail).unwrap();
    assert_eq!(tail, [0xFF; 4]);
}

#[test]
fn driver_does_not_wait_for_completion() {
    let mut drv = board_sim();
    drv.erase_block(0).unwrap();
    assert_eq!(drv.program(0, &[0x00]), Err(FlashError::DeviceBusy));
    wait_idle(&mut drv);
    drv.program(0, &[0x00]).unwrap();
    assert_eq!(drv.transport().memory()[0], 0x00);
}

#[test]
fn write_latch_is_reissued_for_each_command() {
    let mut drv = board_sim();
    drv.program(0x100, &[0x11]).unwrap();
    assert!(!drv.transport().is_write_enabled());
    wait_idle(&mut drv);
    drv.program(0x101, &[0x22]).unwrap();
    wait_idle(&mut drv);
    assert_eq!(&drv.transport().memory()[0x100..0x102], &[0x11, 0x22]);
    assert_eq!(
        drv.transport().executed(),
        &[OpCode::WriteEnable, OpCode::ProgramPage, OpCode::WriteEnable, OpCode::ProgramPage]
    );
}

#[test]
fn rejected_page_crossing_leaves_memory_untouched() {
    let mut drv = board_sim();
    let data = [0u8; 0x11];
    assert!(matches!(drv.program(0x1F0, &data), Err(FlashError::PageBoundaryCrossed { .. })));
    assert!(drv.transport().memory().iter().all(|&b| b == 0xFF));
    assert!(drv.transport().executed().is_empty());
}

#[test]
fn program_without_erase_only_clears_bits() {
    let mut drv = board_sim();
    drv.program(0x40, &[0x0F]).unwrap();
    wait_idle(&mut drv);
    drv.program(0x40, &[0xF3]).unwrap();
    wait_idle(&mut drv);
    let mut b = [0u8; 1];
    drv.read(0x40, &mut b).unwrap();
    assert_eq!(b[0], 0x03);

    drv.erase_block(0).unwrap();
    wait_idle(&mut drv);
    drv.read(0x40, &mut b).unwrap();
    assert_eq!(b[0], 0xFF);
}

#[test]
fn erase_block_only_touches_its_block() {
    let mut drv = board_sim();
    for addr in [BLOCK - 1, BLOCK, 2 * BLOCK] {
        drv.program(addr, &[0x00]).unwrap();
        wait_idle(&mut drv);
    }
    drv.erase_block(BLOCK).unwrap();
    wait_idle(&mut drv);
    let mem = drv.transport().memory();
    assert_eq!(mem[(BLOCK - 1) as usize], 0x00);
    assert_eq!(mem[BLOCK as usize], 0xFF);
    assert_eq!(mem[(2 * BLOCK) as usize], 0x00);
}

#[test]
fn erase_all_resets_device() {
    let mut drv = board_sim();
    for block in 0..4 {
        drv.program(block * BLOCK + 7, b"data").unwrap();
        wait_idle(&mut drv);
    }
    drv.erase_all().unwrap();
    assert!(drv.is_busy());
    wait_idle(&mut drv);
    assert!(drv.transport().memory().iter().all(|&b| b == 0xFF));
}

#[test]
fn powered_down_device_fails_identify() {
    let mut drv = board_sim();
    drv.power_down().unwrap();
    assert_eq!(drv.identify(), Err(FlashError::InvalidJedecId([0xFF; 3])));
    // floating bus reads back WIP set
    assert!(drv.is_busy());
    assert_eq!(drv.erase_all(), Err(FlashError::DeviceBusy));

    drv.power_up().unwrap();
    assert!(drv.identify().is_ok());
    assert!(!drv.is_busy());
}

#[test]
fn write_disable_clears_latch() {
    let mut drv = board_sim();
    drv.write_enable().unwrap();
    assert!(drv.read_status().unwrap().write_enabled());
    drv.write_disable().unwrap();
    assert!(!drv.read_status().unwrap().write_enabled());
}

#[test]
fn forced_busy_blocks_mutation() {
    let mut drv = board_sim();
    drv.transport_mut().force_busy(3);
    assert_eq!(drv.erase_block(0), Err(FlashError::DeviceBusy));
    assert_eq!(drv.erase_block(0), Err(FlashError::DeviceBusy));
    assert_eq!(drv.erase_block(0), Err(FlashError::DeviceBusy));
    assert!(drv.erase_block(0).is_ok());
}
