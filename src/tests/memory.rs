//! Memory access round trips against the simulated core.

use pracc::ExecMode;
use test_helpers::debug_session;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn read_u32_returns_target_word() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().write_ram_u32(0x8000_0000, &[0xDEAD_BEEF]);

    assert_eq!(session.read_u32(0x8000_0000).unwrap(), 0xDEAD_BEEF);
}

#[test]
fn word_write_read_round_trip() {
    init();
    let (mut session, _handle) = debug_session();
    let data = [0x1111_1111, 0x2222_2222, 0x3333_3333];

    session.write_mem_u32(0x8001_0000, &data).unwrap();

    let mut back = [0u32; 3];
    session.read_mem_u32(0x8001_0000, &mut back).unwrap();
    assert_eq!(back, data);
}

#[test]
fn half_and_byte_round_trips() {
    init();
    let (mut session, _handle) = debug_session();

    let halves = [0x1234u16, 0x8001, 0xFFFF, 0x0000, 0x7F80];
    session.write_mem_u16(0x8002_0000, &halves).unwrap();
    let mut back16 = [0u16; 5];
    session.read_mem_u16(0x8002_0000, &mut back16).unwrap();
    assert_eq!(back16, halves);

    let bytes = [0x12u8, 0x80, 0xFF, 0x00, 0x7F, 0xA5, 0x5A];
    session.write_mem_u8(0x8002_0100, &bytes).unwrap();
    let mut back8 = [0u8; 7];
    session.read_mem_u8(0x8002_0100, &mut back8).unwrap();
    assert_eq!(back8, bytes);
}

#[test]
fn immediate_edge_values_round_trip() {
    init();
    let (mut session, _handle) = debug_session();

    // Low half zero, high half zero, both halves set, bit 15 set.
    let data = [0xABCD_0000, 0x0000_1234, 0xABCD_1234, 0x0000_8000, 0x8000_8000];
    session.write_mem_u32(0x8003_0000, &data).unwrap();

    let mut back = [0u32; 5];
    session.read_mem_u32(0x8003_0000, &mut back).unwrap();
    assert_eq!(back, data);
}

#[test]
fn chunk_boundaries() {
    init();
    let (mut session, handle) = debug_session();

    for count in [0usize, 1, 256, 257] {
        let data: Vec<u32> = (0..count as u32).map(|i| 0x0101_0000 + i).collect();
        handle.core().write_ram_u32(0x8004_0000, &data);

        let mut back = vec![0u32; count];
        session.read_mem_u32(0x8004_0000, &mut back).unwrap();
        assert_eq!(back, data, "count = {count}");
    }
}

#[test]
fn upper_half_reload_inside_a_chunk() {
    init();
    let (mut session, handle) = debug_session();

    // The biased upper half of (addr + 0x8000) changes at 0x...8000, so a
    // run crossing it forces the base register reload mid-queue.
    let addr = 0x8000_7FF0;
    let data: Vec<u32> = (0..8).map(|i| 0xCAFE_0000 + i).collect();
    handle.core().write_ram_u32(addr, &data);

    let mut back = [0u32; 8];
    session.read_mem_u32(addr, &mut back).unwrap();
    assert_eq!(back.as_slice(), data.as_slice());

    session.write_mem_u32(addr, &[0x5555_5555; 8]).unwrap();
    assert_eq!(handle.core().read_ram_u32(0x8000_8004), 0x5555_5555);
}

#[test]
fn write_to_cacheable_region_synchronizes_one_line() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().synci_step = 16;

    session
        .write_mem_u32(0x8001_0000, &[0x1111_1111, 0x2222_2222, 0x3333_3333])
        .unwrap();

    // Both bounds round to 0x8001000F: a single line, one SYNCI.
    assert_eq!(handle.core().synci_count, 1);
}

#[test]
fn write_to_kseg1_skips_cache_sync() {
    init();
    let (mut session, handle) = debug_session();

    session.write_mem_u32(0xBF00_0000, &[0]).unwrap();

    assert_eq!(handle.core().synci_count, 0);
    assert_eq!(handle.core().read_ram_u32(0xBF00_0000), 0);
}

#[test]
fn release1_uses_cache_ops() {
    init();
    let (mut session, handle) = debug_session();
    {
        let mut core = handle.core();
        // Release 1, KSEG0 write-back, 8-byte D-cache lines (DL = 2).
        core.set_cp0(16, 0, 3);
        core.set_cp0(16, 1, 2 << 10);
    }

    session.write_mem_u32(0x8001_0000, &[0xAA55_AA55]).unwrap();

    let core = handle.core();
    assert_eq!(core.synci_count, 0);
    assert_eq!(core.cache_ops.get(&0x19).copied().unwrap_or(0), 1); // Hit_Writeback_D
    assert_eq!(core.cache_ops.get(&0x10).copied().unwrap_or(0), 1); // Hit_Invalidate_I
}

#[test]
fn cache_sync_is_idempotent() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().synci_step = 16;

    session.synchronize_cache(0x8001_0000, 0x8001_0040, 3, 1).unwrap();
    let first = handle.core().synci_count;
    session.synchronize_cache(0x8001_0000, 0x8001_0040, 3, 1).unwrap();

    assert_eq!(handle.core().synci_count, 2 * first);
}

#[test]
fn sequential_and_queued_modes_agree() {
    init();
    let run = |queued: bool| -> (Vec<u32>, Vec<u16>, u32) {
        let (mut session, handle) = debug_session();
        if queued {
            session.set_scan_delay(100_000);
            assert_eq!(session.mode(), ExecMode::Queued);
        }
        handle.core().write_ram_u32(0x8000_0100, &[0xFEED_F00D, 0x0BAD_CAFE]);

        session.write_mem_u32(0x8005_0000, &[1, 2, 3, 4, 5]).unwrap();
        session.write_mem_u16(0x8005_0100, &[0xAA00, 0x00BB]).unwrap();

        let mut words = vec![0u32; 7];
        session.read_mem_u32(0x8005_0000, &mut words[..5]).unwrap();
        session.read_mem_u32(0x8000_0100, &mut words[5..]).unwrap();
        let mut halves = vec![0u16; 2];
        session.read_mem_u16(0x8005_0100, &mut halves).unwrap();
        let cp0 = session.cp0_read(16, 0).unwrap();
        (words, halves, cp0)
    };

    assert_eq!(run(false), run(true));
}
