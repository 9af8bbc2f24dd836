//! CP0, register bank and DSP access against the simulated core.

use test_helpers::debug_session;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn cp0_read_prid_stores_exactly_once() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().set_cp0(15, 0, 0x0001_9300);
    handle.core().reset_stats();

    let prid = session.cp0_read(15, 0).unwrap();

    assert_eq!(prid, 0x0001_9300);
    assert_eq!(handle.core().stat_stores, 1);
}

#[test]
fn cp0_write_read_round_trip() {
    init();
    let (mut session, _handle) = debug_session();

    for (reg, sel, value) in [(18, 0, 0xAABB_CCDD), (12, 0, 0x0040_0004), (9, 0, 0xFFFF_0001)] {
        session.cp0_write(reg, sel, value).unwrap();
        assert_eq!(session.cp0_read(reg, sel).unwrap(), value, "cp0 {reg}.{sel}");
    }
}

#[test]
fn register_bank_round_trip() {
    init();
    let (mut session, _handle) = debug_session();

    let mut regs = [0u32; 38];
    for (i, slot) in regs.iter_mut().enumerate().skip(1) {
        *slot = 0x1000_0000 + 0x0101 * i as u32;
    }
    regs[32] = 0x0040_0000; // status
    regs[33] = 0x0000_0033; // lo
    regs[34] = 0x0000_0034; // hi
    regs[35] = 0xDEAD_0035; // badvaddr
    regs[36] = 0x0000_0036; // cause
    regs[37] = 0x8000_1234; // depc

    session.write_regs(&regs).unwrap();
    let back = session.read_regs().unwrap();

    assert_eq!(back[0], 0);
    assert_eq!(&back[1..], &regs[1..]);
}

#[test]
fn scratch_registers_survive_memory_operations() {
    init();
    let (mut session, handle) = debug_session();

    let mut regs = [0u32; 38];
    for (i, slot) in regs.iter_mut().enumerate().skip(1) {
        *slot = 0xA000_0000 + i as u32;
    }
    session.write_regs(&regs).unwrap();

    session.write_mem_u32(0x8001_0000, &[1, 2, 3]).unwrap();
    let mut buf = [0u32; 3];
    session.read_mem_u32(0x8001_0000, &mut buf).unwrap();
    session.cp0_read(16, 1).unwrap();
    session.read_u32(0x8001_0004).unwrap();

    let core = handle.core();
    for i in 1..32 {
        assert_eq!(core.regs[i], regs[i], "gpr {i} clobbered");
    }
}

#[test]
fn dsp_registers_round_trip() {
    init();
    let (mut session, _handle) = debug_session();

    for (index, value) in [
        (0usize, 0x1111_0001u32), // hi1
        (1, 0x1111_0002),         // hi2
        (2, 0x1111_0003),         // hi3
        (3, 0x2222_0001),         // lo1
        (4, 0x2222_0002),         // lo2
        (5, 0x2222_0003),         // lo3
        (6, 0x0000_00FF),         // control
    ] {
        session.write_dsp_reg(index, value).unwrap();
        assert_eq!(session.read_dsp_reg(index).unwrap(), value, "dsp {index}");
    }
}

#[test]
fn dsp_access_restores_status() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().set_cp0(12, 0, 0x0040_0000);

    session.write_dsp_reg(0, 0x1234_5678).unwrap();
    session.read_dsp_reg(0).unwrap();

    assert_eq!(handle.core().cp0(12, 0), 0x0040_0000);
}

#[test]
fn dsp_index_out_of_range_is_syntax_error() {
    init();
    let (mut session, _handle) = debug_session();
    assert!(matches!(
        session.read_dsp_reg(7),
        Err(pracc::Error::Syntax(_))
    ));
}

#[test]
fn debug_caps_from_dcr_and_v20_fallback() {
    init();
    // A modern core reports breaks through DCR.
    let (mut session, handle) = debug_session();
    handle.core().impcode = 0x6000_0000; // EJTAG 3.1
    handle.core().write_ram_u32(0xFF30_0000, &[(1 << 16) | (1 << 17)]);
    session.scan_impcode().unwrap();
    let caps = session.debug_caps().unwrap();
    assert!(caps.inst_break && caps.data_break);

    // An EJTAG 2.0 core is judged from IMPCODE, not DCR.
    let (mut session, handle) = debug_session();
    handle.core().impcode = (1 << 14) | (1 << 15); // NOIB | NODB
    handle.core().write_ram_u32(0xFF30_0000, &[(1 << 16) | (1 << 17)]);
    session.scan_impcode().unwrap();
    let caps = session.debug_caps().unwrap();
    assert!(!caps.inst_break && !caps.data_break);
}
