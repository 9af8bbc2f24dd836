//! Resident algorithm routines
//!
//! Whole-memory scans run orders of magnitude faster as a short program on
//! the target than word by word over dmseg. The routines here are installed
//! into a working area with the ordinary write path and handed to the target
//! driver to run to their terminating breakpoint.

use mips32_insn::gpr;

use crate::ejtag::{EjtagSession, Tap};
use crate::error::{Error, Result};
use crate::target::Target;

/// CRC-32 over target memory, bit-serial with the 0x04C11DB7 polynomial.
/// `$a0` carries the accumulator in and out, `$a1` the byte count.
const CRC_CODE: [u32; 23] = [
    0x248C_0000, // addiu $t4, $a0, 0
    0x24AA_0000, // addiu $t2, $a1, 0
    0x2404_FFFF, // addiu $a0, $zero, 0xffffffff
    0x1000_0010, // beq   $zero, $zero, ncomp
    0x240B_0000, // addiu $t3, $zero, 0
    // nbyte:
    0x8185_0000, // lb    $a1, ($t4)
    0x218C_0001, // addi  $t4, $t4, 1
    0x0005_2E00, // sll   $a1, $a1, 24
    0x3C02_04C1, // lui   $v0, 0x04c1
    0x0085_2026, // xor   $a0, $a0, $a1
    0x3447_1DB7, // ori   $a3, $v0, 0x1db7
    0x0000_3021, // addu  $a2, $zero, $zero
    // loop:
    0x0004_4040, // sll   $t0, $a0, 1
    0x24C6_0001, // addiu $a2, $a2, 1
    0x2884_0000, // slti  $a0, $a0, 0
    0x0107_4826, // xor   $t1, $t0, $a3
    0x0124_400B, // movn  $t0, $t1, $a0
    0x28C3_0008, // slti  $v1, $a2, 8
    0x1460_FFF9, // bne   $v1, $zero, loop
    0x0100_2021, // addu  $a0, $t0, $zero
    // ncomp:
    0x154B_FFF0, // bne   $t2, $t3, nbyte
    0x256B_0001, // addiu $t3, $t3, 1
    0x7000_003F, // sdbbp
];

/// Erase check: AND all bytes of a region into `$a2`. The accumulator is
/// seeded with 0xFF, not 0xFFFFFFFF, so only the low byte of the
/// sign-extended loads ever participates and a blank region reads back as
/// exactly 0xFF.
const ERASE_CHECK_CODE: [u32; 6] = [
    // nbyte:
    0x8088_0000, // lb    $t0, ($a0)
    0x00C8_3024, // and   $a2, $a2, $t0
    0x24A5_FFFF, // addiu $a1, $a1, -1
    0x14A0_FFFC, // bne   $a1, $zero, nbyte
    0x2484_0001, // addiu $a0, $a0, 1
    0x7000_003F, // sdbbp
];

/// Checksum `count` bytes of target memory starting at `address`.
pub fn checksum_memory<T: Tap>(
    session: &mut EjtagSession<T>,
    target: &mut dyn Target,
    address: u32,
    count: u32,
) -> Result<u32> {
    if !target.is_halted() {
        return Err(Error::NotHalted);
    }

    let area = target.alloc_working_area(CRC_CODE.len() as u32 * 4)?;
    session.write_mem_u32(area.address, &CRC_CODE)?;

    // Scale the timeout with the amount of memory scanned.
    let timeout_ms = 20_000 * (1 + count / (1024 * 1024)) * 2;

    let result = target.run_algorithm(
        area.address,
        area.address + (CRC_CODE.len() as u32 - 1) * 4,
        &[(gpr::A0, address), (gpr::A1, count)],
        &[gpr::A0],
        timeout_ms,
    );

    let _ = target.free_working_area(area);
    Ok(result?[0])
}

/// Check whether `count` bytes starting at `address` are erased. Returns the
/// AND accumulator; 0xFF means every byte read as 0xFF.
pub fn blank_check_memory<T: Tap>(
    session: &mut EjtagSession<T>,
    target: &mut dyn Target,
    address: u32,
    count: u32,
) -> Result<u32> {
    if !target.is_halted() {
        return Err(Error::NotHalted);
    }

    let area = target.alloc_working_area(ERASE_CHECK_CODE.len() as u32 * 4)?;
    session.write_mem_u32(area.address, &ERASE_CHECK_CODE)?;

    let result = target.run_algorithm(
        area.address,
        area.address + (ERASE_CHECK_CODE.len() as u32 - 1) * 4,
        &[(gpr::A0, address), (gpr::A1, count), (gpr::A2, 0xFF)],
        &[gpr::A2],
        10_000,
    );

    let _ = target.free_working_area(area);
    Ok(result?[0])
}
