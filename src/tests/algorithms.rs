//! Resident checksum and blank-check routines.

use pracc::algorithm::{blank_check_memory, checksum_memory};
use test_helpers::debug_session;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Bit-serial CRC-32 with the 0x04C11DB7 polynomial, matching the resident
/// routine: init 0xFFFFFFFF, MSB first, no final inversion.
fn reference_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for byte in data {
        crc ^= u32::from(*byte) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[test]
fn checksum_matches_a_host_computation() {
    init();
    let (mut session, handle) = debug_session();

    let data: Vec<u8> = (0..257u32).map(|i| (i.wrapping_mul(37) ^ 0x5A) as u8).collect();
    handle.core().write_ram_u8(0x8001_0000, &data);

    let checksum = checksum_memory(&mut session, &mut handle.clone(), 0x8001_0000, 257).unwrap();
    assert_eq!(checksum, reference_crc32(&data));
}

#[test]
fn blank_check_reports_an_erased_region() {
    init();
    let (mut session, handle) = debug_session();

    handle.core().write_ram_u8(0x8001_0000, &[0xFF; 64]);
    let blank = blank_check_memory(&mut session, &mut handle.clone(), 0x8001_0000, 64).unwrap();
    // The accumulator is seeded with 0xFF, so a blank region reads back as
    // exactly 0xFF.
    assert_eq!(blank, 0xFF);
}

#[test]
fn blank_check_flags_a_programmed_byte() {
    init();
    let (mut session, handle) = debug_session();

    let mut region = [0xFFu8; 64];
    region[17] = 0x7F;
    handle.core().write_ram_u8(0x8001_0000, &region);

    let blank = blank_check_memory(&mut session, &mut handle.clone(), 0x8001_0000, 64).unwrap();
    assert_eq!(blank, 0x7F);
}
