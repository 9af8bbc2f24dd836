//! FASTDATA bulk transfers against the simulated core.

use pracc::pracc::FASTDATA_HANDLER_SIZE;
use pracc::{Error, Target};
use test_helpers::debug_session;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn fastdata_write_round_trips_through_read_mem() {
    init();
    let (mut session, mut handle) = debug_session();
    let area = handle.alloc_working_area(FASTDATA_HANDLER_SIZE).unwrap();

    let data: Vec<u32> = (0..1024u32).map(|i| i.wrapping_mul(0x9E37_79B9)).collect();
    session.fastdata_write(area, 0x8002_0000, &data).unwrap();

    let mut back = vec![0u32; 1024];
    session.read_mem_u32(0x8002_0000, &mut back).unwrap();
    assert_eq!(back, data);
}

#[test]
fn fastdata_read_returns_target_memory() {
    init();
    let (mut session, mut handle) = debug_session();
    let area = handle.alloc_working_area(FASTDATA_HANDLER_SIZE).unwrap();

    let data: Vec<u32> = (0..64u32).map(|i| 0xFEED_0000 + i).collect();
    handle.core().write_ram_u32(0x8002_4000, &data);

    let mut back = vec![0u32; 64];
    session.fastdata_read(area, 0x8002_4000, &mut back).unwrap();
    assert_eq!(back, data);
}

#[test]
fn handler_reinstall_is_skipped_for_the_same_direction() {
    init();
    let (mut session, mut handle) = debug_session();
    let area = handle.alloc_working_area(FASTDATA_HANDLER_SIZE).unwrap();

    session.fastdata_write(area, 0x8002_0000, &[1, 2, 3, 4]).unwrap();
    let fetches_after_first = handle.core().stat_fetches;

    session.fastdata_write(area, 0x8002_0100, &[5, 6, 7, 8]).unwrap();
    let second_cost = handle.core().stat_fetches - fetches_after_first;

    // The second transfer skips the handler download: only the jump stub
    // and the resident loop itself are fetched.
    assert!(second_cost < fetches_after_first);

    let mut back = [0u32; 4];
    session.read_mem_u32(0x8002_0100, &mut back).unwrap();
    assert_eq!(back, [5, 6, 7, 8]);
}

#[test]
fn a_too_small_working_area_is_rejected() {
    init();
    let (mut session, mut handle) = debug_session();
    let area = handle.alloc_working_area(FASTDATA_HANDLER_SIZE / 2).unwrap();

    assert!(matches!(
        session.fastdata_write(area, 0x8002_0000, &[1]),
        Err(Error::ResourceUnavailable)
    ));
}

#[test]
fn dropped_scans_end_in_fast_download_failed_without_hanging() {
    init();
    let (mut session, mut handle) = debug_session();
    let area = handle.alloc_working_area(FASTDATA_HANDLER_SIZE).unwrap();

    // Install the handler with a clean transfer first, then make every
    // fifth FASTDATA scan complete before the core posts its access.
    session.fastdata_write(area, 0x8002_0000, &[0; 4]).unwrap();
    handle.core().fastdata_drop_every = Some(5);

    let data: Vec<u32> = (0..16u32).collect();
    assert!(matches!(
        session.fastdata_write(area, 0x8002_0000, &data),
        Err(Error::FastDownloadFailed)
    ));
}
