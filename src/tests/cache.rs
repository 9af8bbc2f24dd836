//! Explicit cache invalidation through the resident handler.

use pracc::pracc::CacheKind;
use test_helpers::debug_session;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config1 with 64-set, 1-way, 4-byte-line caches on both sides.
const CONFIG1_SMALL_CACHES: u32 = (1 << 19) | (1 << 10);

#[test]
fn instruction_cache_invalidation_walks_every_tag() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().set_cp0(16, 1, CONFIG1_SMALL_CACHES);

    session
        .invalidate_cache(&mut handle.clone(), CacheKind::Inst)
        .unwrap();

    let core = handle.core();
    // 64 sets x 1 way of Index_Store_Tag_I.
    assert_eq!(core.cache_ops.get(&0x08).copied().unwrap_or(0), 64);
}

#[test]
fn data_cache_invalidation_with_writeback() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().set_cp0(16, 1, CONFIG1_SMALL_CACHES);

    session
        .invalidate_cache(&mut handle.clone(), CacheKind::Data)
        .unwrap();

    let core = handle.core();
    assert_eq!(core.cache_ops.get(&0x15).copied().unwrap_or(0), 64); // Hit_Writeback_Inv_D
}

#[test]
fn data_cache_invalidation_without_writeback() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().set_cp0(16, 1, CONFIG1_SMALL_CACHES);

    session
        .invalidate_cache(&mut handle.clone(), CacheKind::DataNoWb)
        .unwrap();

    let core = handle.core();
    assert_eq!(core.cache_ops.get(&0x09).copied().unwrap_or(0), 64); // Index_Store_Tag_D
}

#[test]
fn a_core_without_caches_skips_the_loop() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().set_cp0(16, 1, 0);

    session
        .invalidate_cache(&mut handle.clone(), CacheKind::Inst)
        .unwrap();

    assert!(handle.core().cache_ops.is_empty());
}

#[test]
fn the_session_keeps_working_after_an_invalidation() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().set_cp0(16, 1, CONFIG1_SMALL_CACHES);

    session
        .invalidate_cache(&mut handle.clone(), CacheKind::Inst)
        .unwrap();

    session.write_mem_u32(0x8001_0000, &[0x7777_7777]).unwrap();
    assert_eq!(session.read_u32(0x8001_0000).unwrap(), 0x7777_7777);
}
