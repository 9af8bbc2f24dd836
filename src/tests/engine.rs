//! Protocol-level behavior: restarts, timeouts, queued-mode verification.

use std::time::Duration;

use pracc::{EjtagSession, Error};
use test_helpers::{debug_session, CoreSim, FaultInjector, SimHandle};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn one_bogus_fetch_address_is_recovered_by_restart() {
    init();
    let handle = SimHandle::new(CoreSim::new());
    handle.core().write_ram_u32(0x8000_0000, &[0x0123_4567]);
    let mut tap = FaultInjector::new(handle.clone());
    tap.bogus_fetch_addrs = 1;
    let mut session = EjtagSession::new(tap);

    assert_eq!(session.read_u32(0x8000_0000).unwrap(), 0x0123_4567);
}

#[test]
fn four_bogus_fetch_addresses_exhaust_the_restart_budget() {
    init();
    let handle = SimHandle::new(CoreSim::new());
    let mut tap = FaultInjector::new(handle.clone());
    tap.bogus_fetch_addrs = 4;
    let mut session = EjtagSession::new(tap);

    assert!(matches!(
        session.read_u32(0x8000_0000),
        Err(Error::Protocol(_))
    ));
}

#[test]
fn poll_timeout_is_a_device_error() {
    init();
    let handle = SimHandle::new(CoreSim::new());
    let mut tap = FaultInjector::new(handle.clone());
    tap.dead = true;
    let mut session = EjtagSession::new(tap);
    session.set_access_timeout(Duration::from_millis(20));

    assert!(matches!(
        session.read_u32(0x8000_0000),
        Err(Error::Device(_))
    ));
}

#[test]
fn queued_mode_rejects_a_missing_access() {
    init();
    let handle = SimHandle::new(CoreSim::new());
    let mut tap = FaultInjector::new(handle.clone());
    tap.suppress_pracc = 1;
    let mut session = EjtagSession::new(tap);
    session.set_scan_delay(100_000);

    assert!(matches!(
        session.read_u32(0x8000_0000),
        Err(Error::Device(_))
    ));
}

#[test]
fn slow_store_drains_through_the_final_check() {
    init();
    let (mut session, handle) = debug_session();
    handle.core().write_ram_u32(0x8000_0000, &[0xFACE_FEED]);
    // The store surfaces only after five more fetches: past the end of the
    // queue, into the drain loop after the handler-entry transit.
    handle.core().store_latency = 5;

    assert_eq!(session.read_u32(0x8000_0000).unwrap(), 0xFACE_FEED);
}

#[test]
fn a_session_runs_many_operations_back_to_back() {
    init();
    let (mut session, handle) = debug_session();

    for i in 0..50u32 {
        let addr = 0x8001_0000 + i * 4;
        session.write_mem_u32(addr, &[i ^ 0x5A5A_5A5A]).unwrap();
        assert_eq!(session.read_u32(addr).unwrap(), i ^ 0x5A5A_5A5A);
    }
    assert!(handle.core().stat_fetches > 0);
}
