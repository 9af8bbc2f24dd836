//! Queued processor-access engine
//!
//! Batches one combined scan per expected access into the JTAG layer with
//! idle clocks in between, flushes, then verifies every captured record in a
//! second pass. Roughly an order of magnitude faster than the sequential
//! engine, but it relies on the core keeping up with the scan rate; the
//! inter-scan delay is the knob.
//!
//! A store to dmseg reaches the probe only after the following instruction
//! has been fetched, so the scan pattern interleaves each instruction's
//! fetch with the store read-back of the instruction before it.

use super::{PraccQueue, PRACC_PARAM_OUT, PRACC_TEXT};
use crate::ejtag::{ctrl, EjtagInst, EjtagSession, ExecMode, Tap};
use crate::error::{Error, Result};

impl<T: Tap> EjtagSession<T> {
    /// Execute a queue with the engine selected by the session mode.
    ///
    /// Sequential mode and queues that leave debug mode always take the
    /// sequential path.
    pub fn queue_exec(&mut self, queue: &PraccQueue, param_out: &mut [u32]) -> Result<()> {
        if self.mode() == ExecMode::Sequential || queue.contains_dret() {
            return self.exec(queue, param_out);
        }

        let num_clocks = ((u64::from(self.scan_delay()) * u64::from(self.tap.speed_khz())
            + 500_000)
            / 1_000_000) as u32;

        let ejtag_ctrl = self.ejtag_ctrl & !ctrl::PRACC;
        self.tap.set_instr(EjtagInst::All);

        for i in 0..2 * queue.code_count() {
            let mut data = 0;
            if i & 1 == 1 {
                // Store read-back for the previous instruction, if any.
                if i < 2 || queue.store_addr(i / 2 - 1) == 0 {
                    continue;
                }
            } else {
                data = queue.instr(i / 2);
            }

            self.tap.add_clocks(num_clocks);
            self.tap.queue_scan_96(ejtag_ctrl, data);
        }

        let scans = self.tap.execute_queue()?;

        let mut fetch_addr = PRACC_TEXT;
        let mut scan_count = 0usize;
        for i in 0..2 * queue.code_count() {
            let mut store_addr = 0;
            if i & 1 == 1 {
                if i < 2 {
                    continue;
                }
                store_addr = queue.store_addr(i / 2 - 1);
                if store_addr == 0 {
                    continue;
                }
            }

            let scan = *scans
                .get(scan_count)
                .ok_or(Error::Device("scan queue returned short"))?;

            if scan.ctrl & ctrl::PRACC == 0 {
                log::error!(
                    "error: access not pending, scan_count: {scan_count} ejtag_ctrl: 0x{:08x}",
                    scan.ctrl
                );
                log::warn!("disable caching if enabled or increase \"scan_delay\"");
                return Err(Error::Device("processor access not pending"));
            }

            if store_addr != 0 {
                if scan.ctrl & ctrl::PRNW == 0 {
                    log::error!("not a store/write access, count: {scan_count}");
                    return Err(Error::Protocol("expected a store access"));
                }
                if scan.addr != store_addr {
                    log::error!(
                        "store address mismatch, read: 0x{:08x} expected: 0x{store_addr:08x} \
                         count: {scan_count}",
                        scan.addr
                    );
                    return Err(Error::Protocol("store address mismatch"));
                }
                let index = ((scan.addr - PRACC_PARAM_OUT) / 4) as usize;
                *param_out
                    .get_mut(index)
                    .ok_or(Error::Protocol("store beyond the output buffer"))? = scan.data;
            } else {
                if scan.ctrl & ctrl::PRNW != 0 {
                    log::error!("not a fetch/read access, count: {scan_count}");
                    return Err(Error::Protocol("expected a fetch access"));
                }
                if scan.addr != fetch_addr {
                    log::error!(
                        "fetch addr mismatch, read: 0x{:08x} expected: 0x{fetch_addr:08x} \
                         count: {scan_count}",
                        scan.addr
                    );
                    return Err(Error::Protocol("fetch address mismatch"));
                }
                fetch_addr += 4;
            }
            scan_count += 1;
        }

        Ok(())
    }
}
