//! Sequential processor-access engine
//!
//! Services one dmseg access at a time: poll the control register until an
//! access is pending, read the address, then either feed the next instruction
//! (fetch) or collect the stored word (store), and complete the access. Every
//! address is checked against the queue's expectations; a mismatch early in a
//! sequence is recovered by jumping the core back to the start of the debug
//! handler, at most three times.

use std::time::Instant;

use mips32_insn as insn;

use super::{PraccQueue, PRACC_PARAM_OUT, PRACC_TEXT};
use crate::ejtag::{ctrl, EjtagInst, EjtagSession, ExecMode, Tap};
use crate::error::{Error, Result};

impl<T: Tap> EjtagSession<T> {
    /// Poll until the core posts a processor access, returning the control
    /// word. Fails after the session's access timeout.
    pub(crate) fn wait_for_pracc(&mut self) -> Result<u32> {
        self.tap.set_instr(EjtagInst::Control);
        let start = Instant::now();
        loop {
            let ejtag_ctrl = self.tap.drscan_32(self.ejtag_ctrl)?;
            if ejtag_ctrl & ctrl::PRACC != 0 {
                return Ok(ejtag_ctrl);
            }
            if start.elapsed() > self.access_timeout {
                log::error!("timeout: no memory access in progress!");
                return Err(Error::Device("no processor access pending"));
            }
        }
    }

    /// Shift in control and address for a new processor access and record
    /// them in the session.
    pub(crate) fn read_ctrl_addr(&mut self) -> Result<()> {
        self.pa_ctrl = self.wait_for_pracc()?;
        self.tap.set_instr(EjtagInst::Address);
        self.pa_addr = self.tap.drscan_32(0)?;
        Ok(())
    }

    /// Complete the pending processor access and let the core advance.
    pub(crate) fn finish_access(&mut self) -> Result<()> {
        let ejtag_ctrl = self.ejtag_ctrl & !ctrl::PRACC;
        self.tap.set_instr(EjtagInst::Control);
        self.tap.drscan_32_out(ejtag_ctrl);
        self.tap.execute_queue()?;
        Ok(())
    }

    /// Flush the core's pipeline and steer it back to the start of the debug
    /// handler: three NOPs, a jump, and a NOP in the delay slot. Some
    /// LEXRA and BMIPS cores fetch one extra word after the jump, which gets
    /// another NOP.
    pub(crate) fn clean_text_jump(&mut self) -> Result<()> {
        let jt_code = insn::j((0x0FFF_FFFF & PRACC_TEXT) >> 2);

        for i in 0..5 {
            self.pa_ctrl = self.wait_for_pracc()?;
            self.tap.set_instr(EjtagInst::Data);
            let data = if i == 3 { jt_code } else { insn::NOP };
            self.tap.drscan_32_out(data);
            self.finish_access()?;
        }

        if self.mode() != ExecMode::Sequential {
            // Queued mode never runs on the cores that need the extra NOP.
            return Ok(());
        }

        self.read_ctrl_addr()?;
        if self.pa_addr != PRACC_TEXT {
            self.tap.set_instr(EjtagInst::Data);
            self.tap.drscan_32_out(insn::NOP);
            self.finish_access()?;
        }
        Ok(())
    }

    /// Execute a queue one processor access at a time.
    ///
    /// Stores are written into `param_out` indexed by their offset from
    /// [`PRACC_PARAM_OUT`]. Returns once the core transits the handler entry
    /// with no stores outstanding, or immediately after a `DRET`.
    pub fn exec(&mut self, queue: &PraccQueue, param_out: &mut [u32]) -> Result<()> {
        if queue.code_count() > queue.max_code() {
            log::error!(
                "internal error, code count: {} > max code: {}",
                queue.code_count(),
                queue.max_code()
            );
        }

        let mut code_count = 0usize;
        // Owed stores: grows with every store instruction fetched from
        // dmseg, shrinks with every store access serviced.
        let mut store_pending = 0usize;
        let mut max_store_addr = 0u32;
        let mut restart = false;
        let mut restart_count = 0u32;
        let mut last_instr = insn::NOP;
        // Set once the last queue instruction has been shifted out.
        let mut final_check = false;
        // Set on the first transit through the handler entry afterwards.
        let mut pass = false;

        loop {
            if restart {
                if restart_count >= 3 {
                    log::debug!("max retry reached");
                    return Err(Error::Protocol("restart budget exhausted"));
                }
                self.clean_text_jump()?;
                restart_count += 1;
                restart = false;
                code_count = 0;
                log::debug!("restarting code");
            }

            self.read_ctrl_addr()?;

            if self.pa_ctrl & ctrl::PRNW != 0 {
                // Store access.
                if store_pending == 0 {
                    log::debug!("unexpected write at address 0x{:08x}", self.pa_addr);
                    if code_count < 2 {
                        restart = true;
                        continue;
                    }
                    return Err(Error::Protocol("unexpected store access"));
                }
                if self.pa_addr < PRACC_PARAM_OUT || self.pa_addr > max_store_addr {
                    log::debug!("writing at unexpected address 0x{:08x}", self.pa_addr);
                    return Err(Error::Protocol("store outside the parameter window"));
                }

                self.tap.set_instr(EjtagInst::Data);
                let data = self.tap.drscan_32(0)?;

                let index = ((self.pa_addr - PRACC_PARAM_OUT) / 4) as usize;
                *param_out
                    .get_mut(index)
                    .ok_or(Error::Protocol("store beyond the output buffer"))? = data;
                store_pending -= 1;
            } else {
                // Fetch access.
                let instr;
                if !final_check {
                    let expected = PRACC_TEXT + 4 * code_count as u32;
                    if self.pa_addr != expected {
                        log::debug!(
                            "reading at unexpected address 0x{:08x}, expected 0x{expected:08x} \
                             (code_count = {code_count})",
                            self.pa_addr
                        );

                        if code_count == 1 && self.pa_addr == PRACC_TEXT && restart_count == 0 {
                            log::debug!("restarting, without clean jump");
                            restart_count += 1;
                            code_count = 0;
                            continue;
                        } else if code_count < 2 {
                            restart = true;
                            continue;
                        }
                        return Err(Error::Protocol("fetch address mismatch"));
                    }

                    let store_addr = queue.store_addr(code_count);
                    if store_addr != 0 {
                        if store_addr > max_store_addr {
                            max_store_addr = store_addr;
                        }
                        store_pending += 1;
                    }

                    instr = queue.instr(code_count);
                    code_count += 1;
                    if code_count == queue.code_count() {
                        final_check = true;
                    }
                } else {
                    if self.pa_addr == PRACC_TEXT {
                        if pass {
                            log::debug!("unexpected second pass through pracc text");
                            return Err(Error::Protocol("second transit of the handler entry"));
                        }
                        if store_pending == 0 {
                            return Ok(());
                        }
                        pass = true;
                        code_count = 0;
                    } else if self.pa_addr != PRACC_TEXT + 4 * code_count as u32 {
                        log::debug!(
                            "unexpected read address in final check: 0x{:08x}, expected: 0x{:08x}",
                            self.pa_addr,
                            PRACC_TEXT + 4 * code_count as u32
                        );
                        return Err(Error::Protocol("fetch address mismatch in final check"));
                    }
                    if !pass {
                        // At most two instructions in flight past the end of
                        // the queue before the jump back takes effect.
                        if code_count - queue.code_count() > 1 {
                            log::debug!("failed to jump back to pracc text");
                            return Err(Error::Protocol("no jump back to the handler entry"));
                        }
                    } else if code_count > 10 {
                        log::debug!("execution abandoned, store pending: {store_pending}");
                        return Err(Error::Protocol("outstanding stores never drained"));
                    }
                    instr = insn::NOP;
                    code_count += 1;
                }

                self.tap.set_instr(EjtagInst::Data);
                self.tap.drscan_32_out(instr);
                last_instr = instr;
            }

            self.finish_access()?;

            if last_instr == insn::DRET {
                // The core left debug mode; nothing more to service.
                log::debug!("dret executed");
                return Ok(());
            }

            if store_pending == 0 && pass {
                log::debug!("warning: store access past pracc text");
                return Ok(());
            }
        }
    }
}
