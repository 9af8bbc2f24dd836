//! FASTDATA bulk transfer
//!
//! Trades the per-word verification of the processor-access engines for
//! throughput: a small resident loop in target RAM moves words between
//! memory and the FASTDATA dmseg window, while the probe streams the payload
//! through the EJTAG FASTDATA register. Fetch order from the fastdata area
//! is start address, end address, then the data words.

use mips32_insn as insn;

use super::{FASTDATA_HANDLER_SIZE, PRACC_FASTDATA_AREA, PRACC_TEXT};
use crate::ejtag::{EjtagInst, EjtagSession, ExecMode, Tap};
use crate::error::{Error, Result};
use crate::target::WorkingArea;

/// Fill word used to satisfy dangling accesses during cleanup.
const FILL_CODE: u32 = 0xF111_C0DE;

enum XferBuf<'a> {
    Read(&'a mut [u32]),
    Write(&'a [u32]),
}

impl XferBuf<'_> {
    fn len(&self) -> usize {
        match self {
            XferBuf::Read(buf) => buf.len(),
            XferBuf::Write(buf) => buf.len(),
        }
    }
}

impl<T: Tap> EjtagSession<T> {
    /// Stream `buf` into target RAM at `addr` through the FASTDATA register.
    pub fn fastdata_write(&mut self, source: WorkingArea, addr: u32, buf: &[u32]) -> Result<()> {
        self.fastdata_xfer(source, addr, XferBuf::Write(buf))
    }

    /// Stream target RAM at `addr` into `buf` through the FASTDATA register.
    pub fn fastdata_read(&mut self, source: WorkingArea, addr: u32, buf: &mut [u32]) -> Result<()> {
        self.fastdata_xfer(source, addr, XferBuf::Read(buf))
    }

    fn fastdata_xfer(&mut self, source: WorkingArea, addr: u32, mut buf: XferBuf) -> Result<()> {
        let write = matches!(buf, XferBuf::Write(_));
        let count = buf.len();
        if count == 0 {
            return Ok(());
        }

        if source.size < FASTDATA_HANDLER_SIZE {
            log::error!(
                "working area size 0x{:x} below the fast data handler size",
                source.size
            );
            return Err(Error::ResourceUnavailable);
        }

        // The resident loop. `$15` points at the start of this code; the
        // top of the working area holds the register save slots.
        let mut handler_code = [
            insn::sw(8, FASTDATA_HANDLER_SIZE - 4, 15),
            insn::sw(9, FASTDATA_HANDLER_SIZE - 8, 15),
            insn::sw(10, FASTDATA_HANDLER_SIZE - 12, 15),
            insn::sw(11, FASTDATA_HANDLER_SIZE - 16, 15),
            insn::lui(8, insn::upper16(PRACC_FASTDATA_AREA)),
            insn::ori(8, 8, insn::lower16(PRACC_FASTDATA_AREA)),
            insn::lw(9, 0, 8),  // start address
            insn::lw(10, 0, 8), // end address
            insn::NOP,          // transfer load, patched below
            insn::NOP,          // transfer store, patched below
            insn::bne(10, 9, insn::neg16(3)),
            insn::addi(9, 9, 4), // next word, in the delay slot
            insn::lw(8, FASTDATA_HANDLER_SIZE - 4, 15),
            insn::lw(9, FASTDATA_HANDLER_SIZE - 8, 15),
            insn::lw(10, FASTDATA_HANDLER_SIZE - 12, 15),
            insn::lw(11, FASTDATA_HANDLER_SIZE - 16, 15),
            insn::lui(15, insn::upper16(PRACC_TEXT)),
            insn::ori(15, 15, insn::lower16(PRACC_TEXT)),
            insn::jr(15),
            insn::mfc0(15, 31, 0), // restore $15 from DeSave
        ];
        if write {
            handler_code[8] = insn::lw(11, 0, 8); // load from the probe
            handler_code[9] = insn::sw(11, 0, 9); // store to RAM
        } else {
            handler_code[8] = insn::lw(11, 0, 9); // load from RAM
            handler_code[9] = insn::sw(11, 0, 8); // store to the probe
        }

        // Install the handler, unless the right one is already resident.
        if self.fast_access_save != Some((write, source.address)) {
            self.write_mem_generic(
                source.address,
                super::AccessSize::Word,
                handler_code.len(),
                |i| handler_code[i],
            )?;
            self.fast_access_save = Some((write, source.address));
        }

        let jmp_code = [
            insn::mtc0(15, 31, 0), // move $15 to COP0 DeSave
            insn::lui(15, insn::upper16(source.address)),
            insn::ori(15, 15, insn::lower16(source.address)),
            insn::jr(15), // jump to the resident program
            insn::NOP,
        ];

        for code in jmp_code {
            self.pa_ctrl = self.wait_for_pracc()?;
            self.tap.set_instr(EjtagInst::Data);
            self.tap.drscan_32_out(code);
            self.finish_access()?;
        }

        // The next dmseg fetch must come from the fastdata area.
        self.pa_ctrl = self.wait_for_pracc()?;
        self.tap.set_instr(EjtagInst::Address);
        let address = self.tap.drscan_32(0)?;
        if address != PRACC_FASTDATA_AREA {
            log::error!("unexpected fetch address 0x{address:08x}, not the fastdata area");
            return Err(Error::Protocol("handler did not reach the fastdata area"));
        }

        // Hand over the bounds of the transfer.
        let mut val = addr;
        self.tap.set_instr(EjtagInst::Fastdata);
        self.tap.fastdata_scan(true, &mut val)?;

        self.pa_ctrl = self.wait_for_pracc()?;

        let mut val = addr.wrapping_add((count as u32 - 1) * 4);
        self.tap.set_instr(EjtagInst::Fastdata);
        self.tap.fastdata_scan(true, &mut val)?;

        let num_clocks = if self.mode() == ExecMode::Queued {
            ((u64::from(self.scan_delay()) * u64::from(self.tap.speed_khz()) + 500_000)
                / 1_000_000) as u32
        } else {
            0
        };

        for i in 0..count {
            self.tap.add_clocks(num_clocks);
            let mut word = match &buf {
                XferBuf::Write(data) => data[i],
                XferBuf::Read(_) => 0,
            };
            self.tap.fastdata_scan(write, &mut word)?;
            if let XferBuf::Read(data) = &mut buf {
                data[i] = word;
            }
        }

        if self.tap.execute_queue().is_err() {
            log::error!("fastdata load failed on flush");
            return Err(Error::Device("fastdata flush failed"));
        }

        self.pa_ctrl = self.wait_for_pracc()?;

        self.tap.set_instr(EjtagInst::Address);
        let address = self.tap.drscan_32(0)?;

        if address == PRACC_TEXT {
            return Ok(());
        }

        // The handler is still waiting for data: clean up the dangling
        // accesses so the debug session stays usable, then report failure.
        log::error!("fastdata failed: checking for dangling fastdata accesses");
        log::warn!("increase \"scan_delay\" and retry");
        self.fastdata_cleanup(count)
    }

    fn fastdata_cleanup(&mut self, count: usize) -> Result<()> {
        let mut pending = 0usize;
        let mut address;

        loop {
            pending += 1;
            self.tap.set_instr(EjtagInst::Fastdata);
            let mut val = FILL_CODE;
            if let Err(err) = self.tap.fastdata_scan(true, &mut val) {
                log::error!("fastdata scan failed during cleanup: {err}");
                break;
            }

            if self.wait_for_pracc().is_err() {
                log::error!("no processor access while cleaning up dangling fastdata");
                break;
            }

            self.tap.set_instr(EjtagInst::Address);
            address = self.tap.drscan_32(0)?;

            if pending == count && address == PRACC_TEXT {
                log::error!("reached max outstanding dangling accesses");
                return Err(Error::FastDownloadFailed);
            } else if pending >= count {
                log::error!("exceeded max outstanding dangling accesses");
                return Err(Error::FastDownloadFailed);
            }

            if address != PRACC_TEXT && pending == 1 {
                log::error!("found dangling fastdata accesses: starting clean-up");
            }

            if address == PRACC_TEXT {
                break;
            }
        }

        // Check that the resident loop made it back to the handler entry.
        self.tap.set_instr(EjtagInst::Address);
        address = self.tap.drscan_32(0)?;

        if address != PRACC_FASTDATA_AREA && address != PRACC_TEXT {
            log::error!("unexpected dmseg access: 0x{address:08x}");
            return Err(Error::FastDownloadFailed);
        }
        log::error!("cleared dangling fastdata accesses: found {pending} out of {count} pending");

        if address != PRACC_TEXT {
            log::error!("resident handler did not return to the debug entry");
        }

        Err(Error::FastDownloadFailed)
    }
}
