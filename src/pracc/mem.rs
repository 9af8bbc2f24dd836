//! Memory, CP0, register bank and DSP primitives
//!
//! Every primitive is a code generator with the same shape: save `$15` to
//! DeSave, point `$15` at the dmseg base, do the work in `$8`/`$9` (and
//! `$10` for DSP), restore the scratch registers from the session's shadow
//! values, and branch back to the handler entry with the DeSave restore in
//! the delay slot.

use mips32_insn as insn;

use super::{PraccQueue, PRACC_OUT_OFFSET, PRACC_PARAM_OUT, PRACC_UPPER_BASE_ADDR};
use crate::ejtag::{EjtagSession, Tap};
use crate::error::{Error, Result};

/// Width of one memory element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSize {
    Byte = 1,
    Half = 2,
    Word = 4,
}

impl AccessSize {
    pub fn bytes(self) -> u32 {
        self as u32
    }
}

/// Status register bit that enables DSP ASE register access.
const DSP_ENABLE: u32 = 0x0100_0000;

/// Accumulator and control reads for the seven DSP registers
/// (hi1..hi3, lo1..lo3, control).
const DSP_READ_CODE: [u32; 7] = [
    0x0020_4010, // mfhi $8, ac1
    0x0040_4010, // mfhi $8, ac2
    0x0060_4010, // mfhi $8, ac3
    0x0020_4012, // mflo $8, ac1
    0x0040_4012, // mflo $8, ac2
    0x0060_4012, // mflo $8, ac3
    0x7FFF_44B8, // rddsp $8, 0x1f
];

const DSP_WRITE_CODE: [u32; 7] = [
    0x0100_0811, // mthi $8, ac1
    0x0100_1011, // mthi $8, ac2
    0x0100_1811, // mthi $8, ac3
    0x0100_0813, // mtlo $8, ac1
    0x0100_1013, // mtlo $8, ac2
    0x0100_1813, // mtlo $8, ac3
    0x7D1F_FCF8, // wrdsp $8, 0x1f
];

impl<T: Tap> EjtagSession<T> {
    /// Read one word from an arbitrary target address.
    pub fn read_u32(&mut self, addr: u32) -> Result<u32> {
        let mut ctx = PraccQueue::new(9)?;

        ctx.push(0, insn::mtc0(15, 31, 0)); // move $15 to COP0 DeSave
        ctx.push(0, insn::lui(15, PRACC_UPPER_BASE_ADDR)); // $15 = dmseg base
        ctx.push(0, insn::lui(8, insn::upper16(addr.wrapping_add(0x8000))));
        ctx.push(0, insn::lw(8, insn::lower16(addr), 8));
        ctx.push(PRACC_PARAM_OUT, insn::sw(8, PRACC_OUT_OFFSET, 15));
        ctx.push(0, insn::lui(8, insn::upper16(self.reg8))); // restore $8
        ctx.push(0, insn::ori(8, 8, insn::lower16(self.reg8)));
        ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
        ctx.push(0, insn::mfc0(15, 31, 0)); // restore $15 from DeSave

        let mut out = [0u32; 1];
        self.queue_exec(&ctx, &mut out)?;
        Ok(out[0])
    }

    /// Read `count` elements of `size` starting at `addr`, handing each
    /// zero-extended element to `sink`.
    fn read_mem(
        &mut self,
        mut addr: u32,
        size: AccessSize,
        count: usize,
        mut sink: impl FnMut(usize, u32),
    ) -> Result<()> {
        let mut ctx = PraccQueue::new(256 * 3 + 9 + 1)?;
        let mut data = vec![0u32; count.min(256)];

        let mut index = 0usize;
        let mut remaining = count;
        while remaining > 0 {
            ctx.reset();
            let this_round = remaining.min(256);
            let mut last_upper = insn::upper16(addr.wrapping_add(0x8000));

            ctx.push(0, insn::mtc0(15, 31, 0)); // save $15 in DeSave
            ctx.push(0, insn::lui(15, PRACC_UPPER_BASE_ADDR));
            ctx.push(0, insn::lui(9, last_upper)); // upper memory address

            for i in 0..this_round {
                let upper = insn::upper16(addr.wrapping_add(0x8000));
                if upper != last_upper {
                    // The loads crossed a 64 KiB boundary.
                    ctx.push(0, insn::lui(9, upper));
                    last_upper = upper;
                }
                let load = match size {
                    AccessSize::Word => insn::lw(8, insn::lower16(addr), 9),
                    AccessSize::Half => insn::lhu(8, insn::lower16(addr), 9),
                    AccessSize::Byte => insn::lbu(8, insn::lower16(addr), 9),
                };
                ctx.push(0, load);
                ctx.push(
                    PRACC_PARAM_OUT + 4 * i as u32,
                    insn::sw(8, PRACC_OUT_OFFSET + 4 * i as u32, 15),
                );
                addr = addr.wrapping_add(size.bytes());
            }

            ctx.push(0, insn::lui(8, insn::upper16(self.reg8))); // restore $8
            ctx.push(0, insn::ori(8, 8, insn::lower16(self.reg8)));
            ctx.push(0, insn::lui(9, insn::upper16(self.reg9))); // restore $9
            ctx.push(0, insn::ori(9, 9, insn::lower16(self.reg9)));

            ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
            ctx.push(0, insn::mfc0(15, 31, 0));

            self.queue_exec(&ctx, &mut data[..this_round])?;

            for (i, word) in data[..this_round].iter().enumerate() {
                sink(index + i, *word);
            }
            index += this_round;
            remaining -= this_round;
        }
        Ok(())
    }

    pub fn read_mem_u32(&mut self, addr: u32, buf: &mut [u32]) -> Result<()> {
        if buf.len() == 1 {
            buf[0] = self.read_u32(addr)?;
            return Ok(());
        }
        self.read_mem(addr, AccessSize::Word, buf.len(), |i, word| buf[i] = word)
    }

    pub fn read_mem_u16(&mut self, addr: u32, buf: &mut [u16]) -> Result<()> {
        self.read_mem(addr, AccessSize::Half, buf.len(), |i, word| {
            buf[i] = word as u16;
        })
    }

    pub fn read_mem_u8(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.read_mem(addr, AccessSize::Byte, buf.len(), |i, word| {
            buf[i] = word as u8;
        })
    }

    /// Write `count` elements without any cache maintenance afterwards.
    pub(crate) fn write_mem_generic(
        &mut self,
        mut addr: u32,
        size: AccessSize,
        count: usize,
        fetch: impl Fn(usize) -> u32,
    ) -> Result<()> {
        let mut ctx = PraccQueue::new(128 * 3 + 5 + 1)?;

        let mut index = 0usize;
        let mut remaining = count;
        while remaining > 0 {
            ctx.reset();
            let this_round = remaining.min(128);
            let mut last_upper = insn::upper16(addr.wrapping_add(0x8000));

            ctx.push(0, insn::mtc0(15, 31, 0)); // save $15 in DeSave
            ctx.push(0, insn::lui(15, last_upper)); // memory base in $15

            for _ in 0..this_round {
                let upper = insn::upper16(addr.wrapping_add(0x8000));
                if upper != last_upper {
                    ctx.push(0, insn::lui(15, upper));
                    last_upper = upper;
                }

                let value = fetch(index);
                match size {
                    AccessSize::Word => {
                        // Skip one half of the immediate load when it is zero.
                        if insn::lower16(value) == 0 {
                            ctx.push(0, insn::lui(8, insn::upper16(value)));
                        } else if insn::upper16(value) == 0 {
                            ctx.push(0, insn::ori(8, 0, insn::lower16(value)));
                        } else {
                            ctx.push(0, insn::lui(8, insn::upper16(value)));
                            ctx.push(0, insn::ori(8, 8, insn::lower16(value)));
                        }
                        ctx.push(0, insn::sw(8, insn::lower16(addr), 15));
                    }
                    AccessSize::Half => {
                        ctx.push(0, insn::ori(8, 0, value & 0xFFFF));
                        ctx.push(0, insn::sh(8, insn::lower16(addr), 15));
                    }
                    AccessSize::Byte => {
                        ctx.push(0, insn::ori(8, 0, value & 0xFF));
                        ctx.push(0, insn::sb(8, insn::lower16(addr), 15));
                    }
                }
                addr = addr.wrapping_add(size.bytes());
                index += 1;
            }

            ctx.push(0, insn::lui(8, insn::upper16(self.reg8))); // restore $8
            ctx.push(0, insn::ori(8, 8, insn::lower16(self.reg8)));

            ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
            ctx.push(0, insn::mfc0(15, 31, 0)); // restore $15 from DeSave

            self.queue_exec(&ctx, &mut [])?;
            remaining -= this_round;
        }
        Ok(())
    }

    pub fn write_mem_u32(&mut self, addr: u32, buf: &[u32]) -> Result<()> {
        self.write_mem_generic(addr, AccessSize::Word, buf.len(), |i| buf[i])?;
        self.sync_after_write(addr, buf.len() as u32 * 4)
    }

    pub fn write_mem_u16(&mut self, addr: u32, buf: &[u16]) -> Result<()> {
        self.write_mem_generic(addr, AccessSize::Half, buf.len(), |i| u32::from(buf[i]))?;
        self.sync_after_write(addr, buf.len() as u32 * 2)
    }

    pub fn write_mem_u8(&mut self, addr: u32, buf: &[u8]) -> Result<()> {
        self.write_mem_generic(addr, AccessSize::Byte, buf.len(), |i| u32::from(buf[i]))?;
        self.sync_after_write(addr, buf.len() as u32)
    }

    /// Read a CP0 register. The (reg, sel) pair is inserted straight into
    /// the MFC0 opcode; it cannot travel through the parameter area because
    /// it is an immediate part of the instruction, not a GPR operand.
    pub fn cp0_read(&mut self, cp0_reg: u32, cp0_sel: u32) -> Result<u32> {
        let mut ctx = PraccQueue::new(8)?;

        ctx.push(0, insn::mtc0(15, 31, 0)); // move $15 to COP0 DeSave
        ctx.push(0, insn::lui(15, PRACC_UPPER_BASE_ADDR));
        ctx.push(0, insn::mfc0(8, 0, 0) | (cp0_reg << 11) | cp0_sel);
        ctx.push(PRACC_PARAM_OUT, insn::sw(8, PRACC_OUT_OFFSET, 15));
        ctx.push(0, insn::mfc0(15, 31, 0)); // restore $15 from DeSave
        ctx.push(0, insn::lui(8, insn::upper16(self.reg8))); // restore $8
        ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
        ctx.push(0, insn::ori(8, 8, insn::lower16(self.reg8)));

        let mut out = [0u32; 1];
        self.queue_exec(&ctx, &mut out)?;
        Ok(out[0])
    }

    pub fn cp0_write(&mut self, cp0_reg: u32, cp0_sel: u32, value: u32) -> Result<()> {
        let mut ctx = PraccQueue::new(6)?;

        ctx.push(0, insn::mtc0(15, 31, 0)); // move $15 to COP0 DeSave
        ctx.push(0, insn::lui(15, insn::upper16(value)));
        ctx.push(0, insn::ori(15, 15, insn::lower16(value)));
        ctx.push(0, insn::mtc0(15, 0, 0) | (cp0_reg << 11) | cp0_sel);
        ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
        ctx.push(0, insn::mfc0(15, 31, 0)); // restore $15 from DeSave

        self.queue_exec(&ctx, &mut [])
    }

    /// Read the full register bank: GPRs 1..31 at slots 1..31, then Status,
    /// LO, HI, BadVAddr, Cause and DEPC at slots 32..37.
    pub fn read_regs(&mut self) -> Result<[u32; 38]> {
        let cp0_read_code = [
            insn::mfc0(8, 12, 0), // move status to $8
            insn::mflo(8),
            insn::mfhi(8),
            insn::mfc0(8, 8, 0),  // move badvaddr to $8
            insn::mfc0(8, 13, 0), // move cause to $8
            insn::mfc0(8, 24, 0), // move depc (pc) to $8
        ];

        let mut ctx = PraccQueue::new(48)?;

        ctx.push(0, insn::mtc0(1, 31, 0)); // move $1 to COP0 DeSave
        ctx.push(0, insn::lui(1, PRACC_UPPER_BASE_ADDR));

        for i in 2..32u32 {
            ctx.push(
                PRACC_PARAM_OUT + i * 4,
                insn::sw(i, PRACC_OUT_OFFSET + i * 4, 1),
            );
        }

        for (i, code) in cp0_read_code.iter().enumerate() {
            let slot = (i as u32 + 32) * 4;
            ctx.push(0, *code);
            ctx.push(PRACC_PARAM_OUT + slot, insn::sw(8, PRACC_OUT_OFFSET + slot, 1));
        }

        ctx.push(0, insn::mfc0(8, 31, 0)); // original $1 from DeSave
        ctx.push(PRACC_PARAM_OUT + 4, insn::sw(8, PRACC_OUT_OFFSET + 4, 1));

        ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
        ctx.push(0, insn::mfc0(1, 31, 0)); // restore $1 from DeSave

        let mut regs = [0u32; 38];
        self.queue_exec(&ctx, &mut regs)?;

        // $8 is saved but not restored; the next sequence re-establishes it
        // from these shadows.
        self.reg8 = regs[8];
        self.reg9 = regs[9];
        self.reg10 = regs[10];
        Ok(regs)
    }

    /// Load the full register bank, including the six CP0 slots.
    pub fn write_regs(&mut self, regs: &[u32; 38]) -> Result<()> {
        let cp0_write_code = [
            insn::mtc0(1, 12, 0), // move $1 to status
            insn::mtlo(1),
            insn::mthi(1),
            insn::mtc0(1, 8, 0),  // move $1 to badvaddr
            insn::mtc0(1, 13, 0), // move $1 to cause
            insn::mtc0(1, 24, 0), // move $1 to depc (pc)
        ];

        let mut ctx = PraccQueue::new(37 * 2 + 6 + 1)?;

        for i in 2..32usize {
            let value = regs[i];
            if insn::lower16(value) == 0 {
                ctx.push(0, insn::lui(i as u32, insn::upper16(value)));
            } else if insn::upper16(value) == 0 {
                ctx.push(0, insn::ori(i as u32, 0, insn::lower16(value)));
            } else {
                ctx.push(0, insn::lui(i as u32, insn::upper16(value)));
                ctx.push(0, insn::ori(i as u32, i as u32, insn::lower16(value)));
            }
        }

        for (i, code) in cp0_write_code.iter().enumerate() {
            ctx.push(0, insn::lui(1, insn::upper16(regs[i + 32])));
            ctx.push(0, insn::ori(1, 1, insn::lower16(regs[i + 32])));
            ctx.push(0, *code);
        }

        ctx.push(0, insn::lui(1, insn::upper16(regs[1])));
        ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
        ctx.push(0, insn::ori(1, 1, insn::lower16(regs[1]))); // $1 in the delay slot

        self.queue_exec(&ctx, &mut [])?;

        self.reg8 = regs[8];
        self.reg9 = regs[9];
        self.reg10 = regs[10];
        Ok(())
    }

    /// Read one DSP register (0..=5 select hi1..lo3, 6 the control
    /// register). Access requires the Status.MX dance around the move.
    pub fn read_dsp_reg(&mut self, reg: usize) -> Result<u32> {
        let code = *DSP_READ_CODE
            .get(reg)
            .ok_or_else(|| Error::Syntax(format!("dsp register index {reg} out of range")))?;

        let mut ctx = PraccQueue::new(48)?;

        ctx.push(0, insn::mtc0(15, 31, 0)); // move $15 to COP0 DeSave
        ctx.push(0, insn::lui(15, PRACC_UPPER_BASE_ADDR));

        ctx.push(0, insn::mfc0(9, 12, 0)); // keep status in $9
        ctx.push(0, insn::mfc0(8, 12, 0));

        // Set the MX bit to enable DSP register access.
        ctx.push(0, insn::lui(10, insn::upper16(DSP_ENABLE)));
        ctx.push(0, insn::ori(10, 10, insn::lower16(DSP_ENABLE)));
        ctx.push(0, insn::or(8, 8, 10));
        ctx.push(0, insn::mtc0(8, 12, 0));
        ctx.push(0, insn::NOP);
        ctx.push(0, insn::NOP);

        ctx.push(0, code); // accumulator or control to $8
        ctx.push(0, insn::NOP);
        ctx.push(0, insn::mtc0(9, 12, 0)); // restore status
        ctx.push(PRACC_PARAM_OUT, insn::sw(8, PRACC_OUT_OFFSET, 15));

        ctx.push(0, insn::mfc0(15, 31, 0)); // restore $15 from DeSave
        ctx.push(0, insn::lui(8, insn::upper16(self.reg8)));
        ctx.push(0, insn::ori(8, 8, insn::lower16(self.reg8)));
        ctx.push(0, insn::lui(9, insn::upper16(self.reg9)));
        ctx.push(0, insn::ori(9, 9, insn::lower16(self.reg9)));
        ctx.push(0, insn::lui(10, insn::upper16(self.reg10)));
        ctx.push(0, insn::ori(10, 10, insn::lower16(self.reg10)));
        ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
        ctx.push(0, insn::NOP);

        let mut out = [0u32; 1];
        self.queue_exec(&ctx, &mut out)?;
        Ok(out[0])
    }

    pub fn write_dsp_reg(&mut self, reg: usize, value: u32) -> Result<()> {
        let code = *DSP_WRITE_CODE
            .get(reg)
            .ok_or_else(|| Error::Syntax(format!("dsp register index {reg} out of range")))?;

        let mut ctx = PraccQueue::new(48)?;

        ctx.push(0, insn::mtc0(15, 31, 0)); // move $15 to COP0 DeSave
        ctx.push(0, insn::lui(15, PRACC_UPPER_BASE_ADDR));

        ctx.push(0, insn::mfc0(9, 12, 0)); // keep status in $9
        ctx.push(0, insn::mfc0(8, 12, 0));

        ctx.push(0, insn::lui(10, insn::upper16(DSP_ENABLE)));
        ctx.push(0, insn::ori(10, 10, insn::lower16(DSP_ENABLE)));
        ctx.push(0, insn::or(8, 8, 10));
        ctx.push(0, insn::mtc0(8, 12, 0));
        ctx.push(0, insn::NOP);
        ctx.push(0, insn::NOP);

        ctx.push(0, insn::lui(8, insn::upper16(value)));
        ctx.push(0, insn::ori(8, 8, insn::lower16(value)));
        ctx.push(0, code); // $8 to accumulator or control

        ctx.push(0, insn::NOP);
        ctx.push(0, insn::mtc0(9, 12, 0)); // restore status
        ctx.push(0, insn::NOP);

        ctx.push(0, insn::mfc0(15, 31, 0)); // restore $15 from DeSave
        ctx.push(0, insn::lui(8, insn::upper16(self.reg8)));
        ctx.push(0, insn::ori(8, 8, insn::lower16(self.reg8)));
        ctx.push(0, insn::lui(9, insn::upper16(self.reg9)));
        ctx.push(0, insn::ori(9, 9, insn::lower16(self.reg9)));
        ctx.push(0, insn::lui(10, insn::upper16(self.reg10)));
        ctx.push(0, insn::ori(10, 10, insn::lower16(self.reg10)));
        ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
        ctx.push(0, insn::NOP);

        self.queue_exec(&ctx, &mut [])
    }
}
