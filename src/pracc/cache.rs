//! Cache maintenance
//!
//! Two mechanisms. After a memory write into a cacheable region the engine
//! synchronizes the affected lines so newly written instructions reach the
//! I-cache: release 2 cores get a `SYNCI` loop (the step size comes from the
//! hardware register), release 1 cores an explicit `CACHE` loop. Separately,
//! whole caches can be invalidated by index; those loops are too large for a
//! dmseg sequence and run as a resident program in a working area instead.

use mips32_insn::{self as insn, cacheop, gpr};

use super::{ksegx, AccessSize, PraccQueue, KSEG0, KSEG1, KSEG2, KSEG3, KUSEG};
use super::{PRACC_OUT_OFFSET, PRACC_PARAM_OUT, PRACC_TEXT, PRACC_UPPER_BASE_ADDR};
use crate::ejtag::{EjtagSession, Tap};
use crate::error::{Error, Result};
use crate::target::Target;

// CP0 Config0 fields.
const CONFIG0_KU_SHIFT: u32 = 25;
const CONFIG0_KU_MASK: u32 = 0x7 << CONFIG0_KU_SHIFT;
const CONFIG0_K0_SHIFT: u32 = 0;
const CONFIG0_K0_MASK: u32 = 0x7 << CONFIG0_K0_SHIFT;
const CONFIG0_K23_SHIFT: u32 = 28;
const CONFIG0_K23_MASK: u32 = 0x7 << CONFIG0_K23_SHIFT;
const CONFIG0_AR_SHIFT: u32 = 10;
const CONFIG0_AR_MASK: u32 = 0x7 << CONFIG0_AR_SHIFT;

// CP0 Config1 fields.
const CONFIG1_DL_SHIFT: u32 = 10;
const CONFIG1_DL_MASK: u32 = 0x7 << CONFIG1_DL_SHIFT;
const CONFIG1_IL_SHIFT: u32 = 19;
const CONFIG1_IS_SHIFT: u32 = 22;
const CONFIG1_IA_SHIFT: u32 = 16;
const CONFIG1_DS_SHIFT: u32 = 13;
const CONFIG1_DA_SHIFT: u32 = 7;

/// Which cache an explicit invalidation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Inst,
    /// D-cache with write-back of dirty lines.
    Data,
    /// D-cache by index store tag, discarding dirty lines.
    DataNoWb,
}

impl<T: Tap> EjtagSession<T> {
    /// Cache coherency policy after a memory write: uncached KSEG1 and the
    /// debug segments need nothing, anything cacheable gets its lines
    /// synchronized.
    pub(crate) fn sync_after_write(&mut self, addr: u32, len: u32) -> Result<()> {
        if ksegx(addr) == KSEG1 || (0xFF20_0000..=0xFF3F_FFFF).contains(&addr) {
            return Ok(());
        }

        let conf = self.cp0_read(16, 0)?;
        let cached = match ksegx(addr) {
            KUSEG => (conf & CONFIG0_KU_MASK) >> CONFIG0_KU_SHIFT,
            KSEG0 => (conf & CONFIG0_K0_MASK) >> CONFIG0_K0_SHIFT,
            KSEG2 | KSEG3 => (conf & CONFIG0_K23_MASK) >> CONFIG0_K23_SHIFT,
            _ => 0,
        };

        // Write-back (3) and write-through (0) regions both leave stale
        // I-cache contents behind.
        if cached == 3 || cached == 0 {
            let rel = (conf & CONFIG0_AR_MASK) >> CONFIG0_AR_SHIFT;
            if rel > 1 {
                log::debug!("unknown release in cache code");
                return Err(Error::Device("unknown architecture release"));
            }
            self.synchronize_cache(addr, addr.wrapping_add(len), cached, rel)?;
        }
        Ok(())
    }

    /// Make instruction writes in `[start_addr, end_addr]` effective, with a
    /// `SYNCI` loop on release 2 (`rel == 1`) or a `CACHE` loop on release 1.
    pub fn synchronize_cache(
        &mut self,
        start_addr: u32,
        end_addr: u32,
        cached: u32,
        rel: u32,
    ) -> Result<()> {
        let mut ctx = PraccQueue::new(256 * 2 + 5)?;

        // Find the cache line size in bytes.
        let clsiz;
        if rel == 1 {
            ctx.push(0, insn::lui(15, PRACC_UPPER_BASE_ADDR));
            ctx.push(0, insn::rdhwr(8, insn::SYNCI_STEP));
            ctx.push(PRACC_PARAM_OUT, insn::sw(8, PRACC_OUT_OFFSET, 15));
            ctx.push(0, insn::lui(8, insn::upper16(self.reg8)));
            ctx.push(0, insn::ori(8, 8, insn::lower16(self.reg8)));
            ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
            ctx.push(0, insn::mfc0(15, 31, 0));

            let mut out = [0u32; 1];
            self.queue_exec(&ctx, &mut out)?;
            clsiz = out[0];
        } else {
            let conf = self.cp0_read(16, 1)?;
            let dl = (conf & CONFIG1_DL_MASK) >> CONFIG1_DL_SHIFT;
            // dl encoding: 1 => 4 bytes, 2 => 8 bytes, up to 6 => 128 bytes.
            clsiz = if dl == 0 { 0 } else { 0x2 << dl };
        }

        if clsiz == 0 {
            return Ok(());
        }
        if clsiz & (clsiz - 1) != 0 {
            log::debug!("clsiz must be power of 2");
            return Err(Error::Device("cache line size is not a power of two"));
        }

        // Give both bounds the same offset inside their line so the loop
        // covers every line once.
        let mut addr = start_addr | (clsiz - 1);
        let end_addr = end_addr | (clsiz - 1);

        ctx.reset();
        let mut count = 0;
        let mut last_upper = insn::upper16(addr.wrapping_add(0x8000));

        ctx.push(0, insn::lui(15, last_upper));

        loop {
            let upper = insn::upper16(addr.wrapping_add(0x8000));
            if upper != last_upper {
                ctx.push(0, insn::lui(15, upper));
                last_upper = upper;
            }

            if rel == 1 {
                ctx.push(0, insn::synci(insn::lower16(addr), 15));
            } else {
                if cached == 3 {
                    ctx.push(
                        0,
                        insn::cache(cacheop::HIT_WRITEBACK_D, insn::lower16(addr), 15),
                    );
                }
                ctx.push(
                    0,
                    insn::cache(cacheop::HIT_INVALIDATE_I, insn::lower16(addr), 15),
                );
            }

            count += 1;
            addr = match addr.checked_add(clsiz) {
                Some(next) => next,
                None => break,
            };
            if addr > end_addr {
                break;
            }

            if count == 256 {
                // Flush the queue and keep going; `$15` survives across
                // queues so the continuation needs no new prologue.
                ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
                ctx.push(0, insn::NOP);
                self.queue_exec(&ctx, &mut [])?;
                ctx.reset();
                count = 0;
            }
        }

        ctx.push(0, insn::SYNC);
        ctx.push(0, insn::b(insn::neg16(ctx.code_count() as u32 + 1)));
        ctx.push(0, insn::mfc0(15, 31, 0)); // restore $15 from DeSave

        self.queue_exec(&ctx, &mut [])
    }

    /// Invalidate a whole cache by index, computing sets and ways from
    /// Config1 on the target itself. The loop runs as a resident program:
    /// it is written to a working area (through its uncached alias) and
    /// entered with a jump stub fed over dmseg.
    pub fn invalidate_cache(&mut self, target: &mut dyn Target, kind: CacheKind) -> Result<()> {
        use gpr::{A0, A1, A2, A3, T2, T3, T4, T5, T6, T7, V0, V1};

        let inst_code = [
            insn::mfc0(T2, 16, 1), // Config1
            insn::ext(T3, T2, CONFIG1_IL_SHIFT, 3),
            insn::beq(T3, 0, 0x11), // no I-cache, skip to the jump out
            insn::NOP,
            insn::addiu(T6, 0, 2),
            insn::sllv(T3, T6, T3), // I-cache line size in bytes
            insn::ext(T4, T2, CONFIG1_IS_SHIFT, 3),
            insn::addiu(T6, 0, 64),
            insn::sllv(T4, T6, T4), // sets per way
            insn::ext(T5, T2, CONFIG1_IA_SHIFT, 3),
            insn::addi(T5, T5, 1), // associativity
            insn::mul(T4, T4, T5), // total number of tags
            insn::lui(T6, 0x8000), // KSeg0 address for the cacheops
            insn::mtc0(0, 28, 0),  // clear ITagLo
            insn::mtc0(0, 29, 0),  // clear ITagHi
            insn::or(T7, T4, 0),
            insn::cache(cacheop::INDEX_STORE_TAG_I, 0, T6),
            insn::addi(T7, T7, insn::neg16(1)),
            insn::bne(T7, 0, insn::neg16(3)),
            insn::add(T6, T6, T3), // next line, in the delay slot
            insn::lui(T7, insn::upper16(PRACC_TEXT)),
            insn::ori(T7, T7, insn::lower16(PRACC_TEXT)),
            insn::jr(T7),
            insn::NOP,
        ];

        let mut data_code = [
            insn::mfc0(V0, 16, 1), // Config1
            insn::ext(V1, V0, CONFIG1_DL_SHIFT, 3),
            insn::beq(V1, 0, 19), // no D-cache, skip to the jump out
            insn::NOP,
            insn::addiu(A2, 0, 2),
            insn::sllv(V1, A2, V1), // D-cache line size in bytes
            insn::ext(A0, V0, CONFIG1_DS_SHIFT, 3),
            insn::addiu(A2, 0, 64),
            insn::sllv(A0, A2, A0), // sets per way
            insn::ext(A1, V0, CONFIG1_DA_SHIFT, 3),
            insn::addi(A1, A1, 1), // associativity
            insn::mul(A0, A0, A1), // total number of tags
            insn::lui(A2, 0x8000), // KSeg0 address for the cacheops
            insn::mtc0(0, 28, 0),  // clear TagLo
            insn::mtc0(0, 29, 0),  // clear TagHi
            insn::mtc0(0, 28, 2),  // clear DTagLo
            insn::mtc0(0, 29, 2),  // clear DTagHi
            insn::or(A3, A0, 0),
            insn::cache(cacheop::INDEX_STORE_TAG_D, 0, A2), // patched per kind
            insn::addi(A3, A3, insn::neg16(1)),
            insn::bne(A3, 0, insn::neg16(3)),
            insn::add(A2, A2, V1), // next line, in the delay slot
            insn::lui(T7, insn::upper16(PRACC_TEXT)),
            insn::ori(T7, T7, insn::lower16(PRACC_TEXT)),
            insn::jr(T7),
            insn::NOP,
        ];

        if self.fast_data_area.is_none() {
            let area = target.alloc_working_area(data_code.len() as u32 * 4)?;
            self.fast_data_area = Some(area);
        }
        let area = self.fast_data_area.unwrap();

        // Run the handler through the uncached alias so the loop is not
        // fetched out of the very cache it is invalidating.
        let uncached_addr = (area.address & 0x0FFF_FFFF) | 0xA000_0000;

        match kind {
            CacheKind::Inst => {
                self.write_mem_generic(uncached_addr, AccessSize::Word, inst_code.len(), |i| {
                    inst_code[i]
                })?;
            }
            CacheKind::Data => {
                data_code[18] = insn::cache(cacheop::HIT_WRITEBACK_INV_D, 0, A2);
                self.write_mem_generic(uncached_addr, AccessSize::Word, data_code.len(), |i| {
                    data_code[i]
                })?;
            }
            CacheKind::DataNoWb => {
                data_code[18] = insn::cache(cacheop::INDEX_STORE_TAG_D, 0, A2);
                self.write_mem_generic(uncached_addr, AccessSize::Word, data_code.len(), |i| {
                    data_code[i]
                })?;
            }
        }

        let mut ctx = PraccQueue::new(5)?;
        ctx.push(0, insn::mtc0(15, 31, 0)); // move $15 to COP0 DeSave
        ctx.push(0, insn::lui(15, insn::upper16(uncached_addr)));
        ctx.push(0, insn::ori(15, 15, insn::lower16(uncached_addr)));
        ctx.push(0, insn::jr(15)); // jump to the resident program
        ctx.push(0, insn::NOP);

        let result = self.exec(&ctx, &mut []);

        // The handler area no longer holds the fast data loop.
        self.fast_access_save = None;
        if let Some(area) = self.fast_data_area.take() {
            let _ = target.free_working_area(area);
        }
        result
    }
}
