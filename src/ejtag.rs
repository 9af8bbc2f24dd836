//! EJTAG session state and JTAG transport interface
//!
//! The session owns the TAP handle for the duration of a debug session and
//! carries the state that outlives individual processor-access queues: the
//! control register image, discovered capabilities, the scratch-register
//! shadows, and the scan timing configuration.

use std::time::Duration;

use crate::error::Result;
use crate::pracc::EJTAG_DCR;
use crate::target::WorkingArea;

// ——————————————————————— TAP Instruction Register —————————————————————————— //

/// EJTAG JTAG-level instruction register codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EjtagInst {
    Idcode = 0x01,
    Impcode = 0x03,
    Address = 0x08,
    Data = 0x09,
    Control = 0x0A,
    /// Combined 96-bit control | data | address scan.
    All = 0x0B,
    EjtagBoot = 0x0C,
    NormalBoot = 0x0D,
    Fastdata = 0x0E,
}

// ———————————————————————— Control Register Bits ———————————————————————————— //

/// EJTAG control register bits.
pub mod ctrl {
    /// Debug mode.
    pub const BRKST: u32 = 1 << 3;
    /// Debug interrupt request.
    pub const EJTAGBRK: u32 = 1 << 12;
    /// Probe enable.
    pub const PROBEN: u32 = 1 << 15;
    /// Processor reset.
    pub const PRRST: u32 = 1 << 16;
    /// Processor access pending.
    pub const PRACC: u32 = 1 << 18;
    /// Processor access is a write.
    pub const PRNW: u32 = 1 << 19;
    /// Peripheral reset.
    pub const PERRST: u32 = 1 << 20;
    /// Probe services dmseg accesses.
    pub const SETDEV: u32 = 1 << 14;
    /// Reset occurred.
    pub const ROCC: u32 = 1 << 31;
}

// ————————————————————————————— EJTAG Version ——————————————————————————————— //

/// EJTAG specification revision, decoded from IMPCODE[31:29].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EjtagVersion {
    /// Version 1 and 2.0 share the encoding and the quirks.
    V20,
    V25,
    V26,
    V31,
    V41,
    V51,
    Unknown(u8),
}

impl EjtagVersion {
    pub fn from_impcode(impcode: u32) -> Self {
        match (impcode >> 29) & 0x7 {
            0 => EjtagVersion::V20,
            1 => EjtagVersion::V25,
            2 => EjtagVersion::V26,
            3 => EjtagVersion::V31,
            4 => EjtagVersion::V41,
            5 => EjtagVersion::V51,
            other => EjtagVersion::Unknown(other as u8),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EjtagVersion::V20 => "1 or 2.0",
            EjtagVersion::V25 => "2.5",
            EjtagVersion::V26 => "2.6",
            EjtagVersion::V31 => "3.1",
            EjtagVersion::V41 => "4.1",
            EjtagVersion::V51 => "5.1",
            EjtagVersion::Unknown(_) => "unknown",
        }
    }
}

/// Implementation register bits.
pub mod impcode {
    pub const MIPS64: u32 = 1 << 0;
    pub const NODMA: u32 = 1 << 14;
    pub const MIPS16: u32 = 1 << 16;

    /// EJTAG 2.0 reinterprets the low flags; the capability bits below are
    /// authoritative there because DCR is not.
    pub mod v20 {
        /// No instruction breakpoints.
        pub const NOIB: u32 = 1 << 14;
        /// No data breakpoints.
        pub const NODB: u32 = 1 << 15;
        /// No processor breaks.
        pub const NOPB: u32 = 1 << 16;
    }
}

/// Debug control register bits (drseg DCR).
pub mod dcr {
    pub const INTE: u32 = 1 << 4;
    /// Instruction break implemented.
    pub const IB: u32 = 1 << 16;
    /// Data break implemented.
    pub const DB: u32 = 1 << 17;
    /// Endianness in debug mode.
    pub const ENM: u32 = 1 << 29;
}

/// Hardware breakpoint support, as discovered from DCR or IMPCODE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugCaps {
    pub inst_break: bool,
    pub data_break: bool,
}

// —————————————————————————————— Transport ———————————————————————————————— //

/// One captured record of a queued 96-bit combined scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scan96 {
    pub ctrl: u32,
    pub data: u32,
    pub addr: u32,
}

/// JTAG transport consumed by the engine.
///
/// `drscan_32` shifts a word through the selected data register and returns
/// the captured word immediately; `drscan_32_out` may be deferred by the
/// transport until the next flush. Queued 96-bit scans accumulate until
/// [`Tap::execute_queue`] flushes them and returns the captured records in
/// submission order.
pub trait Tap {
    fn set_instr(&mut self, inst: EjtagInst);
    fn drscan_32(&mut self, data: u32) -> Result<u32>;
    fn drscan_32_out(&mut self, data: u32);
    fn drscan_8_out(&mut self, data: u8);
    fn queue_scan_96(&mut self, ctrl: u32, data: u32);
    fn add_clocks(&mut self, count: u32);
    /// 33-bit FASTDATA scan. `write` selects the probe-to-processor
    /// direction; for the other direction the captured word is stored back
    /// through `data`.
    fn fastdata_scan(&mut self, write: bool, data: &mut u32) -> Result<()>;
    fn execute_queue(&mut self) -> Result<Vec<Scan96>>;
    fn speed_khz(&self) -> u32;
}

// ——————————————————————————————— Session ——————————————————————————————————— //

/// At or above this scan delay the engine switches to the sequential
/// (legacy) engine; below it the queued engine is used.
pub const SCAN_DELAY_LEGACY_MODE: u32 = 2_000_000;

/// Selects how processor-access queues are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// One access at a time, fully verified.
    Sequential,
    /// Batched scans, verified after the flush.
    Queued,
}

/// An EJTAG debug session over one TAP.
pub struct EjtagSession<T: Tap> {
    pub(crate) tap: T,

    /// Control register image shifted in on every control scan.
    pub ejtag_ctrl: u32,
    pub impcode: u32,
    pub idcode: u32,
    pub ejtag_version: EjtagVersion,

    /// Control and address of the processor access currently being serviced.
    pub(crate) pa_ctrl: u32,
    pub(crate) pa_addr: u32,

    mode: ExecMode,
    scan_delay: u32,
    pub(crate) access_timeout: Duration,

    /// Last known values of the scratch registers the code generators
    /// clobber; restored at the end of every sequence.
    pub(crate) reg8: u32,
    pub(crate) reg9: u32,
    pub(crate) reg10: u32,

    /// Direction and handler address of the last fast data transfer, to
    /// skip re-installing the resident handler.
    pub(crate) fast_access_save: Option<(bool, u32)>,
    /// Working area holding a resident handler, kept between operations.
    pub(crate) fast_data_area: Option<WorkingArea>,
}

impl<T: Tap> EjtagSession<T> {
    pub fn new(tap: T) -> Self {
        EjtagSession {
            tap,
            ejtag_ctrl: ctrl::ROCC | ctrl::PRACC | ctrl::PROBEN | ctrl::SETDEV,
            impcode: 0,
            idcode: 0,
            ejtag_version: EjtagVersion::V20,
            pa_ctrl: 0,
            pa_addr: 0,
            mode: ExecMode::Sequential,
            scan_delay: SCAN_DELAY_LEGACY_MODE,
            access_timeout: Duration::from_secs(1),
            reg8: 0,
            reg9: 0,
            reg10: 0,
            fast_access_save: None,
            fast_data_area: None,
        }
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    pub fn scan_delay(&self) -> u32 {
        self.scan_delay
    }

    /// Set the inter-scan delay in nanoseconds and derive the engine mode.
    pub fn set_scan_delay(&mut self, ns: u32) {
        self.scan_delay = ns;
        self.mode = if ns >= SCAN_DELAY_LEGACY_MODE {
            ExecMode::Sequential
        } else {
            ExecMode::Queued
        };
    }

    /// Override the per-access poll timeout (defaults to one second).
    pub fn set_access_timeout(&mut self, timeout: Duration) {
        self.access_timeout = timeout;
    }

    /// Shift in the implementation register and decode the EJTAG version.
    pub fn scan_impcode(&mut self) -> Result<u32> {
        self.tap.set_instr(EjtagInst::Impcode);
        self.impcode = self.tap.drscan_32(0)?;
        self.ejtag_version = EjtagVersion::from_impcode(self.impcode);
        log::debug!(
            "impcode: 0x{:08x} (EJTAG version {})",
            self.impcode,
            self.ejtag_version.as_str()
        );
        Ok(self.impcode)
    }

    pub fn scan_idcode(&mut self) -> Result<u32> {
        self.tap.set_instr(EjtagInst::Idcode);
        self.idcode = self.tap.drscan_32(0)?;
        Ok(self.idcode)
    }

    /// Read the current control register without completing any access.
    pub fn read_control(&mut self) -> Result<u32> {
        self.tap.set_instr(EjtagInst::Control);
        self.tap.drscan_32(self.ejtag_ctrl)
    }

    /// Discover hardware breakpoint support.
    ///
    /// On EJTAG 2.0 cores the DCR break bits are not trustworthy, so the
    /// capability is derived from the implementation register instead.
    pub fn debug_caps(&mut self) -> Result<DebugCaps> {
        if self.ejtag_version == EjtagVersion::V20 {
            return Ok(DebugCaps {
                inst_break: self.impcode & impcode::v20::NOIB == 0,
                data_break: self.impcode & impcode::v20::NODB == 0,
            });
        }
        let dcr = self.read_u32(EJTAG_DCR)?;
        Ok(DebugCaps {
            inst_break: dcr & dcr::IB != 0,
            data_break: dcr & dcr::DB != 0,
        })
    }
}

// ————————————————————————————————— Tests ——————————————————————————————————— //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_decode() {
        assert_eq!(EjtagVersion::from_impcode(0x0000_0000), EjtagVersion::V20);
        assert_eq!(EjtagVersion::from_impcode(0x2000_0000), EjtagVersion::V25);
        assert_eq!(EjtagVersion::from_impcode(0x4000_0000), EjtagVersion::V26);
        assert_eq!(EjtagVersion::from_impcode(0x6000_0000), EjtagVersion::V31);
        assert_eq!(
            EjtagVersion::from_impcode(0xE000_0000),
            EjtagVersion::Unknown(7)
        );
    }
}
