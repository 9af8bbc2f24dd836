//! Register name tables
//!
//! Naming for the 38-entry core register bank the engine reads and writes,
//! the (reg, sel) addressed CP0 registers, and the DSP ASE accumulators.

/// Names of the core register bank slots: GPRs, then the six CP0 values the
/// bank carries, with DEPC presented as `pc`.
pub const CORE_REG_NAMES: [&str; 38] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp", "fp",
    "ra", "status", "lo", "hi", "badvaddr", "cause", "pc",
];

/// A named CP0 register.
pub struct Cp0Reg {
    pub reg: u32,
    pub sel: u32,
    pub name: &'static str,
}

/// The CP0 registers exposed by name.
pub const CP0_REGS: &[Cp0Reg] = &[
    Cp0Reg { reg: 0, sel: 0, name: "index" },
    Cp0Reg { reg: 1, sel: 0, name: "random" },
    Cp0Reg { reg: 2, sel: 0, name: "entrylo0" },
    Cp0Reg { reg: 3, sel: 0, name: "entrylo1" },
    Cp0Reg { reg: 4, sel: 0, name: "context" },
    Cp0Reg { reg: 5, sel: 0, name: "pagemask" },
    Cp0Reg { reg: 5, sel: 1, name: "pagegrain" },
    Cp0Reg { reg: 6, sel: 0, name: "wired" },
    Cp0Reg { reg: 7, sel: 0, name: "hwrena" },
    Cp0Reg { reg: 8, sel: 0, name: "badvaddr" },
    Cp0Reg { reg: 9, sel: 0, name: "count" },
    Cp0Reg { reg: 10, sel: 0, name: "entryhi" },
    Cp0Reg { reg: 11, sel: 0, name: "compare" },
    Cp0Reg { reg: 12, sel: 0, name: "status" },
    Cp0Reg { reg: 12, sel: 1, name: "intctl" },
    Cp0Reg { reg: 12, sel: 2, name: "srsctl" },
    Cp0Reg { reg: 12, sel: 3, name: "srsmap" },
    Cp0Reg { reg: 13, sel: 0, name: "cause" },
    Cp0Reg { reg: 14, sel: 0, name: "epc" },
    Cp0Reg { reg: 15, sel: 0, name: "prid" },
    Cp0Reg { reg: 15, sel: 1, name: "ebase" },
    Cp0Reg { reg: 16, sel: 0, name: "config" },
    Cp0Reg { reg: 16, sel: 1, name: "config1" },
    Cp0Reg { reg: 16, sel: 2, name: "config2" },
    Cp0Reg { reg: 16, sel: 3, name: "config3" },
    Cp0Reg { reg: 17, sel: 0, name: "lladdr" },
    Cp0Reg { reg: 18, sel: 0, name: "watchlo" },
    Cp0Reg { reg: 19, sel: 0, name: "watchhi" },
    Cp0Reg { reg: 23, sel: 0, name: "debug" },
    Cp0Reg { reg: 24, sel: 0, name: "depc" },
    Cp0Reg { reg: 25, sel: 0, name: "perfcnt" },
    Cp0Reg { reg: 26, sel: 0, name: "errctl" },
    Cp0Reg { reg: 27, sel: 0, name: "cacheerr" },
    Cp0Reg { reg: 28, sel: 0, name: "taglo" },
    Cp0Reg { reg: 28, sel: 1, name: "datalo" },
    Cp0Reg { reg: 29, sel: 0, name: "taghi" },
    Cp0Reg { reg: 29, sel: 1, name: "datahi" },
    Cp0Reg { reg: 30, sel: 0, name: "errorepc" },
    Cp0Reg { reg: 31, sel: 0, name: "desave" },
];

/// A named DSP ASE register. The index selects the engine's accumulator
/// move or control access sequence.
pub struct DspReg {
    pub index: usize,
    pub name: &'static str,
}

pub const DSP_REGS: &[DspReg] = &[
    DspReg { index: 0, name: "hi1" },
    DspReg { index: 1, name: "hi2" },
    DspReg { index: 2, name: "hi3" },
    DspReg { index: 3, name: "lo1" },
    DspReg { index: 4, name: "lo2" },
    DspReg { index: 5, name: "lo3" },
    DspReg { index: 6, name: "control" },
];

pub fn cp0_by_name(name: &str) -> Option<&'static Cp0Reg> {
    CP0_REGS.iter().find(|r| r.name == name)
}

pub fn dsp_by_name(name: &str) -> Option<&'static DspReg> {
    DSP_REGS.iter().find(|r| r.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups() {
        let prid = cp0_by_name("prid").unwrap();
        assert_eq!((prid.reg, prid.sel), (15, 0));
        let config1 = cp0_by_name("config1").unwrap();
        assert_eq!((config1.reg, config1.sel), (16, 1));
        assert!(cp0_by_name("nonesuch").is_none());

        assert_eq!(dsp_by_name("control").unwrap().index, 6);
        assert_eq!(dsp_by_name("lo3").unwrap().index, 5);
        assert_eq!(CORE_REG_NAMES[37], "pc");
    }
}
