//! Debugger command surface
//!
//! The textual commands a debug console exposes on top of the engine. Each
//! handler writes its one-line results and diagnostics to the given sink and
//! reports `Ok` even when the engine fails, so a stray access never tears
//! down the console session; only malformed input is an error.

use core::fmt::Write;

use crate::ejtag::{EjtagSession, ExecMode, Tap};
use crate::error::{Error, Result};
use crate::pracc::CacheKind;
use crate::regs;
use crate::target::Target;

fn parse_u32(arg: &str) -> Result<u32> {
    let parsed = if let Some(hex) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        arg.parse()
    };
    parsed.map_err(|_| Error::Syntax(format!("not a number: {arg}")))
}

fn check_halted(target: &dyn Target, name: &str, out: &mut dyn Write) -> bool {
    if target.is_halted() {
        return true;
    }
    let _ = writeln!(out, "target must be stopped for \"{name}\" command");
    false
}

/// `cp0 [name | reg sel] [value]`: dump, read or write CP0 registers.
pub fn cp0_command<T: Tap>(
    session: &mut EjtagSession<T>,
    target: &dyn Target,
    args: &[&str],
    out: &mut dyn Write,
) -> Result<()> {
    if !check_halted(target, "cp0", out) {
        return Ok(());
    }

    match args {
        [] => {
            for reg in regs::CP0_REGS {
                match session.cp0_read(reg.reg, reg.sel) {
                    Ok(value) => {
                        let _ = writeln!(out, "{:>14}: 0x{value:08x}", reg.name);
                    }
                    Err(_) => {
                        let _ = writeln!(out, "couldn't access reg {}", reg.name);
                        return Ok(());
                    }
                }
            }
        }
        [name] => {
            let reg = regs::cp0_by_name(name)
                .ok_or_else(|| Error::Syntax(format!("register '{name}' not found")))?;
            match session.cp0_read(reg.reg, reg.sel) {
                Ok(value) => {
                    let _ = writeln!(out, "0x{value:08x}");
                }
                Err(_) => {
                    let _ = writeln!(out, "couldn't access reg {}", reg.name);
                }
            }
        }
        [first, second] => {
            if first.starts_with(|c: char| c.is_ascii_digit()) {
                let cp0_reg = parse_u32(first)?;
                let cp0_sel = parse_u32(second)?;
                match session.cp0_read(cp0_reg, cp0_sel) {
                    Ok(value) => {
                        let _ = writeln!(
                            out,
                            "cp0 reg {cp0_reg}, select {cp0_sel}: 0x{value:08x}"
                        );
                    }
                    Err(_) => {
                        let _ = writeln!(out, "couldn't access reg {cp0_reg}");
                    }
                }
            } else {
                let reg = regs::cp0_by_name(first)
                    .ok_or_else(|| Error::Syntax(format!("register '{first}' not found")))?;
                let value = parse_u32(second)?;
                if session.cp0_write(reg.reg, reg.sel, value).is_err() {
                    let _ = writeln!(out, "couldn't access reg {}", reg.name);
                }
            }
        }
        [reg, sel, value] => {
            let cp0_reg = parse_u32(reg)?;
            let cp0_sel = parse_u32(sel)?;
            let value = parse_u32(value)?;
            match session.cp0_write(cp0_reg, cp0_sel, value) {
                Ok(()) => {
                    let _ = writeln!(
                        out,
                        "cp0 reg {cp0_reg}, select {cp0_sel}: 0x{value:08x}"
                    );
                }
                Err(_) => {
                    let _ = writeln!(out, "couldn't access cp0 reg {cp0_reg}, select {cp0_sel}");
                }
            }
        }
        _ => return Err(Error::Syntax("usage: cp0 [name|reg sel] [value]".into())),
    }
    Ok(())
}

/// `dsp [name] [value]`: dump, read or write the DSP ASE registers.
pub fn dsp_command<T: Tap>(
    session: &mut EjtagSession<T>,
    target: &dyn Target,
    args: &[&str],
    out: &mut dyn Write,
) -> Result<()> {
    if !check_halted(target, "dsp", out) {
        return Ok(());
    }

    match args {
        [] => {
            for reg in regs::DSP_REGS {
                match session.read_dsp_reg(reg.index) {
                    Ok(value) => {
                        let _ = writeln!(out, "{:>7}: 0x{value:08x}", reg.name);
                    }
                    Err(_) => {
                        let _ = writeln!(out, "couldn't access reg {}", reg.name);
                        return Ok(());
                    }
                }
            }
        }
        [name] => {
            let reg = regs::dsp_by_name(name)
                .ok_or_else(|| Error::Syntax(format!("register '{name}' not found")))?;
            match session.read_dsp_reg(reg.index) {
                Ok(value) => {
                    let _ = writeln!(out, "0x{value:08x}");
                }
                Err(_) => {
                    let _ = writeln!(out, "couldn't access reg {}", reg.name);
                }
            }
        }
        [name, value] => {
            let reg = regs::dsp_by_name(name)
                .ok_or_else(|| Error::Syntax(format!("register '{name}' not found")))?;
            let value = parse_u32(value)?;
            if session.write_dsp_reg(reg.index, value).is_err() {
                let _ = writeln!(out, "couldn't access reg {}", reg.name);
            }
        }
        _ => return Err(Error::Syntax("usage: dsp [name] [value]".into())),
    }
    Ok(())
}

/// `invalidate [all|inst|data|allnowb|datanowb]`: explicit cache
/// invalidation. Without an argument everything is invalidated.
pub fn invalidate_command<T: Tap>(
    session: &mut EjtagSession<T>,
    target: &mut dyn Target,
    args: &[&str],
    out: &mut dyn Write,
) -> Result<()> {
    if !check_halted(target, "invalidate", out) {
        return Ok(());
    }

    let which = match args {
        [] => "all",
        [arg] => *arg,
        _ => return Err(Error::Syntax("usage: invalidate [all|inst|data|allnowb|datanowb]".into())),
    };

    let kinds: &[CacheKind] = match which {
        "all" => &[CacheKind::Inst, CacheKind::Data],
        "inst" => &[CacheKind::Inst],
        "data" => &[CacheKind::Data],
        "allnowb" => &[CacheKind::Inst, CacheKind::DataNoWb],
        "datanowb" => &[CacheKind::DataNoWb],
        other => return Err(Error::Syntax(format!("unknown cache '{other}'"))),
    };

    for kind in kinds {
        if let Err(err) = session.invalidate_cache(target, *kind) {
            let _ = writeln!(out, "cache invalidation failed: {err}");
            return Ok(());
        }
    }
    let _ = writeln!(out, "{which} cache invalidated");
    Ok(())
}

/// `scan_delay [ns]`: set or show the inter-scan delay, and report which
/// engine the session will use.
pub fn scan_delay_command<T: Tap>(
    session: &mut EjtagSession<T>,
    args: &[&str],
    out: &mut dyn Write,
) -> Result<()> {
    match args {
        [] => {}
        [ns] => session.set_scan_delay(parse_u32(ns)?),
        _ => return Err(Error::Syntax("usage: scan_delay [ns]".into())),
    }

    let _ = writeln!(out, "scan delay: {} nsec", session.scan_delay());
    if session.mode() == ExecMode::Sequential {
        let _ = writeln!(out, "running in legacy mode");
    } else {
        let _ = writeln!(out, "running in fast queued mode");
    }
    Ok(())
}

/// `ejtag_reg`: dump the EJTAG identification and control registers.
pub fn ejtag_reg_command<T: Tap>(
    session: &mut EjtagSession<T>,
    out: &mut dyn Write,
) -> Result<()> {
    let idcode = session.scan_idcode().unwrap_or(0);
    let impcode = session.scan_impcode().unwrap_or(0);
    let ejtag_ctrl = session.read_control().unwrap_or(0);

    let _ = writeln!(out, "       idcode: 0x{idcode:08x}");
    let _ = writeln!(out, "      impcode: 0x{impcode:08x}");
    let _ = writeln!(out, "ejtag control: 0x{ejtag_ctrl:08x}");
    let _ = writeln!(out, "EJTAG version: {}", session.ejtag_version.as_str());
    Ok(())
}

/// `cpuinfo`: identification summary from PRID and the config registers.
pub fn cpuinfo_command<T: Tap>(
    session: &mut EjtagSession<T>,
    target: &dyn Target,
    out: &mut dyn Write,
) -> Result<()> {
    if !check_halted(target, "cpuinfo", out) {
        return Ok(());
    }

    let prid = match session.cp0_read(15, 0) {
        Ok(prid) => prid,
        Err(_) => {
            let _ = writeln!(out, "couldn't access reg prid");
            return Ok(());
        }
    };
    let config = session.cp0_read(16, 0).unwrap_or(0);
    let config1 = session.cp0_read(16, 1).unwrap_or(0);

    let _ = writeln!(out, "    cpu type: {}", cpu_type_from_prid(prid, config, config1));
    let _ = writeln!(out, "        prid: 0x{prid:08x}");
    let _ = writeln!(
        out,
        "instr cache: {} byte lines",
        decode_line_size((config1 >> 19) & 0x7)
    );
    let _ = writeln!(
        out,
        " data cache: {} byte lines",
        decode_line_size((config1 >> 10) & 0x7)
    );
    let _ = writeln!(
        out,
        "architecture: MIPS32 release {}",
        ((config >> 10) & 0x7) + 1
    );
    let _ = writeln!(
        out,
        "  endianness: {}",
        if config & (1 << 15) != 0 { "big" } else { "little" }
    );
    Ok(())
}

fn decode_line_size(field: u32) -> u32 {
    if field == 0 {
        0
    } else {
        2 << field
    }
}

/// Map the MIPS Technologies processor ID to a core name.
fn cpu_type_from_prid(prid: u32, config: u32, config1: u32) -> &'static str {
    match (prid >> 16) & 0xFF {
        0x10 => return "MP32 (Altera)",
        0x02 => return "BCM (Broadcom)",
        0x03 => return "Au1xxx (AMD Alchemy)",
        _ => {}
    }

    let fpu = config1 & 1 != 0;
    match (prid >> 8) & 0xFF {
        0x80 => "MIPS 4Kc",
        0x81 => {
            if fpu {
                "MIPS 5Kf"
            } else {
                "MIPS 5Kc"
            }
        }
        0x82 => "MIPS 20Kc",
        0x83 => {
            if (config >> 20) & 1 != 0 {
                "MIPS 4Kp"
            } else {
                "MIPS 4Km"
            }
        }
        0x84 | 0x90 => "MIPS 4KEc",
        0x85 | 0x91 => {
            if (config >> 20) & 1 != 0 {
                "MIPS 4KEp"
            } else {
                "MIPS 4KEm"
            }
        }
        0x86 => "MIPS 4KSc",
        0x93 => "MIPS 24Kc",
        0x95 => {
            if fpu {
                "MIPS 24KEf"
            } else {
                "MIPS 24KEc"
            }
        }
        0x97 => {
            if fpu {
                "MIPS 74Kf"
            } else {
                "MIPS 74Kc"
            }
        }
        0x99 => {
            if fpu {
                "MIPS 1004Kf"
            } else {
                "MIPS 1004Kc"
            }
        }
        0x9A => {
            if fpu {
                "MIPS 1074Kf"
            } else {
                "MIPS 1074Kc"
            }
        }
        0x9B => "MIPS M14K",
        0x9C => {
            if fpu {
                "MIPS M14Kf"
            } else {
                "MIPS M14Kc"
            }
        }
        0x9D => {
            if fpu {
                "MIPS M14KEf"
            } else {
                "MIPS M14KE"
            }
        }
        0x9E => {
            if fpu {
                "MIPS M14KEcf"
            } else {
                "MIPS M14KEc"
            }
        }
        0xA0 => "MIPS interAptiv",
        0xA1 => "MIPS interAptiv-CM",
        0xA2 => "MIPS proAptiv",
        0xA3 => "MIPS proAptiv-CM",
        0xA6 => "MIPS M5100",
        0xA7 => "MIPS M5150",
        0xA8 => "MIPS P5600",
        0xA9 => "MIPS I5500",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_parsing() {
        assert_eq!(parse_u32("16").unwrap(), 16);
        assert_eq!(parse_u32("0x10").unwrap(), 16);
        assert_eq!(parse_u32("0XFF").unwrap(), 255);
        assert!(parse_u32("zork").is_err());
    }

    #[test]
    fn prid_decode() {
        assert_eq!(cpu_type_from_prid(0x0001_9300, 0, 0), "MIPS 24Kc");
        assert_eq!(cpu_type_from_prid(0x0001_9500, 0, 1), "MIPS 24KEf");
        assert_eq!(cpu_type_from_prid(0x0002_0000, 0, 0), "BCM (Broadcom)");
        assert_eq!(cpu_type_from_prid(0x0001_FF00, 0, 0), "unknown");
    }
}
