//! MIPS32 EJTAG processor-access debug engine
//!
//! This library drives a halted MIPS32 core over its EJTAG debug port. While
//! the core sits in debug mode it fetches every instruction from the debug
//! memory segment (dmseg), which is serviced entirely by the probe: the
//! engine synthesizes short MIPS32 programs on the fly, feeds them to the
//! core one processor access at a time, and collects the stores the programs
//! perform into the output parameter window. On top of that handshake it
//! builds memory and register access, CP0 and DSP access, cache maintenance,
//! and a FASTDATA-based bulk transfer path.
//!
//! The JTAG transport and the target's run control are not part of this
//! crate: the engine consumes a [`Tap`] for scan-chain access and a
//! [`target::Target`] for working-area allocation, and expects the core to be
//! halted in debug mode on entry.

pub mod algorithm;
pub mod commands;
pub mod ejtag;
pub mod error;
pub mod pracc;
pub mod regs;
pub mod target;

pub use ejtag::{EjtagSession, ExecMode, Scan96, Tap};
pub use error::{Error, Result};
pub use target::{Target, WorkingArea};
