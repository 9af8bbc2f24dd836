//! Target-side interfaces consumed by the engine
//!
//! The engine never manages the CPU's run state itself; it relies on the
//! surrounding target driver for the halted guarantee, for target RAM it can
//! borrow, and for running resident routines to completion.

use crate::error::Result;

/// A region of target RAM owned by the debugger for the duration of an
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingArea {
    pub address: u32,
    pub size: u32,
}

/// Register seed for a resident routine: (GPR number, value).
pub type RegParam = (u32, u32);

/// The surrounding target driver.
pub trait Target {
    /// Whether the CPU is halted in debug mode.
    fn is_halted(&self) -> bool;

    /// Borrow target RAM. The backing memory must stay stable until freed;
    /// it is released by the driver on resume or reset at the latest.
    fn alloc_working_area(&mut self, size: u32) -> Result<WorkingArea>;

    fn free_working_area(&mut self, area: WorkingArea) -> Result<()>;

    /// Run a resident routine from `entry` until it hits its terminating
    /// SDBBP at `exit`, with the given GPRs seeded first. Returns the final
    /// values of `out_regs`, in order.
    fn run_algorithm(
        &mut self,
        entry: u32,
        exit: u32,
        init: &[RegParam],
        out_regs: &[u32],
        timeout_ms: u32,
    ) -> Result<Vec<u32>>;
}
