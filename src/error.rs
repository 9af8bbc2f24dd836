//! Engine error type

use thiserror::Error;

/// Errors surfaced by the processor-access engine.
#[derive(Error, Debug)]
pub enum Error {
    /// The target CPU is not halted in debug mode.
    #[error("target is not halted")]
    NotHalted,

    /// The JTAG transport failed, or a processor access never became pending.
    #[error("JTAG device error: {0}")]
    Device(&'static str),

    /// An observed fetch or store contradicted the queue's expectations and
    /// the restart budget is exhausted.
    #[error("processor access protocol violation: {0}")]
    Protocol(&'static str),

    /// The working-area allocator refused a request.
    #[error("no working area available")]
    ResourceUnavailable,

    /// The fast data cleanup ran and the fetch address never converged back
    /// to the debug handler.
    #[error("fast data transfer failed")]
    FastDownloadFailed,

    /// The caller passed an unknown register name or malformed arguments.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A queue buffer allocation failed.
    #[error("out of memory")]
    OutOfMemory,
}

pub type Result<T> = core::result::Result<T, Error>;
