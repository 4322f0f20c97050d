//! The emulator/debugger module for pspsim.

use thiserror::Error;

pub mod alu;
pub mod breakpoints;
pub mod debugger;
pub mod decode;
pub mod emulator;
pub mod interrupt;
pub mod ram;
pub mod registers;

#[cfg(test)]
pub(crate) mod test_utils;

#[derive(Debug, Error)]
pub enum EmuError {
    #[error("program image of {len} bytes does not fit at {addr:#010x} in {size} bytes of RAM")]
    ImageTooLarge { addr: u32, len: usize, size: usize },
    #[error("RAM size must be a non-zero multiple of 4, got {0}")]
    InvalidRamSize(usize),
    /// The engine signaled program completion. There is nothing left to run or debug.
    #[error("program finished")]
    Finished,
}
