//! Common platform code between pspsim's other modules.
//!
//! The [Engine] trait is the only way the debugger touches a simulated core. Everything
//! the stub needs (clocking, interrupt lines, registers, memory) goes through it.

use std::fmt;

/// 32 general purpose registers plus the program counter.
pub const NUM_REGS: usize = 33;

/// The index GDB uses for the program counter.
pub const PC_REG: u32 = 32;

/// A register index in GDB's numbering.
///
/// `x0` - `x31` are indexed with 0 - 31. The program counter is 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegIndex(u32);

impl RegIndex {
    /// The program counter.
    pub const PC: Self = Self(PC_REG);

    /// Returns the raw GDB register number.
    pub fn index(self) -> u32 {
        self.0
    }

    /// Returns `true` if this is the program counter.
    pub fn is_pc(self) -> bool {
        self.0 == PC_REG
    }

    /// Iterates over every register in GDB's `g` packet order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..NUM_REGS as u32).map(Self)
    }
}

impl fmt::Display for RegIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pc() {
            write!(f, "pc")
        } else {
            write!(f, "x{}", self.0)
        }
    }
}

bitflags::bitflags! {
    /// Output lines of a simulated core, sampled after a clock half-cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Signals: u8 {
        /// An instruction committed on the last rising edge.
        const VALID = 1 << 0;
        /// The core is idle, waiting for an interrupt.
        const SLEEPING = 1 << 1;
        /// The committed instruction asked the system to shut down.
        const SHUTDOWN = 1 << 2;
    }
}

/// A cycle-stepped execution engine.
///
/// Implementors only ever get driven from one thread: the debugger that owns them.
pub trait Engine {
    /// Pulses the reset line.
    fn reset(&mut self);

    /// Drives the clock line to `high` and evaluates the design for that half-cycle.
    fn set_clock(&mut self, high: bool);

    /// The current level of the clock line.
    fn clock(&self) -> bool;

    /// The core's output lines as of the last evaluation.
    fn signals(&self) -> Signals;

    /// Returns `true` once the simulation has ended and cannot be clocked any further.
    fn finished(&self) -> bool;

    /// Drives the external interrupt line and the keycode lines that go with it.
    ///
    /// The new levels are seen by the design on the next evaluation.
    fn set_external_interrupt(&mut self, asserted: bool, keycode: u8);

    /// Reads a register.
    fn read_register(&self, reg: RegIndex) -> u32;

    /// Reads a single byte of main memory at any alignment.
    fn read_byte(&self, addr: u32) -> u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg_index_order() {
        let regs: Vec<_> = RegIndex::all().collect();
        assert_eq!(regs.len(), NUM_REGS);
        assert_eq!(regs[0].index(), 0);
        assert!(regs[32].is_pc());
        assert_eq!(regs[5].to_string(), "x5");
        assert_eq!(regs[32].to_string(), "pc");
    }
}
