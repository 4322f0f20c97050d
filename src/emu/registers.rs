/// The general purpose register file (`x0` - `x31`).
///
/// `x0` is hardwired to zero: writes to it are discarded.
#[derive(Debug, Clone, Default)]
pub struct Registers {
    x: [u32; 32],
}

impl Registers {
    pub fn read(&self, reg: u8) -> u32 {
        self.x[(reg & 0x1f) as usize]
    }

    pub fn write(&mut self, reg: u8, value: u32) {
        let reg = (reg & 0x1f) as usize;
        if reg != 0 {
            self.x[reg] = value;
        }
    }

    /// Clears every register back to zero.
    pub fn reset(&mut self) {
        self.x = [0; 32];
    }
}
