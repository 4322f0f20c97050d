use super::EmuError;

/// Main memory, organised as 32-bit little-endian words.
///
/// Accesses outside of the array read as zero and writes to them are dropped.
pub struct Ram {
    words: Box<[u32]>,
}

impl Ram {
    /// Creates a new [`Ram`] instance of `size` bytes, initialized to zero.
    pub fn new(size: usize) -> Result<Self, EmuError> {
        if size == 0 || size % 4 != 0 {
            return Err(EmuError::InvalidRamSize(size));
        }
        Ok(Self {
            words: vec![0u32; size / 4].into_boxed_slice(),
        })
    }

    /// The size of memory in bytes.
    pub fn size(&self) -> usize {
        self.words.len() * 4
    }

    /// Copies `image` into memory starting at `addr`.
    pub fn load(&mut self, addr: u32, image: &[u8]) -> Result<(), EmuError> {
        let end = addr as usize + image.len();
        if end > self.size() {
            return Err(EmuError::ImageTooLarge {
                addr,
                len: image.len(),
                size: self.size(),
            });
        }
        for (offset, byte) in image.iter().enumerate() {
            self.write_byte(addr + offset as u32, *byte);
        }
        Ok(())
    }

    /// Returns a single byte at any alignment.
    pub fn read_byte(&self, addr: u32) -> u8 {
        match self.words.get((addr >> 2) as usize) {
            Some(word) => (word >> (8 * (addr & 0x03))) as u8,
            None => 0,
        }
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) {
        let shift = 8 * (addr & 0x03);
        if let Some(word) = self.words.get_mut((addr >> 2) as usize) {
            *word = (*word & !(0xff << shift)) | ((value as u32) << shift);
        } else {
            log::trace!("dropped write of {:#04x} to unmapped {:#010x}", value, addr);
        }
    }

    /// Reads `width` (1, 2 or 4) bytes starting at `addr`, little-endian.
    pub fn read(&self, addr: u32, width: u32) -> u32 {
        (0..width).fold(0, |acc, i| {
            acc | (self.read_byte(addr.wrapping_add(i)) as u32) << (8 * i)
        })
    }

    /// Writes the low `width` (1, 2 or 4) bytes of `value` starting at `addr`, little-endian.
    pub fn write(&mut self, addr: u32, width: u32, value: u32) {
        for i in 0..width {
            self.write_byte(addr.wrapping_add(i), (value >> (8 * i)) as u8);
        }
    }
}
