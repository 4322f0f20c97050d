/// Number of breakpoint slots.
pub const NUM_BREAKPOINTS: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Breakpoint {
    pub addr: u32,
    pub enabled: bool,
}

/// A fixed-capacity set of PC breakpoints.
///
/// Slots are never reallocated. The same address may occupy several enabled slots.
#[derive(Debug, Clone)]
pub struct BreakpointTable {
    slots: [Breakpoint; NUM_BREAKPOINTS],
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self {
            slots: [Breakpoint::default(); NUM_BREAKPOINTS],
        }
    }

    /// Enables the first free slot for `addr`. Returns `false` if every slot is taken.
    pub fn insert(&mut self, addr: u32) -> bool {
        match self.slots.iter_mut().find(|bp| !bp.enabled) {
            Some(slot) => {
                *slot = Breakpoint {
                    addr,
                    enabled: true,
                };
                true
            }
            None => false,
        }
    }

    /// Disables the first enabled slot at `addr`.
    ///
    /// Removing a breakpoint that does not exist is not an error, so this always returns `true`.
    pub fn remove(&mut self, addr: u32) -> bool {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|bp| bp.enabled && bp.addr == addr)
        {
            *slot = Breakpoint::default();
        }
        true
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.slots.iter().any(|bp| bp.enabled && bp.addr == addr)
    }

    /// Number of enabled slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|bp| bp.enabled).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self::new()
    }
}
