use crate::plat::{Engine, RegIndex, Signals, NUM_REGS};

use super::{breakpoints::BreakpointTable, interrupt::InterruptLatch, EmuError};

/// What the debugger is currently doing with the core.
///
/// [`SteppingOne`][Self::SteppingOne] and [`RunningBounded`][Self::RunningBounded] only last for
/// the duration of the call that entered them. Between calls the state is always `Idle`,
/// `RunningContinuous` or `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// Stopped, waiting for a command.
    Idle,
    /// Inside a single [`step`][Debugger::step].
    SteppingOne,
    /// Inside a [`step_bounded`][Debugger::step_bounded] run.
    RunningBounded,
    /// Free-running in bursts until a breakpoint is hit or the client interrupts.
    RunningContinuous,
    /// The engine signaled completion. Terminal.
    Finished,
}

/// Drives an [`Engine`] one retired instruction at a time, watching for breakpoints and
/// feeding it interrupts scheduled from other threads.
///
/// This is the only thing that ever mutates the engine.
pub struct Debugger<E: Engine> {
    engine: E,
    breakpoints: BreakpointTable,
    interrupts: InterruptLatch,
    state: ExecState,
}

impl<E: Engine> Debugger<E> {
    /// Takes ownership of `engine` and resets it.
    pub fn new(mut engine: E, interrupts: InterruptLatch) -> Self {
        engine.reset();
        Self {
            engine,
            breakpoints: BreakpointTable::new(),
            interrupts,
            state: ExecState::Idle,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.breakpoints
    }

    /// Returns `true` while a continuous run is outstanding.
    pub fn is_running(&self) -> bool {
        self.state == ExecState::RunningContinuous
    }

    /// Enters continuous-run mode. The caller advances it with [`step_bounded`][Self::step_bounded].
    pub fn resume(&mut self) {
        if self.state != ExecState::Finished {
            self.state = ExecState::RunningContinuous;
        }
    }

    /// Leaves continuous-run mode. Returns `true` if a run was outstanding.
    pub fn halt(&mut self) -> bool {
        let was_running = self.is_running();
        if was_running {
            self.state = ExecState::Idle;
        }
        was_running
    }

    /// Adds a PC breakpoint. Returns `false` if the breakpoint table is full.
    pub fn set_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.insert(addr)
    }

    /// Removes a PC breakpoint. Removing one that doesn't exist also succeeds.
    pub fn clear_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.remove(addr)
    }

    pub fn register(&self, reg: RegIndex) -> u32 {
        self.engine.read_register(reg)
    }

    /// Reads every register in GDB order: `x0` - `x31`, then `pc`.
    pub fn registers(&self) -> [u32; NUM_REGS] {
        let mut regs = [0u32; NUM_REGS];
        for (slot, reg) in regs.iter_mut().zip(RegIndex::all()) {
            *slot = self.engine.read_register(reg);
        }
        regs
    }

    /// Fills `buf` with memory starting at `addr`. `addr` needs no particular alignment.
    pub fn read_memory(&self, addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.engine.read_byte(addr.wrapping_add(i as u32));
        }
    }

    /// Advances the core by exactly one retired instruction or one sleeping cycle.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::Finished`] if the engine signaled completion. Once that happens every
    /// later call fails the same way.
    pub fn step(&mut self) -> Result<(), EmuError> {
        self.ensure_alive()?;
        let outer = self.state;
        if outer != ExecState::RunningContinuous {
            self.state = ExecState::SteppingOne;
        }
        self.advance()?;
        self.state = if outer == ExecState::RunningContinuous {
            outer
        } else {
            ExecState::Idle
        };
        Ok(())
    }

    /// Steps up to `n` times, checking the PC against the breakpoint table after every step.
    ///
    /// Returns `true` the moment a breakpoint matches and `false` once `n` steps went by without
    /// one. A breakpoint match ends a continuous run; running out of steps does not.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::Finished`] if the engine signaled completion during the run.
    pub fn step_bounded(&mut self, n: usize) -> Result<bool, EmuError> {
        self.run(Some(n))
    }

    /// Steps until a breakpoint matches. Used when no debugger is attached.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::Finished`] when the program completes.
    pub fn run_to_breakpoint(&mut self) -> Result<(), EmuError> {
        self.run(None).map(|_| ())
    }

    fn run(&mut self, limit: Option<usize>) -> Result<bool, EmuError> {
        self.ensure_alive()?;
        let outer = self.state;
        if outer != ExecState::RunningContinuous {
            self.state = ExecState::RunningBounded;
        }

        let mut steps = 0usize;
        while limit.map_or(true, |n| steps < n) {
            self.advance()?;
            steps += 1;

            let pc = self.engine.read_register(RegIndex::PC);
            if self.breakpoints.contains(pc) {
                log::debug!("breakpoint hit at pc={:08X} after {} steps", pc, steps);
                self.state = ExecState::Idle;
                return Ok(true);
            }
        }

        self.state = if outer == ExecState::RunningContinuous {
            outer
        } else {
            ExecState::Idle
        };
        Ok(false)
    }

    fn ensure_alive(&self) -> Result<(), EmuError> {
        if self.state == ExecState::Finished {
            Err(EmuError::Finished)
        } else {
            Ok(())
        }
    }

    fn finish(&mut self) -> EmuError {
        self.state = ExecState::Finished;
        EmuError::Finished
    }

    /// Toggles the clock until the core retires an instruction or reports that it is sleeping.
    ///
    /// A pending interrupt is driven onto the engine's lines for the first falling and rising
    /// evaluation, then dropped on the next half-cycle.
    fn advance(&mut self) -> Result<(), EmuError> {
        let mut irq = self.interrupts.take();
        if let Some(keycode) = irq {
            log::debug!("delivering interrupt (keycode {:#04x})", keycode);
            self.engine.set_external_interrupt(true, keycode);
        }

        self.engine.set_clock(false);

        loop {
            if self.engine.finished() {
                return Err(self.finish());
            }

            let clk = !self.engine.clock();
            self.engine.set_clock(clk);

            if let Some(keycode) = irq.take() {
                self.engine.set_external_interrupt(false, keycode);
            }

            let signals = self.engine.signals();
            if clk && signals.contains(Signals::VALID | Signals::SHUTDOWN) {
                log::info!("program requested shutdown");
                return Err(self.finish());
            }
            if clk && signals.intersects(Signals::VALID | Signals::SLEEPING) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::interrupt::InterruptGate;

    /// Retires one instruction per rising edge, advancing the PC by 4.
    #[derive(Default)]
    struct MockEngine {
        pc: u32,
        clk: bool,
        signals: Signals,
        irq: bool,
        keycode: u8,
        sleeping: bool,
        retired: u32,
        shutdown_after: Option<u32>,
        finished: bool,
        resets: usize,
        /// `(clock, interrupt line)` as seen by every evaluation.
        evals: Vec<(bool, bool)>,
    }

    impl Engine for MockEngine {
        fn reset(&mut self) {
            self.pc = 0;
            self.resets += 1;
        }

        fn set_clock(&mut self, high: bool) {
            let rising = high && !self.clk;
            self.clk = high;
            self.evals.push((high, self.irq));
            if !rising {
                return;
            }
            self.signals = Signals::empty();
            if self.sleeping {
                self.signals.insert(Signals::SLEEPING);
                self.sleeping = !self.irq;
                return;
            }
            self.pc += 4;
            self.retired += 1;
            self.signals.insert(Signals::VALID);
            if self.shutdown_after == Some(self.retired) {
                self.signals.insert(Signals::SHUTDOWN);
                self.finished = true;
            }
        }

        fn clock(&self) -> bool {
            self.clk
        }

        fn signals(&self) -> Signals {
            self.signals
        }

        fn finished(&self) -> bool {
            self.finished
        }

        fn set_external_interrupt(&mut self, asserted: bool, keycode: u8) {
            self.irq = asserted;
            self.keycode = keycode;
        }

        fn read_register(&self, reg: RegIndex) -> u32 {
            if reg.is_pc() {
                self.pc
            } else {
                reg.index() * 0x11
            }
        }

        fn read_byte(&self, addr: u32) -> u8 {
            addr as u8
        }
    }

    fn debugger(engine: MockEngine) -> (Debugger<MockEngine>, InterruptGate) {
        let (gate, latch) = InterruptGate::new();
        (Debugger::new(engine, latch), gate)
    }

    #[test]
    fn test_new_resets_engine() {
        let (dbg, _) = debugger(MockEngine {
            pc: 0x80,
            ..Default::default()
        });
        assert_eq!(dbg.engine().resets, 1);
        assert_eq!(dbg.register(RegIndex::PC), 0);
        assert_eq!(dbg.state(), ExecState::Idle);
    }

    #[test]
    fn test_step_retires_one() {
        let (mut dbg, _) = debugger(MockEngine::default());
        dbg.step().unwrap();
        dbg.step().unwrap();
        assert_eq!(dbg.register(RegIndex::PC), 8);
        assert_eq!(dbg.engine().retired, 2);
        assert_eq!(dbg.state(), ExecState::Idle);
    }

    #[test]
    fn test_sleeping_cycle_counts_as_step() {
        let (mut dbg, _) = debugger(MockEngine {
            sleeping: true,
            ..Default::default()
        });
        dbg.step().unwrap();
        assert_eq!(dbg.register(RegIndex::PC), 0);
        assert!(dbg.engine().sleeping);
    }

    #[test]
    fn test_interrupt_held_for_one_toggle() {
        let (mut dbg, gate) = debugger(MockEngine::default());
        gate.schedule(b'a');
        gate.schedule(b'b');
        dbg.step().unwrap();
        dbg.step().unwrap();

        let evals = &dbg.engine().evals;
        assert_eq!(evals[..2], [(false, true), (true, true)]);
        assert!(evals[2..].iter().all(|&(_, irq)| !irq));
        assert_eq!(dbg.engine().keycode, b'b');
        assert!(!dbg.engine().irq);
    }

    #[test]
    fn test_interrupt_wakes_sleeping_core() {
        let (mut dbg, gate) = debugger(MockEngine {
            sleeping: true,
            ..Default::default()
        });
        dbg.step().unwrap();
        gate.schedule(1);
        dbg.step().unwrap();
        dbg.step().unwrap();
        assert_eq!(dbg.register(RegIndex::PC), 4);
    }

    #[test]
    fn test_step_bounded() {
        let (mut dbg, _) = debugger(MockEngine::default());
        assert!(dbg.set_breakpoint(12));
        assert!(!dbg.step_bounded(2).unwrap());
        assert_eq!(dbg.register(RegIndex::PC), 8);
        assert_eq!(dbg.state(), ExecState::Idle);
        assert!(dbg.step_bounded(5).unwrap());
        assert_eq!(dbg.register(RegIndex::PC), 12);
        assert!(!dbg.step_bounded(0).unwrap());
        assert_eq!(dbg.register(RegIndex::PC), 12);
    }

    #[test]
    fn test_continuous_run_state() {
        let (mut dbg, _) = debugger(MockEngine::default());
        dbg.set_breakpoint(40);
        dbg.resume();
        assert!(dbg.is_running());
        assert!(!dbg.step_bounded(4).unwrap());
        assert!(dbg.is_running());
        assert!(dbg.step_bounded(100).unwrap());
        assert!(!dbg.is_running());
        assert_eq!(dbg.register(RegIndex::PC), 40);

        dbg.resume();
        assert!(dbg.halt());
        assert!(!dbg.halt());
    }

    #[test]
    fn test_completion_is_terminal() {
        let (mut dbg, _) = debugger(MockEngine {
            shutdown_after: Some(3),
            ..Default::default()
        });
        assert!(matches!(dbg.step_bounded(10), Err(EmuError::Finished)));
        assert_eq!(dbg.state(), ExecState::Finished);
        assert!(matches!(dbg.step(), Err(EmuError::Finished)));
        dbg.resume();
        assert!(!dbg.is_running());
    }

    #[test]
    fn test_run_to_breakpoint() {
        let (mut dbg, _) = debugger(MockEngine::default());
        dbg.set_breakpoint(0x100);
        dbg.run_to_breakpoint().unwrap();
        assert_eq!(dbg.register(RegIndex::PC), 0x100);
    }

    #[test]
    fn test_snapshot_and_memory() {
        let (dbg, _) = debugger(MockEngine::default());
        let regs = dbg.registers();
        assert_eq!(regs[3], 0x33);
        assert_eq!(regs[32], 0);

        let mut buf = [0u8; 4];
        dbg.read_memory(0x1001, &mut buf);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
    }
}
