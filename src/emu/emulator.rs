use std::collections::VecDeque;

use crate::plat::{Engine, RegIndex, Signals};

use super::{
    decode::Instruction,
    ram::Ram,
    registers::Registers,
    EmuError,
};

/// Loads from this address return the keycode latched by the last external interrupt.
pub const KEYCODE_ADDR: u32 = 0xffff_fff0;

/// How many retired instructions are kept in [`Emulator::instr_history`].
const HISTORY_LEN: usize = 64;

/// The emulator's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmuState {
    /// The next rising edge fetches and decodes the instruction at `pc`.
    Fetch,
    /// The next rising edge executes and retires the given instruction.
    Execute(Instruction),
    /// Idle after a `wfi`. Only an external interrupt wakes the core up.
    Sleep,
    /// Halt execution. Nothing but a reset leaves this state.
    Halt,
}

/// A multi-cycle RV32I core.
///
/// Every instruction takes two rising clock edges: one to fetch and decode it, one to execute and
/// retire it. [`Signals::VALID`] is raised on the retiring edge.
pub struct Emulator {
    pub registers: Registers,
    pub pc: u32,
    pub ram: Ram,
    pub state: EmuState,
    pub instr_history: VecDeque<Instruction>,
    reset_pc: u32,
    clk: bool,
    signals: Signals,
    irq_line: bool,
    irq_keycode: u8,
    keycode: u8,
    finished: bool,
}

impl Emulator {
    /// Creates a core with `ram_size` bytes of zeroed memory that starts executing at `reset_pc`.
    ///
    /// # Errors
    ///
    /// This function will return an error if `ram_size` is not a non-zero multiple of 4.
    pub fn new(ram_size: usize, reset_pc: u32) -> Result<Self, EmuError> {
        Ok(Self {
            registers: Registers::default(),
            pc: reset_pc,
            ram: Ram::new(ram_size)?,
            state: EmuState::Fetch,
            instr_history: VecDeque::with_capacity(HISTORY_LEN),
            reset_pc,
            clk: false,
            signals: Signals::empty(),
            irq_line: false,
            irq_keycode: 0,
            keycode: 0,
            finished: false,
        })
    }

    /// Loads a binary program image at the reset address.
    pub fn load(&mut self, image: &[u8]) -> Result<(), EmuError> {
        self.ram.load(self.reset_pc, image)
    }

    fn load_mem(&self, addr: u32, width: u32) -> u32 {
        if addr == KEYCODE_ADDR {
            self.keycode as u32
        } else {
            self.ram.read(addr, width)
        }
    }

    fn posedge(&mut self) {
        self.signals.remove(Signals::VALID | Signals::SHUTDOWN);

        if self.irq_line {
            self.keycode = self.irq_keycode;
            if self.state == EmuState::Sleep {
                log::debug!("interrupt woke the core (keycode {:#04x})", self.keycode);
                self.state = EmuState::Fetch;
            }
        }

        match self.state {
            EmuState::Fetch => {
                let word = self.ram.read(self.pc, 4);
                match Instruction::try_from(word) {
                    Ok(instr) => self.state = EmuState::Execute(instr),
                    Err(e) => {
                        log::error!("{} at pc={:08X}, ending simulation", e, self.pc);
                        self.state = EmuState::Halt;
                        self.finished = true;
                    }
                }
            }
            EmuState::Execute(instr) => {
                log::trace!("[pc={:08X}] {}", self.pc, instr);
                self.execute(instr);
                self.signals.insert(Signals::VALID);
                if self.instr_history.len() == HISTORY_LEN {
                    self.instr_history.pop_front();
                }
                self.instr_history.push_back(instr);
            }
            EmuState::Sleep | EmuState::Halt => {}
        }

        self.signals
            .set(Signals::SLEEPING, self.state == EmuState::Sleep);
    }

    fn execute(&mut self, instr: Instruction) {
        let pc = self.pc;
        let mut next_pc = pc.wrapping_add(4);
        self.state = EmuState::Fetch;

        match instr {
            Instruction::Lui { rd, imm } => self.registers.write(rd, imm),
            Instruction::Auipc { rd, imm } => self.registers.write(rd, pc.wrapping_add(imm)),
            Instruction::Jal { rd, offset } => {
                self.registers.write(rd, next_pc);
                next_pc = pc.wrapping_add(offset as u32);
            }
            Instruction::Jalr { rd, rs1, offset } => {
                let target = self.registers.read(rs1).wrapping_add(offset as u32) & !1;
                self.registers.write(rd, next_pc);
                next_pc = target;
            }
            Instruction::Branch {
                cond,
                rs1,
                rs2,
                offset,
            } => {
                if cond.taken(self.registers.read(rs1), self.registers.read(rs2)) {
                    next_pc = pc.wrapping_add(offset as u32);
                }
            }
            Instruction::Load {
                access,
                rd,
                rs1,
                offset,
            } => {
                let addr = self.registers.read(rs1).wrapping_add(offset as u32);
                let value = self.load_mem(addr, access.width);
                let value = match (access.width, access.signed) {
                    (1, true) => value as u8 as i8 as i32 as u32,
                    (2, true) => value as u16 as i16 as i32 as u32,
                    _ => value,
                };
                self.registers.write(rd, value);
            }
            Instruction::Store {
                width,
                rs1,
                rs2,
                offset,
            } => {
                let addr = self.registers.read(rs1).wrapping_add(offset as u32);
                self.ram.write(addr, width, self.registers.read(rs2));
            }
            Instruction::OpImm { mode, rd, rs1, imm } => {
                let value = mode.eval(self.registers.read(rs1), imm as u32);
                self.registers.write(rd, value);
            }
            Instruction::Op { mode, rd, rs1, rs2 } => {
                let value = mode.eval(self.registers.read(rs1), self.registers.read(rs2));
                self.registers.write(rd, value);
            }
            Instruction::Fence | Instruction::Ebreak => {}
            Instruction::Ecall => {
                log::info!("shutdown requested at pc={:08X}", pc);
                self.signals.insert(Signals::SHUTDOWN);
                self.state = EmuState::Halt;
                self.finished = true;
            }
            Instruction::Wfi => self.state = EmuState::Sleep,
        }

        self.pc = next_pc;
    }
}

impl Engine for Emulator {
    fn reset(&mut self) {
        self.registers.reset();
        self.pc = self.reset_pc;
        self.state = EmuState::Fetch;
        self.instr_history.clear();
        self.clk = false;
        self.signals = Signals::empty();
        self.irq_line = false;
        self.keycode = 0;
        self.finished = false;
        log::debug!("reset complete, pc={:08X}", self.pc);
    }

    fn set_clock(&mut self, high: bool) {
        let rising = high && !self.clk;
        self.clk = high;
        if rising && !self.finished {
            self.posedge();
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
        self.irq_line = asserted;
        self.irq_keycode = keycode;
    }

    fn read_register(&self, reg: RegIndex) -> u32 {
        if reg.is_pc() {
            self.pc
        } else {
            self.registers.read(reg.index() as u8)
        }
    }

    fn read_byte(&self, addr: u32) -> u8 {
        self.ram.read_byte(addr)
    }
}
