//! RV32I instruction decoding.

use std::fmt;

use thiserror::Error;

use super::alu::{AluMode, BranchCond};

const OP_LOAD: u32 = 0b000_0011;
const OP_MISC_MEM: u32 = 0b000_1111;
const OP_IMM: u32 = 0b001_0011;
const OP_AUIPC: u32 = 0b001_0111;
const OP_STORE: u32 = 0b010_0011;
const OP_REG: u32 = 0b011_0011;
const OP_LUI: u32 = 0b011_0111;
const OP_BRANCH: u32 = 0b110_0011;
const OP_JALR: u32 = 0b110_0111;
const OP_JAL: u32 = 0b110_1111;
const OP_SYSTEM: u32 = 0b111_0011;

const ECALL: u32 = 0x0000_0073;
const EBREAK: u32 = 0x0010_0073;
const WFI: u32 = 0x1050_0073;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal instruction {0:#010x}")]
pub struct IllegalInstruction(pub u32);

/// Width and signedness of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Access {
    pub width: u32,
    pub signed: bool,
}

/// A decoded RV32I instruction. Immediates are already sign-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Lui { rd: u8, imm: u32 },
    Auipc { rd: u8, imm: u32 },
    Jal { rd: u8, offset: i32 },
    Jalr { rd: u8, rs1: u8, offset: i32 },
    Branch { cond: BranchCond, rs1: u8, rs2: u8, offset: i32 },
    Load { access: Access, rd: u8, rs1: u8, offset: i32 },
    Store { width: u32, rs1: u8, rs2: u8, offset: i32 },
    OpImm { mode: AluMode, rd: u8, rs1: u8, imm: i32 },
    Op { mode: AluMode, rd: u8, rs1: u8, rs2: u8 },
    Fence,
    Ecall,
    Ebreak,
    Wfi,
}

fn rd(word: u32) -> u8 {
    ((word >> 7) & 0x1f) as u8
}

fn rs1(word: u32) -> u8 {
    ((word >> 15) & 0x1f) as u8
}

fn rs2(word: u32) -> u8 {
    ((word >> 20) & 0x1f) as u8
}

fn funct3(word: u32) -> u32 {
    (word >> 12) & 0x7
}

fn funct7(word: u32) -> u32 {
    word >> 25
}

fn imm_i(word: u32) -> i32 {
    (word as i32) >> 20
}

fn imm_s(word: u32) -> i32 {
    (((word as i32) >> 25) << 5) | ((word >> 7) & 0x1f) as i32
}

fn imm_b(word: u32) -> i32 {
    let imm = ((word >> 31) & 1) << 12
        | ((word >> 7) & 1) << 11
        | ((word >> 25) & 0x3f) << 5
        | ((word >> 8) & 0xf) << 1;
    ((imm << 19) as i32) >> 19
}

fn imm_j(word: u32) -> i32 {
    let imm = ((word >> 31) & 1) << 20
        | ((word >> 12) & 0xff) << 12
        | ((word >> 20) & 1) << 11
        | ((word >> 21) & 0x3ff) << 1;
    ((imm << 11) as i32) >> 11
}

impl TryFrom<u32> for Instruction {
    type Error = IllegalInstruction;

    fn try_from(word: u32) -> Result<Self, IllegalInstruction> {
        let illegal = IllegalInstruction(word);
        let instr = match word & 0x7f {
            OP_LUI => Self::Lui {
                rd: rd(word),
                imm: word & 0xffff_f000,
            },
            OP_AUIPC => Self::Auipc {
                rd: rd(word),
                imm: word & 0xffff_f000,
            },
            OP_JAL => Self::Jal {
                rd: rd(word),
                offset: imm_j(word),
            },
            OP_JALR if funct3(word) == 0 => Self::Jalr {
                rd: rd(word),
                rs1: rs1(word),
                offset: imm_i(word),
            },
            OP_BRANCH => {
                let cond = match funct3(word) {
                    0b000 => BranchCond::Eq,
                    0b001 => BranchCond::Ne,
                    0b100 => BranchCond::Lt,
                    0b101 => BranchCond::Ge,
                    0b110 => BranchCond::Ltu,
                    0b111 => BranchCond::Geu,
                    _ => return Err(illegal),
                };
                Self::Branch {
                    cond,
                    rs1: rs1(word),
                    rs2: rs2(word),
                    offset: imm_b(word),
                }
            }
            OP_LOAD => {
                let access = match funct3(word) {
                    0b000 => Access { width: 1, signed: true },
                    0b001 => Access { width: 2, signed: true },
                    0b010 => Access { width: 4, signed: false },
                    0b100 => Access { width: 1, signed: false },
                    0b101 => Access { width: 2, signed: false },
                    _ => return Err(illegal),
                };
                Self::Load {
                    access,
                    rd: rd(word),
                    rs1: rs1(word),
                    offset: imm_i(word),
                }
            }
            OP_STORE => {
                let width = match funct3(word) {
                    0b000 => 1,
                    0b001 => 2,
                    0b010 => 4,
                    _ => return Err(illegal),
                };
                Self::Store {
                    width,
                    rs1: rs1(word),
                    rs2: rs2(word),
                    offset: imm_s(word),
                }
            }
            OP_IMM => {
                let mode = match (funct3(word), funct7(word)) {
                    (0b000, _) => AluMode::Add,
                    (0b010, _) => AluMode::Slt,
                    (0b011, _) => AluMode::Sltu,
                    (0b100, _) => AluMode::Xor,
                    (0b110, _) => AluMode::Or,
                    (0b111, _) => AluMode::And,
                    (0b001, 0) => AluMode::Sll,
                    (0b101, 0) => AluMode::Srl,
                    (0b101, 0b010_0000) => AluMode::Sra,
                    _ => return Err(illegal),
                };
                Self::OpImm {
                    mode,
                    rd: rd(word),
                    rs1: rs1(word),
                    imm: imm_i(word),
                }
            }
            OP_REG => {
                let mode = match (funct3(word), funct7(word)) {
                    (0b000, 0) => AluMode::Add,
                    (0b000, 0b010_0000) => AluMode::Sub,
                    (0b001, 0) => AluMode::Sll,
                    (0b010, 0) => AluMode::Slt,
                    (0b011, 0) => AluMode::Sltu,
                    (0b100, 0) => AluMode::Xor,
                    (0b101, 0) => AluMode::Srl,
                    (0b101, 0b010_0000) => AluMode::Sra,
                    (0b110, 0) => AluMode::Or,
                    (0b111, 0) => AluMode::And,
                    _ => return Err(illegal),
                };
                Self::Op {
                    mode,
                    rd: rd(word),
                    rs1: rs1(word),
                    rs2: rs2(word),
                }
            }
            OP_MISC_MEM => Self::Fence,
            OP_SYSTEM => match word {
                ECALL => Self::Ecall,
                EBREAK => Self::Ebreak,
                WFI => Self::Wfi,
                _ => return Err(illegal),
            },
            _ => return Err(illegal),
        };
        Ok(instr)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Lui { rd, imm } => write!(f, "lui x{rd}, {:#x}", imm >> 12),
            Self::Auipc { rd, imm } => write!(f, "auipc x{rd}, {:#x}", imm >> 12),
            Self::Jal { rd, offset } => write!(f, "jal x{rd}, {offset}"),
            Self::Jalr { rd, rs1, offset } => write!(f, "jalr x{rd}, {offset}(x{rs1})"),
            Self::Branch {
                cond,
                rs1,
                rs2,
                offset,
            } => write!(f, "b{:?} x{rs1}, x{rs2}, {offset}", cond),
            Self::Load {
                access,
                rd,
                rs1,
                offset,
            } => write!(f, "load{} x{rd}, {offset}(x{rs1})", access.width * 8),
            Self::Store {
                width,
                rs1,
                rs2,
                offset,
            } => write!(f, "store{} x{rs2}, {offset}(x{rs1})", width * 8),
            Self::OpImm { mode, rd, rs1, imm } => write!(f, "{:?}i x{rd}, x{rs1}, {imm}", mode),
            Self::Op { mode, rd, rs1, rs2 } => write!(f, "{:?} x{rd}, x{rs1}, x{rs2}", mode),
            Self::Fence => write!(f, "fence"),
            Self::Ecall => write!(f, "ecall"),
            Self::Ebreak => write!(f, "ebreak"),
            Self::Wfi => write!(f, "wfi"),
        }
    }
}
