// The ALU's current mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AluMode {
    Add = 0,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
}

impl AluMode {
    /// Computes `left <op> right`. Shift amounts use the low five bits of `right`.
    pub fn eval(self, left: u32, right: u32) -> u32 {
        let shamt = right & 0x1f;
        match self {
            Self::Add => left.wrapping_add(right),
            Self::Sub => left.wrapping_sub(right),
            Self::Sll => left << shamt,
            Self::Slt => ((left as i32) < (right as i32)) as u32,
            Self::Sltu => (left < right) as u32,
            Self::Xor => left ^ right,
            Self::Srl => left >> shamt,
            Self::Sra => ((left as i32) >> shamt) as u32,
            Self::Or => left | right,
            Self::And => left & right,
        }
    }
}

/// Branch comparison kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchCond {
    Eq,
    Ne,
    Lt,
    Ge,
    Ltu,
    Geu,
}

impl BranchCond {
    pub fn taken(self, left: u32, right: u32) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => (left as i32) < (right as i32),
            Self::Ge => (left as i32) >= (right as i32),
            Self::Ltu => left < right,
            Self::Geu => left >= right,
        }
    }
}
