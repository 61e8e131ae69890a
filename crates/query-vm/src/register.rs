use std::fmt;
use std::ops::{Index, IndexMut};

/// `Sop` value while the machine is running.
pub const SOP_NONE: i64 = 0;
/// `Sop` value that stops the fetch/execute loop.
pub const SOP_EXIT: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Instruction pointer.
    Ip,
    /// Special operation register; [`SOP_EXIT`] halts the machine.
    Sop,
    R0,
    R1,
    R2,
    R3,
}

impl Register {
    pub const COUNT: usize = 6;

    #[inline]
    fn slot(self) -> usize {
        match self {
            Register::Ip => 0,
            Register::Sop => 1,
            Register::R0 => 2,
            Register::R1 => 3,
            Register::R2 => 4,
            Register::R3 => 5,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::Ip => "ip",
            Register::Sop => "sop",
            Register::R0 => "r0",
            Register::R1 => "r1",
            Register::R2 => "r2",
            Register::R3 => "r3",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers([i64; Register::COUNT]);

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn ip(&self) -> i64 {
        self[Register::Ip]
    }

    #[inline]
    pub fn advance(&mut self) {
        self[Register::Ip] += 1;
    }

    #[inline]
    pub fn jump(&mut self, target: usize) {
        self[Register::Ip] = target as i64;
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self[Register::Sop] == SOP_EXIT
    }

    #[inline]
    pub fn halt(&mut self) {
        self[Register::Sop] = SOP_EXIT;
    }
}

impl Index<Register> for Registers {
    type Output = i64;

    #[inline]
    fn index(&self, register: Register) -> &i64 {
        &self.0[register.slot()]
    }
}

impl IndexMut<Register> for Registers {
    #[inline]
    fn index_mut(&mut self, register: Register) -> &mut i64 {
        &mut self.0[register.slot()]
    }
}
