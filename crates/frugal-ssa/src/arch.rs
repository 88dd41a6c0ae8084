//! Architecture-specific registers
//!
//! Once register allocation has run, registers of the arch kind carry an
//! index into [`ARCH_REGS`]. Only x86-64 is targeted.

use std::fmt;

/// A physical x86-64 general purpose register
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ArchReg {
    /// `rax`
    Rax,
    /// `rcx`
    Rcx,
    /// `rdx`
    Rdx,
    /// `rbx`
    Rbx,
    /// `rsp`
    Rsp,
    /// `rbp`
    Rbp,
    /// `rsi`
    Rsi,
    /// `rdi`
    Rdi,
    /// `r8`
    R8,
    /// `r9`
    R9,
    /// `r10`
    R10,
    /// `r11`
    R11,
    /// `r12`
    R12,
    /// `r13`
    R13,
    /// `r14`
    R14,
    /// `r15`
    R15,
}

/// Register table indexed by the arch register kind's index field.
///
/// The order matches the hardware encoding so that `ARCH_REGS[i] as u8 == i`.
pub const ARCH_REGS: [ArchReg; 16] = [
    ArchReg::Rax,
    ArchReg::Rcx,
    ArchReg::Rdx,
    ArchReg::Rbx,
    ArchReg::Rsp,
    ArchReg::Rbp,
    ArchReg::Rsi,
    ArchReg::Rdi,
    ArchReg::R8,
    ArchReg::R9,
    ArchReg::R10,
    ArchReg::R11,
    ArchReg::R12,
    ArchReg::R13,
    ArchReg::R14,
    ArchReg::R15,
];

impl ArchReg {
    /// Look up a register by its table index
    pub fn from_index(index: usize) -> Option<ArchReg> {
        ARCH_REGS.get(index).copied()
    }

    /// Index of this register in [`ARCH_REGS`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical lowercase assembler name
    pub fn name(self) -> &'static str {
        match self {
            ArchReg::Rax => "rax",
            ArchReg::Rcx => "rcx",
            ArchReg::Rdx => "rdx",
            ArchReg::Rbx => "rbx",
            ArchReg::Rsp => "rsp",
            ArchReg::Rbp => "rbp",
            ArchReg::Rsi => "rsi",
            ArchReg::Rdi => "rdi",
            ArchReg::R8 => "r8",
            ArchReg::R9 => "r9",
            ArchReg::R10 => "r10",
            ArchReg::R11 => "r11",
            ArchReg::R12 => "r12",
            ArchReg::R13 => "r13",
            ArchReg::R14 => "r14",
            ArchReg::R15 => "r15",
        }
    }

    /// Whether the allocator may hand this register out.
    ///
    /// The stack and frame pointers are reserved.
    pub fn is_allocatable(self) -> bool {
        !matches!(self, ArchReg::Rsp | ArchReg::Rbp)
    }
}

impl fmt::Display for ArchReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_encoding() {
        for (i, reg) in ARCH_REGS.iter().enumerate() {
            assert_eq!(reg.index(), i);
            assert_eq!(ArchReg::from_index(i), Some(*reg));
        }
        assert_eq!(ArchReg::from_index(16), None);
    }

    #[test]
    fn test_reserved_registers() {
        assert!(!ArchReg::Rsp.is_allocatable());
        assert!(!ArchReg::Rbp.is_allocatable());
        assert_eq!(ARCH_REGS.iter().filter(|r| r.is_allocatable()).count(), 14);
    }

    #[test]
    fn test_display() {
        assert_eq!(ArchReg::R12.to_string(), "%r12");
    }
}
