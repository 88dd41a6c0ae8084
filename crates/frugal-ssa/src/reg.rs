//! Register encoding
//!
//! A [`Reg`] packs three fields into one `u64`:
//!
//! ```text
//!  63   62..59   58..0
//! +---+--------+---------------------+
//! | P |  kind  |        index        |
//! +---+--------+---------------------+
//! ```
//!
//! - `P` marks a GC-visible pointer value.
//! - `kind` 0..=7 are generic classes (front-end register numbers), 12 is an
//!   arch-specific physical register, 13 the zero constant, 14 a compiler
//!   temporary and 15 an SSA-normalized slot. Kinds 8..=11 are invalid.
//! - `index` is a dense slot number within the kind.
//!
//! Indices wider than the 59-bit field are truncated by [`Reg::make`],
//! [`Reg::rename`] and [`Reg::normalize`] alike; callers that may overflow
//! should check [`Reg::fits_index`] first.

use std::fmt;

use crate::arch::ArchReg;
use crate::error::{IrError, IrResult};

const B_PTR: u32 = 63;
const B_KIND: u32 = 59;

const M_PTR: u64 = 1;
const M_KIND: u64 = 0x0f;

const R_PTR: u64 = M_PTR << B_PTR;
const R_KIND: u64 = M_KIND << B_KIND;
const R_INDEX: u64 = (1 << B_KIND) - 1;

const K_MAX: u8 = 7;
const K_ARCH: u8 = 12;
const K_ZERO: u8 = 13;
const K_TEMP: u8 = 14;
const K_NORM: u8 = 15;

const fn pack(ptr: bool, kind: u8, index: u64) -> u64 {
    ((ptr as u64) << B_PTR) | (((kind as u64) & M_KIND) << B_KIND) | (index & R_INDEX)
}

/// Decoded register kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegKind {
    /// Generic numbered class, 0..=7
    Generic(u8),
    /// Physical register, index into [`crate::arch::ARCH_REGS`]
    Arch,
    /// Zero / nil constant
    Zero,
    /// Compiler-introduced temporary
    Temp,
    /// SSA-normalized slot
    Norm,
}

impl RegKind {
    /// Raw 4-bit kind value
    pub fn bits(self) -> u8 {
        match self {
            RegKind::Generic(n) => n,
            RegKind::Arch => K_ARCH,
            RegKind::Zero => K_ZERO,
            RegKind::Temp => K_TEMP,
            RegKind::Norm => K_NORM,
        }
    }

    /// Decode a raw kind value, rejecting the unassigned range
    pub fn from_bits(kind: u8) -> IrResult<RegKind> {
        match kind {
            0..=K_MAX => Ok(RegKind::Generic(kind)),
            K_ARCH => Ok(RegKind::Arch),
            K_ZERO => Ok(RegKind::Zero),
            K_TEMP => Ok(RegKind::Temp),
            K_NORM => Ok(RegKind::Norm),
            _ => Err(IrError::InvalidRegisterKind(kind)),
        }
    }
}

/// A register in the SSA IR
///
/// Equality, hashing and ordering are all on the raw bit pattern.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(u64);

impl Reg {
    /// Largest index representable in the index field
    pub const MAX_INDEX: usize = R_INDEX as usize;

    /// Non-pointer zero constant
    pub const RZ: Reg = Reg(pack(false, K_ZERO, 0));
    /// Pointer nil constant
    pub const PN: Reg = Reg(pack(true, K_ZERO, 0));

    /// First non-pointer temporary
    pub const TR: Reg = Reg(pack(false, K_TEMP, 0));
    /// First pointer temporary
    pub const PR: Reg = Reg(pack(true, K_TEMP, 0));

    /// Build a register from its raw fields.
    ///
    /// Rejects kinds 8..=11 and anything above 15, zero registers with a
    /// non-zero index and arch registers outside the register table. The
    /// index is truncated to the index field.
    pub fn make(ptr: bool, kind: u8, index: usize) -> IrResult<Reg> {
        let index = index as u64 & R_INDEX;
        match RegKind::from_bits(kind)? {
            RegKind::Zero if index != 0 => Err(IrError::InvalidZeroIndex(index as usize)),
            RegKind::Arch if ArchReg::from_index(index as usize).is_none() => {
                Err(IrError::InvalidArchRegister(index as usize))
            }
            _ => Ok(Reg(pack(ptr, kind, index))),
        }
    }

    /// Build a register from a decoded kind
    pub fn new(ptr: bool, kind: RegKind, index: usize) -> IrResult<Reg> {
        Reg::make(ptr, kind.bits(), index)
    }

    /// SSA-normalized register
    pub const fn norm(ptr: bool, index: usize) -> Reg {
        Reg(pack(ptr, K_NORM, index as u64))
    }

    /// Compiler temporary
    pub const fn temp(ptr: bool, index: usize) -> Reg {
        Reg(pack(ptr, K_TEMP, index as u64))
    }

    /// Physical register. Pointer-ness is tracked on the register, not the
    /// hardware slot, so both flavours are representable.
    pub const fn arch(ptr: bool, reg: ArchReg) -> Reg {
        Reg(pack(ptr, K_ARCH, reg as u64))
    }

    /// Whether `index` fits the index field without truncation
    pub const fn fits_index(index: usize) -> bool {
        index as u64 <= R_INDEX
    }

    /// Raw bit pattern
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Whether the register holds a GC pointer
    pub fn is_ptr(self) -> bool {
        self.0 & R_PTR != 0
    }

    /// Slot number within the kind
    pub fn index(self) -> usize {
        (self.0 & R_INDEX) as usize
    }

    /// Raw 4-bit kind field
    pub fn kind_bits(self) -> u8 {
        ((self.0 & R_KIND) >> B_KIND) as u8
    }

    /// Decoded kind. Every `Reg` is built through a validating constructor,
    /// so the unassigned kinds never appear here.
    pub fn kind(self) -> RegKind {
        match self.kind_bits() {
            K_ARCH => RegKind::Arch,
            K_ZERO => RegKind::Zero,
            K_TEMP => RegKind::Temp,
            K_NORM => RegKind::Norm,
            n => RegKind::Generic(n),
        }
    }

    /// Whether this is `RZ` or `PN`
    pub fn is_zero(self) -> bool {
        self.kind_bits() == K_ZERO
    }

    /// Whether this is an SSA-normalized register
    pub fn is_normalized(self) -> bool {
        self.kind_bits() == K_NORM
    }

    /// Whether this is a physical register
    pub fn is_arch(self) -> bool {
        self.kind_bits() == K_ARCH
    }

    /// Whether this register names a storage slot that passes may rename.
    /// Zero constants and physical registers are not slots.
    pub fn is_slot(self) -> bool {
        !self.is_zero() && !self.is_arch()
    }

    /// Physical register bound to this arch-kind register
    pub fn arch_reg(self) -> IrResult<ArchReg> {
        if !self.is_arch() {
            return Err(IrError::Unsupported(format!("{:?} is not an arch register", self)));
        }
        ArchReg::from_index(self.index()).ok_or(IrError::InvalidArchRegister(self.index()))
    }

    /// Replace the index, keeping kind and pointer flag.
    ///
    /// Zero registers are constants rather than slots and are returned
    /// unchanged, so `RZ` and `PN` remain the only zero-kind values.
    pub fn rename(self, index: usize) -> Reg {
        if self.is_zero() {
            self
        } else {
            Reg((self.0 & (R_PTR | R_KIND)) | (index as u64 & R_INDEX))
        }
    }

    /// Turn this register into the SSA-normalized slot `index`, keeping the
    /// pointer flag.
    pub fn normalize(self, index: usize) -> Reg {
        Reg((self.0 & R_PTR) | ((K_NORM as u64) << B_KIND) | (index as u64 & R_INDEX))
    }

    /// Canonical zero with the same pointer-ness
    pub fn zero(self) -> Reg {
        if self.is_ptr() {
            Reg::PN
        } else {
            Reg::RZ
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ptr, index) = (self.is_ptr(), self.index());
        match self.kind() {
            RegKind::Generic(k) if ptr => write!(f, "%p{}.{}", k, index),
            RegKind::Generic(k) => write!(f, "%r{}.{}", k, index),
            // An arch register outside the table is an allocator bug.
            RegKind::Arch => match ArchReg::from_index(index) {
                Some(reg) => write!(f, "{}", reg),
                None => Err(fmt::Error),
            },
            RegKind::Zero if ptr => f.write_str("nil"),
            RegKind::Zero => f.write_str("$0"),
            RegKind::Temp if ptr => write!(f, "%tp{}", index),
            RegKind::Temp => write!(f, "%tr{}", index),
            RegKind::Norm if ptr => write!(f, "%p{}", index),
            RegKind::Norm => write!(f, "%r{}", index),
        }
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_arch() && ArchReg::from_index(self.index()).is_none() {
            return write!(f, "%arch?{}", self.index());
        }
        fmt::Display::fmt(self, f)
    }
}

/// Register as named by the front-end, before SSA construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HirReg {
    /// Generic register `R0`..`R7`
    R(u8),
    /// Pointer register `P0`..`P7`
    P(u8),
    /// Zero register
    Rz,
    /// Nil pointer register
    Pn,
}

impl HirReg {
    /// Generic register `n`, rejecting numbers outside 0..=7
    pub fn generic(n: u8) -> IrResult<HirReg> {
        if n > K_MAX {
            Err(IrError::InvalidHirRegister(n))
        } else {
            Ok(HirReg::R(n))
        }
    }

    /// Pointer register `n`, rejecting numbers outside 0..=7
    pub fn pointer(n: u8) -> IrResult<HirReg> {
        if n > K_MAX {
            Err(IrError::InvalidHirRegister(n))
        } else {
            Ok(HirReg::P(n))
        }
    }
}

impl TryFrom<HirReg> for Reg {
    type Error = IrError;

    /// Front-end register numbers become generic kinds with index 0; SSA
    /// construction later assigns indices.
    fn try_from(reg: HirReg) -> IrResult<Reg> {
        match reg {
            HirReg::Rz => Ok(Reg::RZ),
            HirReg::Pn => Ok(Reg::PN),
            HirReg::R(n) if n <= K_MAX => Reg::make(false, n, 0),
            HirReg::P(n) if n <= K_MAX => Reg::make(true, n, 0),
            HirReg::R(n) | HirReg::P(n) => Err(IrError::InvalidHirRegister(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_rejects_reserved_kinds() {
        for kind in 8..=11 {
            assert_eq!(Reg::make(false, kind, 0), Err(IrError::InvalidRegisterKind(kind)));
        }
        assert_eq!(Reg::make(true, 16, 0), Err(IrError::InvalidRegisterKind(16)));
        assert!(Reg::make(true, 7, 3).is_ok());
        assert!(Reg::make(false, K_TEMP, 3).is_ok());
        assert!(Reg::make(false, K_NORM, 3).is_ok());
    }

    #[test]
    fn test_zero_kind_has_two_inhabitants() {
        assert_eq!(Reg::make(false, K_ZERO, 0), Ok(Reg::RZ));
        assert_eq!(Reg::make(true, K_ZERO, 0), Ok(Reg::PN));
        assert_eq!(Reg::make(false, K_ZERO, 1), Err(IrError::InvalidZeroIndex(1)));
        assert_eq!(Reg::RZ.rename(9), Reg::RZ);
        assert_eq!(Reg::PN.rename(9), Reg::PN);
    }

    #[test]
    fn test_arch_index_is_checked() {
        assert!(Reg::make(false, K_ARCH, 15).is_ok());
        assert_eq!(Reg::make(false, K_ARCH, 16), Err(IrError::InvalidArchRegister(16)));

        let bad = Reg::arch(false, ArchReg::Rax).rename(40);
        assert_eq!(bad.arch_reg(), Err(IrError::InvalidArchRegister(40)));
        assert_eq!(format!("{:?}", bad), "%arch?40");
    }

    #[test]
    fn test_field_decoding() {
        let r = Reg::make(true, 5, 1234).unwrap();
        assert!(r.is_ptr());
        assert_eq!(r.kind(), RegKind::Generic(5));
        assert_eq!(r.index(), 1234);
    }

    #[test]
    fn test_index_truncation() {
        let r = Reg::norm(false, Reg::MAX_INDEX + 2);
        assert_eq!(r.index(), 1);
        assert!(!r.is_ptr());
        assert!(Reg::fits_index(Reg::MAX_INDEX));
        assert!(!Reg::fits_index(Reg::MAX_INDEX + 1));
    }

    #[test]
    fn test_normalize_keeps_pointer_flag() {
        let p = Reg::temp(true, 3).normalize(8);
        assert!(p.is_ptr());
        assert_eq!(p.kind(), RegKind::Norm);
        assert_eq!(p.index(), 8);
        assert_eq!(Reg::RZ.normalize(2), Reg::norm(false, 2));
    }

    #[test]
    fn test_zero_mapping() {
        assert_eq!(Reg::RZ.zero(), Reg::RZ);
        assert_eq!(Reg::PN.zero(), Reg::PN);
        assert_eq!(Reg::norm(false, 4).zero(), Reg::RZ);
        assert_eq!(Reg::temp(true, 4).zero(), Reg::PN);
    }

    #[test]
    fn test_display() {
        assert_eq!(Reg::make(false, 3, 2).unwrap().to_string(), "%r3.2");
        assert_eq!(Reg::make(true, 0, 7).unwrap().to_string(), "%p0.7");
        assert_eq!(Reg::arch(false, ArchReg::Rdi).to_string(), "%rdi");
        assert_eq!(Reg::RZ.to_string(), "$0");
        assert_eq!(Reg::PN.to_string(), "nil");
        assert_eq!(Reg::TR.rename(4).to_string(), "%tr4");
        assert_eq!(Reg::PR.rename(4).to_string(), "%tp4");
        assert_eq!(Reg::norm(false, 1).to_string(), "%r1");
        assert_eq!(Reg::norm(true, 1).to_string(), "%p1");
    }

    #[test]
    fn test_ordering_is_bitwise() {
        let a = Reg::norm(false, 1);
        let b = Reg::norm(false, 2);
        let p = Reg::norm(true, 0);
        assert!(a < b);
        assert!(b < p);
        assert_eq!(a.cmp(&b), a.bits().cmp(&b.bits()));
    }

    #[test]
    fn test_hir_conversion() {
        assert_eq!(Reg::try_from(HirReg::Rz), Ok(Reg::RZ));
        assert_eq!(Reg::try_from(HirReg::Pn), Ok(Reg::PN));

        let r = Reg::try_from(HirReg::generic(6).unwrap()).unwrap();
        assert_eq!(r.kind(), RegKind::Generic(6));
        assert!(!r.is_ptr());

        let p = Reg::try_from(HirReg::pointer(2).unwrap()).unwrap();
        assert_eq!(p.kind(), RegKind::Generic(2));
        assert!(p.is_ptr());

        assert_eq!(HirReg::generic(8), Err(IrError::InvalidHirRegister(8)));
        assert_eq!(Reg::try_from(HirReg::P(9)), Err(IrError::InvalidHirRegister(9)));
    }
}
