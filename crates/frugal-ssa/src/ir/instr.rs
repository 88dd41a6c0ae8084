//! Instruction nodes
//!
//! Every instruction kind is its own struct; [`IrNode`] is the closed sum
//! over all of them. A kind opts into the dataflow capabilities by
//! implementing [`IrUsages`] (registers read) and/or [`IrDefinitions`]
//! (registers written). Both report *locations*: writing through a
//! `&mut Reg` from `usages_mut` rewrites the owning node in place.

use super::call::IrCall;
use super::phi::IrPhi;
use super::term::{IrReturn, IrSwitch, IrTerminator};
use crate::error::{IrError, IrResult};
use crate::layout::{TypeKind, TypeLayout};
use crate::reg::Reg;

/// Registers an instruction reads, in operand order
pub trait IrUsages {
    /// Copies of the registers read
    fn usages(&self) -> Vec<Reg>;
    /// Locations of the registers read
    fn usages_mut(&mut self) -> Vec<&mut Reg>;
}

/// Registers an instruction writes, in operand order
pub trait IrDefinitions {
    /// Copies of the registers written
    fn definitions(&self) -> Vec<Reg>;
    /// Locations of the registers written
    fn definitions_mut(&mut self) -> Vec<&mut Reg>;
}

fn check_access_size(size: u8, ptr: bool) -> IrResult<()> {
    if !matches!(size, 1 | 2 | 4 | 8) {
        return Err(IrError::InvalidAccessSize(size as usize));
    }
    if ptr && size as usize != TypeLayout::PTR_SIZE {
        return Err(IrError::PointerMismatch(format!(
            "pointer access must be {} bytes, got {}",
            TypeLayout::PTR_SIZE,
            size
        )));
    }
    Ok(())
}

fn layout_access_size(layout: &TypeLayout, reg: Reg) -> IrResult<u8> {
    let size = layout
        .access_size()
        .ok_or_else(|| IrError::Unsupported(format!("{:?} of {} bytes needs more than one access", layout.kind, layout.size)))?;
    if (layout.kind == TypeKind::Pointer) != reg.is_ptr() {
        return Err(IrError::PointerMismatch(format!("{:?} value in {}", layout.kind, reg)));
    }
    Ok(size)
}

// ===== Memory =====

/// `dst = *mem`, `size` bytes wide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrLoad {
    /// Destination
    pub dst: Reg,
    /// Address
    pub mem: Reg,
    size: u8,
}

impl IrLoad {
    /// Build a load of 1, 2, 4 or 8 bytes. Pointer loads must be pointer-width.
    pub fn new(dst: Reg, mem: Reg, size: u8) -> IrResult<Self> {
        check_access_size(size, dst.is_ptr())?;
        Ok(IrLoad { dst, mem, size })
    }

    /// Build a load sized from a runtime type layout
    pub fn for_layout(dst: Reg, mem: Reg, layout: &TypeLayout) -> IrResult<Self> {
        let size = layout_access_size(layout, dst)?;
        IrLoad::new(dst, mem, size)
    }

    /// Access width in bytes
    pub fn size(&self) -> u8 {
        self.size
    }
}

impl IrUsages for IrLoad {
    fn usages(&self) -> Vec<Reg> {
        vec![self.mem]
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.mem]
    }
}

impl IrDefinitions for IrLoad {
    fn definitions(&self) -> Vec<Reg> {
        vec![self.dst]
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.dst]
    }
}

/// `*mem = val`, `size` bytes wide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrStore {
    /// Value stored
    pub val: Reg,
    /// Address
    pub mem: Reg,
    size: u8,
}

impl IrStore {
    /// Build a store of 1, 2, 4 or 8 bytes. Pointer stores must be pointer-width.
    pub fn new(val: Reg, mem: Reg, size: u8) -> IrResult<Self> {
        check_access_size(size, val.is_ptr())?;
        Ok(IrStore { val, mem, size })
    }

    /// Build a store sized from a runtime type layout
    pub fn for_layout(val: Reg, mem: Reg, layout: &TypeLayout) -> IrResult<Self> {
        let size = layout_access_size(layout, val)?;
        IrStore::new(val, mem, size)
    }

    /// Access width in bytes
    pub fn size(&self) -> u8 {
        self.size
    }
}

impl IrUsages for IrStore {
    fn usages(&self) -> Vec<Reg> {
        vec![self.val, self.mem]
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.val, &mut self.mem]
    }
}

/// `dst = argument #id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrLoadArg {
    /// Destination
    pub dst: Reg,
    /// Argument number
    pub id: u64,
}

impl IrDefinitions for IrLoadArg {
    fn definitions(&self) -> Vec<Reg> {
        vec![self.dst]
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.dst]
    }
}

// ===== Constants =====

/// `dst = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrConstInt {
    /// Destination
    pub dst: Reg,
    /// Constant value
    pub value: i64,
}

impl IrDefinitions for IrConstInt {
    fn definitions(&self) -> Vec<Reg> {
        vec![self.dst]
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.dst]
    }
}

/// `dst = addr`, a raw address the IR never dereferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrConstPtr {
    /// Destination
    pub dst: Reg,
    /// Raw address; never dereferenced by the compiler
    pub addr: usize,
}

impl IrDefinitions for IrConstPtr {
    fn definitions(&self) -> Vec<Reg> {
        vec![self.dst]
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.dst]
    }
}

// ===== Arithmetic =====

/// `dst = &mem[off]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrLea {
    /// Destination
    pub dst: Reg,
    /// Base address
    pub mem: Reg,
    /// Byte offset
    pub off: Reg,
}

impl IrUsages for IrLea {
    fn usages(&self) -> Vec<Reg> {
        vec![self.mem, self.off]
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.mem, &mut self.off]
    }
}

impl IrDefinitions for IrLea {
    fn definitions(&self) -> Vec<Reg> {
        vec![self.dst]
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.dst]
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Two's complement negation
    Negate,
    /// Byte swap of the low 16 bits
    Swap16,
    /// Byte swap of the low 32 bits
    Swap32,
    /// Byte swap of all 64 bits
    Swap64,
    /// Sign-extend the low 32 bits
    Sx32to64,
}

/// Binary operators. Comparisons produce 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Wrapping addition
    Add,
    /// Wrapping subtraction
    Sub,
    /// Wrapping multiplication
    Mul,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
    /// Logical shift right
    Shr,
    /// Equality
    Eq,
    /// Inequality
    Ne,
    /// Signed less-than
    Lt,
    /// Unsigned less-than
    Ltu,
    /// Unsigned greater-or-equal
    Geu,
}

impl BinaryOp {
    /// Whether the operator is a comparison
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Ltu | BinaryOp::Geu
        )
    }
}

/// `dst = op val`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrUnaryExpr {
    /// Destination
    pub dst: Reg,
    /// Operand
    pub val: Reg,
    /// Operator
    pub op: UnaryOp,
}

impl IrUsages for IrUnaryExpr {
    fn usages(&self) -> Vec<Reg> {
        vec![self.val]
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.val]
    }
}

impl IrDefinitions for IrUnaryExpr {
    fn definitions(&self) -> Vec<Reg> {
        vec![self.dst]
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.dst]
    }
}

/// `dst = x op y`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrBinaryExpr {
    /// Destination
    pub dst: Reg,
    /// Left operand
    pub x: Reg,
    /// Right operand
    pub y: Reg,
    /// Operator
    pub op: BinaryOp,
}

impl IrBinaryExpr {
    /// `dst = src`, encoded as `dst = src + 0` with a zero of matching
    /// pointer-ness
    pub fn copy(dst: Reg, src: Reg) -> Self {
        IrBinaryExpr {
            dst,
            x: src,
            y: src.zero(),
            op: BinaryOp::Add,
        }
    }

    /// The copied register if this expression is a plain copy
    pub fn as_copy(&self) -> Option<Reg> {
        if self.op == BinaryOp::Add && self.y.is_zero() {
            Some(self.x)
        } else {
            None
        }
    }
}

impl IrUsages for IrBinaryExpr {
    fn usages(&self) -> Vec<Reg> {
        vec![self.x, self.y]
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.x, &mut self.y]
    }
}

impl IrDefinitions for IrBinaryExpr {
    fn definitions(&self) -> Vec<Reg> {
        vec![self.dst]
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.dst]
    }
}

/// Bit test-and-set: `t = (x >> y) & 1`, `s = x | (1 << y)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrBitTestSet {
    /// Tested bit
    pub t: Reg,
    /// Value with the bit set
    pub s: Reg,
    /// Source value
    pub x: Reg,
    /// Bit number
    pub y: Reg,
}

impl IrUsages for IrBitTestSet {
    fn usages(&self) -> Vec<Reg> {
        vec![self.x, self.y]
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.x, &mut self.y]
    }
}

impl IrDefinitions for IrBitTestSet {
    fn definitions(&self) -> Vec<Reg> {
        vec![self.t, self.s]
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.t, &mut self.s]
    }
}

// ===== Runtime integration =====

/// Pointer store `*mem = val` that must notify the garbage collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrWriteBarrier {
    /// Address written
    pub mem: Reg,
    /// Pointer being stored
    pub val: Reg,
}

impl IrUsages for IrWriteBarrier {
    fn usages(&self) -> Vec<Reg> {
        vec![self.mem, self.val]
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.mem, &mut self.val]
    }
}

/// Debug trap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrBreakpoint;

// ===== Node =====

/// An IR instruction node
#[derive(Debug, Clone)]
pub enum IrNode {
    /// `IrPhi` node
    Phi(IrPhi),
    /// `IrSwitch` node
    Switch(IrSwitch),
    /// `IrReturn` node
    Return(IrReturn),
    /// `IrLoad` node
    Load(IrLoad),
    /// `IrStore` node
    Store(IrStore),
    /// `IrLoadArg` node
    LoadArg(IrLoadArg),
    /// `IrConstInt` node
    ConstInt(IrConstInt),
    /// `IrConstPtr` node
    ConstPtr(IrConstPtr),
    /// `IrLea` node
    Lea(IrLea),
    /// `IrUnaryExpr` node
    Unary(IrUnaryExpr),
    /// `IrBinaryExpr` node
    Binary(IrBinaryExpr),
    /// `IrBitTestSet` node
    BitTestSet(IrBitTestSet),
    /// `IrCall` node
    Call(IrCall),
    /// `IrWriteBarrier` node
    WriteBarrier(IrWriteBarrier),
    /// `IrBreakpoint` node
    Breakpoint(IrBreakpoint),
}

impl IrNode {
    /// Whether this node ends a basic block
    pub fn is_terminator(&self) -> bool {
        matches!(self, IrNode::Switch(_) | IrNode::Return(_))
    }

    /// Terminator view of this node
    pub fn as_terminator(&self) -> Option<&dyn IrTerminator> {
        match self {
            IrNode::Switch(n) => Some(n),
            IrNode::Return(n) => Some(n),
            IrNode::Phi(_)
            | IrNode::Load(_)
            | IrNode::Store(_)
            | IrNode::LoadArg(_)
            | IrNode::ConstInt(_)
            | IrNode::ConstPtr(_)
            | IrNode::Lea(_)
            | IrNode::Unary(_)
            | IrNode::Binary(_)
            | IrNode::BitTestSet(_)
            | IrNode::Call(_)
            | IrNode::WriteBarrier(_)
            | IrNode::Breakpoint(_) => None,
        }
    }

    /// Usage capability, if this kind reads registers
    pub fn as_usages(&self) -> Option<&dyn IrUsages> {
        match self {
            IrNode::Phi(n) => Some(n),
            IrNode::Switch(n) => Some(n),
            IrNode::Return(n) => Some(n),
            IrNode::Load(n) => Some(n),
            IrNode::Store(n) => Some(n),
            IrNode::Lea(n) => Some(n),
            IrNode::Unary(n) => Some(n),
            IrNode::Binary(n) => Some(n),
            IrNode::BitTestSet(n) => Some(n),
            IrNode::Call(n) => Some(n),
            IrNode::WriteBarrier(n) => Some(n),
            IrNode::LoadArg(_) | IrNode::ConstInt(_) | IrNode::ConstPtr(_) | IrNode::Breakpoint(_) => None,
        }
    }

    /// Mutable usage capability, if this kind reads registers
    pub fn as_usages_mut(&mut self) -> Option<&mut dyn IrUsages> {
        match self {
            IrNode::Phi(n) => Some(n),
            IrNode::Switch(n) => Some(n),
            IrNode::Return(n) => Some(n),
            IrNode::Load(n) => Some(n),
            IrNode::Store(n) => Some(n),
            IrNode::Lea(n) => Some(n),
            IrNode::Unary(n) => Some(n),
            IrNode::Binary(n) => Some(n),
            IrNode::BitTestSet(n) => Some(n),
            IrNode::Call(n) => Some(n),
            IrNode::WriteBarrier(n) => Some(n),
            IrNode::LoadArg(_) | IrNode::ConstInt(_) | IrNode::ConstPtr(_) | IrNode::Breakpoint(_) => None,
        }
    }

    /// Definition capability, if this kind writes registers
    pub fn as_definitions(&self) -> Option<&dyn IrDefinitions> {
        match self {
            IrNode::Phi(n) => Some(n),
            IrNode::Load(n) => Some(n),
            IrNode::LoadArg(n) => Some(n),
            IrNode::ConstInt(n) => Some(n),
            IrNode::ConstPtr(n) => Some(n),
            IrNode::Lea(n) => Some(n),
            IrNode::Unary(n) => Some(n),
            IrNode::Binary(n) => Some(n),
            IrNode::BitTestSet(n) => Some(n),
            IrNode::Call(n) => Some(n),
            IrNode::Switch(_)
            | IrNode::Return(_)
            | IrNode::Store(_)
            | IrNode::WriteBarrier(_)
            | IrNode::Breakpoint(_) => None,
        }
    }

    /// Mutable definition capability, if this kind writes registers
    pub fn as_definitions_mut(&mut self) -> Option<&mut dyn IrDefinitions> {
        match self {
            IrNode::Phi(n) => Some(n),
            IrNode::Load(n) => Some(n),
            IrNode::LoadArg(n) => Some(n),
            IrNode::ConstInt(n) => Some(n),
            IrNode::ConstPtr(n) => Some(n),
            IrNode::Lea(n) => Some(n),
            IrNode::Unary(n) => Some(n),
            IrNode::Binary(n) => Some(n),
            IrNode::BitTestSet(n) => Some(n),
            IrNode::Call(n) => Some(n),
            IrNode::Switch(_)
            | IrNode::Return(_)
            | IrNode::Store(_)
            | IrNode::WriteBarrier(_)
            | IrNode::Breakpoint(_) => None,
        }
    }

    /// Registers read; empty when the kind has no usages
    pub fn usages(&self) -> Vec<Reg> {
        self.as_usages().map(|n| n.usages()).unwrap_or_default()
    }

    /// Locations of registers read; empty when the kind has no usages
    pub fn usages_mut(&mut self) -> Vec<&mut Reg> {
        self.as_usages_mut().map(|n| n.usages_mut()).unwrap_or_default()
    }

    /// Registers written; empty when the kind has no definitions
    pub fn definitions(&self) -> Vec<Reg> {
        self.as_definitions().map(|n| n.definitions()).unwrap_or_default()
    }

    /// Locations of registers written; empty when the kind has no definitions
    pub fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        self.as_definitions_mut().map(|n| n.definitions_mut()).unwrap_or_default()
    }

    /// The `i`-th register read
    pub fn usage_at(&self, i: usize) -> Option<Reg> {
        self.usages().get(i).copied()
    }

    /// Overwrite the `i`-th register read. Returns false if out of range.
    pub fn set_usage_at(&mut self, i: usize, reg: Reg) -> bool {
        match self.usages_mut().into_iter().nth(i) {
            Some(slot) => {
                *slot = reg;
                true
            }
            None => false,
        }
    }

    /// The `i`-th register written
    pub fn definition_at(&self, i: usize) -> Option<Reg> {
        self.definitions().get(i).copied()
    }

    /// Overwrite the `i`-th register written. Returns false if out of range.
    pub fn set_definition_at(&mut self, i: usize, reg: Reg) -> bool {
        match self.definitions_mut().into_iter().nth(i) {
            Some(slot) => {
                *slot = reg;
                true
            }
            None => false,
        }
    }

    /// Whether the node must survive dead-code elimination even when none
    /// of its definitions are used
    pub fn has_side_effects(&self) -> bool {
        match self {
            IrNode::Switch(_)
            | IrNode::Return(_)
            | IrNode::Store(_)
            | IrNode::Call(_)
            | IrNode::WriteBarrier(_)
            | IrNode::Breakpoint(_) => true,

            IrNode::Phi(_)
            | IrNode::Load(_)
            | IrNode::LoadArg(_)
            | IrNode::ConstInt(_)
            | IrNode::ConstPtr(_)
            | IrNode::Lea(_)
            | IrNode::Unary(_)
            | IrNode::Binary(_)
            | IrNode::BitTestSet(_) => false,
        }
    }
}

macro_rules! impl_from_node {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for IrNode {
                fn from(node: $ty) -> Self {
                    IrNode::$variant(node)
                }
            }
        )*
    };
}

impl_from_node! {
    IrPhi => Phi,
    IrSwitch => Switch,
    IrReturn => Return,
    IrLoad => Load,
    IrStore => Store,
    IrLoadArg => LoadArg,
    IrConstInt => ConstInt,
    IrConstPtr => ConstPtr,
    IrLea => Lea,
    IrUnaryExpr => Unary,
    IrBinaryExpr => Binary,
    IrBitTestSet => BitTestSet,
    IrCall => Call,
    IrWriteBarrier => WriteBarrier,
    IrBreakpoint => Breakpoint,
}
