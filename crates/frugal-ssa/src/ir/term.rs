//! Block terminators and the successor protocol

use rustc_hash::FxHashMap;

use super::block::BlockId;
use super::instr::{IrNode, IrUsages};
use crate::error::{IrError, IrResult};
use crate::reg::Reg;

/// One outgoing control-flow edge. `value` is the switch case that selects
/// it, or `None` for the default edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Target block
    pub block: BlockId,
    /// Case value, `None` for the default edge
    pub value: Option<i64>,
}

/// Finite, restartable iterator over a terminator's outgoing edges.
///
/// The edge list is a snapshot: iterating never touches the terminator it
/// came from.
#[derive(Debug, Clone, Default)]
pub struct Successors {
    edges: Vec<Edge>,
    pos: usize,
}

impl Successors {
    fn new(edges: Vec<Edge>) -> Self {
        Successors { edges, pos: 0 }
    }

    /// No outgoing edges
    pub fn empty() -> Self {
        Successors::default()
    }

    /// Restart from the first edge
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// All target blocks in edge order, independent of the cursor
    pub fn blocks(&self) -> Vec<BlockId> {
        self.edges.iter().map(|e| e.block).collect()
    }
}

impl Iterator for Successors {
    type Item = Edge;

    fn next(&mut self) -> Option<Edge> {
        let edge = self.edges.get(self.pos).copied();
        if edge.is_some() {
            self.pos += 1;
        }
        edge
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.edges.len() - self.pos;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for Successors {}

/// Capability of nodes that end a basic block
pub trait IrTerminator {
    /// Outgoing edges
    fn successors(&self) -> Successors;

    /// Point every edge into `from` at `to` instead. Returns the number of
    /// edges changed.
    fn retarget(&mut self, from: BlockId, to: BlockId) -> usize;
}

// ===== Switch =====

/// Multi-way branch on an integer discriminant with a mandatory default.
/// With no explicit branches it is an unconditional jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrSwitch {
    /// Discriminant
    pub val: Reg,
    /// Target when no case matches
    pub default: BlockId,
    branches: FxHashMap<i64, BlockId>,
}

impl IrSwitch {
    /// Build a switch. Pointer discriminants and repeated case values are
    /// rejected.
    pub fn new(val: Reg, default: BlockId, branches: impl IntoIterator<Item = (i64, BlockId)>) -> IrResult<Self> {
        let mut map = FxHashMap::default();
        for (value, block) in branches {
            if map.insert(value, block).is_some() {
                return Err(IrError::MalformedSwitch(format!("duplicate case {}", value)));
            }
        }
        if val.is_ptr() && !map.is_empty() {
            return Err(IrError::MalformedSwitch(format!("cannot switch on pointer {}", val)));
        }
        Ok(IrSwitch {
            val,
            default,
            branches: map,
        })
    }

    /// Unconditional jump to `target`
    pub fn jump(target: BlockId) -> Self {
        IrSwitch {
            val: Reg::RZ,
            default: target,
            branches: FxHashMap::default(),
        }
    }

    /// Whether this switch has no explicit branches
    pub fn is_jump(&self) -> bool {
        self.branches.is_empty()
    }

    /// Explicit branches, ascending by case value
    pub fn branches(&self) -> Vec<(i64, BlockId)> {
        let mut out: Vec<(i64, BlockId)> = self.branches.iter().map(|(v, b)| (*v, *b)).collect();
        out.sort_unstable_by_key(|(v, _)| *v);
        out
    }

    /// Target for case `value`, if it has an explicit branch
    pub fn branch(&self, value: i64) -> Option<BlockId> {
        self.branches.get(&value).copied()
    }
}

impl IrTerminator for IrSwitch {
    fn successors(&self) -> Successors {
        let mut edges: Vec<Edge> = self
            .branches()
            .into_iter()
            .map(|(v, block)| Edge { block, value: Some(v) })
            .collect();
        edges.push(Edge {
            block: self.default,
            value: None,
        });
        Successors::new(edges)
    }

    fn retarget(&mut self, from: BlockId, to: BlockId) -> usize {
        let mut n = 0;
        for block in self.branches.values_mut() {
            if *block == from {
                *block = to;
                n += 1;
            }
        }
        if self.default == from {
            self.default = to;
            n += 1;
        }
        n
    }
}

impl IrUsages for IrSwitch {
    fn usages(&self) -> Vec<Reg> {
        vec![self.val]
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.val]
    }
}

// ===== Return =====

/// Function exit returning zero or more registers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrReturn {
    /// Returned registers, in order
    pub regs: Vec<Reg>,
}

impl IrReturn {
    /// Return of `regs`
    pub fn new(regs: Vec<Reg>) -> Self {
        IrReturn { regs }
    }
}

impl IrTerminator for IrReturn {
    fn successors(&self) -> Successors {
        Successors::empty()
    }

    fn retarget(&mut self, _from: BlockId, _to: BlockId) -> usize {
        0
    }
}

impl IrUsages for IrReturn {
    fn usages(&self) -> Vec<Reg> {
        self.regs.clone()
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        self.regs.iter_mut().collect()
    }
}

// ===== Terminator =====

/// The node that closes a basic block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Multi-way branch
    Switch(IrSwitch),
    /// Function return
    Return(IrReturn),
}

impl Terminator {
    fn as_dyn(&self) -> &dyn IrTerminator {
        match self {
            Terminator::Switch(s) => s,
            Terminator::Return(r) => r,
        }
    }

    /// Outgoing edges
    pub fn successors(&self) -> Successors {
        self.as_dyn().successors()
    }

    /// See [`IrTerminator::retarget`]
    pub fn retarget(&mut self, from: BlockId, to: BlockId) -> usize {
        match self {
            Terminator::Switch(s) => s.retarget(from, to),
            Terminator::Return(r) => r.retarget(from, to),
        }
    }

    /// Registers read by the terminator
    pub fn usages(&self) -> Vec<Reg> {
        match self {
            Terminator::Switch(s) => s.usages(),
            Terminator::Return(r) => r.usages(),
        }
    }

    /// Locations of the registers read by the terminator
    pub fn usages_mut(&mut self) -> Vec<&mut Reg> {
        match self {
            Terminator::Switch(s) => s.usages_mut(),
            Terminator::Return(r) => r.usages_mut(),
        }
    }
}

impl From<IrSwitch> for Terminator {
    fn from(s: IrSwitch) -> Self {
        Terminator::Switch(s)
    }
}

impl From<IrReturn> for Terminator {
    fn from(r: IrReturn) -> Self {
        Terminator::Return(r)
    }
}

impl From<Terminator> for IrNode {
    fn from(t: Terminator) -> Self {
        match t {
            Terminator::Switch(s) => IrNode::Switch(s),
            Terminator::Return(r) => IrNode::Return(r),
        }
    }
}

impl TryFrom<IrNode> for Terminator {
    type Error = IrError;

    fn try_from(node: IrNode) -> IrResult<Terminator> {
        match node {
            IrNode::Switch(s) => Ok(Terminator::Switch(s)),
            IrNode::Return(r) => Ok(Terminator::Return(r)),
            other => Err(IrError::NotATerminator(other.to_string())),
        }
    }
}
