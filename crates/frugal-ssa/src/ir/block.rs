//! Basic blocks

use std::fmt;

use super::instr::IrNode;
use super::phi::IrPhi;
use super::term::{Successors, Terminator};
use crate::error::{IrError, IrResult};
use crate::reg::Reg;

/// Basic block identifier, an index into the owning function's block table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb_{}", self.0)
    }
}

/// A basic block: phis, then straight-line instructions, then one terminator
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Block id
    pub id: BlockId,
    /// Phi nodes, evaluated on entry
    pub phi: Vec<IrPhi>,
    /// Straight-line instructions
    pub ins: Vec<IrNode>,
    /// `None` until the front-end closes the block
    pub term: Option<Terminator>,
}

impl BasicBlock {
    /// Create an empty, unterminated block
    pub fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            phi: vec![],
            ins: vec![],
            term: None,
        }
    }

    /// The block's terminator, failing if the block was never closed
    pub fn terminator(&self) -> IrResult<&Terminator> {
        self.term
            .as_ref()
            .ok_or_else(|| IrError::Verification(format!("{} has no terminator", self.id)))
    }

    /// Close the block, replacing any previous terminator
    pub fn set_terminator(&mut self, term: impl Into<Terminator>) {
        self.term = Some(term.into());
    }

    /// Outgoing edges; empty for an unterminated block
    pub fn successors(&self) -> Successors {
        self.term
            .as_ref()
            .map(Terminator::successors)
            .unwrap_or_else(Successors::empty)
    }

    /// Registers read anywhere in the block, phis first
    pub fn usages(&self) -> Vec<Reg> {
        let mut out = Vec::new();
        for phi in &self.phi {
            out.extend(phi.sources().into_iter().map(|(_, r)| r));
        }
        for node in &self.ins {
            out.extend(node.usages());
        }
        if let Some(term) = &self.term {
            out.extend(term.usages());
        }
        out
    }

    /// Locations of every register read in the block, phis first
    pub fn usages_mut(&mut self) -> Vec<&mut Reg> {
        let mut out = Vec::new();
        for phi in &mut self.phi {
            out.extend(phi.sources_mut().into_iter().map(|(_, r)| r));
        }
        for node in &mut self.ins {
            out.extend(node.usages_mut());
        }
        if let Some(term) = &mut self.term {
            out.extend(term.usages_mut());
        }
        out
    }

    /// Registers written anywhere in the block, phis first
    pub fn definitions(&self) -> Vec<Reg> {
        let mut out: Vec<Reg> = self.phi.iter().map(|p| p.dst).collect();
        for node in &self.ins {
            out.extend(node.definitions());
        }
        out
    }

    /// Locations of every register written in the block, phis first
    pub fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        let mut out: Vec<&mut Reg> = self.phi.iter_mut().map(|p| &mut p.dst).collect();
        for node in &mut self.ins {
            out.extend(node.definitions_mut());
        }
        out
    }

    /// Number of nodes in the block, counting phis and the terminator
    pub fn len(&self) -> usize {
        self.phi.len() + self.ins.len() + usize::from(self.term.is_some())
    }

    /// Whether the block holds no nodes at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
