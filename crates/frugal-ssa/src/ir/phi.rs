//! Phi nodes

use rustc_hash::FxHashMap;

use super::block::BlockId;
use super::instr::{IrDefinitions, IrUsages};
use crate::error::{IrError, IrResult};
use crate::reg::Reg;

/// `dst = φ(pred: src, ...)`, one source register per predecessor block.
///
/// Sources live in a hash map; every observable ordering (usages, rendering,
/// iteration) is by ascending block id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrPhi {
    /// Register defined by the phi
    pub dst: Reg,
    sources: FxHashMap<BlockId, Reg>,
}

impl IrPhi {
    /// Build a phi from `(predecessor, source)` pairs.
    ///
    /// Fails when the target is a zero register or a predecessor is listed
    /// twice with different sources.
    pub fn new(dst: Reg, sources: impl IntoIterator<Item = (BlockId, Reg)>) -> IrResult<Self> {
        if dst.is_zero() {
            return Err(IrError::MalformedPhi(format!("cannot assign to {}", dst)));
        }
        let mut phi = IrPhi {
            dst,
            sources: FxHashMap::default(),
        };
        for (block, reg) in sources {
            match phi.sources.insert(block, reg) {
                Some(prev) if prev != reg => {
                    return Err(IrError::MalformedPhi(format!(
                        "{} has conflicting sources {} and {} for {}",
                        dst, prev, reg, block
                    )));
                }
                _ => {}
            }
        }
        Ok(phi)
    }

    /// Set the source for `block`, returning the previous one
    pub fn insert(&mut self, block: BlockId, reg: Reg) -> Option<Reg> {
        self.sources.insert(block, reg)
    }

    /// Drop the source for `block`
    pub fn remove(&mut self, block: BlockId) -> Option<Reg> {
        self.sources.remove(&block)
    }

    /// Source for the edge from `block`
    pub fn source(&self, block: BlockId) -> Option<Reg> {
        self.sources.get(&block).copied()
    }

    /// Source for the edge from `block`, mutably
    pub fn source_mut(&mut self, block: BlockId) -> Option<&mut Reg> {
        self.sources.get_mut(&block)
    }

    /// Predecessor blocks, ascending
    pub fn blocks(&self) -> Vec<BlockId> {
        let mut blocks: Vec<BlockId> = self.sources.keys().copied().collect();
        blocks.sort_unstable();
        blocks
    }

    /// `(predecessor, source)` pairs, ascending by block id
    pub fn sources(&self) -> Vec<(BlockId, Reg)> {
        let mut out: Vec<(BlockId, Reg)> = self.sources.iter().map(|(b, r)| (*b, *r)).collect();
        out.sort_unstable_by_key(|(b, _)| *b);
        out
    }

    /// Source locations, ascending by block id
    pub fn sources_mut(&mut self) -> Vec<(BlockId, &mut Reg)> {
        let mut out: Vec<(BlockId, &mut Reg)> = self.sources.iter_mut().map(|(b, r)| (*b, r)).collect();
        out.sort_unstable_by_key(|(b, _)| *b);
        out
    }

    /// Number of incoming edges
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the phi has no sources
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Move the source keyed by `old` to `new`. Returns false if `old` had
    /// no source.
    pub fn rekey(&mut self, old: BlockId, new: BlockId) -> bool {
        match self.sources.remove(&old) {
            Some(reg) => {
                self.sources.insert(new, reg);
                true
            }
            None => false,
        }
    }

    /// The single register every source agrees on, ignoring self-references
    /// to `dst`. `None` if there are two distinct sources or none at all.
    pub fn trivial_source(&self) -> Option<Reg> {
        let mut same = None;
        for reg in self.sources.values().copied() {
            if reg == self.dst || Some(reg) == same {
                continue;
            }
            if same.is_some() {
                return None;
            }
            same = Some(reg);
        }
        same
    }
}

impl IrUsages for IrPhi {
    fn usages(&self) -> Vec<Reg> {
        self.sources().into_iter().map(|(_, r)| r).collect()
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        self.sources_mut().into_iter().map(|(_, r)| r).collect()
    }
}

impl IrDefinitions for IrPhi {
    fn definitions(&self) -> Vec<Reg> {
        vec![self.dst]
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.dst]
    }
}
