//! Functions: an arena of basic blocks plus CFG queries

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use super::block::{BasicBlock, BlockId};
use super::term::IrSwitch;
use crate::error::{IrError, IrResult};
use crate::reg::Reg;

/// A function under compilation.
///
/// Blocks are owned by the function and referenced everywhere else by
/// [`BlockId`]. Iteration is always in ascending id order.
#[derive(Debug, Clone)]
pub struct IrFunction {
    /// Function name, used in dumps and logs
    pub name: String,
    /// Entry block; has no predecessors
    pub entry: BlockId,
    blocks: BTreeMap<BlockId, BasicBlock>,
    next_block: u32,
    next_temp: usize,
}

impl IrFunction {
    /// Create a function holding only an empty entry block `bb_0`
    pub fn new(name: impl Into<String>) -> Self {
        let entry = BlockId(0);
        let mut blocks = BTreeMap::new();
        blocks.insert(entry, BasicBlock::new(entry));
        IrFunction {
            name: name.into(),
            entry,
            blocks,
            next_block: 1,
            next_temp: 0,
        }
    }

    /// Append a fresh, unterminated block
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(id, BasicBlock::new(id));
        id
    }

    /// Look up a block
    pub fn block(&self, id: BlockId) -> IrResult<&BasicBlock> {
        self.blocks.get(&id).ok_or(IrError::UnknownBlock(id.0))
    }

    /// Look up a block for mutation
    pub fn block_mut(&mut self, id: BlockId) -> IrResult<&mut BasicBlock> {
        self.blocks.get_mut(&id).ok_or(IrError::UnknownBlock(id.0))
    }

    /// Whether `id` names a block
    pub fn contains_block(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    /// Blocks in ascending id order
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.values()
    }

    /// Blocks in ascending id order, mutably
    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut BasicBlock> {
        self.blocks.values_mut()
    }

    /// Ids of every block, ascending
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    /// Number of blocks
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Detach a block from the arena. Edges into it are left dangling.
    pub fn remove_block(&mut self, id: BlockId) -> Option<BasicBlock> {
        self.blocks.remove(&id)
    }

    /// A temporary register not handed out before
    pub fn new_temp(&mut self, ptr: bool) -> Reg {
        let reg = Reg::temp(ptr, self.next_temp);
        self.next_temp += 1;
        reg
    }

    /// Successor blocks of `id`, in edge order
    pub fn successors(&self, id: BlockId) -> IrResult<Vec<BlockId>> {
        Ok(self.block(id)?.successors().blocks())
    }

    /// Predecessors of every block, each list ascending and deduplicated.
    /// Every block has an entry, even if empty.
    pub fn predecessors(&self) -> FxHashMap<BlockId, Vec<BlockId>> {
        let mut preds: FxHashMap<BlockId, Vec<BlockId>> =
            self.blocks.keys().map(|id| (*id, Vec::new())).collect();
        for block in self.blocks.values() {
            for succ in block.successors() {
                preds.entry(succ.block).or_default().push(block.id);
            }
        }
        for list in preds.values_mut() {
            list.sort_unstable();
            list.dedup();
        }
        preds
    }

    /// Blocks reachable from the entry, in reverse postorder
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut visited = FxHashSet::default();
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut stack: Vec<(BlockId, Vec<BlockId>, usize)> = Vec::new();

        if self.blocks.contains_key(&self.entry) {
            visited.insert(self.entry);
            stack.push((self.entry, self.succ_list(self.entry), 0));
        }

        while let Some((id, succs, next)) = stack.last_mut() {
            if let Some(succ) = succs.get(*next).copied() {
                *next += 1;
                if self.blocks.contains_key(&succ) && visited.insert(succ) {
                    stack.push((succ, self.succ_list(succ), 0));
                }
            } else {
                order.push(*id);
                stack.pop();
            }
        }

        order.reverse();
        order
    }

    fn succ_list(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .get(&id)
            .map(|b| b.successors().blocks())
            .unwrap_or_default()
    }

    /// Drop blocks the entry cannot reach, and any phi sources keyed by
    /// them. Returns the number of blocks removed.
    pub fn remove_unreachable(&mut self) -> usize {
        let live: FxHashSet<BlockId> = self.reverse_postorder().into_iter().collect();
        let dead: Vec<BlockId> = self.blocks.keys().filter(|id| !live.contains(id)).copied().collect();
        if dead.is_empty() {
            return 0;
        }
        for id in &dead {
            self.blocks.remove(id);
        }
        for block in self.blocks.values_mut() {
            for phi in &mut block.phi {
                for id in &dead {
                    phi.remove(*id);
                }
            }
        }
        tracing::trace!(function = %self.name, removed = dead.len(), "removed unreachable blocks");
        dead.len()
    }

    /// Insert an empty block on the edge `from -> to`, fixing up the phis
    /// of `to`. Returns the new block.
    pub fn split_edge(&mut self, from: BlockId, to: BlockId) -> IrResult<BlockId> {
        self.block(to)?;
        if !self.successors(from)?.contains(&to) {
            return Err(IrError::Verification(format!("no edge {} -> {}", from, to)));
        }
        let mid = self.add_block();
        if let Some(term) = self.block_mut(from)?.term.as_mut() {
            term.retarget(to, mid);
        }
        self.block_mut(mid)?.set_terminator(IrSwitch::jump(to));
        for phi in &mut self.block_mut(to)?.phi {
            phi.rekey(from, mid);
        }
        Ok(mid)
    }

    /// Rewrite every read of `from` into a read of `to`. Returns the number
    /// of operands changed.
    pub fn replace_usages(&mut self, from: Reg, to: Reg) -> usize {
        let mut n = 0;
        for block in self.blocks.values_mut() {
            for reg in block.usages_mut() {
                if *reg == from {
                    *reg = to;
                    n += 1;
                }
            }
        }
        n
    }

    /// Total number of nodes across all blocks
    pub fn instr_count(&self) -> usize {
        self.blocks.values().map(BasicBlock::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IrPhi, IrReturn};

    fn r(i: usize) -> Reg {
        Reg::norm(false, i)
    }

    /// bb_0 -> {bb_1, bb_2} -> bb_3, plus an orphan bb_4
    fn diamond() -> IrFunction {
        let mut func = IrFunction::new("diamond");
        let b1 = func.add_block();
        let b2 = func.add_block();
        let b3 = func.add_block();
        let b4 = func.add_block();
        func.block_mut(BlockId(0))
            .unwrap()
            .set_terminator(IrSwitch::new(r(0), b2, [(1, b1)]).unwrap());
        func.block_mut(b1).unwrap().set_terminator(IrSwitch::jump(b3));
        func.block_mut(b2).unwrap().set_terminator(IrSwitch::jump(b3));
        func.block_mut(b4).unwrap().set_terminator(IrSwitch::jump(b3));
        let bb3 = func.block_mut(b3).unwrap();
        bb3.phi.push(IrPhi::new(r(9), [(b1, r(1)), (b2, r(2)), (b4, r(4))]).unwrap());
        bb3.set_terminator(IrReturn::new(vec![r(9)]));
        func
    }

    #[test]
    fn test_new_has_entry() {
        let func = IrFunction::new("f");
        assert_eq!(func.entry, BlockId(0));
        assert_eq!(func.num_blocks(), 1);
        assert!(func.block(BlockId(1)).is_err());
    }

    #[test]
    fn test_predecessors() {
        let func = diamond();
        let preds = func.predecessors();
        assert_eq!(preds[&BlockId(3)], vec![BlockId(1), BlockId(2), BlockId(4)]);
        assert!(preds[&BlockId(0)].is_empty());
    }

    #[test]
    fn test_reverse_postorder() {
        let func = diamond();
        let rpo = func.reverse_postorder();
        assert_eq!(rpo.first(), Some(&BlockId(0)));
        assert_eq!(rpo.last(), Some(&BlockId(3)));
        assert_eq!(rpo.len(), 4);
        assert!(!rpo.contains(&BlockId(4)));
    }

    #[test]
    fn test_remove_unreachable_scrubs_phis() {
        let mut func = diamond();
        assert_eq!(func.remove_unreachable(), 1);
        assert!(!func.contains_block(BlockId(4)));
        let phi = &func.block(BlockId(3)).unwrap().phi[0];
        assert_eq!(phi.blocks(), vec![BlockId(1), BlockId(2)]);
        assert_eq!(func.remove_unreachable(), 0);
    }

    #[test]
    fn test_split_edge() {
        let mut func = diamond();
        let mid = func.split_edge(BlockId(1), BlockId(3)).unwrap();
        assert_eq!(func.successors(BlockId(1)).unwrap(), vec![mid]);
        assert_eq!(func.successors(mid).unwrap(), vec![BlockId(3)]);
        let phi = &func.block(BlockId(3)).unwrap().phi[0];
        assert_eq!(phi.source(mid), Some(r(1)));
        assert_eq!(phi.source(BlockId(1)), None);

        assert!(func.split_edge(BlockId(1), BlockId(2)).is_err());
    }

    #[test]
    fn test_replace_usages() {
        let mut func = diamond();
        assert_eq!(func.replace_usages(r(9), r(10)), 1);
        assert_eq!(func.replace_usages(r(0), r(11)), 1);
        let ret = func.block(BlockId(3)).unwrap().terminator().unwrap().usages();
        assert_eq!(ret, vec![r(10)]);
    }

    #[test]
    fn test_new_temp_is_fresh() {
        let mut func = IrFunction::new("f");
        let a = func.new_temp(false);
        let b = func.new_temp(true);
        assert_ne!(a.index(), b.index());
        assert!(b.is_ptr());
    }
}
