//! Dominator tree and dominance frontiers
//!
//! Uses the iterative algorithm of Cooper, Harvey and Kennedy over the
//! reverse postorder. Only blocks reachable from the entry take part.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::{BlockId, IrFunction};

/// Immediate dominators, dominator-tree children and dominance frontiers
#[derive(Debug, Clone)]
pub struct DomTree {
    entry: BlockId,
    rpo: Vec<BlockId>,
    idom: FxHashMap<BlockId, BlockId>,
    children: FxHashMap<BlockId, Vec<BlockId>>,
    frontiers: FxHashMap<BlockId, Vec<BlockId>>,
}

impl DomTree {
    /// Compute dominators for every block reachable from the entry
    pub fn compute(func: &IrFunction) -> DomTree {
        let entry = func.entry;
        let rpo = func.reverse_postorder();
        let order: FxHashMap<BlockId, usize> = rpo.iter().enumerate().map(|(i, b)| (*b, i)).collect();
        let preds = func.predecessors();
        let reachable_preds = |b: BlockId| -> Vec<BlockId> {
            preds
                .get(&b)
                .map(|ps| ps.iter().copied().filter(|p| order.contains_key(p)).collect())
                .unwrap_or_default()
        };

        let mut idom: FxHashMap<BlockId, BlockId> = FxHashMap::default();
        if !rpo.is_empty() {
            idom.insert(entry, entry);
        }

        let intersect = |idom: &FxHashMap<BlockId, BlockId>, mut a: BlockId, mut b: BlockId| {
            while a != b {
                while order[&a] > order[&b] {
                    a = idom[&a];
                }
                while order[&b] > order[&a] {
                    b = idom[&b];
                }
            }
            a
        };

        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for p in reachable_preds(b) {
                    if !idom.contains_key(&p) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(&idom, p, cur),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if idom.get(&b) != Some(&new_idom) {
                        idom.insert(b, new_idom);
                        changed = true;
                    }
                }
            }
        }

        let mut children: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        for &b in &rpo {
            if b == entry {
                continue;
            }
            if let Some(&parent) = idom.get(&b) {
                children.entry(parent).or_default().push(b);
            }
        }
        for list in children.values_mut() {
            list.sort_unstable();
        }

        let mut frontiers: FxHashMap<BlockId, FxHashSet<BlockId>> = FxHashMap::default();
        for &b in &rpo {
            let ps = reachable_preds(b);
            if ps.len() < 2 {
                continue;
            }
            let Some(&stop) = idom.get(&b) else { continue };
            for p in ps {
                let mut runner = p;
                while runner != stop {
                    frontiers.entry(runner).or_default().insert(b);
                    match idom.get(&runner) {
                        Some(&up) if up != runner => runner = up,
                        _ => break,
                    }
                }
            }
        }
        let frontiers = frontiers
            .into_iter()
            .map(|(b, set)| {
                let mut v: Vec<BlockId> = set.into_iter().collect();
                v.sort_unstable();
                (b, v)
            })
            .collect();

        DomTree {
            entry,
            rpo,
            idom,
            children,
            frontiers,
        }
    }

    /// Immediate dominator of `b`; `None` for the entry and unreachable blocks
    pub fn idom(&self, b: BlockId) -> Option<BlockId> {
        if b == self.entry {
            return None;
        }
        self.idom.get(&b).copied()
    }

    /// Whether `a` dominates `b`. Every block dominates itself.
    pub fn dominates(&self, a: BlockId, mut b: BlockId) -> bool {
        if !self.idom.contains_key(&b) {
            return false;
        }
        loop {
            if a == b {
                return true;
            }
            match self.idom(b) {
                Some(up) => b = up,
                None => return false,
            }
        }
    }

    /// Blocks immediately dominated by `b`, ascending
    pub fn children(&self, b: BlockId) -> &[BlockId] {
        self.children.get(&b).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dominance frontier of `b`, ascending
    pub fn frontier(&self, b: BlockId) -> &[BlockId] {
        self.frontiers.get(&b).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reachable blocks in reverse postorder
    pub fn rpo(&self) -> &[BlockId] {
        &self.rpo
    }

    /// Root of the tree
    pub fn entry(&self) -> BlockId {
        self.entry
    }
}
