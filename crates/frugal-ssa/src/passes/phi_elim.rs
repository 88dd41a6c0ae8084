//! Phi elimination
//!
//! Takes a function out of SSA form by replacing every phi with copies at
//! the end of its predecessor blocks.
//!
//! ## Algorithm
//!
//! 1. Split every edge into a phi block whose source ends in a real
//!    (non-jump) switch, so the copies cannot land before a terminator
//!    that still reads the old values.
//! 2. For each predecessor, emit the phi moves as a parallel copy: every
//!    source is first copied into a fresh temporary, then every target is
//!    assigned from its temporary.
//! 3. Remove the phis.
//!
//! ## Example
//!
//! Before:
//! ```text
//! bb_1:
//!     goto bb_3
//! bb_2:
//!     goto bb_3
//! bb_3:
//!     %r3 = φ(bb_1: %r1, bb_2: %r2)
//! ```
//!
//! After:
//! ```text
//! bb_1:
//!     %r3 = %r1 + $0
//!     goto bb_3
//! bb_2:
//!     %r3 = %r2 + $0
//!     goto bb_3
//! bb_3:
//! ```

use rustc_hash::FxHashMap;

use super::{IrPass, SsaEffect};
use crate::error::IrResult;
use crate::ir::{BlockId, IrBinaryExpr, IrFunction, IrNode, Terminator};
use crate::reg::Reg;

/// SSA destruction pass
pub struct PhiElimination;

impl PhiElimination {
    fn split_critical_edges(func: &mut IrFunction) -> IrResult<usize> {
        let mut edges = Vec::new();
        for block in func.blocks() {
            for pred in block.phi.iter().flat_map(|phi| phi.blocks()) {
                edges.push((pred, block.id));
            }
        }
        edges.sort_unstable();
        edges.dedup();

        let mut split = 0;
        for (pred, to) in edges {
            let plain_jump = matches!(
                func.block(pred)?.term,
                Some(Terminator::Switch(ref s)) if s.is_jump()
            );
            if !plain_jump {
                func.split_edge(pred, to)?;
                split += 1;
            }
        }
        Ok(split)
    }

    fn lower_phis(func: &mut IrFunction) -> IrResult<usize> {
        let mut moves: FxHashMap<BlockId, Vec<(Reg, Reg)>> = FxHashMap::default();
        let mut lowered = 0;
        for block in func.blocks_mut() {
            for phi in block.phi.drain(..) {
                for (pred, src) in phi.sources() {
                    if src != phi.dst {
                        moves.entry(pred).or_default().push((phi.dst, src));
                    }
                }
                lowered += 1;
            }
        }

        let mut preds: Vec<BlockId> = moves.keys().copied().collect();
        preds.sort_unstable();
        for pred in preds {
            let copies = moves.remove(&pred).unwrap_or_default();
            let mut nodes: Vec<IrNode> = Vec::with_capacity(copies.len() * 2);
            if let [(dst, src)] = copies.as_slice() {
                nodes.push(IrBinaryExpr::copy(*dst, *src).into());
            } else {
                let temps: Vec<Reg> = copies.iter().map(|(dst, _)| func.new_temp(dst.is_ptr())).collect();
                for ((_, src), tmp) in copies.iter().zip(&temps) {
                    nodes.push(IrBinaryExpr::copy(*tmp, *src).into());
                }
                for ((dst, _), tmp) in copies.iter().zip(&temps) {
                    nodes.push(IrBinaryExpr::copy(*dst, *tmp).into());
                }
            }
            func.block_mut(pred)?.ins.extend(nodes);
        }
        Ok(lowered)
    }
}

impl IrPass for PhiElimination {
    fn name(&self) -> &str {
        "phi-elim"
    }

    fn run(&self, func: &mut IrFunction) -> IrResult<()> {
        let split = Self::split_critical_edges(func)?;
        let lowered = Self::lower_phis(func)?;
        tracing::debug!(function = %func.name, split, lowered, "eliminated phis");
        Ok(())
    }

    fn ssa_effect(&self) -> SsaEffect {
        SsaEffect::Destroy
    }
}
