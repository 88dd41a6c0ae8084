//! Dead code elimination
//!
//! Mark-and-sweep over registers. Roots are everything read by terminators
//! and side-effecting nodes; a pure node is live when one of its
//! definitions is live or writes a non-slot register. Dead cycles through
//! phis are removed as well.

use rustc_hash::FxHashSet;

use super::IrPass;
use crate::error::IrResult;
use crate::ir::{IrFunction, IrNode};
use crate::reg::Reg;

/// Removes side-effect-free nodes and phis whose results are never read
pub struct DeadCodeElimination;

fn defines_live(defs: &[Reg], live: &FxHashSet<Reg>) -> bool {
    defs.iter().any(|r| !r.is_slot() || live.contains(r))
}

impl DeadCodeElimination {
    fn mark(func: &IrFunction) -> FxHashSet<Reg> {
        let mut live: FxHashSet<Reg> = FxHashSet::default();
        for block in func.blocks() {
            if let Some(term) = &block.term {
                live.extend(term.usages());
            }
            for node in block.ins.iter().filter(|n| n.has_side_effects()) {
                live.extend(node.usages());
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for block in func.blocks() {
                for phi in &block.phi {
                    if live.contains(&phi.dst) || !phi.dst.is_slot() {
                        for (_, src) in phi.sources() {
                            changed |= live.insert(src);
                        }
                    }
                }
                for node in block.ins.iter().filter(|n| !n.has_side_effects()) {
                    if defines_live(&node.definitions(), &live) {
                        for reg in node.usages() {
                            changed |= live.insert(reg);
                        }
                    }
                }
            }
        }
        live
    }
}

impl IrPass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dce"
    }

    fn run(&self, func: &mut IrFunction) -> IrResult<()> {
        let live = Self::mark(func);
        let mut removed = 0;
        for block in func.blocks_mut() {
            let before = block.phi.len() + block.ins.len();
            block.phi.retain(|phi| !phi.dst.is_slot() || live.contains(&phi.dst));
            block
                .ins
                .retain(|node: &IrNode| node.has_side_effects() || defines_live(&node.definitions(), &live));
            removed += before - block.phi.len() - block.ins.len();
        }
        tracing::debug!(function = %func.name, removed, "removed dead nodes");
        Ok(())
    }
}
