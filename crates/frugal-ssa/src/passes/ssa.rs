//! SSA construction
//!
//! Turns a function over front-end registers into SSA form:
//!
//! 1. Drop unreachable blocks.
//! 2. Insert a phi for every variable at the iterated dominance frontier of
//!    its definition sites.
//! 3. Rename along the dominator tree, giving each definition a fresh
//!    normalized register.
//! 4. Remove phis whose sources all agree.
//!
//! A *variable* is any slot register that is not already normalized. Zero
//! and arch registers are left alone.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use super::dom::DomTree;
use super::{IrPass, SsaEffect};
use crate::error::{IrError, IrResult};
use crate::ir::{BlockId, IrFunction, IrPhi};
use crate::reg::Reg;

/// SSA construction pass
pub struct SsaBuilder;

fn is_var(reg: Reg) -> bool {
    reg.is_slot() && !reg.is_normalized()
}

enum Step {
    Enter(BlockId),
    Leave(Vec<Reg>),
}

struct Renamer {
    stacks: FxHashMap<Reg, Vec<Reg>>,
    next: usize,
}

impl Renamer {
    fn define(&mut self, var: Reg, pushed: &mut Vec<Reg>) -> Reg {
        let name = var.normalize(self.next);
        self.next += 1;
        self.stacks.entry(var).or_default().push(name);
        pushed.push(var);
        name
    }

    fn current(&self, var: Reg) -> Option<Reg> {
        self.stacks.get(&var).and_then(|s| s.last()).copied()
    }

    fn use_of(&self, var: Reg) -> IrResult<Reg> {
        self.current(var)
            .ok_or_else(|| IrError::UndefinedRegister(var.to_string()))
    }

    fn leave(&mut self, pushed: Vec<Reg>) {
        for var in pushed {
            if let Some(stack) = self.stacks.get_mut(&var) {
                stack.pop();
            }
        }
    }
}

impl SsaBuilder {
    fn insert_phis(func: &mut IrFunction, dom: &DomTree) -> IrResult<usize> {
        // Ordered so phi insertion is deterministic.
        let mut defsites: BTreeMap<Reg, Vec<BlockId>> = BTreeMap::new();
        for &b in dom.rpo() {
            for var in func.block(b)?.definitions() {
                if is_var(var) {
                    let sites = defsites.entry(var).or_default();
                    if sites.last() != Some(&b) {
                        sites.push(b);
                    }
                }
            }
        }

        let preds = func.predecessors();
        let mut inserted = 0;
        for (var, sites) in defsites {
            let mut has_phi: FxHashSet<BlockId> = FxHashSet::default();
            let mut seen: FxHashSet<BlockId> = sites.iter().copied().collect();
            let mut work = sites;
            while let Some(d) = work.pop() {
                for &y in dom.frontier(d) {
                    if !has_phi.insert(y) {
                        continue;
                    }
                    let sources = preds.get(&y).into_iter().flatten().map(|p| (*p, var));
                    let phi = IrPhi::new(var, sources)?;
                    func.block_mut(y)?.phi.push(phi);
                    inserted += 1;
                    if seen.insert(y) {
                        work.push(y);
                    }
                }
            }
        }
        Ok(inserted)
    }

    /// One past the highest index held by a normalized register already in
    /// the function, so fresh names never collide with existing values.
    fn first_free_index(func: &IrFunction) -> usize {
        func.blocks()
            .flat_map(|b| b.usages().into_iter().chain(b.definitions()))
            .filter(|r| r.is_normalized())
            .map(|r| r.index() + 1)
            .max()
            .unwrap_or(0)
    }

    fn rename(func: &mut IrFunction, dom: &DomTree) -> IrResult<usize> {
        let base = Self::first_free_index(func);
        let mut ren = Renamer {
            stacks: FxHashMap::default(),
            next: base,
        };
        let mut steps = vec![Step::Enter(dom.entry())];

        while let Some(step) = steps.pop() {
            let b = match step {
                Step::Enter(b) => b,
                Step::Leave(pushed) => {
                    ren.leave(pushed);
                    continue;
                }
            };

            let mut pushed = Vec::new();
            let block = func.block_mut(b)?;
            for phi in &mut block.phi {
                if is_var(phi.dst) {
                    phi.dst = ren.define(phi.dst, &mut pushed);
                }
            }
            for node in &mut block.ins {
                for reg in node.usages_mut() {
                    if is_var(*reg) {
                        *reg = ren.use_of(*reg)?;
                    }
                }
                for reg in node.definitions_mut() {
                    if is_var(*reg) {
                        *reg = ren.define(*reg, &mut pushed);
                    }
                }
            }
            if let Some(term) = &mut block.term {
                for reg in term.usages_mut() {
                    if is_var(*reg) {
                        *reg = ren.use_of(*reg)?;
                    }
                }
            }

            let mut succs = block.successors().blocks();
            succs.sort_unstable();
            succs.dedup();
            for s in succs {
                for phi in &mut func.block_mut(s)?.phi {
                    if let Some(src) = phi.source_mut(b) {
                        let var = *src;
                        if is_var(var) {
                            *src = ren.current(var).unwrap_or_else(|| var.zero());
                        }
                    }
                }
            }

            steps.push(Step::Leave(pushed));
            for &child in dom.children(b).iter().rev() {
                steps.push(Step::Enter(child));
            }
        }
        Ok(ren.next - base)
    }

    /// Remove phis whose sources are all one register (ignoring the phi
    /// itself), forwarding that register to every use. Repeats until none
    /// are left, since removing one phi can make another trivial.
    pub fn remove_trivial_phis(func: &mut IrFunction) -> usize {
        let mut removed = 0;
        loop {
            let mut found = None;
            'search: for block in func.blocks() {
                for (i, phi) in block.phi.iter().enumerate() {
                    if let Some(src) = phi.trivial_source() {
                        found = Some((block.id, i, phi.dst, src));
                        break 'search;
                    }
                }
            }
            let Some((b, i, dst, src)) = found else { break };
            if let Ok(block) = func.block_mut(b) {
                block.phi.remove(i);
            }
            func.replace_usages(dst, src);
            removed += 1;
        }
        removed
    }
}

impl IrPass for SsaBuilder {
    fn name(&self) -> &str {
        "ssa-builder"
    }

    fn run(&self, func: &mut IrFunction) -> IrResult<()> {
        func.remove_unreachable();
        let preds = func.predecessors();
        if preds.get(&func.entry).is_some_and(|p| !p.is_empty()) {
            return Err(IrError::Verification(format!(
                "entry block {} has predecessors",
                func.entry
            )));
        }

        let dom = DomTree::compute(func);
        let phis = Self::insert_phis(func, &dom)?;
        let renamed = Self::rename(func, &dom)?;
        let trivial = Self::remove_trivial_phis(func);

        tracing::debug!(
            function = %func.name,
            phis_inserted = phis,
            phis_removed = trivial,
            registers = renamed,
            "built SSA form"
        );
        Ok(())
    }

    fn ssa_effect(&self) -> SsaEffect {
        SsaEffect::Establish
    }
}
