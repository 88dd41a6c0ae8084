//! Register normalization
//!
//! Renumbers every slot register into the normalized kind with dense
//! indices, assigned in order of first appearance along the reverse
//! postorder. Zero and arch registers keep their encoding.

use rustc_hash::FxHashMap;

use super::IrPass;
use crate::error::{IrError, IrResult};
use crate::ir::{BasicBlock, IrFunction};
use crate::reg::Reg;

/// Dense renumbering pass
pub struct Normalizer {
    max_registers: usize,
}

impl Normalizer {
    /// Normalizer refusing more than `max_registers` registers
    pub fn new(max_registers: usize) -> Self {
        Normalizer { max_registers }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Reg::MAX_INDEX + 1)
    }
}

struct Numbering {
    map: FxHashMap<Reg, Reg>,
    limit: usize,
}

impl Numbering {
    fn assign(&mut self, reg: &mut Reg) -> IrResult<()> {
        if !reg.is_slot() {
            return Ok(());
        }
        let next = self.map.len();
        let renamed = match self.map.get(&*reg) {
            Some(r) => *r,
            None => {
                if next >= self.limit {
                    return Err(IrError::RegisterSpaceExhausted(self.limit));
                }
                let r = reg.normalize(next);
                self.map.insert(*reg, r);
                r
            }
        };
        *reg = renamed;
        Ok(())
    }

    fn block(&mut self, block: &mut BasicBlock) -> IrResult<()> {
        for phi in &mut block.phi {
            self.assign(&mut phi.dst)?;
            for (_, src) in phi.sources_mut() {
                self.assign(src)?;
            }
        }
        for node in &mut block.ins {
            for reg in node.usages_mut() {
                self.assign(reg)?;
            }
            for reg in node.definitions_mut() {
                self.assign(reg)?;
            }
        }
        if let Some(term) = &mut block.term {
            for reg in term.usages_mut() {
                self.assign(reg)?;
            }
        }
        Ok(())
    }
}

impl IrPass for Normalizer {
    fn name(&self) -> &str {
        "normalize"
    }

    fn run(&self, func: &mut IrFunction) -> IrResult<()> {
        let mut order = func.reverse_postorder();
        let mut rest: Vec<_> = func.block_ids().into_iter().filter(|b| !order.contains(b)).collect();
        order.append(&mut rest);

        let mut numbering = Numbering {
            map: FxHashMap::default(),
            limit: self.max_registers,
        };
        for id in order {
            numbering.block(func.block_mut(id)?)?;
        }

        tracing::debug!(function = %func.name, registers = numbering.map.len(), "normalized registers");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, BlockId, IrBuilder, IrNode};

    fn build() -> IrFunction {
        let mut func = IrFunction::new("f");
        let t = func.new_temp(false);
        let mut b = IrBuilder::new(&mut func);
        b.load_arg(Reg::norm(true, 40), 0).unwrap();
        b.load_arg(t, 1).unwrap();
        b.binary(BinaryOp::Add, Reg::norm(false, 17), t, Reg::RZ).unwrap();
        b.ret(vec![Reg::norm(false, 17), Reg::norm(true, 40)]).unwrap();
        func
    }

    #[test]
    fn test_dense_first_appearance() {
        let mut func = build();
        Normalizer::default().run(&mut func).unwrap();
        let bb = func.block(BlockId(0)).unwrap();
        assert_eq!(bb.ins[0].definitions(), vec![Reg::norm(true, 0)]);
        assert_eq!(bb.ins[1].definitions(), vec![Reg::norm(false, 1)]);
        assert_eq!(bb.ins[2].usages(), vec![Reg::norm(false, 1), Reg::RZ]);
        assert_eq!(bb.ins[2].definitions(), vec![Reg::norm(false, 2)]);
        assert_eq!(
            bb.terminator().unwrap().usages(),
            vec![Reg::norm(false, 2), Reg::norm(true, 0)]
        );
    }

    #[test]
    fn test_idempotent() {
        let mut func = build();
        Normalizer::default().run(&mut func).unwrap();
        let once = func.to_string();
        Normalizer::default().run(&mut func).unwrap();
        assert_eq!(func.to_string(), once);
    }

    #[test]
    fn test_register_limit() {
        let mut func = build();
        let err = Normalizer::new(2).run(&mut func).unwrap_err();
        assert_eq!(err, IrError::RegisterSpaceExhausted(2));
    }

    #[test]
    fn test_every_slot_normalized() {
        let mut func = build();
        Normalizer::default().run(&mut func).unwrap();
        for block in func.blocks() {
            for node in &block.ins {
                let regs = node.usages().into_iter().chain(node.definitions());
                assert!(regs.filter(|r| r.is_slot()).all(|r| r.is_normalized()), "{}", node);
            }
            assert!(!matches!(block.ins.first(), Some(IrNode::Phi(_))));
        }
    }
}
