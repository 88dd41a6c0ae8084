//! IR verifier
//!
//! Structural checks hold for every function; SSA checks additionally hold
//! between SSA construction and phi elimination.

use rustc_hash::FxHashSet;

use super::IrPass;
use crate::error::{IrError, IrResult};
use crate::ir::{IrFunction, IrNode};
use crate::reg::Reg;

/// Checks the invariants of a function
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    ssa: bool,
}

impl Verifier {
    /// Block-structure checks only
    pub fn structural() -> Self {
        Verifier { ssa: false }
    }

    /// Block structure plus single definition of normalized registers
    pub fn ssa() -> Self {
        Verifier { ssa: true }
    }

    /// Run the checks
    pub fn check(&self, func: &IrFunction) -> IrResult<()> {
        self.check_structure(func)?;
        if self.ssa {
            self.check_ssa(func)?;
        }
        Ok(())
    }

    fn check_structure(&self, func: &IrFunction) -> IrResult<()> {
        func.block(func.entry)?;
        for block in func.blocks() {
            let term = block.terminator()?;
            for edge in term.successors() {
                if !func.contains_block(edge.block) {
                    return Err(IrError::UnknownBlock(edge.block.0));
                }
            }
            for node in &block.ins {
                match node {
                    IrNode::Phi(_) | IrNode::Switch(_) | IrNode::Return(_) => {
                        return Err(IrError::Verification(format!(
                            "`{}` in the instruction list of {}",
                            node, block.id
                        )));
                    }
                    IrNode::Call(call) => call.validate()?,
                    _ => {}
                }
            }
        }

        let preds = func.predecessors();
        if preds.get(&func.entry).is_some_and(|p| !p.is_empty()) {
            return Err(IrError::Verification(format!("entry block {} has predecessors", func.entry)));
        }
        for block in func.blocks() {
            let expected = preds.get(&block.id).map(Vec::as_slice).unwrap_or(&[]);
            for phi in &block.phi {
                if phi.blocks() != expected {
                    return Err(IrError::MalformedPhi(format!(
                        "`{}` in {} does not match predecessors {:?}",
                        phi, block.id, expected
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_ssa(&self, func: &IrFunction) -> IrResult<()> {
        let mut defined: FxHashSet<Reg> = FxHashSet::default();
        for block in func.blocks() {
            for reg in block.definitions().into_iter().filter(|r| r.is_slot()) {
                if !reg.is_normalized() {
                    return Err(IrError::Verification(format!("{} in {} is not normalized", reg, block.id)));
                }
                if !defined.insert(reg) {
                    return Err(IrError::Verification(format!("{} is defined more than once", reg)));
                }
            }
        }
        for block in func.blocks() {
            for reg in block.usages().into_iter().filter(|r| r.is_slot()) {
                if !defined.contains(&reg) {
                    return Err(IrError::UndefinedRegister(reg.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl IrPass for Verifier {
    fn name(&self) -> &str {
        if self.ssa {
            "verify-ssa"
        } else {
            "verify"
        }
    }

    fn run(&self, func: &mut IrFunction) -> IrResult<()> {
        self.check(func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockId, IrBuilder, IrReturn};

    fn r(i: usize) -> Reg {
        Reg::norm(false, i)
    }

    fn ok_func() -> IrFunction {
        let mut func = IrFunction::new("f");
        let mut b = IrBuilder::new(&mut func);
        b.load_arg(r(0), 0).unwrap();
        b.ret(vec![r(0)]).unwrap();
        func
    }

    #[test]
    fn test_accepts_valid() {
        let func = ok_func();
        assert!(Verifier::structural().check(&func).is_ok());
        assert!(Verifier::ssa().check(&func).is_ok());
    }

    #[test]
    fn test_missing_terminator() {
        let mut func = ok_func();
        func.add_block();
        assert!(matches!(Verifier::structural().check(&func), Err(IrError::Verification(_))));
    }

    #[test]
    fn test_unknown_target() {
        let mut func = ok_func();
        let mut b = IrBuilder::new(&mut func);
        b.jump(BlockId(42)).unwrap();
        assert_eq!(Verifier::structural().check(&func), Err(IrError::UnknownBlock(42)));
    }

    #[test]
    fn test_terminator_in_body() {
        let mut func = ok_func();
        func.block_mut(BlockId(0)).unwrap().ins.push(IrNode::from(IrReturn::default()));
        assert!(matches!(Verifier::structural().check(&func), Err(IrError::Verification(_))));
    }

    #[test]
    fn test_phi_keys_must_match_preds() {
        let mut func = ok_func();
        let exit = func.add_block();
        let mut b = IrBuilder::new(&mut func);
        b.jump(exit).unwrap();
        b.switch_to_block(exit).unwrap();
        b.phi(r(1), [(BlockId(0), r(0)), (BlockId(7), r(0))]).unwrap();
        b.ret(vec![r(1)]).unwrap();
        assert!(matches!(Verifier::structural().check(&func), Err(IrError::MalformedPhi(_))));

        let phi = &mut func.block_mut(exit).unwrap().phi[0];
        phi.remove(BlockId(7));
        assert!(Verifier::ssa().check(&func).is_ok());
    }

    #[test]
    fn test_double_definition() {
        let mut func = ok_func();
        let mut b = IrBuilder::new(&mut func);
        b.const_int(r(0), 1).unwrap();
        assert!(Verifier::structural().check(&func).is_ok());
        assert!(matches!(Verifier::ssa().check(&func), Err(IrError::Verification(_))));
    }

    #[test]
    fn test_undefined_use() {
        let mut func = ok_func();
        let mut b = IrBuilder::new(&mut func);
        b.ret(vec![r(9)]).unwrap();
        assert!(matches!(Verifier::ssa().check(&func), Err(IrError::UndefinedRegister(_))));
    }

    #[test]
    fn test_unnormalized_definition() {
        let mut func = IrFunction::new("f");
        let mut b = IrBuilder::new(&mut func);
        b.load_arg(Reg::temp(false, 0), 0).unwrap();
        b.ret(vec![]).unwrap();
        assert!(matches!(Verifier::ssa().check(&func), Err(IrError::Verification(_))));
    }
}
