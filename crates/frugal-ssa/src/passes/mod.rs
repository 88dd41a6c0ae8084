//! Passes over the SSA IR
//!
//! Each pass implements the [`IrPass`] trait and transforms an
//! [`IrFunction`] in place. [`PassPipeline`] runs a sequence of passes,
//! optionally verifying the function after each one.

mod dce;
mod dom;
mod normalize;
mod phi_elim;
mod ssa;
mod verify;

pub use dce::DeadCodeElimination;
pub use dom::DomTree;
pub use normalize::Normalizer;
pub use phi_elim::PhiElimination;
pub use ssa::SsaBuilder;
pub use verify::Verifier;

use crate::error::IrResult;
use crate::ir::IrFunction;
use crate::reg::Reg;

/// How a pass changes the SSA status of the function it runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsaEffect {
    /// Leaves the function in whatever form it was in
    Preserve,
    /// Puts the function into SSA form
    Establish,
    /// Takes the function out of SSA form
    Destroy,
}

/// A transformation pass on IR
pub trait IrPass: Send + Sync {
    /// Name of this pass (for diagnostics)
    fn name(&self) -> &str;

    /// Run the pass, mutating the function in place
    fn run(&self, func: &mut IrFunction) -> IrResult<()>;

    /// Effect on SSA form, used to pick the verifier mode afterwards
    fn ssa_effect(&self) -> SsaEffect {
        SsaEffect::Preserve
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PassConfig {
    /// Run the verifier after every pass
    pub verify_each_pass: bool,
    /// Log the rendered function at `trace` level after every pass
    pub dump_ir: bool,
    /// Upper bound on distinct registers handed out by normalization
    pub max_registers: usize,
}

impl Default for PassConfig {
    fn default() -> Self {
        PassConfig {
            verify_each_pass: true,
            dump_ir: false,
            max_registers: Reg::MAX_INDEX + 1,
        }
    }
}

/// Runs a sequence of passes
pub struct PassPipeline {
    passes: Vec<Box<dyn IrPass>>,
    config: PassConfig,
}

impl PassPipeline {
    /// Create a pipeline that builds SSA, removes dead code and renumbers
    /// registers densely
    pub fn new(config: PassConfig) -> Self {
        PassPipeline {
            passes: vec![
                Box::new(SsaBuilder),
                Box::new(DeadCodeElimination),
                Box::new(Normalizer::new(config.max_registers)),
            ],
            config,
        }
    }

    /// Create an empty pipeline (no passes)
    pub fn empty(config: PassConfig) -> Self {
        PassPipeline { passes: vec![], config }
    }

    /// Add a pass to the pipeline
    pub fn add_pass(&mut self, pass: Box<dyn IrPass>) {
        self.passes.push(pass);
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    /// Names of the passes, in run order
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run all passes in order, stopping at the first failure
    pub fn run(&self, func: &mut IrFunction) -> IrResult<()> {
        let mut in_ssa = false;
        for pass in &self.passes {
            let name = pass.name();
            tracing::debug!(
                pass = name,
                function = %func.name,
                blocks = func.num_blocks(),
                instrs = func.instr_count(),
                "running pass"
            );
            pass.run(func).map_err(|e| e.in_pass(name))?;

            match pass.ssa_effect() {
                SsaEffect::Preserve => {}
                SsaEffect::Establish => in_ssa = true,
                SsaEffect::Destroy => in_ssa = false,
            }

            if self.config.dump_ir {
                tracing::trace!(pass = name, "after pass:\n{}", func);
            }

            if self.config.verify_each_pass {
                let verifier = if in_ssa { Verifier::ssa() } else { Verifier::structural() };
                if let Err(e) = verifier.check(func) {
                    tracing::warn!(pass = name, function = %func.name, error = %e, "verification failed");
                    return Err(e.in_pass(name));
                }
            }
        }
        Ok(())
    }
}

impl Default for PassPipeline {
    fn default() -> Self {
        Self::new(PassConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IrError;
    use crate::ir::{BlockId, IrBuilder};

    struct Failing;

    impl IrPass for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(&self, _func: &mut IrFunction) -> IrResult<()> {
            Err(IrError::Unsupported("nope".into()))
        }
    }

    struct Unterminate;

    impl IrPass for Unterminate {
        fn name(&self) -> &str {
            "unterminate"
        }

        fn run(&self, func: &mut IrFunction) -> IrResult<()> {
            func.block_mut(func.entry)?.term = None;
            Ok(())
        }
    }

    fn returning() -> IrFunction {
        let mut func = IrFunction::new("f");
        let mut b = IrBuilder::new(&mut func);
        b.ret(vec![]).unwrap();
        func
    }

    #[test]
    fn test_default_pipeline_passes() {
        let pipeline = PassPipeline::default();
        assert_eq!(pipeline.pass_names(), vec!["ssa-builder", "dce", "normalize"]);
        assert!(pipeline.config().verify_each_pass);
    }

    #[test]
    fn test_pass_error_carries_name() {
        let mut pipeline = PassPipeline::empty(PassConfig::default());
        pipeline.add_pass(Box::new(Failing));
        let err = pipeline.run(&mut returning()).unwrap_err();
        assert_eq!(err.to_string(), "pass `failing` failed: unsupported: nope");
        assert!(!err.is_internal());
    }

    #[test]
    fn test_verification_after_pass() {
        let mut pipeline = PassPipeline::empty(PassConfig::default());
        pipeline.add_pass(Box::new(Unterminate));
        let err = pipeline.run(&mut returning()).unwrap_err();
        assert!(matches!(err, IrError::Pass { ref pass, .. } if pass == "unterminate"));
        assert!(err.is_internal());

        let config = PassConfig {
            verify_each_pass: false,
            ..PassConfig::default()
        };
        let mut pipeline = PassPipeline::empty(config);
        pipeline.add_pass(Box::new(Unterminate));
        assert!(pipeline.run(&mut returning()).is_ok());
    }

    #[test]
    fn test_empty_pipeline_is_noop() {
        let mut func = returning();
        PassPipeline::empty(PassConfig::default()).run(&mut func).unwrap();
        assert_eq!(func.block_ids(), vec![BlockId(0)]);
    }
}
