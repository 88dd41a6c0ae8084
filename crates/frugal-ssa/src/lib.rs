//! Frugal SSA layer
//!
//! This crate provides the intermediate representation used by the frugal
//! serialization JIT between the schema front-end and native code emission:
//! - **Registers**: bit-packed register values with kind, index and pointer flag (`reg`)
//! - **Arch registers**: the physical register table bound during allocation (`arch`)
//! - **Type layouts**: the runtime-type capability used to size memory accesses (`layout`)
//! - **IR**: SSA instruction nodes, terminators, phis, blocks and functions (`ir`)
//! - **Passes**: SSA construction, normalization, DCE, phi elimination and verification (`passes`)
//!
//! # Example
//!
//! ```rust,ignore
//! use frugal_ssa::ir::{BinaryOp, IrBuilder, IrFunction};
//! use frugal_ssa::passes::{PassConfig, PassPipeline};
//! use frugal_ssa::reg::{HirReg, Reg};
//!
//! let mut func = IrFunction::new("encode_size");
//! let mut b = IrBuilder::new(&mut func);
//! let a = Reg::try_from(HirReg::generic(0)?)?;
//! b.load_arg(a, 0)?;
//! b.ret(vec![a])?;
//!
//! PassPipeline::new(PassConfig::default()).run(&mut func)?;
//! println!("{}", func);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Error taxonomy for IR construction and passes
pub mod error;

/// Architecture-specific register table
pub mod arch;

/// Register encoding
pub mod reg;

/// Runtime type layouts consumed when sizing memory accesses
pub mod layout;

/// Instruction nodes, terminators, blocks and functions
pub mod ir;

/// Passes over the IR
pub mod passes;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{IrError, IrResult};
pub use ir::{BlockId, IrFunction, IrNode};
pub use reg::{Reg, RegKind};
