//! SSA IR: instruction nodes, terminators, phis, blocks and functions
//!
//! Instructions operate on [`Reg`](crate::reg::Reg) values and are grouped
//! into basic blocks with explicit terminators. Dataflow is exposed uniformly
//! through the [`IrUsages`] and [`IrDefinitions`] capabilities; control flow
//! through [`IrTerminator::successors`].

pub mod block;
pub mod builder;
pub mod call;
pub mod display;
pub mod function;
pub mod instr;
pub mod phi;
pub mod term;

pub use block::{BasicBlock, BlockId};
pub use builder::IrBuilder;
pub use call::{CallHandle, CallKind, CallTarget, IrCall, IrReceiver};
pub use function::IrFunction;
pub use instr::{
    BinaryOp, IrBinaryExpr, IrBitTestSet, IrBreakpoint, IrConstInt, IrConstPtr, IrDefinitions,
    IrLea, IrLoad, IrLoadArg, IrNode, IrStore, IrUnaryExpr, IrUsages, IrWriteBarrier, UnaryOp,
};
pub use phi::IrPhi;
pub use term::{Edge, IrReturn, IrSwitch, IrTerminator, Successors, Terminator};
