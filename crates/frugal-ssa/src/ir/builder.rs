//! IR builder helpers
//!
//! Utilities for emitting IR into a function one block at a time. The
//! front-end supplies its own registers, so every helper takes the
//! destination explicitly.

use super::block::BlockId;
use super::call::{CallHandle, IrCall, IrReceiver};
use super::function::IrFunction;
use super::instr::*;
use super::phi::IrPhi;
use super::term::{IrReturn, IrSwitch, Terminator};
use crate::error::{IrError, IrResult};
use crate::layout::{TypeIntrospect, TypeLayout, TypeToken};
use crate::reg::Reg;

/// Builder that simplifies IR construction
pub struct IrBuilder<'a> {
    func: &'a mut IrFunction,
    current_block: BlockId,
}

impl<'a> IrBuilder<'a> {
    /// Create a builder positioned at the function's entry block
    pub fn new(func: &'a mut IrFunction) -> Self {
        let entry = func.entry;
        IrBuilder {
            func,
            current_block: entry,
        }
    }

    /// Switch to emitting into a different block
    pub fn switch_to_block(&mut self, block: BlockId) -> IrResult<()> {
        self.func.block(block)?;
        self.current_block = block;
        Ok(())
    }

    /// Block that receives emitted nodes
    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Create a new basic block without switching to it
    pub fn create_block(&mut self) -> BlockId {
        self.func.add_block()
    }

    /// Emit a node into the current block. Phis join the phi list and
    /// terminators close the block.
    pub fn emit(&mut self, node: impl Into<IrNode>) -> IrResult<()> {
        let block = self.func.block_mut(self.current_block)?;
        match node.into() {
            IrNode::Phi(phi) => block.phi.push(phi),
            IrNode::Switch(s) => block.set_terminator(s),
            IrNode::Return(r) => block.set_terminator(r),
            other => block.ins.push(other),
        }
        Ok(())
    }

    /// Set the terminator for the current block
    pub fn terminate(&mut self, term: impl Into<Terminator>) -> IrResult<()> {
        self.func.block_mut(self.current_block)?.set_terminator(term);
        Ok(())
    }

    /// Emit a phi
    pub fn phi(&mut self, dst: Reg, sources: impl IntoIterator<Item = (BlockId, Reg)>) -> IrResult<()> {
        self.emit(IrPhi::new(dst, sources)?)
    }

    /// Emit `dst = argument #id`
    pub fn load_arg(&mut self, dst: Reg, id: u64) -> IrResult<()> {
        self.emit(IrLoadArg { dst, id })
    }

    /// Emit an integer constant
    pub fn const_int(&mut self, dst: Reg, value: i64) -> IrResult<()> {
        self.emit(IrConstInt { dst, value })
    }

    /// Emit a pointer constant
    pub fn const_ptr(&mut self, dst: Reg, addr: usize) -> IrResult<()> {
        self.emit(IrConstPtr { dst, addr })
    }

    /// Emit `dst = src + zero`
    pub fn copy(&mut self, dst: Reg, src: Reg) -> IrResult<()> {
        self.emit(IrBinaryExpr::copy(dst, src))
    }

    /// Emit a unary expression
    pub fn unary(&mut self, op: UnaryOp, dst: Reg, val: Reg) -> IrResult<()> {
        self.emit(IrUnaryExpr { dst, val, op })
    }

    /// Emit a binary expression
    pub fn binary(&mut self, op: BinaryOp, dst: Reg, x: Reg, y: Reg) -> IrResult<()> {
        self.emit(IrBinaryExpr { dst, x, y, op })
    }

    /// Emit `dst = &mem[off]`
    pub fn lea(&mut self, dst: Reg, mem: Reg, off: Reg) -> IrResult<()> {
        self.emit(IrLea { dst, mem, off })
    }

    /// Emit a load of `size` bytes
    pub fn load(&mut self, dst: Reg, mem: Reg, size: u8) -> IrResult<()> {
        self.emit(IrLoad::new(dst, mem, size)?)
    }

    /// Emit a store of `size` bytes
    pub fn store(&mut self, val: Reg, mem: Reg, size: u8) -> IrResult<()> {
        self.emit(IrStore::new(val, mem, size)?)
    }

    /// Emit a call, checking the receiver against the callee kind
    pub fn call(
        &mut self,
        func: CallHandle,
        rx: Option<IrReceiver>,
        ins: Vec<Reg>,
        outs: Vec<Reg>,
    ) -> IrResult<()> {
        self.emit(IrCall::new(func, rx, ins, outs)?)
    }

    /// Emit a breakpoint
    pub fn breakpoint(&mut self) -> IrResult<()> {
        self.emit(IrBreakpoint)
    }

    /// Close the current block with an unconditional jump
    pub fn jump(&mut self, target: BlockId) -> IrResult<()> {
        self.terminate(IrSwitch::jump(target))
    }

    /// Close the current block with a multi-way branch
    pub fn switch(
        &mut self,
        val: Reg,
        default: BlockId,
        branches: impl IntoIterator<Item = (i64, BlockId)>,
    ) -> IrResult<()> {
        self.terminate(IrSwitch::new(val, default, branches)?)
    }

    /// Close the current block with a return
    pub fn ret(&mut self, regs: Vec<Reg>) -> IrResult<()> {
        self.terminate(IrReturn::new(regs))
    }

    fn layout_of(types: &dyn TypeIntrospect, ty: TypeToken) -> IrResult<TypeLayout> {
        types
            .layout(ty)
            .ok_or_else(|| IrError::Unsupported(format!("no layout for type token {:#x}", ty.0)))
    }

    /// Load a value of runtime type `ty`, sized from its layout
    pub fn load_typed(&mut self, types: &dyn TypeIntrospect, ty: TypeToken, dst: Reg, mem: Reg) -> IrResult<()> {
        let layout = Self::layout_of(types, ty)?;
        self.emit(IrLoad::for_layout(dst, mem, &layout)?)
    }

    /// Store a value of runtime type `ty`. Pointer-bearing types go
    /// through a write barrier instead of a plain store.
    pub fn store_typed(&mut self, types: &dyn TypeIntrospect, ty: TypeToken, val: Reg, mem: Reg) -> IrResult<()> {
        let layout = Self::layout_of(types, ty)?;
        if !layout.needs_write_barrier() {
            return self.emit(IrStore::for_layout(val, mem, &layout)?);
        }
        if layout.access_size() != Some(TypeLayout::PTR_SIZE as u8) {
            return Err(IrError::Unsupported(format!(
                "{:?} of {} bytes with pointers needs more than one barrier",
                layout.kind, layout.size
            )));
        }
        if !val.is_ptr() {
            return Err(IrError::PointerMismatch(format!("barriered store of non-pointer {}", val)));
        }
        self.emit(IrWriteBarrier { mem, val })
    }

    /// Function being built
    pub fn func(&self) -> &IrFunction {
        self.func
    }

    /// Function being built, mutably
    pub fn func_mut(&mut self) -> &mut IrFunction {
        self.func
    }
}
