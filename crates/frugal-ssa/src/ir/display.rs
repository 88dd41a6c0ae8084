//! Pretty-printing for the SSA IR
//!
//! Display implementations for debugging and dump output. Rendering is
//! deterministic: phi sources, switch cases and blocks all print in
//! ascending id order.

use std::fmt::{self, Write as _};

use super::block::BasicBlock;
use super::call::IrCall;
use super::function::IrFunction;
use super::instr::*;
use super::phi::IrPhi;
use super::term::{IrReturn, IrSwitch, Terminator};
use crate::reg::Reg;

struct RegList<'a>(&'a [Reg]);

impl fmt::Display for RegList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reg) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", reg)?;
        }
        Ok(())
    }
}

impl fmt::Display for IrPhi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = φ(", self.dst)?;
        for (i, (block, reg)) in self.sources().into_iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", block, reg)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for IrSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_jump() {
            return write!(f, "goto {}", self.default);
        }
        writeln!(f, "switch {} {{", self.val)?;
        for (value, block) in self.branches() {
            writeln!(f, "  {} => {},", value, block)?;
        }
        writeln!(f, "  _ => {},", self.default)?;
        f.write_str("}")
    }
}

impl fmt::Display for IrReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ret {{{}}}", RegList(&self.regs))
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Switch(s) => write!(f, "{}", s),
            Terminator::Return(r) => write!(f, "{}", r),
        }
    }
}

impl fmt::Display for IrLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dst.is_ptr() {
            write!(f, "{} = load.ptr {}", self.dst, self.mem)
        } else {
            write!(f, "{} = load.u{} {}", self.dst, self.size() as u32 * 8, self.mem)
        }
    }
}

impl fmt::Display for IrStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.val.is_ptr() {
            write!(f, "store.ptr({} -> *{})", self.val, self.mem)
        } else {
            write!(f, "store.u{}({} -> *{})", self.size() as u32 * 8, self.val, self.mem)
        }
    }
}

impl fmt::Display for IrLoadArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = if self.dst.is_ptr() { "ptr" } else { "i64" };
        write!(f, "{} = loadarg.{}(#{})", self.dst, ty, self.id)
    }
}

impl fmt::Display for IrConstInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = const.i64 {}", self.dst, self.value)
    }
}

impl fmt::Display for IrConstPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = const.ptr {:#x}", self.dst, self.addr)
    }
}

impl fmt::Display for IrLea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = &({})[{}]", self.dst, self.mem, self.off)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Negate => "negate",
            UnaryOp::Swap16 => "bswap16",
            UnaryOp::Swap32 => "bswap32",
            UnaryOp::Swap64 => "bswap64",
            UnaryOp::Sx32to64 => "sign_extend_32_to_64",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Ltu => "<#",
            BinaryOp::Geu => ">=#",
        })
    }
}

impl fmt::Display for IrUnaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {}", self.dst, self.op, self.val)
    }
}

impl fmt::Display for IrBinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {} {}", self.dst, self.x, self.op, self.y)
    }
}

impl fmt::Display for IrBitTestSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t.{}, s.{} = bts {}, {}", self.t, self.s, self.x, self.y)
    }
}

impl fmt::Display for IrCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.outs.is_empty() {
            write!(f, "{} = ", RegList(&self.outs))?;
        }
        write!(f, "{} {}", self.func().kind(), self.func())?;
        if let Some(rx) = self.receiver() {
            write!(f, ", {{{}, {}}}", rx.ty, rx.val)?;
        }
        write!(f, ", {{{}}}", RegList(&self.ins))
    }
}

impl fmt::Display for IrWriteBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "write_barrier({} -> *{})", self.val, self.mem)
    }
}

impl fmt::Display for IrBreakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("breakpoint")
    }
}

impl fmt::Display for IrNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrNode::Phi(n) => write!(f, "{}", n),
            IrNode::Switch(n) => write!(f, "{}", n),
            IrNode::Return(n) => write!(f, "{}", n),
            IrNode::Load(n) => write!(f, "{}", n),
            IrNode::Store(n) => write!(f, "{}", n),
            IrNode::LoadArg(n) => write!(f, "{}", n),
            IrNode::ConstInt(n) => write!(f, "{}", n),
            IrNode::ConstPtr(n) => write!(f, "{}", n),
            IrNode::Lea(n) => write!(f, "{}", n),
            IrNode::Unary(n) => write!(f, "{}", n),
            IrNode::Binary(n) => write!(f, "{}", n),
            IrNode::BitTestSet(n) => write!(f, "{}", n),
            IrNode::Call(n) => write!(f, "{}", n),
            IrNode::WriteBarrier(n) => write!(f, "{}", n),
            IrNode::Breakpoint(n) => write!(f, "{}", n),
        }
    }
}

/// Write `item` indented by four spaces, including continuation lines
fn write_indented(f: &mut fmt::Formatter<'_>, item: &dyn fmt::Display) -> fmt::Result {
    let mut text = String::new();
    write!(text, "{}", item)?;
    for line in text.lines() {
        writeln!(f, "    {}", line)?;
    }
    Ok(())
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {}:", self.id)?;
        for phi in &self.phi {
            write_indented(f, phi)?;
        }
        for node in &self.ins {
            write_indented(f, node)?;
        }
        match &self.term {
            Some(term) => write_indented(f, term),
            None => writeln!(f, "    ; unterminated"),
        }
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function @{} (entry: {}) {{", self.name, self.entry)?;
        for block in self.blocks() {
            write!(f, "{}", block)?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ArchReg;
    use crate::ir::{BlockId, CallHandle, IrReceiver};

    fn r(i: usize) -> Reg {
        Reg::norm(false, i)
    }

    fn p(i: usize) -> Reg {
        Reg::norm(true, i)
    }

    #[test]
    fn test_phi_format() {
        let phi = IrPhi::new(r(0), [(BlockId(3), r(3)), (BlockId(1), r(1)), (BlockId(2), r(2))]).unwrap();
        assert_eq!(phi.to_string(), "%r0 = φ(bb_1: %r1, bb_2: %r2, bb_3: %r3)");
    }

    #[test]
    fn test_switch_format() {
        let sw = IrSwitch::new(r(0), BlockId(2), [(1, BlockId(1))]).unwrap();
        assert_eq!(sw.to_string(), "switch %r0 {\n  1 => bb_1,\n  _ => bb_2,\n}");
        assert_eq!(IrSwitch::jump(BlockId(4)).to_string(), "goto bb_4");
        let empty = IrSwitch::new(r(0), BlockId(5), []).unwrap();
        assert_eq!(empty.to_string(), "goto bb_5");
    }

    #[test]
    fn test_return_format() {
        assert_eq!(IrReturn::new(vec![r(1), Reg::PN]).to_string(), "ret {%r1, nil}");
        assert_eq!(IrReturn::default().to_string(), "ret {}");
    }

    #[test]
    fn test_memory_formats() {
        assert_eq!(IrLoad::new(r(1), p(0), 4).unwrap().to_string(), "%r1 = load.u32 %p0");
        assert_eq!(IrLoad::new(p(1), p(0), 8).unwrap().to_string(), "%p1 = load.ptr %p0");
        assert_eq!(IrStore::new(r(1), p(0), 1).unwrap().to_string(), "store.u8(%r1 -> *%p0)");
        assert_eq!(IrStore::new(p(1), p(0), 8).unwrap().to_string(), "store.ptr(%p1 -> *%p0)");
        assert_eq!(IrLoadArg { dst: p(0), id: 2 }.to_string(), "%p0 = loadarg.ptr(#2)");
        assert_eq!(IrLoadArg { dst: r(0), id: 1 }.to_string(), "%r0 = loadarg.i64(#1)");
        assert_eq!(IrLea { dst: p(2), mem: p(0), off: r(1) }.to_string(), "%p2 = &(%p0)[%r1]");
    }

    #[test]
    fn test_const_formats() {
        assert_eq!(IrConstInt { dst: r(0), value: -7 }.to_string(), "%r0 = const.i64 -7");
        assert_eq!(IrConstPtr { dst: p(0), addr: 0xdead }.to_string(), "%p0 = const.ptr 0xdead");
    }

    #[test]
    fn test_expr_formats() {
        let neg = IrUnaryExpr { dst: r(1), val: r(0), op: UnaryOp::Sx32to64 };
        assert_eq!(neg.to_string(), "%r1 = sign_extend_32_to_64 %r0");
        let cmp = IrBinaryExpr { dst: r(2), x: r(0), y: r(1), op: BinaryOp::Geu };
        assert_eq!(cmp.to_string(), "%r2 = %r0 >=# %r1");
        assert_eq!(IrBinaryExpr::copy(r(1), r(0)).to_string(), "%r1 = %r0 + $0");
        let bts = IrBitTestSet { t: r(0), s: r(1), x: r(2), y: r(3) };
        assert_eq!(bts.to_string(), "t.%r0, s.%r1 = bts %r2, %r3");
    }

    #[test]
    fn test_call_formats() {
        let call = IrCall::new(CallHandle::native("memmove", 0x10), None, vec![p(0), p(1), r(2)], vec![]).unwrap();
        assert_eq!(call.to_string(), "ccall memmove, {%p0, %p1, %r2}");

        let rx = IrReceiver { ty: p(0), val: p(1) };
        let call = IrCall::new(CallHandle::dynamic("Marshal", 3), Some(rx), vec![r(2)], vec![p(4), r(5)]).unwrap();
        assert_eq!(call.to_string(), "%p4, %r5 = icall #3, {%p0, %p1}, {%r2}");
    }

    #[test]
    fn test_runtime_formats() {
        let wb = IrWriteBarrier { mem: p(0), val: p(1) };
        assert_eq!(wb.to_string(), "write_barrier(%p1 -> *%p0)");
        assert_eq!(IrBreakpoint.to_string(), "breakpoint");
    }

    #[test]
    fn test_register_kinds_in_nodes() {
        let rax = Reg::arch(false, ArchReg::Rax);
        let c = IrBinaryExpr::copy(rax, Reg::temp(false, 3));
        assert_eq!(c.to_string(), "%rax = %tr3 + $0");
    }

    #[test]
    fn test_function_dump() {
        let mut func = IrFunction::new("enc");
        let exit = func.add_block();
        let entry = func.entry;
        let bb = func.block_mut(entry).unwrap();
        bb.ins.push(IrConstInt { dst: r(0), value: 1 }.into());
        bb.set_terminator(IrSwitch::new(r(0), exit, [(1, exit)]).unwrap());
        func.block_mut(exit).unwrap().set_terminator(IrReturn::new(vec![r(0)]));

        let expected = "function @enc (entry: bb_0) {\n  bb_0:\n    %r0 = const.i64 1\n    switch %r0 {\n      1 => bb_1,\n      _ => bb_1,\n    }\n  bb_1:\n    ret {%r0}\n}\n";
        assert_eq!(func.to_string(), expected);
    }

    #[test]
    fn test_bad_arch_register_is_format_error() {
        use crate::ir::{BasicBlock, BlockId};
        use std::fmt::Write;

        let bad = Reg::arch(false, ArchReg::Rax).rename(40);
        let mut bb = BasicBlock::new(BlockId(0));
        bb.ins.push(IrBinaryExpr::copy(r(0), bad).into());
        bb.set_terminator(IrReturn::new(vec![r(0)]));

        let mut out = String::new();
        assert!(write!(out, "{}", bb).is_err());
    }
}
