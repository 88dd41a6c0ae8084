//! Call descriptors and the call node

use std::fmt;

use super::instr::{IrDefinitions, IrUsages};
use crate::error::{IrError, IrResult};
use crate::reg::Reg;

/// Calling convention of a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Native code at a static address
    Native,
    /// Host-runtime function following the managed convention
    Managed,
    /// Dispatch through a method-table slot of a receiver
    Dynamic,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallKind::Native => "ccall",
            CallKind::Managed => "gcall",
            CallKind::Dynamic => "icall",
        })
    }
}

/// Where a call lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// Entry address of a static function
    Address(u64),
    /// Method-table slot, resolved at run time against the receiver
    Slot(usize),
}

/// Descriptor of a callee: convention, debug name and target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallHandle {
    kind: CallKind,
    name: String,
    target: CallTarget,
}

impl CallHandle {
    /// Dynamic handles must name a slot; the others an address.
    pub fn new(kind: CallKind, name: impl Into<String>, target: CallTarget) -> IrResult<Self> {
        let name = name.into();
        let ok = matches!(
            (kind, target),
            (CallKind::Dynamic, CallTarget::Slot(_))
                | (CallKind::Native | CallKind::Managed, CallTarget::Address(_))
        );
        if !ok {
            return Err(IrError::InvalidCallTarget { kind, name });
        }
        Ok(CallHandle { kind, name, target })
    }

    /// Native callee at a static address
    pub fn native(name: impl Into<String>, addr: u64) -> Self {
        CallHandle {
            kind: CallKind::Native,
            name: name.into(),
            target: CallTarget::Address(addr),
        }
    }

    /// Host-runtime callee at a static address
    pub fn managed(name: impl Into<String>, addr: u64) -> Self {
        CallHandle {
            kind: CallKind::Managed,
            name: name.into(),
            target: CallTarget::Address(addr),
        }
    }

    /// Callee dispatched through a method table slot
    pub fn dynamic(name: impl Into<String>, slot: usize) -> Self {
        CallHandle {
            kind: CallKind::Dynamic,
            name: name.into(),
            target: CallTarget::Slot(slot),
        }
    }

    /// Calling convention
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Symbol name, used only for display
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address or slot
    pub fn target(&self) -> CallTarget {
        self.target
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            CallTarget::Slot(slot) => write!(f, "#{}", slot),
            CallTarget::Address(_) => f.write_str(&self.name),
        }
    }
}

/// Receiver of a dynamic call: its type word and data word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrReceiver {
    /// Type word
    pub ty: Reg,
    /// Data word
    pub val: Reg,
}

/// `outs... = call func [rx], ins...`
///
/// A receiver is present exactly when the callee is dynamic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrCall {
    func: CallHandle,
    rx: Option<IrReceiver>,
    /// Arguments
    pub ins: Vec<Reg>,
    /// Results
    pub outs: Vec<Reg>,
}

impl IrCall {
    /// Build a call, rejecting a receiver that does not match the callee kind
    pub fn new(func: CallHandle, rx: Option<IrReceiver>, ins: Vec<Reg>, outs: Vec<Reg>) -> IrResult<Self> {
        let call = IrCall { func, rx, ins, outs };
        call.validate()?;
        Ok(call)
    }

    /// Check the receiver invariant
    pub fn validate(&self) -> IrResult<()> {
        let kind = self.func.kind();
        if self.rx.is_some() != (kind == CallKind::Dynamic) {
            return Err(IrError::ReceiverMismatch {
                kind,
                present: self.rx.is_some(),
            });
        }
        Ok(())
    }

    /// Callee
    pub fn func(&self) -> &CallHandle {
        &self.func
    }

    /// Receiver, present only for dynamic calls
    pub fn receiver(&self) -> Option<&IrReceiver> {
        self.rx.as_ref()
    }

    /// Receiver, mutably
    pub fn receiver_mut(&mut self) -> Option<&mut IrReceiver> {
        self.rx.as_mut()
    }
}

impl IrUsages for IrCall {
    fn usages(&self) -> Vec<Reg> {
        let mut out = Vec::with_capacity(self.ins.len() + 2);
        if let Some(rx) = &self.rx {
            out.push(rx.ty);
            out.push(rx.val);
        }
        out.extend_from_slice(&self.ins);
        out
    }

    fn usages_mut(&mut self) -> Vec<&mut Reg> {
        let mut out = Vec::with_capacity(self.ins.len() + 2);
        if let Some(rx) = &mut self.rx {
            out.push(&mut rx.ty);
            out.push(&mut rx.val);
        }
        out.extend(self.ins.iter_mut());
        out
    }
}

impl IrDefinitions for IrCall {
    fn definitions(&self) -> Vec<Reg> {
        self.outs.clone()
    }

    fn definitions_mut(&mut self) -> Vec<&mut Reg> {
        self.outs.iter_mut().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(i: usize) -> Reg {
        Reg::norm(false, i)
    }

    fn p(i: usize) -> Reg {
        Reg::norm(true, i)
    }

    #[test]
    fn test_dynamic_requires_receiver() {
        let err = IrCall::new(CallHandle::dynamic("Marshal", 2), None, vec![], vec![]).unwrap_err();
        assert_eq!(
            err,
            IrError::ReceiverMismatch {
                kind: CallKind::Dynamic,
                present: false
            }
        );
        assert!(err.is_internal());
    }

    #[test]
    fn test_static_rejects_receiver() {
        let rx = IrReceiver { ty: p(0), val: p(1) };
        let err = IrCall::new(CallHandle::native("memmove", 0x1000), Some(rx), vec![], vec![]).unwrap_err();
        assert!(matches!(err, IrError::ReceiverMismatch { present: true, .. }));

        let err = IrCall::new(CallHandle::managed("growslice", 0x2000), Some(rx), vec![], vec![]).unwrap_err();
        assert!(matches!(err, IrError::ReceiverMismatch { kind: CallKind::Managed, .. }));
    }

    #[test]
    fn test_usage_order() {
        let rx = IrReceiver { ty: p(0), val: p(1) };
        let call = IrCall::new(CallHandle::dynamic("Marshal", 3), Some(rx), vec![r(2), p(3)], vec![r(4)]).unwrap();
        assert_eq!(call.usages(), vec![p(0), p(1), r(2), p(3)]);
        assert_eq!(call.definitions(), vec![r(4)]);

        let call = IrCall::new(CallHandle::native("f", 1), None, vec![r(2)], vec![]).unwrap();
        assert_eq!(call.usages(), vec![r(2)]);
        assert!(call.definitions().is_empty());
    }

    #[test]
    fn test_handle_target_validation() {
        assert!(CallHandle::new(CallKind::Dynamic, "m", CallTarget::Slot(0)).is_ok());
        assert!(matches!(
            CallHandle::new(CallKind::Dynamic, "m", CallTarget::Address(1)),
            Err(IrError::InvalidCallTarget { .. })
        ));
        assert!(matches!(
            CallHandle::new(CallKind::Native, "f", CallTarget::Slot(1)),
            Err(IrError::InvalidCallTarget { .. })
        ));
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(CallHandle::dynamic("Marshal", 5).to_string(), "#5");
        assert_eq!(CallHandle::native("memmove", 0x10).to_string(), "memmove");
    }
}
