//! Property tests for the register encoding
//!
//! Checks that packing round-trips and that the register transforms keep
//! the fields they promise to keep.

use frugal_ssa::reg::{Reg, RegKind};
use proptest::prelude::*;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

/// Kinds that carry an arbitrary index
fn slot_kind() -> impl Strategy<Value = u8> {
    prop_oneof![0u8..=7, Just(14u8), Just(15u8)]
}

fn index() -> impl Strategy<Value = usize> {
    prop_oneof![0usize..1024, 0usize..=Reg::MAX_INDEX]
}

fn slot_reg() -> impl Strategy<Value = Reg> {
    (any::<bool>(), slot_kind(), index()).prop_map(|(ptr, kind, idx)| match Reg::make(ptr, kind, idx) {
        Ok(reg) => reg,
        Err(e) => panic!("slot kinds always encode: {}", e),
    })
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_make_round_trips(ptr in any::<bool>(), kind in slot_kind(), idx in index()) {
        let reg = Reg::make(ptr, kind, idx).unwrap();
        prop_assert_eq!(reg.is_ptr(), ptr);
        prop_assert_eq!(reg.kind_bits(), kind);
        prop_assert_eq!(reg.index(), idx);
        prop_assert_eq!(reg.kind(), RegKind::from_bits(kind).unwrap());
    }

    #[test]
    fn prop_oversized_index_truncates(ptr in any::<bool>(), kind in slot_kind(), extra in 1usize..16) {
        let idx = (extra << 59) | 5;
        let reg = Reg::make(ptr, kind, idx).unwrap();
        prop_assert_eq!(reg.index(), 5);
        prop_assert_eq!(reg.kind_bits(), kind);
        prop_assert!(!Reg::fits_index(idx));
    }

    #[test]
    fn prop_unassigned_kinds_rejected(ptr in any::<bool>(), kind in 8u8..=11, idx in index()) {
        prop_assert!(Reg::make(ptr, kind, idx).is_err());
    }

    #[test]
    fn prop_rename_keeps_kind_and_flag(reg in slot_reg(), idx in index()) {
        let renamed = reg.rename(idx);
        prop_assert_eq!(renamed.kind(), reg.kind());
        prop_assert_eq!(renamed.is_ptr(), reg.is_ptr());
        prop_assert_eq!(renamed.index(), idx);
        prop_assert_eq!(renamed.rename(idx), renamed);
    }

    #[test]
    fn prop_normalize_forces_kind(reg in slot_reg(), idx in index()) {
        let norm = reg.normalize(idx);
        prop_assert!(norm.is_normalized());
        prop_assert_eq!(norm.kind(), RegKind::Norm);
        prop_assert_eq!(norm.is_ptr(), reg.is_ptr());
        prop_assert_eq!(norm.index(), idx);
        prop_assert_eq!(norm.normalize(idx), norm);
    }

    #[test]
    fn prop_zero_follows_pointer_flag(reg in slot_reg()) {
        let zero = reg.zero();
        prop_assert!(zero.is_zero());
        prop_assert_eq!(zero, if reg.is_ptr() { Reg::PN } else { Reg::RZ });
        prop_assert_eq!(zero.rename(42), zero);
    }

    #[test]
    fn prop_display_is_stable(reg in slot_reg()) {
        let text = reg.to_string();
        prop_assert!(text.starts_with('%'));
        prop_assert_eq!(text, reg.to_string());
    }
}
