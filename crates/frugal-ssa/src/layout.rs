//! Runtime type layouts
//!
//! The front-end describes every serializable type through an opaque
//! [`TypeToken`]. Recovering size, alignment and pointer layout for a token is
//! the job of the host runtime, which exposes it through [`TypeIntrospect`].
//! The IR only needs enough of that answer to size loads and stores and to
//! decide where write barriers go.

/// Opaque handle naming a runtime type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeToken(pub u64);

/// Coarse runtime kind of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Boolean
    Bool,
    /// Signed integer
    Int,
    /// Unsigned integer
    Uint,
    /// Floating point
    Float,
    /// Raw pointer
    Pointer,
    /// String header
    String,
    /// Slice header
    Slice,
    /// Map header
    Map,
    /// Aggregate
    Struct,
    /// Interface pair
    Interface,
}

/// Size, alignment and pointer layout of a runtime type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLayout {
    /// Size in bytes
    pub size: usize,
    /// Alignment in bytes
    pub align: usize,
    /// One bit per pointer-sized word, set when that word holds a pointer
    pub ptr_bitmap: Vec<u8>,
    /// Runtime kind
    pub kind: TypeKind,
}

/// Capability that resolves type tokens to layouts
pub trait TypeIntrospect {
    /// Layout of `ty`, or `None` if the runtime does not know the token
    fn layout(&self, ty: TypeToken) -> Option<TypeLayout>;
}

impl TypeLayout {
    /// Width of a pointer on the target, in bytes
    pub const PTR_SIZE: usize = 8;

    /// Layout of a scalar with no pointers
    pub fn scalar(kind: TypeKind, size: usize) -> Self {
        TypeLayout {
            size,
            align: size.max(1),
            ptr_bitmap: vec![],
            kind,
        }
    }

    /// Layout of a single pointer
    pub fn pointer() -> Self {
        TypeLayout {
            size: Self::PTR_SIZE,
            align: Self::PTR_SIZE,
            ptr_bitmap: vec![1],
            kind: TypeKind::Pointer,
        }
    }

    /// Whether word `i` of the value holds a pointer
    pub fn is_pointer_word(&self, i: usize) -> bool {
        self.ptr_bitmap
            .get(i / 8)
            .map(|byte| byte & (1 << (i % 8)) != 0)
            .unwrap_or(false)
    }

    /// Whether any word of the value holds a pointer
    pub fn has_pointers(&self) -> bool {
        self.ptr_bitmap.iter().any(|b| *b != 0)
    }

    /// Whether a store of this type needs a write barrier
    pub fn needs_write_barrier(&self) -> bool {
        self.has_pointers()
    }

    /// Size of a single load or store moving this type, if it can be moved
    /// in one access
    pub fn access_size(&self) -> Option<u8> {
        match self.kind {
            TypeKind::Pointer => Some(Self::PTR_SIZE as u8),
            TypeKind::Bool | TypeKind::Int | TypeKind::Uint | TypeKind::Float => match self.size {
                1 | 2 | 4 | 8 => Some(self.size as u8),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_access_sizes() {
        assert_eq!(TypeLayout::scalar(TypeKind::Bool, 1).access_size(), Some(1));
        assert_eq!(TypeLayout::scalar(TypeKind::Int, 2).access_size(), Some(2));
        assert_eq!(TypeLayout::scalar(TypeKind::Float, 8).access_size(), Some(8));
        assert_eq!(TypeLayout::scalar(TypeKind::Int, 16).access_size(), None);
        assert_eq!(TypeLayout::pointer().access_size(), Some(8));
    }

    #[test]
    fn test_aggregates_have_no_access_size() {
        let s = TypeLayout {
            size: 24,
            align: 8,
            ptr_bitmap: vec![0b001],
            kind: TypeKind::Slice,
        };
        assert_eq!(s.access_size(), None);
        assert!(s.is_pointer_word(0));
        assert!(!s.is_pointer_word(1));
        assert!(!s.is_pointer_word(64));
        assert!(s.needs_write_barrier());
    }

    #[test]
    fn test_scalars_need_no_barrier() {
        assert!(!TypeLayout::scalar(TypeKind::Uint, 4).needs_write_barrier());
        assert!(TypeLayout::pointer().needs_write_barrier());
    }
}
