use bytemuck::{Pod, Zeroable};

/// Newtype for a marker, the atomic unit that vertices are made of.
/// Marker IDs are dense and never change.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable,
)]
#[repr(transparent)]
pub struct MarkerId(pub u64);

/// Newtype for a marker graph vertex.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable,
)]
#[repr(transparent)]
pub struct VertexId(pub u64);

/// Newtype for a marker graph edge.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable,
)]
#[repr(transparent)]
pub struct EdgeId(pub u64);

/// Identifies a traversal, i.e. an oriented read, that visits a
/// sequence of vertices.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TraversalId(pub u64);

macro_rules! impl_id_newtype {
    ($for:ty) => {
        impl $for {
            pub const INVALID: Self = Self(std::u64::MAX);

            #[inline]
            pub fn is_invalid(&self) -> bool {
                *self == Self::INVALID
            }
        }

        impl std::fmt::Display for $for {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $for {
            #[inline]
            fn from(num: u64) -> Self {
                Self(num)
            }
        }

        impl From<usize> for $for {
            #[inline]
            fn from(num: usize) -> Self {
                Self(num as u64)
            }
        }

        impl From<$for> for u64 {
            #[inline]
            fn from(id: $for) -> Self {
                id.0
            }
        }

        impl From<$for> for usize {
            #[inline]
            fn from(id: $for) -> Self {
                id.0 as usize
            }
        }
    };
}

impl_id_newtype!(MarkerId);
impl_id_newtype!(VertexId);
impl_id_newtype!(EdgeId);
impl_id_newtype!(TraversalId);

/// A vertex ID packed into 40 bits, stored as 5 little-endian bytes
/// so that the vertex table and the edge records stay small.
///
/// The all-ones value is reserved as
/// [`INVALID`](CompressedVertexId::INVALID), so the largest vertex ID
/// that can be compressed is `2^40 - 2`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct CompressedVertexId([u8; 5]);

impl CompressedVertexId {
    pub const BITS: u32 = 40;

    pub const INVALID: Self = Self([0xFF; 5]);

    const MAX_VALUE: u64 = (1 << Self::BITS) - 1;

    /// Packs a vertex ID into 40 bits. Panics if the value does not
    /// fit, or collides with the sentinel.
    #[inline]
    pub fn new(value: u64) -> Self {
        assert!(
            value < Self::MAX_VALUE,
            "vertex ID {} does not fit in a compressed vertex ID",
            value
        );
        let bytes = value.to_le_bytes();
        Self([bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]])
    }

    #[inline]
    pub fn get(self) -> u64 {
        let b = self.0;
        let mut bytes = [0u8; 8];
        bytes[..5].copy_from_slice(&b);
        u64::from_le_bytes(bytes)
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }

    /// Unpacks into a `VertexId`, or `None` for the sentinel.
    #[inline]
    pub fn vertex_id(self) -> Option<VertexId> {
        if self.is_invalid() {
            None
        } else {
            Some(VertexId(self.get()))
        }
    }
}

impl Default for CompressedVertexId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Debug for CompressedVertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_invalid() {
            write!(f, "CompressedVertexId(INVALID)")
        } else {
            write!(f, "CompressedVertexId({})", self.get())
        }
    }
}

impl From<VertexId> for CompressedVertexId {
    /// The invalid `VertexId` maps to the invalid compressed ID;
    /// anything else must fit in 40 bits.
    #[inline]
    fn from(id: VertexId) -> Self {
        if id.is_invalid() {
            Self::INVALID
        } else {
            Self::new(id.0)
        }
    }
}

impl From<CompressedVertexId> for VertexId {
    #[inline]
    fn from(id: CompressedVertexId) -> Self {
        id.vertex_id().unwrap_or(VertexId::INVALID)
    }
}

/// An ID that can be used as the key of a
/// [`MappedVecOfVecs`](crate::mapped::MappedVecOfVecs), i.e. converted
/// to and from a dense 0-based index.
pub trait RecordKey: Copy {
    fn from_index(ix: usize) -> Self;

    fn to_index(self) -> usize;
}

impl RecordKey for usize {
    #[inline]
    fn from_index(ix: usize) -> Self {
        ix
    }

    #[inline]
    fn to_index(self) -> usize {
        self
    }
}

impl RecordKey for u64 {
    #[inline]
    fn from_index(ix: usize) -> Self {
        ix as u64
    }

    #[inline]
    fn to_index(self) -> usize {
        self as usize
    }
}

impl RecordKey for VertexId {
    #[inline]
    fn from_index(ix: usize) -> Self {
        VertexId(ix as u64)
    }

    #[inline]
    fn to_index(self) -> usize {
        self.0 as usize
    }
}

impl RecordKey for CompressedVertexId {
    #[inline]
    fn from_index(ix: usize) -> Self {
        CompressedVertexId::new(ix as u64)
    }

    #[inline]
    fn to_index(self) -> usize {
        assert!(!self.is_invalid(), "used the invalid vertex ID as a key");
        self.get() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quickcheck::quickcheck;

    quickcheck! {
        fn prop_compressed_isomorphism(value: u64) -> bool {
            let value = value % CompressedVertexId::MAX_VALUE;
            let id = CompressedVertexId::new(value);
            id.get() == value && VertexId::from(id) == VertexId(value)
        }
    }

    #[test]
    fn compressed_sentinel() {
        let invalid = CompressedVertexId::INVALID;
        assert!(invalid.is_invalid());
        assert_eq!(invalid.get(), (1 << 40) - 1);
        assert_eq!(invalid.vertex_id(), None);
        assert_eq!(VertexId::from(invalid), VertexId::INVALID);
        assert_eq!(CompressedVertexId::from(VertexId::INVALID), invalid);
        assert_eq!(CompressedVertexId::default(), invalid);
    }

    #[test]
    fn compressed_is_five_bytes() {
        assert_eq!(std::mem::size_of::<CompressedVertexId>(), 5);
        assert_eq!(std::mem::align_of::<CompressedVertexId>(), 1);
    }

    #[test]
    #[should_panic]
    fn compressed_overflow_panics() {
        CompressedVertexId::new(1 << 40);
    }

    #[test]
    #[should_panic]
    fn compressed_sentinel_value_panics() {
        CompressedVertexId::new((1 << 40) - 1);
    }
}
