//! Host-owned inference buffers and scoped pins.
//!
//! Inputs are flat, contiguous, type-erased byte blocks tagged with a
//! [`DataType`]; outputs are bridge-allocated score/index regions. Both are
//! supplied fresh per predict call and never retained across calls.
//!
//! A pin is the bridge's guarantee that a directly-addressable view of a
//! buffer stays valid and stable for one marshalling iteration. Guards
//! acquire on construction and release on drop, so release happens on
//! every exit path; the acquire/release balance is observable through
//! `active_pins()`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::{DataType, DatasetAttributes, Dim, SparseEncoding};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u32 {}
    impl Sealed for i32 {}
    impl Sealed for u64 {}
    impl Sealed for i64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for u8 {}
    impl Sealed for i8 {}
}

/// Element types a [`DenseDataset`] can be built from.
pub trait Element: sealed::Sealed + Copy {
    const DATA_TYPE: DataType;
    fn append_ne_bytes(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($ty:ty, $tag:expr) => {
        impl Element for $ty {
            const DATA_TYPE: DataType = $tag;
            fn append_ne_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_ne_bytes());
            }
        }
    };
}

impl_element!(u32, DataType::UInt);
impl_element!(i32, DataType::Int);
impl_element!(u64, DataType::LLUInt);
impl_element!(i64, DataType::LLInt);
impl_element!(f32, DataType::Float);
impl_element!(f64, DataType::Double);
impl_element!(u8, DataType::UChar);
impl_element!(i8, DataType::Char);

/// Decrements a pin counter when dropped.
struct PinToken {
    pins: Arc<AtomicUsize>,
}

impl PinToken {
    fn acquire(pins: &Arc<AtomicUsize>) -> Self {
        pins.fetch_add(1, Ordering::SeqCst);
        Self { pins: Arc::clone(pins) }
    }
}

impl Drop for PinToken {
    fn drop(&mut self) {
        self.pins.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared view of a buffer's pin counter, independent of the buffer's
/// borrow state. Lets a caller observe acquire/release balance while a
/// pin guard is live.
#[derive(Clone)]
pub struct PinTracker {
    pins: Arc<AtomicUsize>,
}

impl PinTracker {
    pub fn active(&self) -> usize {
        self.pins.load(Ordering::SeqCst)
    }
}

/// Scoped read-only view of an input's backing bytes.
pub struct InputPin<'a> {
    data: &'a [u8],
    _token: PinToken,
}

impl InputPin<'_> {
    pub fn bytes(&self) -> &[u8] {
        self.data
    }
}

/// Scoped read-only view of a sparse start array.
pub struct SparseStartPin<'a> {
    start: &'a [u64],
    _token: PinToken,
}

impl SparseStartPin<'_> {
    pub fn len(&self) -> usize {
        self.start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty()
    }
}

/// One named input dataset: a flat byte block plus its type tag, shape,
/// attribute word, and optional sparse encoding.
pub struct DenseDataset {
    name: String,
    dim: Dim,
    data_type: DataType,
    attributes: DatasetAttributes,
    data: Vec<u8>,
    sparse: Option<SparseEncoding>,
    pins: Arc<AtomicUsize>,
}

impl DenseDataset {
    /// Builds a dataset from typed elements. The slice length must match
    /// the shape's total element count.
    pub fn from_slice<T: Element>(name: impl Into<String>, dim: Dim, elements: &[T]) -> Self {
        assert_eq!(
            elements.len(),
            dim.element_count(),
            "element count does not match dataset shape"
        );
        let mut data = Vec::with_capacity(elements.len() * T::DATA_TYPE.size_bytes());
        for &e in elements {
            e.append_ne_bytes(&mut data);
        }
        Self {
            name: name.into(),
            dim,
            data_type: T::DATA_TYPE,
            attributes: DatasetAttributes::empty(),
            data,
            sparse: None,
            pins: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_attributes(mut self, attributes: DatasetAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_sparse(mut self, sparse: SparseEncoding) -> Self {
        self.attributes |= DatasetAttributes::SPARSE;
        self.sparse = Some(sparse);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn attributes(&self) -> DatasetAttributes {
        self.attributes
    }

    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }

    /// Pins the backing bytes for one marshalling iteration.
    pub fn pin(&self) -> InputPin<'_> {
        InputPin {
            data: &self.data,
            _token: PinToken::acquire(&self.pins),
        }
    }

    /// Pins the sparse start array, when the dataset carries one.
    pub fn pin_sparse_start(&self) -> Option<SparseStartPin<'_>> {
        self.sparse.as_ref().map(|sparse| SparseStartPin {
            start: &sparse.start,
            _token: PinToken::acquire(&self.pins),
        })
    }

    /// Number of currently live pins. Zero outside a predict call.
    pub fn active_pins(&self) -> usize {
        self.pins.load(Ordering::SeqCst)
    }

    pub fn pin_tracker(&self) -> PinTracker {
        PinTracker {
            pins: Arc::clone(&self.pins),
        }
    }
}

/// Scoped writable view of an output's score and index regions.
pub struct OutputPin<'a> {
    scores: &'a mut [f32],
    indexes: &'a mut [i64],
    _token: PinToken,
}

impl OutputPin<'_> {
    pub fn scores(&mut self) -> &mut [f32] {
        self.scores
    }

    pub fn indexes(&mut self) -> &mut [i64] {
        self.indexes
    }
}

/// Output of one prediction: per-example scores and the ranked indexes
/// the engine returns alongside them. Both regions are allocated by the
/// bridge, one slot per element.
pub struct OutputDataset {
    dim: Dim,
    scores: Vec<f32>,
    indexes: Vec<i64>,
    pins: Arc<AtomicUsize>,
}

impl OutputDataset {
    pub fn new(dim: Dim) -> Self {
        let n = dim.element_count();
        Self {
            dim,
            scores: vec![0.0; n],
            indexes: vec![0; n],
            pins: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn indexes(&self) -> &[i64] {
        &self.indexes
    }

    /// Pins both output regions for one marshalling iteration.
    pub fn pin(&mut self) -> OutputPin<'_> {
        let token = PinToken::acquire(&self.pins);
        OutputPin {
            scores: &mut self.scores,
            indexes: &mut self.indexes,
            _token: token,
        }
    }

    /// Number of currently live pins. Zero outside a predict call.
    pub fn active_pins(&self) -> usize {
        self.pins.load(Ordering::SeqCst)
    }

    pub fn pin_tracker(&self) -> PinTracker {
        PinTracker {
            pins: Arc::clone(&self.pins),
        }
    }
}
