//! Host-side object model: layer and dataset metadata records.
//!
//! These are the typed counterparts of the engine's internal descriptors.
//! Kind and data-type tags are closed enumerations with explicit ordinal
//! mappings; an ordinal outside the enumeration is always an explicit
//! failure, never a silent default. Attribute words are bitmasks carried
//! through the boundary verbatim.

use std::path::PathBuf;

use bitflags::bitflags;

use crate::error::{BridgeError, Result};

/// Classification of a network layer, matching the engine's kind ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LayerKind {
    Input = 0,
    Output = 1,
    Hidden = 2,
    Target = 3,
}

impl LayerKind {
    /// Maps an engine kind ordinal back into the closed enumeration.
    pub fn from_ordinal(ordinal: u32) -> Result<Self> {
        match ordinal {
            0 => Ok(LayerKind::Input),
            1 => Ok(LayerKind::Output),
            2 => Ok(LayerKind::Hidden),
            3 => Ok(LayerKind::Target),
            other => Err(BridgeError::Engine(format!(
                "unknown layer kind ordinal {other}"
            ))),
        }
    }

    pub fn ordinal(self) -> u32 {
        self as u32
    }
}

/// Element type of a dataset, matching the engine's data-type ordinals.
///
/// The enumeration covers the engine's full public data-type table; the
/// inference marshaller converts only a subset of it (see
/// [`DataType::conversion_supported`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataType {
    UInt = 0,
    Int = 1,
    LLUInt = 2,
    LLInt = 3,
    Float = 4,
    Double = 5,
    RGB8 = 6,
    RGB16 = 7,
    UChar = 8,
    Char = 9,
}

impl DataType {
    /// Maps a data-type ordinal back into the closed enumeration.
    pub fn from_ordinal(ordinal: u32) -> Result<Self> {
        match ordinal {
            0 => Ok(DataType::UInt),
            1 => Ok(DataType::Int),
            2 => Ok(DataType::LLUInt),
            3 => Ok(DataType::LLInt),
            4 => Ok(DataType::Float),
            5 => Ok(DataType::Double),
            6 => Ok(DataType::RGB8),
            7 => Ok(DataType::RGB16),
            8 => Ok(DataType::UChar),
            9 => Ok(DataType::Char),
            other => Err(BridgeError::UnsupportedDataType(other)),
        }
    }

    pub fn ordinal(self) -> u32 {
        self as u32
    }

    /// Size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DataType::UInt => 4,
            DataType::Int => 4,
            DataType::LLUInt => 8,
            DataType::LLInt => 8,
            DataType::Float => 4,
            DataType::Double => 8,
            DataType::RGB8 => 3,
            DataType::RGB16 => 6,
            DataType::UChar => 1,
            DataType::Char => 1,
        }
    }

    /// Whether the inference marshaller defines a score conversion for
    /// this tag. Tags outside this set fail `UnsupportedDataType` at
    /// predict time.
    pub fn conversion_supported(self) -> bool {
        matches!(
            self,
            DataType::Int | DataType::LLInt | DataType::Float | DataType::Double | DataType::Char
        )
    }
}

bitflags! {
    /// Layer attribute word, copied through from the engine unmodified.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayerAttributes: u32 {
        const SPARSE = 0x1;
        const DENOISING = 0x2;
        const BATCH_NORMALIZATION = 0x4;
    }
}

bitflags! {
    /// Dataset attribute word, forwarded to the engine unmodified.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DatasetAttributes: u32 {
        const SPARSE = 0x1;
        const BOOLEAN = 0x2;
        const COMPRESSED = 0x4;
        const RECURRENT = 0x8;
        const MUTABLE = 0x10;
        const SPARSE_IGNORE_ZERO = 0x20;
        const INDEXED = 0x40;
        const WEIGHTED = 0x80;
    }
}

/// Shape of one dataset: three spatial dimensions plus the example count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dim {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub examples: u32,
}

impl Dim {
    pub fn new(x: u32, y: u32, z: u32, examples: u32) -> Self {
        Self { x, y, z, examples }
    }

    /// Total number of elements across all examples.
    pub fn element_count(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize * self.examples as usize
    }
}

/// Host-side copy of one engine layer descriptor.
///
/// Produced by layer introspection; read-only to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub name: String,
    pub dataset_name: String,
    pub kind: LayerKind,
    pub attributes: LayerAttributes,
    pub num_dimensions: u32,
    pub dim_x: u32,
    pub dim_y: u32,
    pub dim_z: u32,
    pub dim_w: u32,
}

/// Per-example sparse row encoding over a flat index array.
///
/// `start[i]..end[i]` delimits example `i`'s slice of `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseEncoding {
    pub start: Vec<u64>,
    pub end: Vec<u64>,
    pub index: Vec<u64>,
}

impl SparseEncoding {
    /// Checks the structural invariants: one (start, end) pair per example,
    /// `start[i] <= end[i]`, nondecreasing across examples, and an index
    /// array long enough to back the last row.
    pub fn validate(&self) -> Result<()> {
        if self.start.len() != self.end.len() {
            return Err(BridgeError::InvalidDescriptor(format!(
                "sparse start has {} entries but end has {}",
                self.start.len(),
                self.end.len()
            )));
        }
        let mut prev_end = 0u64;
        for (i, (&s, &e)) in self.start.iter().zip(&self.end).enumerate() {
            if s > e {
                return Err(BridgeError::InvalidDescriptor(format!(
                    "sparse row {i} has start {s} > end {e}"
                )));
            }
            if s < prev_end {
                return Err(BridgeError::InvalidDescriptor(format!(
                    "sparse row {i} starts at {s}, before previous row end {prev_end}"
                )));
            }
            prev_end = e;
        }
        if (self.index.len() as u64) < prev_end {
            return Err(BridgeError::InvalidDescriptor(format!(
                "sparse index array has {} entries, rows reference up to {prev_end}",
                self.index.len()
            )));
        }
        Ok(())
    }
}

/// One dataset registration record.
///
/// A single sequence of these replaces the index-aligned parallel arrays of
/// the engine's registration call, making the equal-length invariant
/// impossible to violate once records are built. Columnar callers go
/// through [`DatasetDescriptor::from_parallel_arrays`], which enforces the
/// invariant before any record exists.
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    pub name: String,
    pub attributes: DatasetAttributes,
    pub data_type: DataType,
    pub dim: Dim,
    pub sparse: Option<SparseEncoding>,
}

impl DatasetDescriptor {
    pub fn new(name: impl Into<String>, attributes: DatasetAttributes, data_type: DataType, dim: Dim) -> Self {
        Self {
            name: name.into(),
            attributes,
            data_type,
            dim,
            sparse: None,
        }
    }

    pub fn with_sparse(mut self, sparse: SparseEncoding) -> Self {
        self.attributes |= DatasetAttributes::SPARSE;
        self.sparse = Some(sparse);
        self
    }

    /// Builds records from index-aligned parallel arrays.
    ///
    /// Every array must have the same length as `names`; index `i` across
    /// all arrays describes the same dataset. Any divergence fails with
    /// `ArrayLengthMismatch` naming the divergent field, before a single
    /// record is built. Data types arrive as raw ordinals and are mapped
    /// through the closed enumeration.
    pub fn from_parallel_arrays(
        names: &[&str],
        attributes: &[u32],
        data_types: &[u32],
        dim_xs: &[u32],
        dim_ys: &[u32],
        dim_zs: &[u32],
        examples: &[u32],
    ) -> Result<Vec<Self>> {
        let expected = names.len();
        let check = |field: &'static str, actual: usize| -> Result<()> {
            if actual != expected {
                return Err(BridgeError::ArrayLengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
            Ok(())
        };
        check("attributes", attributes.len())?;
        check("dataTypes", data_types.len())?;
        check("dimXs", dim_xs.len())?;
        check("dimYs", dim_ys.len())?;
        check("dimZs", dim_zs.len())?;
        check("examples", examples.len())?;

        let mut descriptors = Vec::with_capacity(expected);
        for i in 0..expected {
            descriptors.push(DatasetDescriptor {
                name: names[i].to_owned(),
                attributes: DatasetAttributes::from_bits_retain(attributes[i]),
                data_type: DataType::from_ordinal(data_types[i])?,
                dim: Dim::new(dim_xs[i], dim_ys[i], dim_zs[i], examples[i]),
                sparse: None,
            });
        }
        Ok(descriptors)
    }
}

/// Host-side record describing which network to load and how to size it.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Path to the pretrained network file.
    pub network_file_path: PathBuf,
    /// Batch size the loaded network is dimensioned for.
    pub batch_size: u32,
}

impl NetworkConfig {
    pub fn new(network_file_path: impl Into<PathBuf>, batch_size: u32) -> Self {
        Self {
            network_file_path: network_file_path.into(),
            batch_size,
        }
    }
}
