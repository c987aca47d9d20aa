//! nnbridge: Rust bridge to a native GPU neural-network inference engine.
//!
//! The engine ships as a shared library (`libnnengine.so`, overridable via
//! `NNENGINE_LIBRARY`) whose entry points are resolved exactly once into a
//! process-wide symbol table. This crate is strictly the boundary layer
//! between typed host records and the engine's flat, type-erased buffers:
//!
//! - Context lifecycle (load a pretrained network, shutdown,
//!   generation-checked handles)
//! - Layer introspection (host copies of engine layer descriptors)
//! - Dataset registration (structured records bound to the network)
//! - Batch prediction (scoped buffer pins, type-tagged score conversion)
//!
//! Every call is synchronous and blocks until the engine returns. The
//! bridge performs no internal threading; callers order operations per
//! handle (`load` first, `register_datasets` before `predict` for any
//! dataset referenced by name, `shutdown` last) and serialize concurrent
//! access to a handle externally.

pub mod context;
mod convert;
pub mod data;
pub mod datasets;
pub mod error;
pub mod layers;
pub mod predict;
pub mod registry;
pub mod symbols;
pub mod types;

#[cfg(test)]
mod stub;

pub use context::{load, shutdown, Network};
pub use data::{DenseDataset, Element, InputPin, OutputDataset, OutputPin, PinTracker, SparseStartPin};
pub use datasets::register_datasets;
pub use error::{BridgeError, Result};
pub use layers::get_layers;
pub use predict::predict;
pub use registry::ContextHandle;
pub use symbols::{unload, ENGINE_LIBRARY_DEFAULT, ENGINE_LIBRARY_ENV};
pub use types::{
    DataType, DatasetAttributes, DatasetDescriptor, Dim, LayerAttributes, LayerDescriptor,
    LayerKind, NetworkConfig, SparseEncoding,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub;

    // Full control flow: load, introspect, register, predict, shutdown.
    #[test]
    fn end_to_end_identity_prediction() {
        let _lock = stub::setup();

        let network = Network::load(&NetworkConfig::new("/models/movielens.nc", 2)).unwrap();
        let input_layer = &network.input_layers()[0];
        assert_eq!(input_layer.dataset_name, "input_data");

        let dim = Dim::new(input_layer.dim_x, 1, 1, 2);
        network
            .register_datasets(&[DatasetDescriptor::new(
                "input_data",
                DatasetAttributes::empty(),
                DataType::Int,
                dim,
            )])
            .unwrap();

        let inputs = [DenseDataset::from_slice(
            "input_data",
            dim,
            &[1i32, 2, 3, 4, 5, 6, 7, 8],
        )];
        let mut outputs = [OutputDataset::new(dim)];
        network.predict(4, &inputs, &mut outputs).unwrap();

        assert_eq!(outputs[0].scores(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);

        network.shutdown().unwrap();
    }
}
