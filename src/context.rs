//! Context lifecycle: engine startup, network load, handle validation,
//! shutdown.
//!
//! `load` is the only entry point that initializes the engine; every other
//! operation validates its handle first and fails with `InvalidHandle`
//! until a `load` has succeeded. The engine instance is process-wide:
//! repeated loads reinitialize the same singleton runtime (engine-owned
//! behavior), each returning a fresh handle.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::data::{DenseDataset, OutputDataset};
use crate::error::{BridgeError, Result};
use crate::registry::{self, ContextHandle};
use crate::symbols::{self, NativeNetwork};
use crate::types::{DatasetDescriptor, LayerDescriptor, LayerKind, NetworkConfig};

/// Deterministic seed fixed at engine startup.
const RANDOM_SEED: u64 = 12134;

/// Faux process name handed to the engine's runtime startup.
const FAUX_PROCESS: &CStr = c"nnbridge-faux-process";

/// Starts the engine runtime, fixes the deterministic seed, loads a
/// pretrained network sized for the configured batch, and returns a
/// handle to the bound context.
pub fn load(config: &NetworkConfig) -> Result<ContextHandle> {
    let api = symbols::ensure_loaded()?;

    let path = config.network_file_path.to_str().ok_or_else(|| {
        BridgeError::InvalidDescriptor(format!(
            "network file path is not valid UTF-8: {:?}",
            config.network_file_path
        ))
    })?;
    let c_path = CString::new(path)
        .map_err(|_| BridgeError::InvalidDescriptor("network file path contains NUL".into()))?;

    tracing::info!(path, batch_size = config.batch_size, "loading network");

    let mut argv = [FAUX_PROCESS.as_ptr() as *mut c_char, std::ptr::null_mut()];
    unsafe {
        (api.startup)(1, argv.as_mut_ptr());
        (api.set_random_seed)(RANDOM_SEED);
    }

    let network = unsafe { (api.load_network)(c_path.as_ptr(), config.batch_size) };
    if network.is_null() {
        return Err(BridgeError::Engine(format!(
            "failed to load network from {path}"
        )));
    }

    registry::insert(network)
}

/// Validates a handle and releases the engine context it names.
///
/// After shutdown the handle is invalid for all further operations.
pub fn shutdown(handle: ContextHandle) -> Result<()> {
    let api = symbols::api()?;
    let network = registry::remove(handle)?;
    unsafe { (api.shutdown_network)(network) };
    tracing::info!("engine context released");
    Ok(())
}

/// Resolves a handle to the engine's network pointer.
///
/// Every public operation calls this before touching the engine.
pub(crate) fn check_handle(handle: ContextHandle) -> Result<*mut NativeNetwork> {
    registry::resolve(handle)
}

/// A loaded network together with its input and output layer metadata.
///
/// Convenience wrapper over the raw handle operations: loading queries
/// both layer sets up front, so a network with no input or no output
/// layers fails at load time with `LayerNotFound` rather than at first
/// predict.
pub struct Network {
    handle: ContextHandle,
    input_layers: Vec<LayerDescriptor>,
    output_layers: Vec<LayerDescriptor>,
}

impl Network {
    pub fn load(config: &NetworkConfig) -> Result<Self> {
        let handle = load(config)?;
        let layers = crate::layers::get_layers(handle, LayerKind::Input)
            .and_then(|input| {
                crate::layers::get_layers(handle, LayerKind::Output)
                    .map(|output| (input, output))
            });
        match layers {
            Ok((input_layers, output_layers)) => Ok(Self {
                handle,
                input_layers,
                output_layers,
            }),
            Err(err) => {
                // Don't leak the context when layer introspection fails.
                let _ = shutdown(handle);
                Err(err)
            }
        }
    }

    pub fn handle(&self) -> ContextHandle {
        self.handle
    }

    pub fn input_layers(&self) -> &[LayerDescriptor] {
        &self.input_layers
    }

    pub fn output_layers(&self) -> &[LayerDescriptor] {
        &self.output_layers
    }

    pub fn register_datasets(&self, descriptors: &[DatasetDescriptor]) -> Result<()> {
        crate::datasets::register_datasets(self.handle, descriptors)
    }

    pub fn predict(
        &self,
        k: u32,
        inputs: &[DenseDataset],
        outputs: &mut [OutputDataset],
    ) -> Result<()> {
        crate::predict::predict(self.handle, k, inputs, outputs)
    }

    pub fn shutdown(self) -> Result<()> {
        shutdown(self.handle)
    }
}
