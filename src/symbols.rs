//! Engine symbol registry: one-time resolution of every engine entry point.
//!
//! The engine ships as a native shared library. All cross-boundary callables
//! are resolved exactly once, at first `load()`, into a process-wide
//! [`EngineApi`] table; no other module resolves symbols. The table is never
//! mutated after initialization and is released by [`unload`].
//!
//! Before any symbol is resolved, the engine's parallel runtime
//! (`libmpi.so`) is loaded into the *global* linkage namespace. Shared
//! libraries opened by the bridge land in a local namespace, but the
//! runtime's symbols must be visible process-wide; if that load fails the
//! process terminates, there is no degraded mode.

use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use libloading::{Library, Symbol};

use crate::error::{BridgeError, Result};

/// Environment variable overriding the engine library location.
pub const ENGINE_LIBRARY_ENV: &str = "NNENGINE_LIBRARY";

/// Default engine library name, resolved through the loader search path.
pub const ENGINE_LIBRARY_DEFAULT: &str = "libnnengine.so";

#[cfg(target_os = "linux")]
const PARALLEL_RUNTIME_SO: &[u8] = b"libmpi.so\0";

/// Opaque engine network instance. Only ever handled by pointer.
#[repr(C)]
pub struct NativeNetwork {
    _private: [u8; 0],
}

/// Opaque engine layer descriptor. Only ever handled by pointer.
#[repr(C)]
pub struct NativeLayer {
    _private: [u8; 0],
}

pub type StartupFn = unsafe extern "C" fn(c_int, *mut *mut c_char);
pub type SetRandomSeedFn = unsafe extern "C" fn(u64);
pub type LoadNetworkFn = unsafe extern "C" fn(*const c_char, u32) -> *mut NativeNetwork;
pub type ShutdownNetworkFn = unsafe extern "C" fn(*mut NativeNetwork);
pub type NetworkNameFn = unsafe extern "C" fn(*const NativeNetwork) -> *const c_char;
pub type NetworkBatchFn = unsafe extern "C" fn(*const NativeNetwork) -> u32;
pub type LayerCountFn = unsafe extern "C" fn(*const NativeNetwork, u32) -> u32;
pub type LayerAtFn = unsafe extern "C" fn(*const NativeNetwork, u32, u32) -> *const NativeLayer;
pub type LayerStrFn = unsafe extern "C" fn(*const NativeLayer) -> *const c_char;
pub type LayerWordFn = unsafe extern "C" fn(*const NativeLayer) -> u32;
pub type LayerDimensionsFn =
    unsafe extern "C" fn(*const NativeLayer, *mut u32, *mut u32, *mut u32, *mut u32);
pub type DefineDatasetFn =
    unsafe extern "C" fn(*mut NativeNetwork, *const c_char, u32, u32, u32, u32, u32, u32) -> c_int;
pub type PredictFn = unsafe extern "C" fn(*mut NativeNetwork, u32, *mut f32, u64, *mut i64) -> c_int;

/// Resolved engine entry points, keyed by field instead of by name lookup.
///
/// Holding the [`Library`] keeps every pointer valid for the table's
/// lifetime.
pub(crate) struct EngineApi {
    pub startup: StartupFn,
    pub set_random_seed: SetRandomSeedFn,
    pub load_network: LoadNetworkFn,
    pub shutdown_network: ShutdownNetworkFn,
    pub network_name: NetworkNameFn,
    pub network_batch: NetworkBatchFn,
    pub layer_count: LayerCountFn,
    pub layer_at: LayerAtFn,
    pub layer_name: LayerStrFn,
    pub layer_dataset_name: LayerStrFn,
    pub layer_kind: LayerWordFn,
    pub layer_attributes: LayerWordFn,
    pub layer_num_dimensions: LayerWordFn,
    pub layer_dimensions: LayerDimensionsFn,
    pub define_dataset: DefineDatasetFn,
    pub predict: PredictFn,
    _library: Option<Library>,
}

/// Process-wide symbol table, populated once by [`ensure_loaded`].
static SYMBOLS: Mutex<Option<Arc<EngineApi>>> = Mutex::new(None);

/// Returns the resolved symbol table.
///
/// Fails with `InvalidHandle` before initialization: no table means no
/// engine, which means `load()` has not succeeded yet.
pub(crate) fn api() -> Result<Arc<EngineApi>> {
    let guard = SYMBOLS.lock().expect("symbol table mutex poisoned");
    guard.as_ref().cloned().ok_or(BridgeError::InvalidHandle)
}

/// Initializes the symbol table on first use; later calls are no-ops.
///
/// The engine library path comes from `NNENGINE_LIBRARY`, falling back to
/// `libnnengine.so` on the loader search path.
pub(crate) fn ensure_loaded() -> Result<Arc<EngineApi>> {
    let mut guard = SYMBOLS.lock().expect("symbol table mutex poisoned");
    if let Some(api) = guard.as_ref() {
        return Ok(Arc::clone(api));
    }
    let path = std::env::var_os(ENGINE_LIBRARY_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(ENGINE_LIBRARY_DEFAULT));
    let api = Arc::new(resolve_all(&path)?);
    *guard = Some(Arc::clone(&api));
    Ok(api)
}

/// Releases the symbol table at module teardown.
///
/// After this, every operation fails until the next `load()` re-resolves.
pub fn unload() {
    let mut guard = SYMBOLS.lock().expect("symbol table mutex poisoned");
    *guard = None;
}

/// Installs a caller-built table. Test harness entry point.
#[cfg(test)]
pub(crate) fn install(api: EngineApi) {
    let mut guard = SYMBOLS.lock().expect("symbol table mutex poisoned");
    *guard = Some(Arc::new(api));
}

#[cfg(test)]
impl EngineApi {
    /// Builds a table directly from function pointers, without a library.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        startup: StartupFn,
        set_random_seed: SetRandomSeedFn,
        load_network: LoadNetworkFn,
        shutdown_network: ShutdownNetworkFn,
        network_name: NetworkNameFn,
        network_batch: NetworkBatchFn,
        layer_count: LayerCountFn,
        layer_at: LayerAtFn,
        layer_name: LayerStrFn,
        layer_dataset_name: LayerStrFn,
        layer_kind: LayerWordFn,
        layer_attributes: LayerWordFn,
        layer_num_dimensions: LayerWordFn,
        layer_dimensions: LayerDimensionsFn,
        define_dataset: DefineDatasetFn,
        predict: PredictFn,
    ) -> Self {
        Self {
            startup,
            set_random_seed,
            load_network,
            shutdown_network,
            network_name,
            network_batch,
            layer_count,
            layer_at,
            layer_name,
            layer_dataset_name,
            layer_kind,
            layer_attributes,
            layer_num_dimensions,
            layer_dimensions,
            define_dataset,
            predict,
            _library: None,
        }
    }
}

/// Loads the parallel runtime into the global linkage namespace.
///
/// Process-fatal on failure: the engine cannot run without it and a
/// half-initialized bridge must not load.
#[cfg(target_os = "linux")]
fn load_parallel_runtime_global() {
    let handle = unsafe {
        libc::dlopen(
            PARALLEL_RUNTIME_SO.as_ptr() as *const c_char,
            libc::RTLD_NOW | libc::RTLD_GLOBAL,
        )
    };
    if handle.is_null() {
        tracing::error!("failed to load libmpi.so into the global namespace");
        std::process::exit(1);
    }
}

#[cfg(not(target_os = "linux"))]
fn load_parallel_runtime_global() {}

fn resolve_all(engine_lib: &Path) -> Result<EngineApi> {
    load_parallel_runtime_global();

    tracing::info!(path = %engine_lib.display(), "resolving engine symbols");
    let library = unsafe { Library::new(engine_lib) }?;

    unsafe fn get<T: Copy>(library: &Library, symbol: &'static str) -> Result<T> {
        let resolved: Symbol<'_, T> = unsafe {
            library
                .get(symbol.as_bytes())
                .map_err(|_| BridgeError::SymbolResolution { symbol })?
        };
        Ok(*resolved)
    }

    let api = unsafe {
        EngineApi {
            startup: get(&library, "nnengine_startup")?,
            set_random_seed: get(&library, "nnengine_set_random_seed")?,
            load_network: get(&library, "nnengine_load_netcdf")?,
            shutdown_network: get(&library, "nnengine_shutdown")?,
            network_name: get(&library, "nnengine_network_name")?,
            network_batch: get(&library, "nnengine_network_batch")?,
            layer_count: get(&library, "nnengine_layer_count")?,
            layer_at: get(&library, "nnengine_layer_at")?,
            layer_name: get(&library, "nnengine_layer_name")?,
            layer_dataset_name: get(&library, "nnengine_layer_dataset_name")?,
            layer_kind: get(&library, "nnengine_layer_kind")?,
            layer_attributes: get(&library, "nnengine_layer_attributes")?,
            layer_num_dimensions: get(&library, "nnengine_layer_num_dimensions")?,
            layer_dimensions: get(&library, "nnengine_layer_dimensions")?,
            define_dataset: get(&library, "nnengine_define_dataset")?,
            predict: get(&library, "nnengine_predict_topk")?,
            _library: Some(library),
        }
    };
    Ok(api)
}
