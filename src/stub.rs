//! In-process stub engine backing the unit tests.
//!
//! Implements the engine ABI over a fixed four-layer network named
//! `testnet` (one Input, one Output, two Hidden, no Target). The stub's
//! predict is an identity model: the scores staged by the bridge are the
//! prediction, and ranked indexes are written sequentially, so conversion
//! is observable end to end. Failure injection flags let tests drive the
//! engine-error paths.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::sync::{Mutex, MutexGuard};

use crate::symbols::{self, EngineApi, NativeLayer, NativeNetwork};

/// Serializes tests that touch the process-wide engine state.
static TEST_LOCK: Mutex<()> = Mutex::new(());

pub struct DefinedDataset {
    pub name: String,
    pub attributes: u32,
    pub data_type: u32,
    pub dims: (u32, u32, u32),
    pub examples: u32,
}

pub struct StubState {
    pub startup_calls: usize,
    pub seed: Option<u64>,
    pub loaded: Vec<(String, u32)>,
    pub defined_datasets: Vec<DefinedDataset>,
    pub predict_calls: usize,
    pub shutdowns: usize,
    pub fail_load: bool,
    pub fail_define: bool,
    pub fail_predict: bool,
}

impl StubState {
    const fn fresh() -> Self {
        Self {
            startup_calls: 0,
            seed: None,
            loaded: Vec::new(),
            defined_datasets: Vec::new(),
            predict_calls: 0,
            shutdowns: 0,
            fail_load: false,
            fail_define: false,
            fail_predict: false,
        }
    }
}

static STATE: Mutex<StubState> = Mutex::new(StubState::fresh());

pub fn state() -> MutexGuard<'static, StubState> {
    STATE.lock().unwrap_or_else(|e| e.into_inner())
}

/// Installs the stub vtable with fresh state and serializes the caller.
///
/// Hold the returned guard for the duration of the test.
pub fn setup() -> MutexGuard<'static, ()> {
    let lock = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    *state() = StubState::fresh();
    symbols::install(stub_api());
    lock
}

struct StubNet {
    batch: u32,
}

struct StubLayer {
    name: &'static CStr,
    dataset: &'static CStr,
    kind: u32,
    attributes: u32,
    num_dims: u32,
    dims: [u32; 4],
}

static LAYERS: [StubLayer; 4] = [
    StubLayer {
        name: c"Input",
        dataset: c"input_data",
        kind: 0,
        attributes: 0,
        num_dims: 1,
        dims: [4, 1, 1, 1],
    },
    StubLayer {
        name: c"Output",
        dataset: c"output_data",
        kind: 1,
        attributes: 0,
        num_dims: 1,
        dims: [4, 1, 1, 1],
    },
    StubLayer {
        name: c"Hidden1",
        dataset: c"hidden1_data",
        kind: 2,
        attributes: 0,
        num_dims: 1,
        dims: [8, 1, 1, 1],
    },
    StubLayer {
        name: c"Hidden2",
        dataset: c"hidden2_data",
        kind: 2,
        attributes: 0,
        num_dims: 1,
        dims: [8, 1, 1, 1],
    },
];

unsafe extern "C" fn startup(_argc: c_int, _argv: *mut *mut c_char) {
    state().startup_calls += 1;
}

unsafe extern "C" fn set_random_seed(seed: u64) {
    state().seed = Some(seed);
}

unsafe extern "C" fn load_network(path: *const c_char, batch: u32) -> *mut NativeNetwork {
    let mut st = state();
    let path = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();
    st.loaded.push((path, batch));
    if st.fail_load {
        return std::ptr::null_mut();
    }
    Box::into_raw(Box::new(StubNet { batch })) as *mut NativeNetwork
}

unsafe extern "C" fn shutdown_network(net: *mut NativeNetwork) {
    state().shutdowns += 1;
    drop(unsafe { Box::from_raw(net as *mut StubNet) });
}

unsafe extern "C" fn network_name(_net: *const NativeNetwork) -> *const c_char {
    c"testnet".as_ptr()
}

unsafe extern "C" fn network_batch(net: *const NativeNetwork) -> u32 {
    unsafe { (*(net as *const StubNet)).batch }
}

fn nth_of_kind(kind: u32, index: u32) -> Option<&'static StubLayer> {
    LAYERS.iter().filter(|l| l.kind == kind).nth(index as usize)
}

unsafe extern "C" fn layer_count(_net: *const NativeNetwork, kind: u32) -> u32 {
    LAYERS.iter().filter(|l| l.kind == kind).count() as u32
}

unsafe extern "C" fn layer_at(
    _net: *const NativeNetwork,
    kind: u32,
    index: u32,
) -> *const NativeLayer {
    match nth_of_kind(kind, index) {
        Some(layer) => layer as *const StubLayer as *const NativeLayer,
        None => std::ptr::null(),
    }
}

unsafe fn stub_layer<'a>(layer: *const NativeLayer) -> &'a StubLayer {
    unsafe { &*(layer as *const StubLayer) }
}

unsafe extern "C" fn layer_name(layer: *const NativeLayer) -> *const c_char {
    unsafe { stub_layer(layer) }.name.as_ptr()
}

unsafe extern "C" fn layer_dataset_name(layer: *const NativeLayer) -> *const c_char {
    unsafe { stub_layer(layer) }.dataset.as_ptr()
}

unsafe extern "C" fn layer_kind(layer: *const NativeLayer) -> u32 {
    unsafe { stub_layer(layer) }.kind
}

unsafe extern "C" fn layer_attributes(layer: *const NativeLayer) -> u32 {
    unsafe { stub_layer(layer) }.attributes
}

unsafe extern "C" fn layer_num_dimensions(layer: *const NativeLayer) -> u32 {
    unsafe { stub_layer(layer) }.num_dims
}

unsafe extern "C" fn layer_dimensions(
    layer: *const NativeLayer,
    x: *mut u32,
    y: *mut u32,
    z: *mut u32,
    w: *mut u32,
) {
    let dims = unsafe { stub_layer(layer) }.dims;
    unsafe {
        *x = dims[0];
        *y = dims[1];
        *z = dims[2];
        *w = dims[3];
    }
}

unsafe extern "C" fn define_dataset(
    _net: *mut NativeNetwork,
    name: *const c_char,
    attributes: u32,
    data_type: u32,
    dim_x: u32,
    dim_y: u32,
    dim_z: u32,
    examples: u32,
) -> c_int {
    let mut st = state();
    if st.fail_define {
        return -3;
    }
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
    st.defined_datasets.push(DefinedDataset {
        name,
        attributes,
        data_type,
        dims: (dim_x, dim_y, dim_z),
        examples,
    });
    0
}

unsafe extern "C" fn predict(
    _net: *mut NativeNetwork,
    _k: u32,
    _scores: *mut f32,
    element_count: u64,
    indexes: *mut i64,
) -> c_int {
    let mut st = state();
    st.predict_calls += 1;
    if st.fail_predict {
        return -5;
    }
    // identity model: the staged scores are the prediction; rank sequentially
    let indexes = unsafe { std::slice::from_raw_parts_mut(indexes, element_count as usize) };
    for (j, slot) in indexes.iter_mut().enumerate() {
        *slot = j as i64;
    }
    0
}

fn stub_api() -> EngineApi {
    EngineApi::from_parts(
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
    )
}
