//! Boundary conversion helpers: C strings crossing the engine ABI and the
//! type-tagged numeric conversion of input elements into scores.
//!
//! Conversion dispatches over the closed [`DataType`] enumeration. Each
//! supported tag has one defined path to `f32`; any other tag is an
//! explicit `UnsupportedDataType`, never a silent no-op.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::error::{BridgeError, Result};
use crate::types::DataType;

/// Copies an engine-owned C string into a host `String`.
///
/// # Safety
/// `ptr` must be null or point to a valid, null-terminated string that
/// outlives this call.
pub(crate) unsafe fn cstr_to_string(ptr: *const c_char) -> Result<String> {
    if ptr.is_null() {
        return Err(BridgeError::Engine("engine returned a null string".into()));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_owned)
        .map_err(|e| BridgeError::Engine(format!("engine returned invalid UTF-8: {e}")))
}

/// Builds the scoped C string for one dataset name.
///
/// The returned value lives exactly as long as its binding, so release on
/// every exit path comes for free.
pub(crate) fn scoped_name(name: &str) -> Result<CString> {
    CString::new(name)
        .map_err(|_| BridgeError::InvalidDescriptor(format!("name {name:?} contains an interior NUL")))
}

macro_rules! convert_into {
    ($ty:ty, $bytes:expr, $scores:expr) => {{
        const SIZE: usize = std::mem::size_of::<$ty>();
        for (score, chunk) in $scores.iter_mut().zip($bytes.chunks_exact(SIZE)) {
            let mut raw = [0u8; SIZE];
            raw.copy_from_slice(chunk);
            *score = <$ty>::from_ne_bytes(raw) as f32;
        }
    }};
}

/// Converts `scores.len()` elements of type-erased input into `f32`
/// scores at the same linear offsets.
///
/// `Int`, `LLInt`, and `Char` widen; `Float` passes through; `Double`
/// narrows. The byte slice must hold exactly one input element per score
/// slot.
pub(crate) fn convert_scores(data_type: DataType, bytes: &[u8], scores: &mut [f32]) -> Result<()> {
    let expected = scores.len() * data_type.size_bytes();
    if bytes.len() != expected {
        return Err(BridgeError::InvalidDescriptor(format!(
            "input holds {} bytes, expected {expected} for {} {data_type:?} elements",
            bytes.len(),
            scores.len()
        )));
    }
    match data_type {
        DataType::Int => convert_into!(i32, bytes, scores),
        DataType::LLInt => convert_into!(i64, bytes, scores),
        DataType::Float => convert_into!(f32, bytes, scores),
        DataType::Double => convert_into!(f64, bytes, scores),
        DataType::Char => convert_into!(i8, bytes, scores),
        other => return Err(BridgeError::UnsupportedDataType(other.ordinal())),
    }
    Ok(())
}
