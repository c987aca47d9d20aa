//! Dataset registration: binds host dataset descriptors to the network.

use crate::context;
use crate::convert::scoped_name;
use crate::error::{BridgeError, Result};
use crate::registry::ContextHandle;
use crate::symbols;
use crate::types::{DatasetAttributes, DatasetDescriptor};

/// Registers every descriptor against the loaded network.
///
/// All records are validated before the first engine call, so a malformed
/// record rejects the whole batch with no registration side effect. Each
/// dataset's name is extracted into a C string scoped to its own
/// iteration and released on every exit path.
pub fn register_datasets(handle: ContextHandle, descriptors: &[DatasetDescriptor]) -> Result<()> {
    let api = symbols::api()?;
    let network = context::check_handle(handle)?;

    for (i, descriptor) in descriptors.iter().enumerate() {
        if descriptor.name.contains('\0') {
            return Err(BridgeError::InvalidDescriptor(format!(
                "dataset {i} name contains an interior NUL"
            )));
        }
        if descriptor.attributes.contains(DatasetAttributes::SPARSE) {
            match &descriptor.sparse {
                Some(encoding) => encoding.validate()?,
                None => {
                    return Err(BridgeError::InvalidDescriptor(format!(
                        "dataset {:?} is marked sparse but carries no sparse encoding",
                        descriptor.name
                    )))
                }
            }
        }
    }

    for descriptor in descriptors {
        let name = scoped_name(&descriptor.name)?;
        let status = unsafe {
            (api.define_dataset)(
                network,
                name.as_ptr(),
                descriptor.attributes.bits(),
                descriptor.data_type.ordinal(),
                descriptor.dim.x,
                descriptor.dim.y,
                descriptor.dim.z,
                descriptor.dim.examples,
            )
        };
        if status != 0 {
            return Err(BridgeError::Engine(format!(
                "defining dataset {:?} failed with status {status}",
                descriptor.name
            )));
        }
        tracing::debug!(name = %descriptor.name, "dataset registered");
    }
    Ok(())
}
