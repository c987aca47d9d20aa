//! Layer introspection: copies engine layer descriptors into host records.

use crate::context;
use crate::convert::cstr_to_string;
use crate::error::{BridgeError, Result};
use crate::registry::ContextHandle;
use crate::symbols;
use crate::types::{LayerAttributes, LayerDescriptor, LayerKind};

/// Returns every layer of the requested kind, in the engine's own
/// enumeration order.
///
/// A kind with no matches fails with `LayerNotFound` naming the kind and
/// the network; an empty sequence is never returned silently.
pub fn get_layers(handle: ContextHandle, kind: LayerKind) -> Result<Vec<LayerDescriptor>> {
    let api = symbols::api()?;
    let network = context::check_handle(handle)?;

    let count = unsafe { (api.layer_count)(network, kind.ordinal()) };
    if count == 0 {
        let network = unsafe { cstr_to_string((api.network_name)(network)) }?;
        return Err(BridgeError::LayerNotFound { kind, network });
    }

    let mut layers = Vec::with_capacity(count as usize);
    for index in 0..count {
        let layer = unsafe { (api.layer_at)(network, kind.ordinal(), index) };
        if layer.is_null() {
            return Err(BridgeError::Engine(format!(
                "layer enumeration returned null at index {index}"
            )));
        }
        let name = unsafe { cstr_to_string((api.layer_name)(layer)) }?;
        let dataset_name = unsafe { cstr_to_string((api.layer_dataset_name)(layer)) }?;
        let kind = LayerKind::from_ordinal(unsafe { (api.layer_kind)(layer) })?;
        let attributes = LayerAttributes::from_bits_retain(unsafe { (api.layer_attributes)(layer) });
        let num_dimensions = unsafe { (api.layer_num_dimensions)(layer) };
        let (mut dim_x, mut dim_y, mut dim_z, mut dim_w) = (0, 0, 0, 0);
        unsafe {
            (api.layer_dimensions)(layer, &mut dim_x, &mut dim_y, &mut dim_z, &mut dim_w);
        }
        layers.push(LayerDescriptor {
            name,
            dataset_name,
            kind,
            attributes,
            num_dimensions,
            dim_x,
            dim_y,
            dim_z,
            dim_w,
        });
    }
    Ok(layers)
}
