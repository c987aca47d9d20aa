//! Inference marshalling: pins host buffers, converts typed input into the
//! engine's score layout, and invokes prediction.
//!
//! Inputs and outputs are index-aligned: pair `i` describes the network's
//! `i`-th input layer. Every pair's data type and buffer sizing is
//! validated before any output is written; the per-pair loop then pins,
//! converts, and calls the engine, releasing its pins on every exit path.

use crate::context;
use crate::convert::convert_scores;
use crate::data::{DenseDataset, OutputDataset};
use crate::error::{BridgeError, Result};
use crate::registry::ContextHandle;
use crate::symbols;
use crate::types::LayerKind;

/// Runs one synchronous prediction over index-aligned input/output pairs.
///
/// `k` is the top-k request size, forwarded to the engine; ranking
/// semantics stay engine-side. On success every output's scores region
/// holds `dim_x * batch_size` converted elements and its indexes region
/// holds the engine's ranked indexes.
pub fn predict(
    handle: ContextHandle,
    k: u32,
    inputs: &[DenseDataset],
    outputs: &mut [OutputDataset],
) -> Result<()> {
    let api = symbols::api()?;
    let network = context::check_handle(handle)?;
    let batch_size = unsafe { (api.network_batch)(network) };

    let expected = unsafe { (api.layer_count)(network, LayerKind::Input.ordinal()) } as usize;
    if inputs.len() != expected {
        return Err(BridgeError::ArrayLengthMismatch {
            field: "inputs",
            expected,
            actual: inputs.len(),
        });
    }
    if outputs.len() != inputs.len() {
        return Err(BridgeError::ArrayLengthMismatch {
            field: "outputs",
            expected: inputs.len(),
            actual: outputs.len(),
        });
    }

    // Validate every pair before writing any output: element counts come
    // from the matching input layer's dimensions, batch-major.
    let mut element_counts = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let layer = unsafe { (api.layer_at)(network, LayerKind::Input.ordinal(), i as u32) };
        if layer.is_null() {
            return Err(BridgeError::Engine(format!(
                "input layer enumeration returned null at index {i}"
            )));
        }
        let (mut dim_x, mut dim_y, mut dim_z, mut dim_w) = (0, 0, 0, 0);
        unsafe {
            (api.layer_dimensions)(layer, &mut dim_x, &mut dim_y, &mut dim_z, &mut dim_w);
        }
        let element_count = dim_x as usize * batch_size as usize;

        let data_type = input.data_type();
        if !data_type.conversion_supported() {
            return Err(BridgeError::UnsupportedDataType(data_type.ordinal()));
        }
        if input.len_bytes() != element_count * data_type.size_bytes() {
            return Err(BridgeError::InvalidDescriptor(format!(
                "input {i} holds {} bytes, expected {} for layer dim {dim_x} x batch {batch_size}",
                input.len_bytes(),
                element_count * data_type.size_bytes()
            )));
        }
        if outputs[i].scores().len() != element_count {
            return Err(BridgeError::InvalidDescriptor(format!(
                "output {i} has {} score slots, expected {element_count}",
                outputs[i].scores().len()
            )));
        }
        element_counts.push(element_count);
    }

    for (i, (input, output)) in inputs.iter().zip(outputs.iter_mut()).enumerate() {
        let data_type = input.data_type();
        let attributes = input.attributes();
        tracing::debug!(pair = i, ?data_type, ?attributes, "marshalling input");

        let data = input.pin();
        if let Some(start) = input.pin_sparse_start() {
            tracing::debug!(pair = i, sparse_start_len = start.len(), "sparse input");
        }
        let mut out = output.pin();

        convert_scores(data_type, data.bytes(), out.scores())?;

        let scores_ptr = out.scores().as_mut_ptr();
        let indexes_ptr = out.indexes().as_mut_ptr();
        let status = unsafe {
            (api.predict)(network, k, scores_ptr, element_counts[i] as u64, indexes_ptr)
        };
        if status != 0 {
            return Err(BridgeError::Engine(format!(
                "predict failed with status {status} on input {i}"
            )));
        }
        // pins for this pair released here
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub;
    use crate::types::{DataType, Dim, NetworkConfig, SparseEncoding};

    const MODEL: &str = "/models/movielens.nc";

    fn loaded(batch: u32) -> ContextHandle {
        crate::context::load(&NetworkConfig::new(MODEL, batch)).unwrap()
    }

    #[test]
    fn int_input_converts_to_identical_float_scores() {
        let _lock = stub::setup();
        let handle = loaded(2);

        // one Input layer of dim (4,1,1), batch 2: 8 elements end to end
        let dim = Dim::new(4, 1, 1, 2);
        let inputs = [DenseDataset::from_slice("input_data", dim, &[1i32, 2, 3, 4, 5, 6, 7, 8])];
        let mut outputs = [OutputDataset::new(dim)];

        predict(handle, 4, &inputs, &mut outputs).unwrap();

        assert_eq!(outputs[0].scores(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(outputs[0].indexes(), [0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(stub::state().predict_calls, 1);
        assert_eq!(inputs[0].active_pins(), 0);
        assert_eq!(outputs[0].active_pins(), 0);

        crate::context::shutdown(handle).unwrap();
    }

    #[test]
    fn float_input_passes_through() {
        let _lock = stub::setup();
        let handle = loaded(1);

        let dim = Dim::new(4, 1, 1, 1);
        let inputs = [DenseDataset::from_slice("input_data", dim, &[0.5f32, 1.5, -2.0, 8.25])];
        let mut outputs = [OutputDataset::new(dim)];

        predict(handle, 4, &inputs, &mut outputs).unwrap();
        assert_eq!(outputs[0].scores(), [0.5, 1.5, -2.0, 8.25]);

        crate::context::shutdown(handle).unwrap();
    }

    #[test]
    fn unsupported_data_type_fails_before_any_output_write() {
        let _lock = stub::setup();
        let handle = loaded(1);

        let dim = Dim::new(4, 1, 1, 1);
        let inputs = [DenseDataset::from_slice("input_data", dim, &[1u32, 2, 3, 4])];
        let mut outputs = [OutputDataset::new(dim)];

        let err = predict(handle, 4, &inputs, &mut outputs).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::UnsupportedDataType(ordinal) if ordinal == DataType::UInt.ordinal()
        ));
        assert_eq!(outputs[0].scores(), [0.0; 4]);
        assert_eq!(stub::state().predict_calls, 0);

        // same input always fails the same way
        let err = predict(handle, 4, &inputs, &mut outputs).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedDataType(_)));

        crate::context::shutdown(handle).unwrap();
    }

    #[test]
    fn pins_are_released_when_the_engine_fails() {
        let _lock = stub::setup();
        let handle = loaded(1);

        let dim = Dim::new(4, 1, 1, 1);
        let inputs = [DenseDataset::from_slice("input_data", dim, &[1i32, 2, 3, 4])];
        let mut outputs = [OutputDataset::new(dim)];
        let input_pins = inputs[0].pin_tracker();
        let output_pins = outputs[0].pin_tracker();

        stub::state().fail_predict = true;
        let err = predict(handle, 4, &inputs, &mut outputs).unwrap_err();
        assert!(matches!(err, BridgeError::Engine(_)));
        assert_eq!(input_pins.active(), 0);
        assert_eq!(output_pins.active(), 0);

        crate::context::shutdown(handle).unwrap();
    }

    #[test]
    fn input_count_must_match_the_network() {
        let _lock = stub::setup();
        let handle = loaded(1);

        let dim = Dim::new(4, 1, 1, 1);
        let inputs = [
            DenseDataset::from_slice("a", dim, &[1i32, 2, 3, 4]),
            DenseDataset::from_slice("b", dim, &[5i32, 6, 7, 8]),
        ];
        let mut outputs = [OutputDataset::new(dim), OutputDataset::new(dim)];

        let err = predict(handle, 4, &inputs, &mut outputs).unwrap_err();
        match err {
            BridgeError::ArrayLengthMismatch { field, expected, actual } => {
                assert_eq!(field, "inputs");
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected ArrayLengthMismatch, got {other:?}"),
        }

        crate::context::shutdown(handle).unwrap();
    }

    #[test]
    fn output_count_must_match_inputs() {
        let _lock = stub::setup();
        let handle = loaded(1);

        let dim = Dim::new(4, 1, 1, 1);
        let inputs = [DenseDataset::from_slice("input_data", dim, &[1i32, 2, 3, 4])];
        let mut outputs: [OutputDataset; 0] = [];

        let err = predict(handle, 4, &inputs, &mut outputs).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ArrayLengthMismatch { field: "outputs", .. }
        ));

        crate::context::shutdown(handle).unwrap();
    }

    #[test]
    fn mis_sized_input_buffer_is_rejected() {
        let _lock = stub::setup();
        let handle = loaded(2);

        // layer expects dim_x 4 * batch 2 = 8 elements; supply 4
        let dim = Dim::new(4, 1, 1, 1);
        let inputs = [DenseDataset::from_slice("input_data", dim, &[1i32, 2, 3, 4])];
        let mut outputs = [OutputDataset::new(Dim::new(4, 1, 1, 2))];

        let err = predict(handle, 4, &inputs, &mut outputs).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidDescriptor(_)));
        assert_eq!(stub::state().predict_calls, 0);

        crate::context::shutdown(handle).unwrap();
    }

    #[test]
    fn sparse_input_logs_and_predicts() {
        let _lock = stub::setup();
        let handle = loaded(1);

        let dim = Dim::new(4, 1, 1, 1);
        let inputs = [DenseDataset::from_slice("input_data", dim, &[9i32, 8, 7, 6])
            .with_sparse(SparseEncoding {
                start: vec![0],
                end: vec![4],
                index: vec![0, 1, 2, 3],
            })];
        let mut outputs = [OutputDataset::new(dim)];

        predict(handle, 4, &inputs, &mut outputs).unwrap();
        assert_eq!(outputs[0].scores(), [9.0, 8.0, 7.0, 6.0]);
        assert_eq!(inputs[0].active_pins(), 0);

        crate::context::shutdown(handle).unwrap();
    }

    #[test]
    fn stale_handle_is_rejected_before_marshalling() {
        let _lock = stub::setup();
        let handle = loaded(1);
        crate::context::shutdown(handle).unwrap();

        let dim = Dim::new(4, 1, 1, 1);
        let inputs = [DenseDataset::from_slice("input_data", dim, &[1i32, 2, 3, 4])];
        let mut outputs = [OutputDataset::new(dim)];
        let err = predict(handle, 4, &inputs, &mut outputs).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle));
        assert_eq!(stub::state().predict_calls, 0);
    }
}
