//! ONNX tier against small graphs encoded in place.
//!
//! Each graph is `y = x @ w` with `x: [N, inputs]` and `w: [inputs, outputs]`.

use egg_production_api::error::ServiceError;
use egg_production_api::models::loader::{LoadStrategy, ModelLoader, OnnxStrategy};
use egg_production_api::models::Regressor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn int_field(field: u64, value: u64, out: &mut Vec<u8>) {
    varint(field << 3, out);
    varint(value, out);
}

fn bytes_field(field: u64, bytes: &[u8], out: &mut Vec<u8>) {
    varint((field << 3) | 2, out);
    varint(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

/// `ValueInfoProto` for a float tensor of shape `[N, width]`.
fn value_info(name: &str, width: u64) -> Vec<u8> {
    let mut batch = Vec::new();
    bytes_field(2, b"N", &mut batch);
    let mut features = Vec::new();
    int_field(1, width, &mut features);

    let mut shape = Vec::new();
    bytes_field(1, &batch, &mut shape);
    bytes_field(1, &features, &mut shape);

    let mut tensor_type = Vec::new();
    int_field(1, 1, &mut tensor_type);
    bytes_field(2, &shape, &mut tensor_type);

    let mut type_proto = Vec::new();
    bytes_field(1, &tensor_type, &mut type_proto);

    let mut info = Vec::new();
    bytes_field(1, name.as_bytes(), &mut info);
    bytes_field(2, &type_proto, &mut info);
    info
}

fn matmul_model(weights: &[f32], inputs: u64, outputs: u64) -> Vec<u8> {
    let mut node = Vec::new();
    bytes_field(1, b"x", &mut node);
    bytes_field(1, b"w", &mut node);
    bytes_field(2, b"y", &mut node);
    bytes_field(4, b"MatMul", &mut node);

    let packed: Vec<u8> = weights.iter().flat_map(|w| w.to_le_bytes()).collect();
    let mut initializer = Vec::new();
    int_field(1, inputs, &mut initializer);
    int_field(1, outputs, &mut initializer);
    int_field(2, 1, &mut initializer);
    bytes_field(4, &packed, &mut initializer);
    bytes_field(8, b"w", &mut initializer);

    let mut graph = Vec::new();
    bytes_field(1, &node, &mut graph);
    bytes_field(2, b"regression", &mut graph);
    bytes_field(5, &initializer, &mut graph);
    bytes_field(11, &value_info("x", inputs), &mut graph);
    bytes_field(12, &value_info("y", outputs), &mut graph);

    let mut opset = Vec::new();
    bytes_field(1, b"", &mut opset);
    int_field(2, 13, &mut opset);

    let mut model = Vec::new();
    int_field(1, 8, &mut model);
    bytes_field(7, &graph, &mut model);
    bytes_field(8, &opset, &mut model);
    model
}

fn write_model(dir: &TempDir, weights: &[f32], inputs: u64, outputs: u64) -> PathBuf {
    let path = dir.path().join("sequence_model.onnx");
    std::fs::write(&path, matmul_model(weights, inputs, outputs)).unwrap();
    path
}

fn onnx_only() -> ModelLoader {
    ModelLoader::with_strategies(vec![Box::new(OnnxStrategy::new(1))])
}

fn tier_message(err: ServiceError, path: &Path) -> String {
    match err {
        ServiceError::ArtifactUnparseable { path: failed, failures } => {
            assert_eq!(failed, path);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].tier, "onnx-runtime");
            failures[0].message.clone()
        }
        other => panic!("expected unparseable artifact, got {}", other),
    }
}

#[test]
fn test_seven_feature_graph_loads_and_predicts() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_model(&dir, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], 7, 1);

    let model = OnnxStrategy::new(1).load(&path).unwrap();
    let description = model.describe();
    assert_eq!(description.backend, "onnx-runtime");
    assert_eq!(description.input_width, 7);
    assert_eq!(description.output_width, 1);
    assert_eq!(description.summary, vec!["input: x [?, 7]", "output: y [?, 1]"]);

    let output = model.predict(&[1.0; 7]).unwrap();
    assert!((output - 28.0).abs() < 1e-5);

    let err = model.predict(&[1.0; 5]).unwrap_err();
    assert!(err.to_string().contains("expects 7 inputs"));

    let loaded = onnx_only().load_model(&path).unwrap();
    assert_eq!(loaded.tier, "onnx-runtime");
}

#[test]
fn test_wrong_input_width_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_model(&dir, &[1.0; 5], 5, 1);

    let message = tier_message(onnx_only().load_model(&path).unwrap_err(), &path);
    assert!(message.contains("[?, 5]"), "{}", message);
    assert!(message.contains("expected 7 features"), "{}", message);
}

#[test]
fn test_wide_output_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_model(&dir, &[0.5; 21], 7, 3);

    let message = tier_message(onnx_only().load_model(&path).unwrap_err(), &path);
    assert!(message.contains("has 3 outputs"), "{}", message);
}

#[test]
fn test_keras_file_fails_the_onnx_tier() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sequence_model.h5");
    std::fs::write(&path, b"\x89HDF\r\n\x1a\n").unwrap();

    let message = tier_message(onnx_only().load_model(&path).unwrap_err(), &path);
    assert!(message.contains("Failed to load model"), "{}", message);
}
