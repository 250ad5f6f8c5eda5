//! Saved Keras models.
//!
//! Legacy HDF5 layout written by `model.save("model.h5")`:
//!
//! - root attribute `model_config`: architecture JSON
//! - `model_weights/<layer>/...`: one group per layer, holding the layer's
//!   variables as datasets whose names end in `kernel` or `bias`, optionally
//!   suffixed with `:0` (Keras 2 writes `<layer>/kernel:0`, Keras 3 may nest
//!   the full variable path)
//!
//! Keras 3 archive written by `model.save("model.keras")`: a zip holding
//! `config.json` (architecture) and `model.weights.h5`, where each layer's
//! variables are numbered datasets under `layers/<layer>/vars` (`0` kernel,
//! `1` bias).

use crate::models::keras::LayerWeights;
use anyhow::{anyhow, bail, Context, Result};
use hdf5::types::{VarLenAscii, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{Array1, Array2};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
const ARCHIVE_CONFIG: &str = "config.json";
const ARCHIVE_WEIGHTS: &str = "model.weights.h5";

/// Architecture and weights read from a saved Keras model.
#[derive(Debug)]
pub struct KerasH5 {
    /// Raw architecture JSON
    pub model_config: String,
    /// Weights keyed by layer name; layers without variables are absent
    pub weights: HashMap<String, LayerWeights>,
}

impl KerasH5 {
    /// Read a legacy HDF5 file or, if the file is a zip, a Keras 3 archive.
    pub fn read(path: &Path) -> Result<Self> {
        let mut magic = [0u8; 4];
        let is_archive = fs::File::open(path)
            .and_then(|mut f| f.read_exact(&mut magic))
            .map(|_| &magic == ZIP_MAGIC)
            .unwrap_or(false);

        if is_archive {
            return Self::read_archive(path);
        }

        let file = File::open(path)
            .with_context(|| format!("Failed to open HDF5 file {:?}", path))?;

        Ok(Self {
            model_config: read_model_config(&file)?,
            weights: read_weights(&file)?,
        })
    }

    fn read_archive(path: &Path) -> Result<Self> {
        let mut archive = ZipArchive::new(fs::File::open(path)?)
            .with_context(|| format!("Failed to open Keras archive {:?}", path))?;

        let mut model_config = String::new();
        archive
            .by_name(ARCHIVE_CONFIG)
            .with_context(|| format!("no {} in Keras archive", ARCHIVE_CONFIG))?
            .read_to_string(&mut model_config)?;

        let mut weights_file = Vec::new();
        archive
            .by_name(ARCHIVE_WEIGHTS)
            .with_context(|| format!("no {} in Keras archive", ARCHIVE_WEIGHTS))?
            .read_to_end(&mut weights_file)?;

        // HDF5 only opens files by path
        let scratch = scratch_path();
        fs::write(&scratch, &weights_file)?;
        let weights = File::open(&scratch)
            .context("archived weights are not an HDF5 file")
            .and_then(|file| read_archive_weights(&file));
        let _ = fs::remove_file(&scratch);

        Ok(Self {
            model_config,
            weights: weights?,
        })
    }
}

fn scratch_path() -> PathBuf {
    std::env::temp_dir().join(format!("keras-weights-{}.h5", uuid::Uuid::new_v4()))
}

fn read_model_config(file: &File) -> Result<String> {
    let attr = file
        .attr("model_config")
        .context("no model_config attribute in HDF5 file")?;

    if let Ok(text) = attr.read_scalar::<VarLenUnicode>() {
        return Ok(text.as_str().to_string());
    }
    let text = attr
        .read_scalar::<VarLenAscii>()
        .context("model_config attribute is not a variable-length string")?;
    Ok(text.as_str().to_string())
}

fn read_weights(file: &File) -> Result<HashMap<String, LayerWeights>> {
    let root = file
        .group("model_weights")
        .context("no model_weights group in HDF5 file")?;

    let mut weights = HashMap::new();
    for layer in root.groups()? {
        let name = leaf_name(&layer.name());

        let mut datasets = Vec::new();
        collect_datasets(&layer, &mut datasets)?;

        let mut kernel = None;
        let mut bias = None;
        for dataset in &datasets {
            match variable_name(&dataset.name()) {
                "kernel" => kernel = Some(read_matrix(dataset)?),
                "bias" => bias = Some(Array1::from(dataset.read_raw::<f32>()?)),
                _ => {}
            }
        }

        if let Some(kernel) = kernel {
            weights.insert(name, LayerWeights { kernel, bias });
        }
    }
    Ok(weights)
}

fn read_archive_weights(file: &File) -> Result<HashMap<String, LayerWeights>> {
    let root = file
        .group("layers")
        .or_else(|_| file.group("_layer_checkpoint_dependencies"))
        .context("no layers group in archived weights")?;

    let mut weights = HashMap::new();
    for layer in root.groups()? {
        let Ok(vars) = layer.group("vars") else {
            continue;
        };
        let Ok(kernel) = vars.dataset("0") else {
            continue;
        };
        let bias = match vars.dataset("1") {
            Ok(bias) => Some(Array1::from(bias.read_raw::<f32>()?)),
            Err(_) => None,
        };
        weights.insert(
            leaf_name(&layer.name()),
            LayerWeights {
                kernel: read_matrix(&kernel)?,
                bias,
            },
        );
    }
    Ok(weights)
}

fn collect_datasets(group: &Group, out: &mut Vec<Dataset>) -> Result<()> {
    out.extend(group.datasets()?);
    for child in group.groups()? {
        collect_datasets(&child, out)?;
    }
    Ok(())
}

fn leaf_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// `/model_weights/dense/dense/kernel:0` -> `kernel`
fn variable_name(path: &str) -> &str {
    let leaf = path.rsplit('/').next().unwrap_or(path);
    leaf.strip_suffix(":0").unwrap_or(leaf)
}

fn read_matrix(dataset: &Dataset) -> Result<Array2<f32>> {
    let shape = dataset.shape();
    let &[rows, cols] = shape.as_slice() else {
        bail!("kernel {} has shape {:?}, expected 2-D", dataset.name(), shape);
    };
    let data = dataset.read_raw::<f32>()?;
    Array2::from_shape_vec((rows, cols), data)
        .with_context(|| format!("kernel {} has inconsistent data", dataset.name()))
}

/// Write a Keras-layout HDF5 file with one `kernel:0`/`bias:0` pair per
/// dense layer.
pub fn write(path: &Path, model_config: &Value, layers: &[(String, LayerWeights)]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create HDF5 file {:?}", path))?;

    let config = VarLenUnicode::from_str(&model_config.to_string())
        .map_err(|e| anyhow!("model_config cannot be stored: {:?}", e))?;
    file.new_attr::<VarLenUnicode>()
        .shape(())
        .create("model_config")?
        .write_scalar(&config)?;

    let root = file.create_group("model_weights")?;
    for (name, tensors) in layers {
        let variables = root.create_group(name)?.create_group(name)?;

        let (rows, cols) = tensors.kernel.dim();
        let kernel: Vec<f32> = tensors.kernel.iter().copied().collect();
        variables
            .new_dataset::<f32>()
            .shape((rows, cols))
            .create("kernel:0")?
            .write_raw(kernel.as_slice())?;

        if let Some(bias) = &tensors.bias {
            let bias = bias.to_vec();
            variables
                .new_dataset::<f32>()
                .shape(bias.len())
                .create("bias:0")?
                .write_raw(bias.as_slice())?;
        }
    }
    Ok(())
}

/// Write a Keras 3 archive with numbered `vars` per dense layer.
pub fn write_archive(
    path: &Path,
    model_config: &Value,
    layers: &[(String, LayerWeights)],
) -> Result<()> {
    let scratch = scratch_path();
    let weights = write_archive_weights(&scratch, layers).and_then(|_| Ok(fs::read(&scratch)?));
    let _ = fs::remove_file(&scratch);
    let weights = weights?;

    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create Keras archive {:?}", path))?;
    let mut archive = ZipWriter::new(file);
    archive.start_file(ARCHIVE_CONFIG, SimpleFileOptions::default())?;
    archive.write_all(model_config.to_string().as_bytes())?;
    archive.start_file(ARCHIVE_WEIGHTS, SimpleFileOptions::default())?;
    archive.write_all(&weights)?;
    archive.finish()?;
    Ok(())
}

fn write_archive_weights(path: &Path, layers: &[(String, LayerWeights)]) -> Result<()> {
    let file = File::create(path)?;
    let root = file.create_group("layers")?;
    for (name, tensors) in layers {
        let vars = root.create_group(name)?.create_group("vars")?;

        let kernel: Vec<f32> = tensors.kernel.iter().copied().collect();
        vars.new_dataset::<f32>()
            .shape(tensors.kernel.dim())
            .create("0")?
            .write_raw(kernel.as_slice())?;

        if let Some(bias) = &tensors.bias {
            let bias = bias.to_vec();
            vars.new_dataset::<f32>()
                .shape(bias.len())
                .create("1")?
                .write_raw(bias.as_slice())?;
        }
    }
    Ok(())
}
