use std::{
    collections::HashMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use log::info;
use machine_learning::{NdArray, ParamTable, Topology};
use ndarray::IxDyn;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};
use serde::de::DeserializeOwned;

use crate::{OrchestratorError, Result};

const ARG_PREFIX: &str = "arg:";
const AUX_PREFIX: &str = "aux:";

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// The file holding the network description, `<prefix>-symbol.json`.
pub fn symbol_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, "-symbol.json")
}

/// The file holding the parameters of `epoch`, `<prefix>-<epoch:04>.params`.
pub fn params_path(prefix: &Path, epoch: usize) -> PathBuf {
    with_suffix(prefix, &format!("-{epoch:04}.params"))
}

/// Saves the network description and its parameters.
///
/// # Arguments
/// * `prefix` - The path prefix of both files.
/// * `epoch` - The epoch the parameters belong to.
/// * `topology` - The network.
/// * `arg_params` - The argument parameters.
/// * `aux_params` - The auxiliary states.
///
/// # Returns
/// An io error if a file can't be written, or a serialization error.
pub fn save_checkpoint(
    prefix: &Path,
    epoch: usize,
    topology: &dyn Topology,
    arg_params: &ParamTable,
    aux_params: &ParamTable,
) -> Result<()> {
    fs::write(symbol_path(prefix), topology.to_json()?)?;

    let buffers: Vec<(String, NdArray)> = arg_params
        .iter()
        .map(|(name, arr)| (format!("{ARG_PREFIX}{name}"), arr))
        .chain(
            aux_params
                .iter()
                .map(|(name, arr)| (format!("{AUX_PREFIX}{name}"), arr)),
        )
        .map(|(key, arr)| (key, arr.as_standard_layout().into_owned()))
        .collect();

    let views = buffers
        .iter()
        .map(|(key, arr)| {
            let data = arr.as_slice().ok_or_else(|| {
                OrchestratorError::Serialization(format!("{key} is not contiguous"))
            })?;
            let bytes = bytemuck::cast_slice(data);
            Ok((key.as_str(), TensorView::new(Dtype::F32, arr.shape().to_vec(), bytes)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let path = params_path(prefix, epoch);
    let metadata: Option<HashMap<String, String>> = None;
    let encoded = safetensors::serialize(views.iter().map(|(key, view)| (*key, view)), &metadata)?;
    fs::write(&path, encoded)?;

    info!("saved checkpoint to \"{}\"", path.display());
    Ok(())
}

/// Loads the parameters saved for `epoch`.
///
/// # Returns
/// The argument parameters and the auxiliary states, or a configuration error if a key
/// has neither the `arg:` nor the `aux:` prefix.
pub fn load_params(prefix: &Path, epoch: usize) -> Result<(ParamTable, ParamTable)> {
    let bytes = fs::read(params_path(prefix, epoch))?;
    let tensors = SafeTensors::deserialize(&bytes)?;

    let mut arg_params = ParamTable::new();
    let mut aux_params = ParamTable::new();

    for (key, view) in tensors.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(OrchestratorError::Serialization(format!(
                "{key} is stored as {:?}, expected F32",
                view.dtype()
            )));
        }

        let values: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
        let arr = NdArray::from_shape_vec(IxDyn(view.shape()), values)
            .map_err(|e| OrchestratorError::Serialization(e.to_string()))?;

        if let Some(name) = key.strip_prefix(ARG_PREFIX) {
            arg_params.insert(name.to_string(), arr);
        } else if let Some(name) = key.strip_prefix(AUX_PREFIX) {
            aux_params.insert(name.to_string(), arr);
        } else {
            return Err(OrchestratorError::Configuration(format!(
                "invalid parameter name {key}, expected an arg: or aux: prefix"
            )));
        }
    }

    Ok((arg_params, aux_params))
}

/// Loads a network description and the parameters saved for `epoch`.
///
/// # Returns
/// The network, its argument parameters and its auxiliary states.
pub fn load_checkpoint<T>(prefix: &Path, epoch: usize) -> Result<(T, ParamTable, ParamTable)>
where
    T: Topology + DeserializeOwned,
{
    let json = fs::read_to_string(symbol_path(prefix))?;
    let topology = serde_json::from_str(&json)?;
    let (arg_params, aux_params) = load_params(prefix, epoch)?;

    Ok((topology, arg_params, aux_params))
}
