use anyhow::{anyhow, Context, Result};
use kcat_properties::utils::data_handling::{rows_to_array2, KcatDataset};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const FINGERPRINTS_STEM: &str = "compound_fingerprints";
pub const ADJACENCIES_STEM: &str = "adjacencies";
pub const PROTEINS_STEM: &str = "local_representations";
pub const KCATS_STEM: &str = "Kcats";
pub const DICTIONARY_STEM: &str = "fingerprint_dict";

const EXTENSIONS: [&str; 3] = ["json", "pickle", "pkl"];

/// Raw per-example collections read from a data directory.
#[derive(Debug, Clone)]
pub struct KcatInputs {
    pub fingerprints: Vec<Vec<u32>>,
    pub adjacencies: Vec<Vec<Vec<f32>>>,
    pub proteins: Vec<Vec<Vec<f32>>>,
    pub kcats: Option<Vec<f32>>,
    pub vocab_size: usize,
}

/// Locates `{stem}.json`, `{stem}.pickle` or `{stem}.pkl` in `data_dir`.
pub fn find_input(data_dir: &Path, stem: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| data_dir.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
}

fn require_input(data_dir: &Path, stem: &str) -> Result<PathBuf> {
    find_input(data_dir, stem).ok_or_else(|| {
        anyhow!(
            "Missing input '{}' ({}) in {:?}",
            stem,
            EXTENSIONS.join(", "),
            data_dir
        )
    })
}

/// Pickled numpy arrays cannot be decoded; inputs must hold plain lists.
fn unpickle_failure(path: &Path) -> String {
    format!(
        "Failed to unpickle {:?}; numpy arrays are not supported, convert them with \
         `.tolist()` or save the input as JSON",
        path
    )
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("json")
}

/// Decodes a JSON or pickle file according to its extension.
pub fn read_value<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open input file: {:?}", path))?;
    let reader = BufReader::new(file);
    if is_json(path) {
        serde_json::from_reader(reader).with_context(|| format!("Failed to parse JSON: {:?}", path))
    } else {
        serde_pickle::from_reader(reader, serde_pickle::DeOptions::new())
            .with_context(|| unpickle_failure(path))
    }
}

/// Number of entries in the fingerprint dictionary.
pub fn vocabulary_size(path: &Path) -> Result<usize> {
    if is_json(path) {
        let value: serde_json::Value = read_value(path)?;
        match value {
            serde_json::Value::Object(map) => Ok(map.len()),
            serde_json::Value::Array(items) => Ok(items.len()),
            _ => Err(anyhow!("Fingerprint dictionary is not a mapping: {:?}", path)),
        }
    } else {
        let file = File::open(path).with_context(|| format!("Failed to open input file: {:?}", path))?;
        let value = serde_pickle::value_from_reader(BufReader::new(file), serde_pickle::DeOptions::new())
            .with_context(|| unpickle_failure(path))?;
        match value {
            serde_pickle::Value::Dict(map) => Ok(map.len()),
            serde_pickle::Value::List(items) => Ok(items.len()),
            _ => Err(anyhow!("Fingerprint dictionary is not a mapping: {:?}", path)),
        }
    }
}

/// Reads the five inputs of a data directory. The target file is optional
/// unless `require_targets` is set.
pub fn load_kcat_inputs(data_dir: &Path, require_targets: bool) -> Result<KcatInputs> {
    let fingerprints: Vec<Vec<u32>> = read_value(&require_input(data_dir, FINGERPRINTS_STEM)?)?;
    let adjacencies: Vec<Vec<Vec<f32>>> = read_value(&require_input(data_dir, ADJACENCIES_STEM)?)?;
    let proteins: Vec<Vec<Vec<f32>>> = read_value(&require_input(data_dir, PROTEINS_STEM)?)?;

    let kcats = match find_input(data_dir, KCATS_STEM) {
        Some(path) => Some(read_value::<Vec<f32>>(&path)?),
        None if require_targets => {
            return Err(anyhow!("Missing input '{}' in {:?}", KCATS_STEM, data_dir))
        }
        None => {
            log::warn!("No '{}' file in {:?}; targets left empty", KCATS_STEM, data_dir);
            None
        }
    };

    let vocab_size = vocabulary_size(&require_input(data_dir, DICTIONARY_STEM)?)?;

    log::info!(
        "Loaded {} compounds, {} adjacencies, {} protein representations from {:?} (vocabulary {})",
        fingerprints.len(),
        adjacencies.len(),
        proteins.len(),
        data_dir,
        vocab_size
    );

    Ok(KcatInputs {
        fingerprints,
        adjacencies,
        proteins,
        kcats,
        vocab_size,
    })
}

/// Converts raw inputs into a validated dataset. Missing targets become NaN.
pub fn build_dataset(inputs: KcatInputs) -> Result<KcatDataset> {
    let n = inputs.fingerprints.len();
    let adjacencies = inputs
        .adjacencies
        .into_iter()
        .map(rows_to_array2)
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid adjacency matrix")?;
    let proteins = inputs
        .proteins
        .into_iter()
        .map(rows_to_array2)
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid protein representation")?;
    let kcats = inputs.kcats.unwrap_or_else(|| vec![f32::NAN; n]);

    let dataset = KcatDataset::from_collections(
        inputs.fingerprints,
        adjacencies,
        proteins,
        kcats,
        inputs.vocab_size,
    )?;
    Ok(dataset)
}

pub fn load_dataset(data_dir: &Path, require_targets: bool) -> Result<KcatDataset> {
    let inputs = load_kcat_inputs(data_dir, require_targets)?;
    build_dataset(inputs)
}
