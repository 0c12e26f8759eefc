//! On-disk encoding of a product container
//!
//! Layout: 8-byte magic, little-endian u64 manifest length, JSON manifest
//! describing the group tree, then the raw little-endian payload of every
//! numeric dataset. Text datasets live in the manifest.
//!
//! This is not HDF5. Product file names keep the extension of the configured
//! output (usually `.h5`), but it is only a label for the file.

use super::container::{Attributes, Dataset, DatasetValues, Dtype, Group, ProductContainer};
use crate::types::{InsarComplex, InsarError, InsarResult};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

const MAGIC: &[u8; 8] = b"INSARPC1";
const HEADER_LEN: usize = 16;

#[derive(Debug, Default, Serialize, Deserialize)]
struct GroupManifest {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: Attributes,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    groups: BTreeMap<String, GroupManifest>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    datasets: BTreeMap<String, DatasetManifest>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasetManifest {
    shape: Vec<usize>,
    dtype: Dtype,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dimension_scales: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<Vec<String>>,
    /// Byte range of the values within the payload section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<(u64, u64)>,
}

/// Encode a container into its on-disk byte representation
pub fn encode(container: &ProductContainer) -> InsarResult<Vec<u8>> {
    let mut payload = Vec::new();
    let manifest = manifest_group(container.root(), &mut payload);
    let manifest = serde_json::to_vec(&manifest)?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + manifest.len() + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&(manifest.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&manifest);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn manifest_group(group: &Group, payload: &mut Vec<u8>) -> GroupManifest {
    GroupManifest {
        attrs: group.attrs.clone(),
        groups: group
            .groups
            .iter()
            .map(|(name, child)| (name.clone(), manifest_group(child, payload)))
            .collect(),
        datasets: group
            .datasets
            .iter()
            .map(|(name, dataset)| (name.clone(), manifest_dataset(dataset, payload)))
            .collect(),
    }
}

fn manifest_dataset(dataset: &Dataset, payload: &mut Vec<u8>) -> DatasetManifest {
    let mut manifest = DatasetManifest {
        shape: dataset.shape.clone(),
        dtype: dataset.dtype,
        attrs: dataset.attrs.clone(),
        dimension_scales: dataset.dimension_scales.clone(),
        text: None,
        payload: None,
    };

    let start = payload.len() as u64;
    match &dataset.values {
        None => return manifest,
        Some(DatasetValues::Text(values)) => {
            manifest.text = Some(values.clone());
            return manifest;
        }
        Some(DatasetValues::Float32(a)) => a.iter().for_each(|v| payload.extend_from_slice(&v.to_le_bytes())),
        Some(DatasetValues::Float64(a)) => a.iter().for_each(|v| payload.extend_from_slice(&v.to_le_bytes())),
        Some(DatasetValues::UInt32(a)) => a.iter().for_each(|v| payload.extend_from_slice(&v.to_le_bytes())),
        Some(DatasetValues::Complex64(a)) => a.iter().for_each(|v| {
            payload.extend_from_slice(&v.re.to_le_bytes());
            payload.extend_from_slice(&v.im.to_le_bytes());
        }),
    }
    manifest.payload = Some((start, payload.len() as u64 - start));
    manifest
}

/// Decode a container from bytes produced by [`encode`]
pub fn decode(bytes: &[u8]) -> InsarResult<ProductContainer> {
    if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
        return Err(InsarError::ContainerFormat(
            "missing product container header".to_string(),
        ));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[8..HEADER_LEN]);
    let manifest_len = usize::try_from(u64::from_le_bytes(len_bytes))
        .map_err(|_| InsarError::ContainerFormat("manifest length overflow".to_string()))?;
    let manifest_end = HEADER_LEN
        .checked_add(manifest_len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| InsarError::ContainerFormat("truncated manifest".to_string()))?;

    let manifest: GroupManifest = serde_json::from_slice(&bytes[HEADER_LEN..manifest_end])?;
    let payload = &bytes[manifest_end..];
    let root = restore_group(manifest, payload, "")?;
    Ok(ProductContainer::from_root(root))
}

fn restore_group(manifest: GroupManifest, payload: &[u8], path: &str) -> InsarResult<Group> {
    let mut group = Group {
        attrs: manifest.attrs,
        ..Group::default()
    };
    for (name, child) in manifest.groups {
        let child_path = format!("{}/{}", path, name);
        group.groups.insert(name, restore_group(child, payload, &child_path)?);
    }
    for (name, dataset) in manifest.datasets {
        let dataset_path = format!("{}/{}", path, name);
        group.datasets.insert(name, restore_dataset(dataset, payload, &dataset_path)?);
    }
    Ok(group)
}

fn restore_dataset(manifest: DatasetManifest, payload: &[u8], path: &str) -> InsarResult<Dataset> {
    let values = match (manifest.text, manifest.payload) {
        (Some(text), _) => {
            if element_count(&manifest.shape) != Some(text.len()) {
                return Err(InsarError::ContainerFormat(format!(
                    "{}: {} text values for shape {:?}",
                    path,
                    text.len(),
                    manifest.shape
                )));
            }
            Some(DatasetValues::Text(text))
        }
        (None, None) => None,
        (None, Some((offset, len))) => {
            let bytes = usize::try_from(offset)
                .ok()
                .zip(usize::try_from(len).ok())
                .and_then(|(start, len)| payload.get(start..start.checked_add(len)?))
                .ok_or_else(|| {
                    InsarError::ContainerFormat(format!("{}: payload range out of bounds", path))
                })?;
            Some(decode_values(manifest.dtype, &manifest.shape, bytes, path)?)
        }
    };

    Ok(Dataset {
        shape: manifest.shape,
        dtype: manifest.dtype,
        attrs: manifest.attrs,
        dimension_scales: manifest.dimension_scales,
        values,
    })
}

/// Number of elements of `shape`, or `None` if it does not fit in memory
fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |count, dim| count.checked_mul(*dim))
}

fn decode_values(dtype: Dtype, shape: &[usize], bytes: &[u8], path: &str) -> InsarResult<DatasetValues> {
    let expected = element_count(shape)
        .and_then(|count| count.checked_mul(dtype.size()))
        .ok_or_else(|| {
            InsarError::ContainerFormat(format!("{}: shape {:?} overflows", path, shape))
        })?;
    if bytes.len() != expected {
        return Err(InsarError::ContainerFormat(format!(
            "{}: {} payload bytes for {:?} {:?}",
            path,
            bytes.len(),
            dtype,
            shape
        )));
    }

    let words4 = || bytes.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]);
    let values = match dtype {
        Dtype::Float32 => DatasetValues::Float32(shaped(shape, words4().map(f32::from_le_bytes).collect(), path)?),
        Dtype::UInt32 => DatasetValues::UInt32(shaped(shape, words4().map(u32::from_le_bytes).collect(), path)?),
        Dtype::Complex64 => {
            let parts: Vec<f32> = words4().map(f32::from_le_bytes).collect();
            let samples = parts
                .chunks_exact(2)
                .map(|pair| InsarComplex::new(pair[0], pair[1]))
                .collect();
            DatasetValues::Complex64(shaped(shape, samples, path)?)
        }
        Dtype::Float64 => {
            let values = bytes
                .chunks_exact(8)
                .map(|c| {
                    let mut word = [0u8; 8];
                    word.copy_from_slice(c);
                    f64::from_le_bytes(word)
                })
                .collect();
            DatasetValues::Float64(shaped(shape, values, path)?)
        }
        Dtype::Text => {
            return Err(InsarError::ContainerFormat(format!(
                "{}: text dataset with a binary payload",
                path
            )))
        }
    };
    Ok(values)
}

fn shaped<T>(shape: &[usize], values: Vec<T>, path: &str) -> InsarResult<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| InsarError::ContainerFormat(format!("{}: {}", path, e)))
}

/// Write a container to `path`, replacing any previous file
pub fn write(path: &Path, container: &ProductContainer) -> InsarResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let bytes = encode(container)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

pub fn read(path: &Path) -> InsarResult<ProductContainer> {
    let bytes = fs::read(path)?;
    decode(&bytes)
}

/// Load the container at `path`, or start an empty one if there is no file yet
pub fn open_or_create(path: &Path) -> InsarResult<ProductContainer> {
    if path.exists() {
        log::info!("Reopening existing product {}", path.display());
        read(path)
    } else {
        Ok(ProductContainer::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use tempfile::TempDir;

    fn sample_container() -> ProductContainer {
        let mut container = ProductContainer::new();
        container.set_attr("title", "NISAR L2 GOFF Product");
        let phase = Array2::from_shape_fn((2, 3), |(i, j)| InsarComplex::new(i as f32, j as f32));
        container
            .create_dataset(
                "/science/LSAR/ifg",
                Dataset::with_values(DatasetValues::Complex64(phase.into_dyn())).attr("units", "unitless"),
            )
            .unwrap();
        container
            .create_dataset("/science/LSAR/snr", Dataset::declared(&[4, 5], Dtype::Float32))
            .unwrap();
        container
            .create_dataset(
                "/science/LSAR/listOfPolarizations",
                Dataset::text(vec!["HH".to_string(), "HV".to_string()]),
            )
            .unwrap();
        container
            .create_dataset("/science/LSAR/projection", Dataset::scalar_u32(32611))
            .unwrap();
        container
    }

    #[test]
    fn test_write_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/product.h5");
        let container = sample_container();

        write(&path, &container).unwrap();
        let loaded = read(&path).unwrap();
        assert_eq!(loaded, container);
    }

    #[test]
    fn test_open_or_create_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let container = open_or_create(&temp_dir.path().join("missing.h5")).unwrap();
        assert!(container.root().groups.is_empty());
    }

    #[test]
    fn test_rejects_foreign_file() {
        let result = decode(b"\x89HDF\r\n\x1a\n0000000000");
        assert!(matches!(result, Err(InsarError::ContainerFormat(_))));
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let mut bytes = encode(&sample_container()).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(decode(&bytes), Err(InsarError::ContainerFormat(_))));
    }

    /// Re-encode `manifest` in front of the original payload
    fn with_manifest(bytes: &[u8], manifest: &serde_json::Value) -> Vec<u8> {
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[8..HEADER_LEN]);
        let manifest_end = HEADER_LEN + u64::from_le_bytes(len_bytes) as usize;
        let manifest = serde_json::to_vec(manifest).unwrap();

        let mut patched = MAGIC.to_vec();
        patched.extend_from_slice(&(manifest.len() as u64).to_le_bytes());
        patched.extend_from_slice(&manifest);
        patched.extend_from_slice(&bytes[manifest_end..]);
        patched
    }

    fn manifest_of(bytes: &[u8]) -> serde_json::Value {
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[8..HEADER_LEN]);
        let manifest_end = HEADER_LEN + u64::from_le_bytes(len_bytes) as usize;
        serde_json::from_slice(&bytes[HEADER_LEN..manifest_end]).unwrap()
    }

    #[test]
    fn test_rejects_overflowing_shape() {
        let bytes = encode(&sample_container()).unwrap();
        let mut manifest = manifest_of(&bytes);
        manifest["groups"]["science"]["groups"]["LSAR"]["datasets"]["ifg"]["shape"] =
            serde_json::json!([u64::MAX, 2]);

        let result = decode(&with_manifest(&bytes, &manifest));
        assert!(matches!(result, Err(InsarError::ContainerFormat(msg)) if msg.contains("overflows")));
    }

    #[test]
    fn test_rejects_text_shape_mismatch() {
        let bytes = encode(&sample_container()).unwrap();
        let mut manifest = manifest_of(&bytes);
        manifest["groups"]["science"]["groups"]["LSAR"]["datasets"]["listOfPolarizations"]["shape"] =
            serde_json::json!([3]);

        let result = decode(&with_manifest(&bytes, &manifest));
        assert!(matches!(
            result,
            Err(InsarError::ContainerFormat(msg)) if msg.contains("listOfPolarizations")
        ));
    }
}
