//! In-memory hierarchical product container
//!
//! Groups hold attributes, child groups and datasets. Paths are `/`-separated
//! and always interpreted from the root. Creation is keyed by path, so writing
//! the same dataset twice replaces it instead of duplicating it.

use crate::types::{InsarComplex, InsarError, InsarResult};
use ndarray::{Array1, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Element type of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dtype {
    Float32,
    Float64,
    Complex64,
    UInt32,
    Text,
}

impl Dtype {
    /// Bytes per element in the container payload
    pub fn size(&self) -> usize {
        match self {
            Dtype::Float32 | Dtype::UInt32 => 4,
            Dtype::Float64 | Dtype::Complex64 => 8,
            Dtype::Text => 0,
        }
    }
}

/// Attribute value attached to a group or dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

/// Values stored in a dataset
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetValues {
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Complex64(ArrayD<InsarComplex>),
    UInt32(ArrayD<u32>),
    Text(Vec<String>),
}

impl DatasetValues {
    pub fn dtype(&self) -> Dtype {
        match self {
            DatasetValues::Float32(_) => Dtype::Float32,
            DatasetValues::Float64(_) => Dtype::Float64,
            DatasetValues::Complex64(_) => Dtype::Complex64,
            DatasetValues::UInt32(_) => Dtype::UInt32,
            DatasetValues::Text(_) => Dtype::Text,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            DatasetValues::Float32(a) => a.shape().to_vec(),
            DatasetValues::Float64(a) => a.shape().to_vec(),
            DatasetValues::Complex64(a) => a.shape().to_vec(),
            DatasetValues::UInt32(a) => a.shape().to_vec(),
            DatasetValues::Text(v) => vec![v.len()],
        }
    }
}

/// Named n-dimensional dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub shape: Vec<usize>,
    pub dtype: Dtype,
    pub attrs: Attributes,
    /// Paths of the coordinate datasets bound to each axis, outermost first
    pub dimension_scales: Vec<String>,
    /// `None` for datasets that are declared but not filled yet
    pub values: Option<DatasetValues>,
}

impl Dataset {
    /// Declared dataset without values
    pub fn declared(shape: &[usize], dtype: Dtype) -> Self {
        Self {
            shape: shape.to_vec(),
            dtype,
            attrs: Attributes::new(),
            dimension_scales: Vec::new(),
            values: None,
        }
    }

    pub fn with_values(values: DatasetValues) -> Self {
        Self {
            shape: values.shape(),
            dtype: values.dtype(),
            attrs: Attributes::new(),
            dimension_scales: Vec::new(),
            values: Some(values),
        }
    }

    pub fn scalar_u32(value: u32) -> Self {
        let array = ArrayD::from_elem(IxDyn(&[]), value);
        Self::with_values(DatasetValues::UInt32(array))
    }

    pub fn scalar_f64(value: f64) -> Self {
        let array = ArrayD::from_elem(IxDyn(&[]), value);
        Self::with_values(DatasetValues::Float64(array))
    }

    pub fn vector_f64(values: Vec<f64>) -> Self {
        Self::with_values(DatasetValues::Float64(Array1::from(values).into_dyn()))
    }

    pub fn text(values: Vec<String>) -> Self {
        Self::with_values(DatasetValues::Text(values))
    }

    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn text_attr(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(AttrValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Fill a declared dataset; shape and dtype must match the declaration
    pub fn set_values(&mut self, values: DatasetValues) -> InsarResult<()> {
        if values.dtype() != self.dtype {
            return Err(InsarError::SchemaConsistency(format!(
                "dtype {:?} does not match declared {:?}",
                values.dtype(),
                self.dtype
            )));
        }
        if values.shape() != self.shape {
            return Err(InsarError::SchemaConsistency(format!(
                "shape {:?} does not match declared {:?}",
                values.shape(),
                self.shape
            )));
        }
        self.values = Some(values);
        Ok(())
    }
}

/// Group of datasets, child groups and attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub attrs: Attributes,
    pub groups: BTreeMap<String, Group>,
    pub datasets: BTreeMap<String, Dataset>,
}

impl Group {
    /// Datasets of this group and all descendants, with paths relative to it
    pub fn walk_datasets(&self) -> Vec<(String, &Dataset)> {
        let mut found = Vec::new();
        self.collect_datasets("", &mut found);
        found
    }

    fn collect_datasets<'a>(&'a self, prefix: &str, found: &mut Vec<(String, &'a Dataset)>) {
        for (name, dataset) in &self.datasets {
            found.push((join(prefix, name), dataset));
        }
        for (name, group) in &self.groups {
            group.collect_datasets(&join(prefix, name), found);
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Split "a/b/c" into ("a/b", "c")
fn split_leaf(path: &str) -> InsarResult<(String, &str)> {
    let parts = components(path);
    match parts.split_last() {
        Some((leaf, parents)) => Ok((parents.join("/"), *leaf)),
        None => Err(InsarError::SchemaConsistency(
            "empty dataset path".to_string(),
        )),
    }
}

/// Root of a hierarchical product
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductContainer {
    root: Group,
}

impl ProductContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_root(root: Group) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Root-level attributes
    pub fn attrs(&self) -> &Attributes {
        &self.root.attrs
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.root.attrs.insert(name.to_string(), value.into());
    }

    /// Get or create the group at `path`, creating missing parents
    pub fn require_group(&mut self, path: &str) -> InsarResult<&mut Group> {
        let mut group = &mut self.root;
        for name in components(path) {
            if group.datasets.contains_key(name) {
                return Err(InsarError::SchemaConsistency(format!(
                    "cannot create group '{}' in {}: a dataset has that name",
                    name, path
                )));
            }
            group = group.groups.entry(name.to_string()).or_default();
        }
        Ok(group)
    }

    pub fn group(&self, path: &str) -> Option<&Group> {
        let mut group = &self.root;
        for name in components(path) {
            group = group.groups.get(name)?;
        }
        Some(group)
    }

    pub fn group_mut(&mut self, path: &str) -> Option<&mut Group> {
        let mut group = &mut self.root;
        for name in components(path) {
            group = group.groups.get_mut(name)?;
        }
        Some(group)
    }

    /// Create (or replace) the dataset at `path`
    pub fn create_dataset(&mut self, path: &str, dataset: Dataset) -> InsarResult<&mut Dataset> {
        let (parent, leaf) = split_leaf(path)?;
        let group = self.require_group(&parent)?;
        if group.groups.contains_key(leaf) {
            return Err(InsarError::SchemaConsistency(format!(
                "cannot create dataset {}: a group has that name",
                path
            )));
        }
        group.datasets.insert(leaf.to_string(), dataset);
        group
            .datasets
            .get_mut(leaf)
            .ok_or_else(|| InsarError::SchemaConsistency(format!("dataset {} vanished", path)))
    }

    pub fn dataset(&self, path: &str) -> Option<&Dataset> {
        let (parent, leaf) = split_leaf(path).ok()?;
        self.group(&parent)?.datasets.get(leaf)
    }

    pub fn dataset_mut(&mut self, path: &str) -> Option<&mut Dataset> {
        let (parent, leaf) = split_leaf(path).ok()?;
        self.group_mut(&parent)?.datasets.get_mut(leaf)
    }

    /// Fill a pre-created dataset with values
    pub fn write_values(&mut self, path: &str, values: DatasetValues) -> InsarResult<()> {
        let dataset = self.dataset_mut(path).ok_or_else(|| {
            InsarError::SchemaConsistency(format!("dataset {} was never created", path))
        })?;
        dataset.set_values(values).map_err(|e| match e {
            InsarError::SchemaConsistency(msg) => {
                InsarError::SchemaConsistency(format!("{}: {}", path, msg))
            }
            other => other,
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.group(path).is_some() || self.dataset(path).is_some()
    }
}
