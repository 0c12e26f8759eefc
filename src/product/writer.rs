//! Phased product writer
//!
//! A product is written in a fixed order: root attributes, then grids, then
//! processing information, and finally it is sealed to disk. Repeating a phase
//! that was already reached overwrites its content in place.

use super::container::{Dataset, DatasetValues, ProductContainer};
use super::grids::{coordinate_names, grid_shape, write_base_grids, write_layers};
use super::procinfo::write_processing_information;
use super::schema::{ProductProfile, ROOT_PATH};
use super::store;
use crate::config::RunConfig;
use crate::types::{Frequency, InsarError, InsarResult, Polarization, ProductType};
use std::fmt;
use std::path::{Path, PathBuf};

/// Writing phase a product has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriterState {
    Unopened,
    RootAttrsWritten,
    GridsWritten,
    ProcInfoWritten,
    Sealed,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::Unopened => "unopened",
            WriterState::RootAttrsWritten => "root attributes written",
            WriterState::GridsWritten => "grids written",
            WriterState::ProcInfoWritten => "processing information written",
            WriterState::Sealed => "sealed",
        };
        f.write_str(name)
    }
}

pub struct ProductWriter<'a> {
    cfg: &'a RunConfig,
    profile: ProductProfile,
    path: PathBuf,
    container: ProductContainer,
    state: WriterState,
}

impl<'a> ProductWriter<'a> {
    /// Writer over a fresh in-memory container that will be sealed to `path`
    pub fn new(cfg: &'a RunConfig, product: ProductType, path: impl Into<PathBuf>) -> Self {
        Self {
            cfg,
            profile: ProductProfile::for_product(product),
            path: path.into(),
            container: ProductContainer::new(),
            state: WriterState::Unopened,
        }
    }

    /// Writer that continues from whatever already exists at `path`
    pub fn open(cfg: &'a RunConfig, product: ProductType, path: impl Into<PathBuf>) -> InsarResult<Self> {
        let mut writer = Self::new(cfg, product, path);
        writer.container = store::open_or_create(&writer.path)?;
        Ok(writer)
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn profile(&self) -> &ProductProfile {
        &self.profile
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn container(&self) -> &ProductContainer {
        &self.container
    }

    pub fn into_container(self) -> ProductContainer {
        self.container
    }

    /// Check that `phase` may run now: its predecessor was reached and the
    /// product is not sealed
    fn enter(&self, operation: &'static str, phase: WriterState) -> InsarResult<()> {
        let ready = match phase {
            WriterState::RootAttrsWritten => true,
            WriterState::GridsWritten => self.state >= WriterState::RootAttrsWritten,
            WriterState::ProcInfoWritten => self.state >= WriterState::GridsWritten,
            WriterState::Sealed => self.state >= WriterState::ProcInfoWritten,
            WriterState::Unopened => false,
        };
        if self.state == WriterState::Sealed || !ready {
            return Err(InsarError::WriterState {
                operation,
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn reach(&mut self, phase: WriterState) {
        self.state = self.state.max(phase);
    }

    /// Stamp title, reference document and the identification group
    pub fn add_root_attrs(&mut self) -> InsarResult<()> {
        self.enter("add root attributes", WriterState::RootAttrsWritten)?;
        let info = self.profile.info();
        let product = self.profile.product;

        self.container.set_attr("Conventions", "CF-1.7");
        self.container.set_attr("contact", "nisarops@jpl.nasa.gov");
        self.container.set_attr("institution", "NASA JPL");
        self.container.set_attr("mission_name", "NISAR");
        self.container.set_attr("reference_document", info.reference_document);
        self.container.set_attr("title", info.title);
        self.container.require_group(ROOT_PATH)?;

        let ident = self.profile.paths().identification();
        let frequencies = self.cfg.freq_pols().map(|(freq, _)| freq.to_string()).collect();
        self.container.create_dataset(
            &format!("{}/productType", ident),
            Dataset::text(vec![product.to_string()])
                .attr("description", "Product type"),
        )?;
        self.container.create_dataset(
            &format!("{}/productLevel", ident),
            Dataset::text(vec![product.level().to_string()])
                .attr("description", "Product level. L0A: Unprocessed instrument data; L0B: Reformatted, unprocessed instrument data; L1: Processed instrument data in radar coordinates system; and L2: Processed instrument data in geocoded coordinates system"),
        )?;
        self.container.create_dataset(
            &format!("{}/listOfFrequencies", ident),
            Dataset::text(frequencies)
                .attr("description", "List of frequency layers available in the product"),
        )?;
        self.container.create_dataset(
            &format!("{}/processingDateTime", ident),
            Dataset::text(vec![chrono::Utc::now().to_rfc3339()])
                .attr("description", "Processing UTC date and time in the format YYYY-MM-DDTHH:MM:SS"),
        )?;

        self.reach(WriterState::RootAttrsWritten);
        log::debug!("{}: root attributes written", product);
        Ok(())
    }

    /// Lay down coordinates and declare every content dataset
    pub fn add_grids(&mut self) -> InsarResult<()> {
        self.enter("add grids", WriterState::GridsWritten)?;
        write_base_grids(&mut self.container, self.cfg, &self.profile)?;
        write_layers(&mut self.container, self.cfg, &self.profile)?;
        self.validate_shapes()?;
        self.reach(WriterState::GridsWritten);
        log::debug!("{}: grids written", self.profile.product);
        Ok(())
    }

    /// Record algorithms and their parameters
    pub fn add_proc_info(&mut self) -> InsarResult<()> {
        self.enter("add processing information", WriterState::ProcInfoWritten)?;
        write_processing_information(&mut self.container, self.cfg, &self.profile)?;
        self.reach(WriterState::ProcInfoWritten);
        log::debug!("{}: processing information written", self.profile.product);
        Ok(())
    }

    /// Fill one declared content dataset
    pub fn write_layer(
        &mut self,
        freq: Frequency,
        pol: Polarization,
        layer: Option<&str>,
        name: &str,
        values: DatasetValues,
    ) -> InsarResult<()> {
        if self.state < WriterState::GridsWritten || self.state == WriterState::Sealed {
            return Err(InsarError::WriterState {
                operation: "write layer values",
                state: self.state.to_string(),
            });
        }
        let path = format!("{}/{}", self.profile.layer_group(freq, pol, layer), name);
        self.container.write_values(&path, values)
    }

    /// Check every content dataset against its frequency grid and coordinates
    pub fn validate_shapes(&self) -> InsarResult<()> {
        for (freq, _) in self.cfg.freq_pols() {
            let (rows, cols) = grid_shape(self.cfg, &self.profile, freq)?;
            let freq_group = self.profile.frequency_group(freq);

            for (axis, name) in coordinate_names(self.profile.base).iter().enumerate() {
                let path = format!("{}/{}", freq_group, name);
                let expected = if axis == 0 { rows } else { cols };
                match self.container.dataset(&path) {
                    Some(coord) if coord.shape == [expected] => {}
                    Some(coord) => {
                        return Err(InsarError::SchemaConsistency(format!(
                            "{} has shape {:?}, grid axis has {} samples",
                            path, coord.shape, expected
                        )))
                    }
                    None => {
                        return Err(InsarError::SchemaConsistency(format!(
                            "missing coordinate dataset {}",
                            path
                        )))
                    }
                }
            }

            let content = self.profile.content_group(freq);
            let group = self.container.group(&content).ok_or_else(|| {
                InsarError::SchemaConsistency(format!("missing content group {}", content))
            })?;
            for (relative, dataset) in group.walk_datasets() {
                if dataset.shape != [rows, cols] {
                    return Err(InsarError::SchemaConsistency(format!(
                        "{}/{} has shape {:?}, frequency {} grid is {:?}",
                        content,
                        relative,
                        dataset.shape,
                        freq,
                        (rows, cols)
                    )));
                }
                if let Some(values) = &dataset.values {
                    if values.shape() != dataset.shape {
                        return Err(InsarError::SchemaConsistency(format!(
                            "{}/{} holds values of shape {:?}",
                            content,
                            relative,
                            values.shape()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate and write the product to its path; no further changes allowed
    pub fn save(&mut self) -> InsarResult<()> {
        self.enter("seal product", WriterState::Sealed)?;
        self.validate_shapes()?;
        store::write(&self.path, &self.container)?;
        self.reach(WriterState::Sealed);
        log::info!("Sealed {} product {}", self.profile.product, self.path.display());
        Ok(())
    }

    /// Run every phase in order and seal
    pub fn write_all(&mut self) -> InsarResult<()> {
        self.add_root_attrs()?;
        self.add_grids()?;
        self.add_proc_info()?;
        self.save()
    }
}
